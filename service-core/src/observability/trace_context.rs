//! W3C Trace Context propagation for outbound collaborator calls.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Inject the current span's trace context into outbound HTTP headers.
///
/// Formats the active span context as a W3C `traceparent` header so
/// downstream collaborators (e.g. the external profile endpoint) can join
/// the trace. A no-op when there is no sampled span.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let context = Span::current().context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if !span_context.is_valid() {
        return;
    }

    let traceparent = format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    );

    if let Ok(value) = HeaderValue::from_str(&traceparent) {
        headers.insert(TRACEPARENT_HEADER, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_span_means_no_header() {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        assert!(headers.get(TRACEPARENT_HEADER).is_none());
    }
}
