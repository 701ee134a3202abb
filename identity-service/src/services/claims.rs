//! Claim extraction from external profile documents.
//!
//! A claim path is a dotted expression with optional array indices, e.g.
//! `user[0].name.firstName`. The *last* segment name becomes the claim name,
//! which lets tenants flatten nested values into top-level claims. Rules,
//! relied on by existing tenant configurations:
//! - paths that do not resolve are skipped silently, no claim and no error
//! - when two paths end in the same segment name, the later path in
//!   configuration order wins

use serde_json::{Map, Value};

/// Evaluate `paths` against `profile` in order, producing the claim map.
pub fn extract_claims(profile: &Value, paths: &[String]) -> Map<String, Value> {
    let mut claims = Map::new();

    for path in paths {
        if let Some((name, value)) = resolve_path(profile, path) {
            claims.insert(name, value);
        }
    }

    claims
}

/// Resolve one path, returning the final segment name and the value it
/// points at. `None` for empty, malformed or unresolvable paths.
fn resolve_path(profile: &Value, path: &str) -> Option<(String, Value)> {
    let segments: Vec<Segment> = path
        .split('.')
        .map(Segment::parse)
        .collect::<Option<Vec<_>>>()?;

    let last_name = segments.last()?.name.clone();

    let mut current = profile;
    for segment in &segments {
        current = current.get(&segment.name)?;
        for index in &segment.indices {
            current = current.get(index)?;
        }
    }

    Some((last_name, current.clone()))
}

struct Segment {
    name: String,
    indices: Vec<usize>,
}

impl Segment {
    /// Parses `name`, `name[0]` or `name[0][1]`.
    fn parse(raw: &str) -> Option<Segment> {
        let (name, mut rest) = match raw.find('[') {
            Some(pos) => (&raw[..pos], &raw[pos..]),
            None => (raw, ""),
        };

        if name.is_empty() {
            return None;
        }

        let mut indices = Vec::new();
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            indices.push(inner[..close].parse::<usize>().ok()?);
            rest = &inner[close + 1..];
        }

        Some(Segment {
            name: name.to_string(),
            indices,
        })
    }
}
