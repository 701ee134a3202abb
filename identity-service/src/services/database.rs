//! Postgres-backed storage. One struct implements every store trait so the
//! service wires a single pool everywhere.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::models::{BiometricCredential, Client, RefreshToken, TokenConfig};
use crate::services::error::ServiceError;
use crate::services::store::{ClientStore, ConfigStore, CredentialStore, RefreshTokenStore};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, ServiceError> {
        tracing::info!("Connecting to Postgres");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        tracing::info!("Database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ClientStore for Database {
    async fn find_client(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, ServiceError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT tenant_id, client_id, client_name, kind, allowed_scopes,
                   mfa_factors, enabled, created_at
            FROM clients
            WHERE tenant_id = $1 AND client_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn find_by_device(
        &self,
        tenant_id: &str,
        client_id: &str,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<BiometricCredential>, ServiceError> {
        let credential = sqlx::query_as::<_, BiometricCredential>(
            r#"
            SELECT tenant_id, client_id, user_id, device_id, credential_id,
                   public_key, created_at, updated_at
            FROM biometric_credentials
            WHERE tenant_id = $1 AND client_id = $2 AND user_id = $3 AND device_id = $4
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn find_by_credential_id(
        &self,
        tenant_id: &str,
        client_id: &str,
        credential_id: &str,
    ) -> Result<Option<BiometricCredential>, ServiceError> {
        let credential = sqlx::query_as::<_, BiometricCredential>(
            r#"
            SELECT tenant_id, client_id, user_id, device_id, credential_id,
                   public_key, created_at, updated_at
            FROM biometric_credentials
            WHERE tenant_id = $1 AND client_id = $2 AND credential_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(client_id)
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn upsert(
        &self,
        credential: BiometricCredential,
    ) -> Result<BiometricCredential, ServiceError> {
        // On conflict the existing credential_id and created_at survive;
        // only the key material rotates.
        let stored = sqlx::query_as::<_, BiometricCredential>(
            r#"
            INSERT INTO biometric_credentials
                (tenant_id, client_id, user_id, device_id, credential_id,
                 public_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (tenant_id, client_id, user_id, device_id)
            DO UPDATE SET public_key = EXCLUDED.public_key, updated_at = NOW()
            RETURNING tenant_id, client_id, user_id, device_id, credential_id,
                      public_key, created_at, updated_at
            "#,
        )
        .bind(&credential.tenant_id)
        .bind(&credential.client_id)
        .bind(&credential.user_id)
        .bind(&credential.device_id)
        .bind(&credential.credential_id)
        .bind(&credential.public_key)
        .bind(credential.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }
}

#[async_trait]
impl RefreshTokenStore for Database {
    async fn insert(&self, token: &RefreshToken) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, tenant_id, client_id, user_id, token_hash, expires_at,
                 active, scope, device_name, ip, source, location,
                 auth_methods, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(token.id)
        .bind(&token.tenant_id)
        .bind(&token.client_id)
        .bind(&token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.active)
        .bind(&token.scope)
        .bind(&token.device_name)
        .bind(&token.ip)
        .bind(&token.source)
        .bind(&token.location)
        .bind(&token.auth_methods)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_hash(
        &self,
        tenant_id: &str,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, ServiceError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, tenant_id, client_id, user_id, token_hash, expires_at,
                   active, scope, device_name, ip, source, location,
                   auth_methods, created_at
            FROM refresh_tokens
            WHERE tenant_id = $1 AND token_hash = $2
            "#,
        )
        .bind(tenant_id)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn list_active(
        &self,
        tenant_id: &str,
        user_id: &str,
        client_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RefreshToken>, ServiceError> {
        let tokens = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, tenant_id, client_id, user_id, token_hash, expires_at,
                   active, scope, device_name, ip, source, location,
                   auth_methods, created_at
            FROM refresh_tokens
            WHERE tenant_id = $1 AND user_id = $2 AND client_id = $3
              AND active = TRUE AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(client_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    async fn count_active(
        &self,
        tenant_id: &str,
        user_id: &str,
        client_id: &str,
    ) -> Result<i64, ServiceError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM refresh_tokens
            WHERE tenant_id = $1 AND user_id = $2 AND client_id = $3
              AND active = TRUE AND expires_at > NOW()
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn deactivate(&self, tenant_id: &str, token_hash: &str) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET active = FALSE WHERE tenant_id = $1 AND token_hash = $2",
        )
        .bind(tenant_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ConfigStore for Database {
    async fn find_token_config(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TokenConfig>, ServiceError> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT config FROM token_configs WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(value) => {
                let config: TokenConfig = serde_json::from_value(value).map_err(|e| {
                    ServiceError::TokenConfig(format!(
                        "Stored token config for tenant {} is malformed: {}",
                        tenant_id, e
                    ))
                })?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }
}
