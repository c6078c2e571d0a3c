//! Health probe handler.

use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tokio::time::{Duration, timeout};
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::GIT_COMMIT_HASH;

const HEALTH_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health",
)]
/// Report service health including database connectivity.
pub async fn health(pool: Extension<PgPool>) -> impl IntoResponse {
    let db_healthy = probe_database(&pool).await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_healthy {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let mut headers = HeaderMap::new();
    if let Ok(value) =
        format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>()
    {
        headers.insert("X-App", value);
    }

    if db_healthy {
        (StatusCode::OK, headers, Json(health))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, Json(health))
    }
}

async fn probe_database(pool: &PgPool) -> bool {
    let probe = timeout(Duration::from_secs(HEALTH_DB_TIMEOUT_SECONDS), async {
        match pool.acquire().await {
            Ok(mut conn) => match conn.ping().await {
                Ok(()) => true,
                Err(error) => {
                    error!("Failed to ping database: {error}");
                    false
                }
            },
            Err(error) => {
                error!("Failed to acquire database connection: {error}");
                false
            }
        }
    })
    .await;

    match probe {
        Ok(healthy) => {
            debug!("Database probe finished: healthy={healthy}");
            healthy
        }
        Err(_) => {
            warn!("Database health check timed out");
            false
        }
    }
}
