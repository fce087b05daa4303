//! External collaborators: the cabinet, the global leaderboard and the
//! community table catalog.
//!
//! Each is a trait so the scanner can be driven by the HTTP clients in this
//! module or by in-memory fakes.

/// VPin Studio REST client.
pub mod cabinet;
/// Lazily loaded community table catalog.
pub mod catalog;
/// VPin Mania leaderboard client.
pub mod leaderboard;

pub use cabinet::{best_score, CabinetClient, CabinetScore};
pub use catalog::{CatalogEntry, CatalogFile, HttpCatalog, TableCatalog};
pub use leaderboard::{LeaderboardClient, LeaderboardScore};

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::ClientError,
    models::{ActivityReport, CabinetId, ScoreStatus, TableDetails, WebTableId},
};

const USER_AGENT: &str = concat!("scoreboard/", env!("CARGO_PKG_VERSION"));

/// Tables, scores and play statistics held by the cabinet.
#[async_trait]
pub trait CabinetSource: Send + Sync {
    /// Every installed table.
    async fn tables(&self) -> Result<Vec<TableDetails>, ClientError>;

    /// High score entries currently stored for a table.
    async fn scores(&self, id: &CabinetId) -> Result<Vec<CabinetScore>, ClientError>;

    /// Why a table has no readable scores.
    async fn score_status(&self, id: &CabinetId) -> Result<ScoreStatus, ClientError>;

    /// Cumulative play statistics for every table.
    async fn activity(&self) -> Result<Vec<ActivityReport>, ClientError>;
}

/// Global leaderboard keyed by table design.
#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    /// Remote scores for a design.
    async fn scores(&self, web_id: &WebTableId) -> Result<Vec<LeaderboardScore>, ClientError>;
}

/// Full dump of the community catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every catalog entry.
    async fn entries(&self) -> Result<Vec<CatalogEntry>, ClientError>;
}

/// Shared HTTP client with the configured timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(ClientError::Build)
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, ClientError> {
    debug!(url = %url, "GET");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ClientError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| ClientError::Http {
            url: url.to_string(),
            source,
        })?;
    serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}
