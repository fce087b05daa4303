use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use super::{fetch_json, CabinetSource};
use crate::{
    capture::normalize_score_text,
    error::ClientError,
    models::{ActivityReport, CabinetId, ScoreStatus, TableDetails},
};

/// One high score entry as stored on the cabinet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CabinetScore {
    /// Player initials.
    pub player_initials: String,
    /// Score as printed, e.g. `"48,104,320"`.
    pub score: String,
    /// Parsed value of `score`; zero when unparseable.
    pub numeric_score: i64,
}

impl CabinetScore {
    /// Entry from printed score text.
    pub fn new(player_initials: impl Into<String>, score: impl Into<String>) -> Self {
        let score = score.into();
        Self {
            player_initials: player_initials.into(),
            numeric_score: normalize_score_text(&score),
            score,
        }
    }
}

impl<'de> Deserialize<'de> for CabinetScore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            player_initials: String,
            score: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(CabinetScore::new(raw.player_initials, raw.score))
    }
}

/// Best positive score the owner holds in a cabinet listing.
pub fn best_score<'a>(scores: &'a [CabinetScore], owner: &str) -> Option<&'a CabinetScore> {
    scores
        .iter()
        .filter(|entry| entry.player_initials == owner && entry.numeric_score > 0)
        .max_by_key(|entry| entry.numeric_score)
}

#[derive(Debug, Deserialize)]
struct ScoresResponse {
    #[serde(default)]
    scores: Vec<CabinetScore>,
}

#[derive(Debug, Deserialize)]
struct ScanScoreResponse {
    #[serde(default)]
    status: Option<String>,
}

/// REST client for VPin Studio running on the cabinet.
#[derive(Debug, Clone)]
pub struct CabinetClient {
    http: reqwest::Client,
    base_url: String,
}

impl CabinetClient {
    /// Client rooted at `base_url`, e.g. `http://cabinet:8089/api/v1`.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Wheel artwork for a table.
    pub fn wheel_image_url(&self, id: &CabinetId) -> String {
        self.url(&format!("poppermedia/{id}/Wheel"))
    }
}

#[async_trait]
impl CabinetSource for CabinetClient {
    async fn tables(&self) -> Result<Vec<TableDetails>, ClientError> {
        fetch_json(&self.http, &self.url("games/knowns/-1")).await
    }

    async fn scores(&self, id: &CabinetId) -> Result<Vec<CabinetScore>, ClientError> {
        let response: ScoresResponse =
            fetch_json(&self.http, &self.url(&format!("games/scores/{id}"))).await?;
        Ok(response.scores)
    }

    async fn score_status(&self, id: &CabinetId) -> Result<ScoreStatus, ClientError> {
        let response: ScanScoreResponse =
            fetch_json(&self.http, &self.url(&format!("games/scanscore/{id}"))).await?;
        Ok(ScoreStatus::from_scan_text(response.status.as_deref()))
    }

    async fn activity(&self) -> Result<Vec<ActivityReport>, ClientError> {
        fetch_json(&self.http, &self.url("alx")).await
    }
}
