use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use super::{fetch_json, LeaderboardSource};
use crate::{
    error::ClientError,
    models::{Score, WebTableId},
};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry on the global leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardScore {
    /// Score value.
    pub score: i64,
    /// Player initials.
    pub initials: String,
    /// Player display name.
    #[serde(default)]
    pub display_name: String,
    /// When the score was posted, in UTC.
    #[serde(deserialize_with = "deserialize_date")]
    pub creation_date: DateTime<Utc>,
}

impl LeaderboardScore {
    /// Model score carrying the posting date.
    pub fn into_score(self) -> Score {
        Score::at(self.initials, self.score, self.creation_date)
    }
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let naive =
        NaiveDateTime::parse_from_str(&text, DATE_FORMAT).map_err(serde::de::Error::custom)?;
    // Dates carry no zone and are read in the local one.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|date| date.with_timezone(&Utc))
        .ok_or_else(|| serde::de::Error::custom(format!("no such local time: {text}")))
}

/// Client for the VPin Mania leaderboard.
#[derive(Debug, Clone)]
pub struct LeaderboardClient {
    http: reqwest::Client,
    base_url: String,
}

impl LeaderboardClient {
    /// Client rooted at `base_url`, e.g. `https://www.vpin-mania.net/api/highscores/table`.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LeaderboardSource for LeaderboardClient {
    async fn scores(&self, web_id: &WebTableId) -> Result<Vec<LeaderboardScore>, ClientError> {
        fetch_json(&self.http, &format!("{}/{web_id}", self.base_url)).await
    }
}
