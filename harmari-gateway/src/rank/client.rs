//! Remote ranking job API client.
//!
//! Thin request/response wrapper: submit a search job, fetch job status.
//! There is no retry here; retry policy lives in the coordinator's polling
//! loop, which branches on the error taxonomy this client exposes.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use harmari_core::{RankScore, RankingCard, UNKNOWN};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);

/// Ranking API client
#[derive(Clone)]
pub struct RankApiClient {
    http: reqwest::Client,
    base_url: String,
}

/// Errors that can occur when calling the ranking API.
///
/// `AccessDenied`, `BadRequest`, `JobNotFound` and `Rejected` are permanent
/// and must not be retried; `Transport` and `Payload` are transient and the
/// polling loop retries them until its ceiling.
#[derive(Debug, thiserror::Error)]
pub enum RankApiError {
    #[error("access denied by the ranking API")]
    AccessDenied,
    #[error("the ranking API rejected the request as malformed")]
    BadRequest,
    #[error("search job not found")]
    JobNotFound,
    #[error("search rejected: {message}")]
    Rejected { message: String },
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response payload: {0}")]
    Payload(String),
}

impl RankApiError {
    /// Whether the polling loop may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, RankApiError::Transport(_) | RankApiError::Payload(_))
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    server: &'a str,
    character: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchSubmitResponse {
    success: bool,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    estimated_wait_time: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// Remote job status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Timeout,
    /// Unrecognized status string; treated as still-running.
    #[serde(other)]
    Unknown,
}

/// Response from `GET /search/status/{job_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub character: Option<ApiCharacter>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Character payload of a completed job. The rankings map is keyed by the
/// Korean category names; individual fields may be numbers or pre-formatted
/// strings depending on the upstream version.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCharacter {
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub rankings: HashMap<String, ApiRanking>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiRanking {
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub rank: Option<Value>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default)]
    pub change: Option<Value>,
    #[serde(default)]
    pub change_type: Option<String>,
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn score_from(ranking: Option<&ApiRanking>) -> RankScore {
    let empty = ApiRanking::default();
    let r = ranking.unwrap_or(&empty);
    RankScore::normalize(
        r.rank.as_ref().and_then(value_to_string).as_deref(),
        r.power.as_ref().and_then(value_to_string).as_deref(),
        r.change.as_ref().and_then(value_to_string).as_deref(),
        r.change_type.as_deref(),
    )
}

impl ApiCharacter {
    /// Normalize the heterogeneous payload into the canonical card.
    pub fn into_card(self) -> RankingCard {
        let combat = self.rankings.get("전투력");
        let charm = self.rankings.get("매력");
        let life = self.rankings.get("생활력");

        let character = self
            .character
            .or_else(|| combat.and_then(|r| r.character.clone()))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let server = self
            .server
            .or_else(|| combat.and_then(|r| r.server.clone()))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let class = combat
            .and_then(|r| r.class.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());

        RankingCard {
            character,
            server,
            class,
            combat: score_from(combat),
            charm: score_from(charm),
            life: score_from(life),
        }
    }
}

impl RankApiClient {
    /// Create a new client for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Submit a search job; returns the remote job id.
    pub async fn submit_search(
        &self,
        server: &str,
        character: &str,
    ) -> Result<String, RankApiError> {
        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest { server, character })
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await?;

        let response = Self::classify_status(response)?.error_for_status()?;

        let body: SearchSubmitResponse = response
            .json()
            .await
            .map_err(|e| RankApiError::Payload(e.to_string()))?;

        if !body.success {
            return Err(RankApiError::Rejected {
                message: body
                    .message
                    .unwrap_or_else(|| "검색 요청이 거부되었습니다.".to_string()),
            });
        }

        body.job_id
            .ok_or_else(|| RankApiError::Payload("missing job_id in submit response".to_string()))
    }

    /// Fetch the current status of a search job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, RankApiError> {
        let response = self
            .http
            .get(format!("{}/search/status/{}", self.base_url, job_id))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RankApiError::JobNotFound);
        }
        let response = Self::classify_status(response)?.error_for_status()?;

        response
            .json()
            .await
            .map_err(|e| RankApiError::Payload(e.to_string()))
    }

    fn classify_status(response: reqwest::Response) -> Result<reqwest::Response, RankApiError> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RankApiError::AccessDenied),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(RankApiError::BadRequest)
            }
            _ => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmari_core::ChangeType;

    #[test]
    fn status_response_deserializes_nested_payload() {
        let raw = serde_json::json!({
            "status": "completed",
            "success": true,
            "character": {
                "character": "Foo",
                "server": "데이안",
                "rankings": {
                    "전투력": {
                        "class": "전사",
                        "rank": 1234,
                        "power": "123,456",
                        "change": 12,
                        "change_type": "up"
                    },
                    "매력": { "rank": "5,678위", "power": 4000 },
                    "생활력": {}
                }
            }
        });

        let parsed: JobStatusResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.status, JobStatus::Completed);
        assert_eq!(parsed.success, Some(true));

        let card = parsed.character.unwrap().into_card();
        assert_eq!(card.character, "Foo");
        assert_eq!(card.server, "데이안");
        assert_eq!(card.class, "전사");

        // Numbers and pre-formatted strings normalize to the same shape
        assert_eq!(card.combat.rank, "1,234위");
        assert_eq!(card.combat.power, "123,456");
        assert_eq!(card.combat.change, 12);
        assert_eq!(card.combat.change_type, ChangeType::Up);
        assert_eq!(card.charm.rank, "5,678위");
        assert_eq!(card.charm.power, "4,000");

        // An empty category falls back to the unranked sentinel
        assert_eq!(card.life.rank, UNKNOWN);
        assert_eq!(card.life.power, UNKNOWN);
        assert_eq!(card.life.change, 0);
    }

    #[test]
    fn status_response_tolerates_failure_shape() {
        let raw = serde_json::json!({
            "status": "failed",
            "error": "Unknown search error",
            "error_code": "E42"
        });

        let parsed: JobStatusResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.status, JobStatus::Failed);
        assert_eq!(parsed.error.as_deref(), Some("Unknown search error"));
        assert!(parsed.character.is_none());
    }

    #[test]
    fn unknown_status_strings_map_to_unknown() {
        let raw = serde_json::json!({ "status": "queued_v2" });
        let parsed: JobStatusResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.status, JobStatus::Unknown);
    }

    #[test]
    fn card_falls_back_to_combat_identity_fields() {
        let raw = serde_json::json!({
            "rankings": {
                "전투력": { "character": "Bar", "server": "던컨", "class": "궁수", "rank": 9 }
            }
        });
        let character: ApiCharacter = serde_json::from_value(raw).unwrap();
        let card = character.into_card();
        assert_eq!(card.character, "Bar");
        assert_eq!(card.server, "던컨");
        assert_eq!(card.class, "궁수");
        assert_eq!(card.combat.rank, "9위");
    }

    #[test]
    fn transient_classification() {
        assert!(!RankApiError::AccessDenied.is_transient());
        assert!(!RankApiError::BadRequest.is_transient());
        assert!(!RankApiError::JobNotFound.is_transient());
        assert!(
            !RankApiError::Rejected {
                message: "nope".to_string()
            }
            .is_transient()
        );
        assert!(RankApiError::Payload("bad json".to_string()).is_transient());
    }
}
