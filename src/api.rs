use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::level::Level;

const API_ROOT: &str = "api";

/// Opaque identifier the backend hands out for an open session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize)]
struct StartSessionRequest {
    level: Level,
}

#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    session_id: SessionId,
}

#[derive(Debug, Deserialize)]
struct StopSessionResponse {
    duration_minutes: i64,
}

/// Study hours aggregated over one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyHours {
    pub date: String,
    pub hours: f64,
}

/// Aggregate snapshot computed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub b1_plus_hours: f64,
    pub b2_hours: f64,
    pub total_hours: f64,
    pub b1_plus_goal_hours: f64,
    pub b2_goal_hours: f64,
    #[serde(default)]
    pub daily_b1_plus: Vec<DailyHours>,
    #[serde(default)]
    pub daily_b2: Vec<DailyHours>,
}

impl Stats {
    pub fn hours(&self, level: Level) -> f64 {
        match level {
            Level::B1Plus => self.b1_plus_hours,
            Level::B2 => self.b2_hours,
        }
    }

    pub fn goal_hours(&self, level: Level) -> f64 {
        match level {
            Level::B1Plus => self.b1_plus_goal_hours,
            Level::B2 => self.b2_goal_hours,
        }
    }

    pub fn combined_goal_hours(&self) -> f64 {
        self.b1_plus_goal_hours + self.b2_goal_hours
    }

    pub fn daily(&self, level: Level) -> &[DailyHours] {
        match level {
            Level::B1Plus => &self.daily_b1_plus,
            Level::B2 => &self.daily_b2,
        }
    }
}

/// Result of closing a session on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { duration_minutes: u32 },
    /// The backend had already closed this session; its duration was not returned
    AlreadyStopped,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("API {path} failed ({status}): {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("API {path} unreachable: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("API {path} returned an unreadable body: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid backend URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn is_already_stopped(&self) -> bool {
        matches!(
            self,
            ApiError::Status { status, body, .. }
                if (400..500).contains(status) && body.contains("already stopped")
        )
    }
}

/// Backend operations the client depends on
pub trait StudyApi: Send + Sync {
    fn start_session(&self, level: Level) -> Result<SessionId, ApiError>;
    fn stop_session(&self, id: &SessionId) -> Result<StopOutcome, ApiError>;
    fn discard_session(&self, id: &SessionId) -> Result<(), ApiError>;
    fn get_stats(&self) -> Result<Stats, ApiError>;
}

/// Blocking JSON client for the study backend
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let invalid = |reason: String| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|err| invalid(err.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a hierarchical URL".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Backend URL for `segments` under the API root. Each segment is
    /// percent-encoded, so ids cannot escape their path position.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(API_ROOT).extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
    }

    fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        debug!(path, "backend request");
        let response = request.send().map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            debug!(path, status = status.as_u16(), %body, "backend rejected request");
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        response.json::<T>().map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

impl StudyApi for HttpApi {
    fn start_session(&self, level: Level) -> Result<SessionId, ApiError> {
        let url = self.endpoint(&["sessions", "start"]);
        let path = url.path().to_string();
        let request = self
            .request(Method::POST, url)
            .json(&StartSessionRequest { level });
        let response = self.send(&path, request)?;
        let body: StartSessionResponse = Self::decode(&path, response)?;
        Ok(body.session_id)
    }

    fn stop_session(&self, id: &SessionId) -> Result<StopOutcome, ApiError> {
        let url = self.endpoint(&["sessions", "stop", id.as_str()]);
        let path = url.path().to_string();
        match self.send(&path, self.request(Method::POST, url)) {
            Ok(response) => {
                let body: StopSessionResponse = Self::decode(&path, response)?;
                let duration_minutes =
                    u32::try_from(body.duration_minutes.max(0)).unwrap_or(u32::MAX);
                Ok(StopOutcome::Stopped { duration_minutes })
            }
            Err(err) if err.is_already_stopped() => {
                info!(session = %id, "session was already stopped on the backend");
                Ok(StopOutcome::AlreadyStopped)
            }
            Err(err) => Err(err),
        }
    }

    fn discard_session(&self, id: &SessionId) -> Result<(), ApiError> {
        let url = self.endpoint(&["sessions", id.as_str()]);
        let path = url.path().to_string();
        // 204 carries no body
        self.send(&path, self.request(Method::DELETE, url))?;
        Ok(())
    }

    fn get_stats(&self) -> Result<Stats, ApiError> {
        let url = self.endpoint(&["stats"]);
        let path = url.path().to_string();
        let response = self.send(&path, self.request(Method::GET, url))?;
        Self::decode(&path, response)
    }
}

/// A backend call observed by [`ScriptedApi`]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Start(Level),
    Stop(SessionId),
    Discard(SessionId),
    GetStats,
}

#[derive(Debug, Default)]
struct Script {
    starts: VecDeque<Result<SessionId, ApiError>>,
    stops: VecDeque<Result<StopOutcome, ApiError>>,
    discards: VecDeque<Result<(), ApiError>>,
    stats: VecDeque<Result<Stats, ApiError>>,
    calls: Vec<ApiCall>,
}

/// In-memory backend for headless runs and tests.
///
/// Each call pops the next scripted result for its operation; an empty queue
/// answers with a 503 so unscripted calls show up as failures.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut script)
    }

    pub fn push_start(&self, result: Result<SessionId, ApiError>) {
        self.with_script(|s| s.starts.push_back(result));
    }

    pub fn push_stop(&self, result: Result<StopOutcome, ApiError>) {
        self.with_script(|s| s.stops.push_back(result));
    }

    pub fn push_discard(&self, result: Result<(), ApiError>) {
        self.with_script(|s| s.discards.push_back(result));
    }

    pub fn push_stats(&self, result: Result<Stats, ApiError>) {
        self.with_script(|s| s.stats.push_back(result));
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.with_script(|s| s.calls.clone())
    }

    pub fn stats_calls(&self) -> usize {
        self.with_script(|s| s.calls.iter().filter(|c| **c == ApiCall::GetStats).count())
    }

    fn unscripted(path: &str) -> ApiError {
        ApiError::Status {
            path: path.to_string(),
            status: 503,
            body: "no scripted response".to_string(),
        }
    }
}

impl StudyApi for ScriptedApi {
    fn start_session(&self, level: Level) -> Result<SessionId, ApiError> {
        self.with_script(|s| {
            s.calls.push(ApiCall::Start(level));
            s.starts
                .pop_front()
                .unwrap_or_else(|| Err(Self::unscripted("/api/sessions/start")))
        })
    }

    fn stop_session(&self, id: &SessionId) -> Result<StopOutcome, ApiError> {
        self.with_script(|s| {
            s.calls.push(ApiCall::Stop(id.clone()));
            s.stops
                .pop_front()
                .unwrap_or_else(|| Err(Self::unscripted("/api/sessions/stop")))
        })
    }

    fn discard_session(&self, id: &SessionId) -> Result<(), ApiError> {
        self.with_script(|s| {
            s.calls.push(ApiCall::Discard(id.clone()));
            s.discards
                .pop_front()
                .unwrap_or_else(|| Err(Self::unscripted("/api/sessions")))
        })
    }

    fn get_stats(&self) -> Result<Stats, ApiError> {
        self.with_script(|s| {
            s.calls.push(ApiCall::GetStats);
            s.stats
                .pop_front()
                .unwrap_or_else(|| Err(Self::unscripted("/api/stats")))
        })
    }
}
