use crate::config::GithubConfig;
use log::{debug, info, warn};
use reqwest::header::{HeaderValue, InvalidHeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

mod rate;
mod timer;

pub use rate::{
    classify_response, Disposition, RateLimitState, FALLBACK_WAIT, RATE_LIMIT_RESET_BUFFER,
};
pub use timer::{Timer, TokioTimer};

pub const MAX_ATTEMPTS: u32 = 3;
const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("building http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("invalid authorization token: {0}")]
    InvalidToken(#[from] InvalidHeaderValue),
    #[error("get {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {} for {}", .status.as_u16(), .url)]
    UnexpectedStatus { status: StatusCode, url: String },
    #[error("secondary rate limited on {url} after {retries} retries")]
    SecondaryRateLimited { url: String, retries: u32 },
    #[error("primary rate limited on {url} after {retries} retries")]
    PrimaryRateLimited { url: String, retries: u32 },
    #[error("get {url}: exceeded max retries")]
    RetriesExceeded { url: String },
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            ApiError::SecondaryRateLimited { .. } | ApiError::PrimaryRateLimited { .. }
        )
    }
}

// Progress of a single `get_json` call.
enum State<T> {
    Attempting,
    WaitingSecondary(Duration),
    WaitingPrimary(Duration),
    Succeeded(T),
    Failed(ApiError),
}

pub fn build_client(cfg: &GithubConfig) -> Result<Client, ApiError> {
    // Authorization is attached per request so the token never lands in default headers.
    let mut builder = Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .use_rustls_tls();
    if let Some(timeout) = cfg.timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(ApiError::Build)
}

fn auth_header(token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
    value.set_sensitive(true);
    Ok(value)
}

/// GitHub REST client that rides out both secondary (429) and primary
/// (403 with an exhausted quota) rate limits.
pub struct GithubClient {
    http: Client,
    auth: HeaderValue,
    api_url: String,
    api_version: HeaderValue,
    timer: Arc<dyn Timer>,
    rate: Mutex<RateLimitState>,
}

impl GithubClient {
    pub fn new(cfg: &GithubConfig) -> Result<Self, ApiError> {
        Self::with_timer(cfg, Arc::new(TokioTimer))
    }

    pub fn with_timer(cfg: &GithubConfig, timer: Arc<dyn Timer>) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_client(cfg)?,
            auth: auth_header(&cfg.token)?,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            api_version: HeaderValue::from_str(&cfg.api_version)?,
            timer,
            rate: Mutex::new(RateLimitState::default()),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Copy of the tracked primary rate limit.
    pub fn rate_limit(&self) -> RateLimitState {
        *self.lock_rate()
    }

    fn lock_rate(&self) -> MutexGuard<'_, RateLimitState> {
        self.rate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// GET `url` and decode the JSON body, making at most [`MAX_ATTEMPTS`] attempts.
    ///
    /// Only rate-limited responses are retried. Transport failures and any
    /// other non-200 status fail the call on the spot.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let mut attempt: u32 = 0;
        let mut state = State::Attempting;
        loop {
            state = match state {
                State::Attempting if attempt >= MAX_ATTEMPTS => {
                    State::Failed(ApiError::RetriesExceeded { url: url.to_string() })
                }
                State::Attempting => {
                    attempt += 1;
                    self.attempt(url).await
                }
                State::WaitingSecondary(wait) => {
                    let retries_remaining = MAX_ATTEMPTS - attempt;
                    warn!(
                        "github secondary rate limit hit on {}; waiting {:?}, {} retries remaining",
                        url, wait, retries_remaining
                    );
                    self.timer.sleep(wait).await;
                    if retries_remaining == 0 {
                        State::Failed(ApiError::SecondaryRateLimited {
                            url: url.to_string(),
                            retries: MAX_ATTEMPTS,
                        })
                    } else {
                        State::Attempting
                    }
                }
                State::WaitingPrimary(wait) => {
                    let retries_remaining = MAX_ATTEMPTS - attempt;
                    warn!(
                        "github primary rate limit hit on {}; waiting {:?}, {} retries remaining",
                        url, wait, retries_remaining
                    );
                    self.timer.sleep(wait).await;
                    if retries_remaining == 0 {
                        State::Failed(ApiError::PrimaryRateLimited {
                            url: url.to_string(),
                            retries: MAX_ATTEMPTS,
                        })
                    } else {
                        State::Attempting
                    }
                }
                State::Succeeded(value) => return Ok(value),
                State::Failed(err) => return Err(err),
            };
        }
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &str) -> State<T> {
        let preemptive = self.lock_rate().preemptive_wait(self.timer.now());
        if let Some(wait) = preemptive {
            info!(
                "preemptively waiting {:?} for github rate limit reset at {}",
                wait,
                self.rate_limit().reset_at
            );
            self.timer.sleep(wait).await;
        }

        let res = self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(GITHUB_JSON))
            .header(AUTHORIZATION, self.auth.clone())
            .header("X-GitHub-Api-Version", self.api_version.clone())
            .send()
            .await;
        let res = match res {
            Ok(r) => r,
            Err(source) => {
                return State::Failed(ApiError::Transport {
                    url: url.to_string(),
                    source,
                })
            }
        };

        let status = res.status();
        debug!("GET {} -> {}", url, status);
        let disposition = classify_response(status, res.headers(), self.timer.now());
        match disposition {
            Disposition::Success => {
                self.lock_rate().update_from_headers(res.headers());
                match res.json::<T>().await {
                    Ok(value) => State::Succeeded(value),
                    Err(source) => State::Failed(ApiError::Decode {
                        url: url.to_string(),
                        source,
                    }),
                }
            }
            Disposition::SecondaryLimited { wait } => {
                drain(res).await;
                State::WaitingSecondary(wait)
            }
            Disposition::PrimaryLimited { wait } => {
                drain(res).await;
                State::WaitingPrimary(wait)
            }
            Disposition::Unexpected => {
                drain(res).await;
                State::Failed(ApiError::UnexpectedStatus {
                    status,
                    url: url.to_string(),
                })
            }
        }
    }
}

// Read the body to the end so the connection can be reused.
async fn drain(res: Response) {
    let _ = res.bytes().await;
}
