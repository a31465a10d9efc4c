use crate::http::{ApiError, GithubClient};
use crate::types::{SeatsResponse, UsageItem, UsageResponse};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use urlencoding::encode;

pub const SEATS_PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("listing copilot seats page {page}: {source}")]
    SeatsPage {
        page: u32,
        #[source]
        source: ApiError,
    },
    #[error("getting premium usage for user {user:?}: {source}")]
    UserUsage {
        user: String,
        #[source]
        source: ApiError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UsageLabels {
    pub user: String,
    pub sku: String,
    pub model: String,
    pub enterprise: String,
}

impl UsageLabels {
    pub const NAMES: [&'static str; 4] = ["user", "sku", "model", "enterprise"];

    /// Values in the order of [`UsageLabels::NAMES`].
    pub fn values(&self) -> [&str; 4] {
        [
            self.user.as_str(),
            self.sku.as_str(),
            self.model.as_str(),
            self.enterprise.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricObservation {
    pub labels: UsageLabels,
    pub gross_quantity: f64,
    pub gross_amount: f64,
    pub discount_amount: f64,
}

impl MetricObservation {
    pub fn from_item(enterprise: &str, user: &str, item: &UsageItem) -> Self {
        Self {
            labels: UsageLabels {
                user: user.to_string(),
                sku: item.sku.clone(),
                model: item.model.clone(),
                enterprise: enterprise.to_string(),
            },
            gross_quantity: item.gross_quantity,
            gross_amount: item.gross_amount,
            discount_amount: item.discount_amount,
        }
    }
}

/// Everything gathered in one collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub collected_at: DateTime<Utc>,
    pub seat_holders: usize,
    /// Users whose usage could not be fetched this cycle.
    pub skipped_users: Vec<String>,
    pub observations: Vec<MetricObservation>,
}

impl Snapshot {
    pub fn new(observations: Vec<MetricObservation>) -> Self {
        Self {
            collected_at: Utc::now(),
            seat_holders: 0,
            skipped_users: Vec::new(),
            observations,
        }
    }
}

pub struct Collector {
    client: Arc<GithubClient>,
}

impl Collector {
    pub fn new(client: Arc<GithubClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<GithubClient> {
        &self.client
    }

    /// Logins of every Copilot seat holder in the enterprise.
    ///
    /// The endpoint has no "has more" marker; a short page ends the listing.
    pub async fn list_seats(&self, enterprise: &str) -> Result<Vec<String>, CollectError> {
        let mut logins = Vec::new();
        let mut page: u32 = 1;
        loop {
            let url = format!(
                "{}/enterprises/{}/copilot/billing/seats?per_page={}&page={}",
                self.client.api_url(),
                encode(enterprise),
                SEATS_PAGE_SIZE,
                page
            );
            let resp: SeatsResponse = self
                .client
                .get_json(&url)
                .await
                .map_err(|source| CollectError::SeatsPage { page, source })?;

            let page_len = resp.seats.len();
            for seat in resp.seats {
                match seat.assignee.map(|a| a.login).filter(|l| !l.is_empty()) {
                    Some(login) => logins.push(login),
                    None => debug!("skipping copilot seat without an assignee on page {}", page),
                }
            }

            if page_len < SEATS_PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(logins)
    }

    pub async fn get_user_usage(
        &self,
        enterprise: &str,
        user: &str,
    ) -> Result<Vec<UsageItem>, CollectError> {
        let url = format!(
            "{}/enterprises/{}/settings/billing/premium_request/usage?user={}",
            self.client.api_url(),
            encode(enterprise),
            encode(user)
        );
        let resp: UsageResponse =
            self.client
                .get_json(&url)
                .await
                .map_err(|source| CollectError::UserUsage {
                    user: user.to_string(),
                    source,
                })?;
        Ok(resp.usage_items)
    }

    /// Gather one snapshot. Only a failed seat listing fails the whole cycle;
    /// users whose usage cannot be fetched are left out.
    pub async fn collect(&self, enterprise: &str) -> Result<Snapshot, CollectError> {
        let logins = self.list_seats(enterprise).await?;
        info!("found {} copilot seat holders", logins.len());

        let mut observations = Vec::new();
        let mut skipped_users = Vec::new();
        for login in &logins {
            match self.get_user_usage(enterprise, login).await {
                Ok(items) => observations.extend(
                    items
                        .iter()
                        .map(|item| MetricObservation::from_item(enterprise, login, item)),
                ),
                Err(err) => {
                    warn!("failed to get usage for user {}: {}", login, err);
                    skipped_users.push(login.clone());
                }
            }
        }

        Ok(Snapshot {
            collected_at: Utc::now(),
            seat_holders: logins.len(),
            skipped_users,
            observations,
        })
    }
}
