use crate::collector::{Snapshot, UsageLabels};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

pub use prometheus::TEXT_FORMAT;

pub const REQUEST_AMOUNT: &str = "github_copilot_user_usage_request_amount";
pub const REQUEST_COST_GROSS: &str = "github_copilot_user_usage_request_cost_gross";
pub const REQUEST_COST_DISCOUNT: &str = "github_copilot_user_usage_request_cost_discount";

/// Metadata about the currently published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub collected_at: Option<DateTime<Utc>>,
    pub seat_holders: usize,
    pub observations: usize,
    pub skipped_users: Vec<String>,
}

// A fully populated registry. Never mutated once built.
struct Published {
    summary: SnapshotSummary,
    registry: Registry,
}

impl Published {
    fn empty() -> Self {
        Self {
            summary: SnapshotSummary::default(),
            registry: Registry::new(),
        }
    }

    fn build(snapshot: &Snapshot) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let amount = register_gauge_vec(
            &registry,
            REQUEST_AMOUNT,
            "Number of Copilot premium requests per user, SKU, and model for the current month",
        )?;
        let gross = register_gauge_vec(
            &registry,
            REQUEST_COST_GROSS,
            "Gross cost in USD of Copilot premium requests per user, SKU, and model for the current month",
        )?;
        let discount = register_gauge_vec(
            &registry,
            REQUEST_COST_DISCOUNT,
            "Discount amount in USD applied to Copilot premium requests per user, SKU, and model for the current month",
        )?;

        for obs in &snapshot.observations {
            let labels = obs.labels.values();
            amount.with_label_values(&labels).set(obs.gross_quantity);
            gross.with_label_values(&labels).set(obs.gross_amount);
            discount.with_label_values(&labels).set(obs.discount_amount);
        }

        Ok(Self {
            summary: SnapshotSummary {
                collected_at: Some(snapshot.collected_at),
                seat_holders: snapshot.seat_holders,
                observations: snapshot.observations.len(),
                skipped_users: snapshot.skipped_users.clone(),
            },
            registry,
        })
    }
}

fn register_gauge_vec(registry: &Registry, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    let vec = GaugeVec::new(Opts::new(name, help), &UsageLabels::NAMES)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

/// Holds the gauges a scrape sees.
///
/// `publish` builds the new gauge set off to the side and swaps it in under
/// the write lock; `render` only holds the read lock long enough to clone the
/// pointer. A scrape therefore sees exactly one snapshot, old or new.
pub struct Publisher {
    current: RwLock<Arc<Published>>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Published::empty())),
        }
    }

    pub fn publish(&self, snapshot: &Snapshot) -> prometheus::Result<()> {
        let next = Arc::new(Published::build(snapshot)?);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = next;
        Ok(())
    }

    /// Prometheus text exposition of the published gauges.
    pub fn render(&self) -> prometheus::Result<String> {
        let published = self.load();
        let families = published.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn summary(&self) -> SnapshotSummary {
        self.load().summary.clone()
    }

    fn load(&self) -> Arc<Published> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }
}
