use serde::{Deserialize, Serialize};

// Wire shapes of the GitHub enterprise billing endpoints.

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeatsResponse {
    #[serde(default)]
    pub total_seats: i64,
    #[serde(default)]
    pub seats: Vec<CopilotSeat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CopilotSeat {
    // Seats assigned through a team may come back without an assignee.
    #[serde(default)]
    pub assignee: Option<Assignee>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Assignee {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    #[serde(default)]
    pub enterprise: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub usage_items: Vec<UsageItem>,
}

/// One billed line item of premium request usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageItem {
    pub product: String,
    pub sku: String,
    pub model: String,
    pub unit_type: String,
    pub price_per_unit: f64,
    pub gross_quantity: f64,
    pub gross_amount: f64,
    pub discount_quantity: f64,
    pub discount_amount: f64,
    pub net_quantity: f64,
    pub net_amount: f64,
}
