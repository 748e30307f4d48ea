// src/models/plan.rs

use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Branches,
    Staff,
    Products,
    Suppliers,
    Debtors,
    DailySales,
    Reports,
}

impl Feature {
    pub fn is_countable(self) -> bool {
        !matches!(self, Feature::Reports)
    }
}

/// Cap for one feature on one tier. Serializes as a number, `"unlimited"`
/// or a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitValue {
    Count(u32),
    Unlimited,
    Flag(bool),
}

impl Serialize for LimitValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LimitValue::Count(n) => serializer.serialize_u32(*n),
            LimitValue::Unlimited => serializer.serialize_str("unlimited"),
            LimitValue::Flag(b) => serializer.serialize_bool(*b),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheck {
    pub feature: Feature,
    pub tier: PlanTier,
    pub allowed: bool,
    #[schema(value_type = Object, example = 5)]
    pub limit: LimitValue,
    pub current_usage: u64,
}
