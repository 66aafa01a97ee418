//! Named sample customers for quick what-if scoring.

use crate::features::CustomerFeatures;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomerPreset {
    Default,
    HighActivity,
    LowActivity,
    NewCustomer,
}

impl CustomerPreset {
    pub const ALL: [CustomerPreset; 4] = [
        CustomerPreset::Default,
        CustomerPreset::HighActivity,
        CustomerPreset::LowActivity,
        CustomerPreset::NewCustomer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Default      => "default",
            Self::HighActivity => "high-activity",
            Self::LowActivity  => "low-activity",
            Self::NewCustomer  => "new-customer",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Feature record plus the raw CLV estimate that goes with it.
    pub fn sample(&self) -> (CustomerFeatures, f64) {
        let (avg_order_value, invoice_count, total_quantity, tenure_days, raw_clv) = match self {
            Self::Default      => (350.0, 6, 40, 180, 500.0),
            Self::HighActivity => (600.0, 12, 140, 365, 5000.0),
            Self::LowActivity  => (120.0, 2, 8, 60, 200.0),
            Self::NewCustomer  => (250.0, 1, 3, 10, 250.0),
        };
        (
            CustomerFeatures { avg_order_value, invoice_count, total_quantity, tenure_days },
            raw_clv,
        )
    }
}
