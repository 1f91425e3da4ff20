pub mod analytics;
pub mod calculator;
pub mod controller;
pub mod data_structures;
pub mod error;
pub mod rates;
pub mod seeding;
pub mod store;

pub use analytics::{AnalyticsWindow, MonthAnalytics, RoomTrend};
pub use calculator::BillCalculator;
pub use controller::{
    load_month, BillingController, LoadApplied, LoadState, LoadTicket, LocalEdit, MonthLoad,
    MonthlyBilling, UpdateOutcome,
};
pub use data_structures::{
    Bill, BillCalculation, BillPatch, MonthKey, MonthKeyError, MonthSummary, ROOM_IDS,
};
pub use error::{BillingError, StoreError, StoreResult};
pub use rates::Rates;
pub use seeding::{BillSeeder, SeedSource};
pub use store::{BillStore, JsonFileStore, MemoryStore, RestConfig, RestStore};

pub use anyhow::Result;

pub mod prelude {
    pub use crate::controller::{BillingController, UpdateOutcome};
    pub use crate::data_structures::{Bill, BillPatch, MonthKey};
    pub use crate::rates::Rates;
    pub use crate::store::BillStore;
    pub use anyhow::Result;
}
