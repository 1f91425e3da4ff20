use crate::data_structures::Bill;
use serde::{Deserialize, Serialize};

/// VND per kWh when a bill carries no rate of its own.
pub const DEFAULT_ELECTRICITY_RATE: f64 = 5_000.0;
/// VND per occupant when a bill carries no rate of its own.
pub const DEFAULT_WATER_RATE: f64 = 80_000.0;
/// VND per occupant. Fixed, not configurable per bill.
pub const ROOM_RENT: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    electricity_rate: f64,
    water_rate: f64,
}

impl Rates {
    pub fn new(electricity_rate: f64, water_rate: f64) -> Self {
        Self {
            electricity_rate,
            water_rate,
        }
    }

    pub fn for_bill(bill: &Bill) -> Self {
        Self::new(bill.electricity_rate(), bill.water_rate())
    }

    pub fn electricity_rate(&self) -> f64 {
        self.electricity_rate
    }

    pub fn water_rate(&self) -> f64 {
        self.water_rate
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("electricity_rate", self.electricity_rate),
            ("water_rate", self.water_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        Ok(())
    }
}

impl Default for Rates {
    fn default() -> Self {
        Self::new(DEFAULT_ELECTRICITY_RATE, DEFAULT_WATER_RATE)
    }
}
