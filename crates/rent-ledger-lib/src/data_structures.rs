use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rates::{DEFAULT_ELECTRICITY_RATE, DEFAULT_WATER_RATE};

/// Rooms that exist in the house. A month's bill set has one row per room.
pub const ROOM_IDS: [i64; 4] = [1, 2, 3, 4];

pub fn room_name(room_id: i64) -> String {
    format!("Room {}", room_id)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid month key '{input}': expected YYYY-MM")]
pub struct MonthKeyError {
    input: String,
}

impl MonthKeyError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

/// A billing period, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthKeyError> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(MonthKeyError::new(&format!("{}-{}", year, month)));
        }
        Ok(Self { year, month })
    }

    pub fn parse(input: &str) -> Result<Self, MonthKeyError> {
        let (year, month) = input
            .split_once('-')
            .ok_or_else(|| MonthKeyError::new(input))?;

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if year.len() != 4 || month.len() != 2 || !all_digits(year) || !all_digits(month) {
            return Err(MonthKeyError::new(input));
        }

        let year: i32 = year.parse().map_err(|_| MonthKeyError::new(input))?;
        let month: u32 = month.parse().map_err(|_| MonthKeyError::new(input))?;
        Self::new(year, month).map_err(|_| MonthKeyError::new(input))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn previous(self) -> Self {
        self.offset(-1)
    }

    pub fn next(self) -> Self {
        self.offset(1)
    }

    /// Moves by whole calendar months, crossing year boundaries.
    pub fn offset(self, months: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Chart label, e.g. `T12/25`.
    pub fn short_label(&self) -> String {
        format!("T{}/{:02}", self.month, self.year.rem_euclid(100))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = MonthKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = MonthKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(month: MonthKey) -> Self {
        month.to_string()
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Reads an explicit `null` as the type's default.
fn null_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Distinguishes a present `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One room's billing record for one month, as stored in `monthly_bills`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub room_id: i64,
    pub month_key: MonthKey,
    #[serde(default, deserialize_with = "null_or_default")]
    pub occupants: u32,
    #[serde(default, deserialize_with = "null_or_default")]
    pub electricity_old: f64,
    #[serde(default, deserialize_with = "null_or_default")]
    pub electricity_new: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electricity_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_rate: Option<f64>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_paid: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Bill {
    /// An unsaved, zeroed bill using the default rates.
    pub fn draft(room_id: i64, month_key: MonthKey) -> Self {
        Self {
            id: None,
            room_id,
            month_key,
            occupants: 0,
            electricity_old: 0.0,
            electricity_new: 0.0,
            electricity_rate: Some(DEFAULT_ELECTRICITY_RATE),
            water_rate: Some(DEFAULT_WATER_RATE),
            is_paid: false,
            notes: None,
        }
    }

    pub fn electricity_rate(&self) -> f64 {
        self.electricity_rate.unwrap_or(DEFAULT_ELECTRICITY_RATE)
    }

    pub fn water_rate(&self) -> f64 {
        self.water_rate.unwrap_or(DEFAULT_WATER_RATE)
    }

    pub fn room_name(&self) -> String {
        room_name(self.room_id)
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// A sparse set of field changes. Only the fields that are set get sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupants: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electricity_old: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electricity_new: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electricity_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
    /// `Some(None)` clears the notes.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl BillPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rates(electricity_rate: f64, water_rate: f64) -> Self {
        Self {
            electricity_rate: Some(electricity_rate),
            water_rate: Some(water_rate),
            ..Self::default()
        }
    }

    pub fn paid(is_paid: bool) -> Self {
        Self {
            is_paid: Some(is_paid),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, bill: &mut Bill) {
        if let Some(occupants) = self.occupants {
            bill.occupants = occupants;
        }
        if let Some(old) = self.electricity_old {
            bill.electricity_old = old;
        }
        if let Some(new) = self.electricity_new {
            bill.electricity_new = new;
        }
        if let Some(rate) = self.electricity_rate {
            bill.electricity_rate = Some(rate);
        }
        if let Some(rate) = self.water_rate {
            bill.water_rate = Some(rate);
        }
        if let Some(is_paid) = self.is_paid {
            bill.is_paid = is_paid;
        }
        if let Some(notes) = &self.notes {
            bill.notes = notes.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillCalculation {
    electricity_usage: f64,
    electricity_cost: f64,
    water_cost: f64,
    room_rent: f64,
    total_bill: f64,
    per_person: f64,
}

impl BillCalculation {
    pub fn new(
        electricity_usage: f64,
        electricity_cost: f64,
        water_cost: f64,
        room_rent: f64,
        per_person: f64,
    ) -> Self {
        Self {
            electricity_usage,
            electricity_cost,
            water_cost,
            room_rent,
            total_bill: room_rent + water_cost + electricity_cost,
            per_person,
        }
    }

    pub fn electricity_usage(&self) -> f64 {
        self.electricity_usage
    }

    pub fn electricity_cost(&self) -> f64 {
        self.electricity_cost
    }

    pub fn water_cost(&self) -> f64 {
        self.water_cost
    }

    pub fn room_rent(&self) -> f64 {
        self.room_rent
    }

    pub fn total_bill(&self) -> f64 {
        self.total_bill
    }

    pub fn per_person(&self) -> f64 {
        self.per_person
    }
}

/// Totals across one month's bills.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthSummary {
    pub rooms: usize,
    pub occupied_rooms: usize,
    pub occupants: u32,
    pub electricity_usage: f64,
    pub total_revenue: f64,
    pub collected: f64,
    pub outstanding: f64,
    pub paid_rooms: usize,
}
