use crate::data_structures::{Bill, MonthKey, ROOM_IDS};
use crate::rates::Rates;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// Carried forward from the named month's rows.
    PreviousMonth(MonthKey),
    /// No history; zeroed bills for every room.
    Defaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedPlan {
    month: MonthKey,
    source: SeedSource,
    drafts: Vec<Bill>,
}

impl SeedPlan {
    pub fn month(&self) -> MonthKey {
        self.month
    }

    pub fn source(&self) -> SeedSource {
        self.source
    }

    pub fn drafts(&self) -> &[Bill] {
        &self.drafts
    }

    pub fn into_drafts(self) -> Vec<Bill> {
        self.drafts
    }
}

/// Builds the first bill set of a month that has no rows yet.
pub struct BillSeeder {
    room_ids: Vec<i64>,
    default_rates: Rates,
}

impl BillSeeder {
    pub fn new() -> Self {
        Self {
            room_ids: ROOM_IDS.to_vec(),
            default_rates: Rates::default(),
        }
    }

    pub fn with_rooms(room_ids: Vec<i64>) -> Self {
        Self {
            room_ids,
            default_rates: Rates::default(),
        }
    }

    pub fn room_ids(&self) -> &[i64] {
        &self.room_ids
    }

    /// `previous` is whatever the store returned for `month.previous()`.
    pub fn plan(&self, month: MonthKey, previous: &[Bill]) -> SeedPlan {
        if previous.is_empty() {
            return SeedPlan {
                month,
                source: SeedSource::Defaults,
                drafts: self
                    .room_ids
                    .iter()
                    .map(|&room_id| self.default_bill(month, room_id))
                    .collect(),
            };
        }

        // A room can only appear once in the new month, even if an earlier
        // race left two rows behind; the lowest id wins.
        let mut by_room: BTreeMap<i64, &Bill> = BTreeMap::new();
        for bill in previous {
            by_room
                .entry(bill.room_id)
                .and_modify(|kept| {
                    if bill.id.unwrap_or(i64::MAX) < kept.id.unwrap_or(i64::MAX) {
                        *kept = bill;
                    }
                })
                .or_insert(bill);
        }

        SeedPlan {
            month,
            source: SeedSource::PreviousMonth(previous[0].month_key),
            drafts: by_room
                .values()
                .map(|prev| self.rollover(month, prev))
                .collect(),
        }
    }

    /// Meter continuity: last month's closing reading opens this month.
    pub fn rollover(&self, month: MonthKey, previous: &Bill) -> Bill {
        let rates = Rates::for_bill(previous);
        Bill {
            id: None,
            room_id: previous.room_id,
            month_key: month,
            occupants: previous.occupants,
            electricity_old: previous.electricity_new,
            electricity_new: 0.0,
            electricity_rate: Some(rates.electricity_rate()),
            water_rate: Some(rates.water_rate()),
            is_paid: false,
            notes: None,
        }
    }

    pub fn default_bill(&self, month: MonthKey, room_id: i64) -> Bill {
        Bill {
            electricity_rate: Some(self.default_rates.electricity_rate()),
            water_rate: Some(self.default_rates.water_rate()),
            ..Bill::draft(room_id, month)
        }
    }
}

impl Default for BillSeeder {
    fn default() -> Self {
        Self::new()
    }
}
