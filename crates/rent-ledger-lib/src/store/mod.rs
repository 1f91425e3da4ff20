//! The `monthly_bills` table contract and its backends.

pub mod file;
pub mod memory;
pub mod rest;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use rest::{RestConfig, RestStore};

use crate::data_structures::{Bill, BillPatch, MonthKey};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait BillStore: Send + Sync {
    /// Rows whose `month_key` equals `month`, ordered by `room_id`.
    async fn select_month(&self, month: MonthKey) -> StoreResult<Vec<Bill>>;

    /// Rows whose `month_key` is in `months`, ordered by `month_key` then `room_id`.
    async fn select_months(&self, months: &[MonthKey]) -> StoreResult<Vec<Bill>>;

    /// Inserts all drafts or none. Returns the stored rows, ids assigned,
    /// ordered by `room_id`. Fails with [`StoreError::Conflict`] when a row
    /// for the same (room_id, month_key) already exists.
    async fn insert(&self, drafts: &[Bill]) -> StoreResult<Vec<Bill>>;

    async fn update_by_id(&self, id: i64, patch: &BillPatch) -> StoreResult<()>;

    /// Applies `patch` to every row of `month`.
    async fn update_month(&self, month: MonthKey, patch: &BillPatch) -> StoreResult<()>;
}

pub(crate) fn sort_rows(bills: &mut [Bill]) {
    bills.sort_by(|a, b| {
        a.month_key
            .cmp(&b.month_key)
            .then(a.room_id.cmp(&b.room_id))
            .then(a.id.cmp(&b.id))
    });
}

/// Uniqueness of (room_id, month_key) across `existing` and the new `drafts`.
pub(crate) fn check_unique(existing: &[Bill], drafts: &[Bill]) -> StoreResult<()> {
    let mut seen: HashSet<(i64, MonthKey)> = existing
        .iter()
        .map(|bill| (bill.room_id, bill.month_key))
        .collect();

    for draft in drafts {
        if !seen.insert((draft.room_id, draft.month_key)) {
            return Err(StoreError::Conflict(format!(
                "room {} already has a bill for {}",
                draft.room_id, draft.month_key
            )));
        }
    }
    Ok(())
}

/// Shared table logic for the in-process backends.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct Table {
    #[serde(default)]
    next_id: i64,
    #[serde(default)]
    bills: Vec<Bill>,
}

impl Table {
    pub(crate) fn select_month(&self, month: MonthKey) -> Vec<Bill> {
        self.select_months(&[month])
    }

    pub(crate) fn select_months(&self, months: &[MonthKey]) -> Vec<Bill> {
        let mut rows: Vec<Bill> = self
            .bills
            .iter()
            .filter(|bill| months.contains(&bill.month_key))
            .cloned()
            .collect();
        sort_rows(&mut rows);
        rows
    }

    pub(crate) fn insert(&mut self, drafts: &[Bill]) -> StoreResult<Vec<Bill>> {
        check_unique(&self.bills, drafts)?;

        let mut inserted = Vec::with_capacity(drafts.len());
        for draft in drafts {
            self.next_id = self.next_id.max(self.max_id()) + 1;
            let mut row = draft.clone();
            row.id = Some(self.next_id);
            self.bills.push(row.clone());
            inserted.push(row);
        }

        sort_rows(&mut inserted);
        Ok(inserted)
    }

    pub(crate) fn update_by_id(&mut self, id: i64, patch: &BillPatch) -> StoreResult<()> {
        let bill = self
            .bills
            .iter_mut()
            .find(|bill| bill.id == Some(id))
            .ok_or(StoreError::NotFound(id))?;
        patch.apply_to(bill);
        Ok(())
    }

    pub(crate) fn update_month(&mut self, month: MonthKey, patch: &BillPatch) {
        for bill in self.bills.iter_mut().filter(|b| b.month_key == month) {
            patch.apply_to(bill);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bills.len()
    }

    fn max_id(&self) -> i64 {
        self.bills.iter().filter_map(|b| b.id).max().unwrap_or(0)
    }
}
