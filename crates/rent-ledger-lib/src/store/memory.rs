use super::{BillStore, Table};
use crate::data_structures::{Bill, BillPatch, MonthKey};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Operations a [`MemoryStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
}

#[derive(Debug, Default)]
struct Failures {
    select: Option<FailureMode>,
    insert: Option<FailureMode>,
    update: Option<FailureMode>,
}

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    Unavailable,
    /// The write lands, but the caller sees a timeout.
    TimeoutAfterApply,
}

/// In-process `monthly_bills` table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
    failures: RwLock<Failures>,
    inserts: AtomicUsize,
    selects: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_bills(bills: Vec<Bill>) -> StoreResult<Self> {
        let store = Self::new();
        store.table.write().await.insert(&bills)?;
        Ok(store)
    }

    /// Every subsequent call of `op` fails until [`MemoryStore::recover`].
    pub async fn fail(&self, op: StoreOp) {
        self.set_failure(op, Some(FailureMode::Unavailable)).await;
    }

    /// Writes of `op` are applied but reported as timed out.
    pub async fn time_out_after_apply(&self, op: StoreOp) {
        self.set_failure(op, Some(FailureMode::TimeoutAfterApply)).await;
    }

    pub async fn recover(&self, op: StoreOp) {
        self.set_failure(op, None).await;
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of successful insert batches.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn select_count(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    async fn set_failure(&self, op: StoreOp, mode: Option<FailureMode>) {
        let mut failures = self.failures.write().await;
        match op {
            StoreOp::Select => failures.select = mode,
            StoreOp::Insert => failures.insert = mode,
            StoreOp::Update => failures.update = mode,
        }
    }

    async fn failure(&self, op: StoreOp) -> Option<FailureMode> {
        let failures = self.failures.read().await;
        match op {
            StoreOp::Select => failures.select,
            StoreOp::Insert => failures.insert,
            StoreOp::Update => failures.update,
        }
    }

    async fn check(&self, op: StoreOp) -> StoreResult<()> {
        match self.failure(op).await {
            Some(FailureMode::Unavailable) => Err(StoreError::Unavailable(format!("injected {:?} failure", op))),
            _ => Ok(()),
        }
    }

    async fn after_write(&self, op: StoreOp) -> StoreResult<()> {
        match self.failure(op).await {
            Some(FailureMode::TimeoutAfterApply) => {
                Err(StoreError::Timeout(format!("{:?} response lost", op)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BillStore for MemoryStore {
    async fn select_month(&self, month: MonthKey) -> StoreResult<Vec<Bill>> {
        self.check(StoreOp::Select).await?;
        self.selects.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.read().await.select_month(month))
    }

    async fn select_months(&self, months: &[MonthKey]) -> StoreResult<Vec<Bill>> {
        self.check(StoreOp::Select).await?;
        self.selects.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.read().await.select_months(months))
    }

    async fn insert(&self, drafts: &[Bill]) -> StoreResult<Vec<Bill>> {
        self.check(StoreOp::Insert).await?;
        let rows = self.table.write().await.insert(drafts)?;
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.after_write(StoreOp::Insert).await?;
        Ok(rows)
    }

    async fn update_by_id(&self, id: i64, patch: &BillPatch) -> StoreResult<()> {
        self.check(StoreOp::Update).await?;
        self.table.write().await.update_by_id(id, patch)?;
        self.after_write(StoreOp::Update).await
    }

    async fn update_month(&self, month: MonthKey, patch: &BillPatch) -> StoreResult<()> {
        self.check(StoreOp::Update).await?;
        self.table.write().await.update_month(month, patch);
        self.after_write(StoreOp::Update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(key: &str) -> MonthKey {
        MonthKey::parse(key).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_select() {
        let store = MemoryStore::new();
        let rows = store
            .insert(&[Bill::draft(1, month("2025-01")), Bill::draft(2, month("2025-01"))])
            .await
            .unwrap();
        assert!(rows.iter().all(|b| b.id.is_some()));

        let selected = store.select_month(month("2025-01")).await.unwrap();
        assert_eq!(selected, rows);
        assert!(store.select_month(month("2025-02")).await.unwrap().is_empty());
        assert_eq!(store.insert_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let store = MemoryStore::new();
        store.fail(StoreOp::Select).await;
        assert!(store.select_month(month("2025-01")).await.is_err());

        store.recover(StoreOp::Select).await;
        assert!(store.select_month(month("2025-01")).await.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_after_apply_still_writes() {
        let store = MemoryStore::with_bills(vec![Bill::draft(1, month("2025-01"))])
            .await
            .unwrap();
        store.time_out_after_apply(StoreOp::Update).await;

        let err = store
            .update_month(month("2025-01"), &BillPatch::paid(true))
            .await
            .unwrap_err();
        assert!(err.is_ambiguous());

        let rows = store.select_month(month("2025-01")).await.unwrap();
        assert!(rows[0].is_paid);
    }

    #[tokio::test]
    async fn test_update_month_only_touches_that_month() {
        let store = MemoryStore::with_bills(vec![
            Bill::draft(1, month("2025-01")),
            Bill::draft(1, month("2025-02")),
        ])
        .await
        .unwrap();

        store
            .update_month(month("2025-02"), &BillPatch::rates(6_000.0, 90_000.0))
            .await
            .unwrap();

        let january = store.select_month(month("2025-01")).await.unwrap();
        let february = store.select_month(month("2025-02")).await.unwrap();
        assert_eq!(january[0].electricity_rate, Some(5_000.0));
        assert_eq!(february[0].electricity_rate, Some(6_000.0));
        assert_eq!(february[0].water_rate, Some(90_000.0));
    }
}
