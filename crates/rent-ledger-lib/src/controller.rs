//! Monthly billing controller: selected-month state, fetch/seed on first
//! access, and optimistic updates that fall back to a refetch.

use crate::analytics::{fetch_analytics, AnalyticsWindow, MonthAnalytics};
use crate::calculator::BillCalculator;
use crate::data_structures::{Bill, BillCalculation, BillPatch, MonthKey, MonthSummary};
use crate::error::{BillingError, StoreError, StoreResult};
use crate::rates::Rates;
use crate::seeding::{BillSeeder, SeedSource};
use crate::store::BillStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a successful month load found.
#[derive(Debug, Clone, PartialEq)]
pub enum MonthLoad {
    /// Rows already existed; nothing was inserted.
    Existing(Vec<Bill>),
    /// This load inserted the month's first rows.
    Seeded { bills: Vec<Bill>, source: SeedSource },
    /// Our insert lost a race against another writer; these are its rows.
    AlreadySeeded(Vec<Bill>),
}

impl MonthLoad {
    pub fn bills(&self) -> &[Bill] {
        match self {
            MonthLoad::Existing(bills) | MonthLoad::AlreadySeeded(bills) => bills,
            MonthLoad::Seeded { bills, .. } => bills,
        }
    }

    pub fn into_bills(self) -> Vec<Bill> {
        match self {
            MonthLoad::Existing(bills) | MonthLoad::AlreadySeeded(bills) => bills,
            MonthLoad::Seeded { bills, .. } => bills,
        }
    }

    pub fn seed_source(&self) -> Option<SeedSource> {
        match self {
            MonthLoad::Seeded { source, .. } => Some(*source),
            _ => None,
        }
    }
}

/// Fetches `month`, seeding it from the previous month (or defaults) when
/// it has no rows yet.
pub async fn load_month<S>(store: &S, seeder: &BillSeeder, month: MonthKey) -> StoreResult<MonthLoad>
where
    S: BillStore + ?Sized,
{
    let current = store.select_month(month).await?;
    if !current.is_empty() {
        tracing::debug!("Found {} bills for {}", current.len(), month);
        return Ok(MonthLoad::Existing(current));
    }

    let previous_month = month.previous();
    tracing::info!("No bills for {}; checking {}", month, previous_month);
    let previous = store.select_month(previous_month).await?;

    let plan = seeder.plan(month, &previous);
    match plan.source() {
        SeedSource::PreviousMonth(from) => {
            tracing::info!("Seeding {} from {} ({} rooms)", month, from, plan.drafts().len())
        }
        SeedSource::Defaults => {
            tracing::info!("Seeding {} with default bills ({} rooms)", month, plan.drafts().len())
        }
    }

    let source = plan.source();
    match store.insert(plan.drafts()).await {
        Ok(bills) => Ok(MonthLoad::Seeded { bills, source }),
        Err(err) if err.is_conflict() => {
            tracing::info!("{} was seeded concurrently ({}); refetching", month, err);
            let bills = store.select_month(month).await?;
            Ok(MonthLoad::AlreadySeeded(bills))
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading { month: MonthKey },
    Ready { month: MonthKey },
    Failed { month: MonthKey, error: String },
}

/// Identifies one issued load. Only the most recently issued ticket is
/// allowed to publish its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    month: MonthKey,
    generation: u64,
}

impl LoadTicket {
    pub fn month(&self) -> MonthKey {
        self.month
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadApplied {
    Applied,
    /// A newer load was issued; this result was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The backend accepted the write.
    Confirmed,
    /// The write failed and the optimistic change was discarded.
    Reverted { error: String },
    /// The write may or may not have landed. Shows the reloaded rows, or
    /// the pre-edit values when no reload was possible.
    Unknown { error: String },
}

/// Bills as they were before an optimistic edit.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEdit {
    month: MonthKey,
    previous: Vec<Bill>,
}

impl LocalEdit {
    pub fn month(&self) -> MonthKey {
        self.month
    }
}

/// State machine over the selected month and its bills. Contains no I/O;
/// [`BillingController`] drives it.
#[derive(Debug, Clone)]
pub struct MonthlyBilling {
    selected_month: MonthKey,
    state: LoadState,
    bills: Vec<Bill>,
    bills_month: Option<MonthKey>,
    last_seed: Option<SeedSource>,
    generation: u64,
}

impl MonthlyBilling {
    pub fn new(selected_month: MonthKey) -> Self {
        Self {
            selected_month,
            state: LoadState::Idle,
            bills: Vec::new(),
            bills_month: None,
            last_seed: None,
            generation: 0,
        }
    }

    pub fn begin_load(&mut self, month: MonthKey) -> LoadTicket {
        self.generation += 1;
        self.selected_month = month;
        self.state = LoadState::Loading { month };
        LoadTicket {
            month,
            generation: self.generation,
        }
    }

    pub fn finish_load(&mut self, ticket: LoadTicket, result: StoreResult<MonthLoad>) -> LoadApplied {
        if ticket.generation != self.generation {
            tracing::debug!(
                "Dropping stale result for {} (selected {})",
                ticket.month,
                self.selected_month
            );
            return LoadApplied::Stale;
        }

        match result {
            Ok(load) => {
                self.last_seed = load.seed_source();
                self.bills = load.into_bills();
                self.bills_month = Some(ticket.month);
                self.state = LoadState::Ready {
                    month: ticket.month,
                };
            }
            Err(err) => {
                // Keep showing whatever was loaded before.
                tracing::warn!("Loading {} failed: {}", ticket.month, err);
                self.state = LoadState::Failed {
                    month: ticket.month,
                    error: err.to_string(),
                };
            }
        }

        LoadApplied::Applied
    }

    /// Applies `patch` to the loaded bill with `id`, keeping its previous
    /// value for [`MonthlyBilling::rollback`].
    pub fn apply_local(&mut self, id: i64, patch: &BillPatch) -> Result<LocalEdit, BillingError> {
        let bill = self
            .bills
            .iter_mut()
            .find(|bill| bill.id == Some(id))
            .ok_or(BillingError::UnknownBill(id))?;
        let edit = LocalEdit {
            month: bill.month_key,
            previous: vec![bill.clone()],
        };
        patch.apply_to(bill);
        Ok(edit)
    }

    /// Applies `rates` to every loaded bill.
    pub fn apply_local_rates(&mut self, rates: Rates) -> Result<LocalEdit, BillingError> {
        let month = self.bills_month.ok_or(BillingError::NothingLoaded)?;
        let edit = LocalEdit {
            month,
            previous: self.bills.clone(),
        };
        let patch = BillPatch::rates(rates.electricity_rate(), rates.water_rate());
        for bill in &mut self.bills {
            patch.apply_to(bill);
        }
        Ok(edit)
    }

    /// Restores the bills `edit` changed. No-op once another month's rows
    /// replaced them.
    pub fn rollback(&mut self, edit: &LocalEdit) {
        if self.bills_month != Some(edit.month) {
            return;
        }
        for previous in &edit.previous {
            if let Some(bill) = self.bills.iter_mut().find(|bill| bill.id == previous.id) {
                *bill = previous.clone();
            }
        }
    }

    pub fn selected_month(&self) -> MonthKey {
        self.selected_month
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            LoadState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn bills(&self) -> &[Bill] {
        &self.bills
    }

    /// The month the displayed bills belong to. Differs from the selected
    /// month while loading or after a failed load.
    pub fn bills_month(&self) -> Option<MonthKey> {
        self.bills_month
    }

    pub fn is_stale(&self) -> bool {
        self.bills_month != Some(self.selected_month)
    }

    pub fn last_seed(&self) -> Option<SeedSource> {
        self.last_seed
    }

    pub fn bill(&self, id: i64) -> Option<&Bill> {
        self.bills.iter().find(|bill| bill.id == Some(id))
    }

    pub fn calculate(&self, bill: &Bill) -> BillCalculation {
        BillCalculator::new().calculate(bill)
    }

    pub fn summary(&self) -> MonthSummary {
        BillCalculator::new().summarize_month(&self.bills)
    }
}

/// Drives [`MonthlyBilling`] against a [`BillStore`]. Clones share state,
/// so operations can be spawned as independent tasks.
pub struct BillingController<S: ?Sized> {
    store: Arc<S>,
    seeder: Arc<BillSeeder>,
    state: Arc<Mutex<MonthlyBilling>>,
}

impl<S: ?Sized> Clone for BillingController<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            seeder: Arc::clone(&self.seeder),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: BillStore + ?Sized> BillingController<S> {
    pub fn new(store: Arc<S>, initial_month: MonthKey) -> Self {
        Self::with_seeder(store, BillSeeder::new(), initial_month)
    }

    pub fn with_seeder(store: Arc<S>, seeder: BillSeeder, initial_month: MonthKey) -> Self {
        Self {
            store,
            seeder: Arc::new(seeder),
            state: Arc::new(Mutex::new(MonthlyBilling::new(initial_month))),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// A copy of the current state for rendering.
    pub fn snapshot(&self) -> MonthlyBilling {
        self.lock().clone()
    }

    pub fn selected_month(&self) -> MonthKey {
        self.lock().selected_month()
    }

    pub async fn select_month(&self, month: MonthKey) -> LoadApplied {
        let ticket = self.start_load(month);
        self.complete_load(ticket).await
    }

    /// Selects `month` immediately and returns the ticket to complete.
    /// Callers that spawn the completion still get issue-order semantics.
    pub fn start_load(&self, month: MonthKey) -> LoadTicket {
        self.lock().begin_load(month)
    }

    pub async fn complete_load(&self, ticket: LoadTicket) -> LoadApplied {
        let result = load_month(self.store.as_ref(), &self.seeder, ticket.month()).await;
        self.lock().finish_load(ticket, result)
    }

    pub async fn refresh(&self) -> LoadApplied {
        let month = self.selected_month();
        self.select_month(month).await
    }

    pub async fn update_bill(&self, id: i64, patch: BillPatch) -> Result<UpdateOutcome, BillingError> {
        if patch.is_empty() {
            return Ok(UpdateOutcome::Confirmed);
        }

        let edit = self.lock().apply_local(id, &patch)?;
        let result = self.store.update_by_id(id, &patch).await;
        Ok(self.settle(edit, result).await)
    }

    pub async fn update_all_rates(&self, rates: Rates) -> Result<UpdateOutcome, BillingError> {
        rates.validate().map_err(BillingError::InvalidRates)?;

        let edit = self.lock().apply_local_rates(rates)?;
        let patch = BillPatch::rates(rates.electricity_rate(), rates.water_rate());
        let result = self.store.update_month(edit.month(), &patch).await;
        Ok(self.settle(edit, result).await)
    }

    pub async fn analytics(&self, window: AnalyticsWindow) -> StoreResult<Vec<MonthAnalytics>> {
        let center = self.selected_month();
        fetch_analytics(self.store.as_ref(), center, window).await
    }

    /// Confirms an optimistic write, or discards it. The month is refetched
    /// when it is still selected; otherwise the edited bills are restored.
    async fn settle(&self, edit: LocalEdit, result: StoreResult<()>) -> UpdateOutcome {
        let err = match result {
            Ok(()) => return UpdateOutcome::Confirmed,
            Err(err) => err,
        };

        let month = edit.month();
        tracing::warn!("Update for {} failed: {}", month, err);

        if self.selected_month() == month
            && self.select_month(month).await == LoadApplied::Applied
            && self.lock().error().is_none()
        {
            return outcome_for(&err);
        }

        tracing::debug!("No fresh rows for {}; restoring local bills", month);
        self.lock().rollback(&edit);
        outcome_for(&err)
    }

    fn lock(&self) -> MutexGuard<'_, MonthlyBilling> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn outcome_for(err: &StoreError) -> UpdateOutcome {
    if err.is_ambiguous() {
        UpdateOutcome::Unknown {
            error: err.to_string(),
        }
    } else {
        UpdateOutcome::Reverted {
            error: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::StoreOp;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn month(key: &str) -> MonthKey {
        MonthKey::parse(key).unwrap()
    }

    fn controller(store: MemoryStore, initial: &str) -> (Arc<MemoryStore>, BillingController<MemoryStore>) {
        let store = Arc::new(store);
        let controller = BillingController::new(Arc::clone(&store), month(initial));
        (store, controller)
    }

    fn november_bill(room_id: i64, new: f64, occupants: u32, rate: f64) -> Bill {
        Bill {
            occupants,
            electricity_old: 10.0,
            electricity_new: new,
            electricity_rate: Some(rate),
            is_paid: true,
            ..Bill::draft(room_id, month("2025-11"))
        }
    }

    #[tokio::test]
    async fn test_default_seed_for_empty_history() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");

        assert_eq!(controller.select_month(month("2025-01")).await, LoadApplied::Applied);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state(), &LoadState::Ready { month: month("2025-01") });
        assert_eq!(snapshot.last_seed(), Some(SeedSource::Defaults));
        let rooms: Vec<i64> = snapshot.bills().iter().map(|b| b.room_id).collect();
        assert_eq!(rooms, vec![1, 2, 3, 4]);
        assert!(snapshot.bills().iter().all(|b| b.id.is_some()));
        assert!(snapshot
            .bills()
            .iter()
            .all(|b| b.occupants == 0 && b.electricity_old == 0.0 && b.electricity_new == 0.0));
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_rollover_from_previous_month() {
        let seeded = MemoryStore::with_bills(vec![november_bill(1, 120.0, 1, 5_500.0)])
            .await
            .unwrap();
        let (_store, controller) = controller(seeded, "2025-12");

        controller.select_month(month("2025-12")).await;

        let snapshot = controller.snapshot();
        assert_eq!(
            snapshot.last_seed(),
            Some(SeedSource::PreviousMonth(month("2025-11")))
        );
        let bill = &snapshot.bills()[0];
        assert_eq!(bill.month_key, month("2025-12"));
        assert_eq!(bill.electricity_old, 120.0);
        assert_eq!(bill.electricity_new, 0.0);
        assert_eq!(bill.occupants, 1);
        assert_eq!(bill.electricity_rate, Some(5_500.0));
        assert!(!bill.is_paid);
    }

    #[tokio::test]
    async fn test_fetch_twice_never_reseeds() {
        let (store, controller) = controller(MemoryStore::new(), "2025-03");

        controller.select_month(month("2025-03")).await;
        let first = controller.snapshot().bills().to_vec();
        controller.select_month(month("2025-03")).await;

        assert_eq!(store.insert_count(), 1);
        assert_eq!(store.len().await, 4);
        assert_eq!(controller.snapshot().bills(), first.as_slice());
        assert_eq!(controller.snapshot().last_seed(), None);
    }

    #[tokio::test]
    async fn test_existing_month_is_not_seeded() {
        let seeded = MemoryStore::with_bills(vec![november_bill(2, 50.0, 2, 5_000.0)])
            .await
            .unwrap();
        let (store, controller) = controller(seeded, "2025-11");

        controller.select_month(month("2025-11")).await;
        assert_eq!(controller.snapshot().bills().len(), 1);
        assert_eq!(store.insert_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_bills() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;

        store.fail(StoreOp::Select).await;
        controller.select_month(month("2025-02")).await;

        let snapshot = controller.snapshot();
        assert!(matches!(snapshot.state(), LoadState::Failed { month: m, .. } if *m == month("2025-02")));
        assert!(snapshot.error().is_some());
        assert_eq!(snapshot.bills().len(), 4);
        assert_eq!(snapshot.bills_month(), Some(month("2025-01")));
        assert!(snapshot.is_stale());
    }

    #[tokio::test]
    async fn test_failed_insert_is_distinct_from_empty() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        store.fail(StoreOp::Insert).await;

        controller.select_month(month("2025-01")).await;

        let snapshot = controller.snapshot();
        assert!(matches!(snapshot.state(), LoadState::Failed { .. }));
        assert!(snapshot.bills().is_empty());
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_stale_result_is_dropped() {
        let mut billing = MonthlyBilling::new(month("2025-01"));
        let january = billing.begin_load(month("2025-01"));
        let february = billing.begin_load(month("2025-02"));

        let feb_rows = vec![Bill::draft(1, month("2025-02"))];
        let jan_rows = vec![Bill::draft(1, month("2025-01"))];

        assert_eq!(
            billing.finish_load(february, Ok(MonthLoad::Existing(feb_rows.clone()))),
            LoadApplied::Applied
        );
        assert_eq!(
            billing.finish_load(january, Ok(MonthLoad::Existing(jan_rows))),
            LoadApplied::Stale
        );

        assert_eq!(billing.selected_month(), month("2025-02"));
        assert_eq!(billing.bills(), feb_rows.as_slice());
        assert_eq!(billing.state(), &LoadState::Ready { month: month("2025-02") });
    }

    #[test]
    fn test_stale_error_does_not_mark_failed() {
        let mut billing = MonthlyBilling::new(month("2025-01"));
        let old = billing.begin_load(month("2025-01"));
        let _new = billing.begin_load(month("2025-02"));

        let applied = billing.finish_load(old, Err(StoreError::Unavailable("down".into())));
        assert_eq!(applied, LoadApplied::Stale);
        assert!(billing.is_loading());
    }

    #[test]
    fn test_reselecting_same_month_supersedes_older_ticket() {
        let mut billing = MonthlyBilling::new(month("2025-01"));
        let first = billing.begin_load(month("2025-01"));
        let second = billing.begin_load(month("2025-01"));
        assert_eq!(first.month(), second.month());

        assert_eq!(
            billing.finish_load(first, Ok(MonthLoad::Existing(Vec::new()))),
            LoadApplied::Stale
        );
    }

    #[tokio::test]
    async fn test_completions_out_of_order_keep_last_issued() {
        let (_store, controller) = controller(MemoryStore::new(), "2025-01");

        let january = controller.start_load(month("2025-01"));
        let february = controller.start_load(month("2025-02"));
        assert_eq!(controller.selected_month(), month("2025-02"));

        assert_eq!(controller.complete_load(february).await, LoadApplied::Applied);
        assert_eq!(controller.complete_load(january).await, LoadApplied::Stale);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.bills_month(), Some(month("2025-02")));
        assert!(snapshot.bills().iter().all(|b| b.month_key == month("2025-02")));
    }

    #[tokio::test]
    async fn test_update_bill_confirmed() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;
        let id = controller.snapshot().bills()[0].id.unwrap();

        let patch = BillPatch {
            occupants: Some(2),
            electricity_new: Some(42.0),
            ..BillPatch::default()
        };
        let outcome = controller.update_bill(id, patch).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Confirmed);

        assert_eq!(controller.snapshot().bill(id).unwrap().occupants, 2);
        let stored = store.select_month(month("2025-01")).await.unwrap();
        assert_eq!(stored[0].electricity_new, 42.0);
    }

    #[tokio::test]
    async fn test_update_bill_failure_refetches_server_truth() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;
        let id = controller.snapshot().bills()[0].id.unwrap();
        let selects_before = store.select_count();

        store.fail(StoreOp::Update).await;
        let outcome = controller
            .update_bill(id, BillPatch::paid(true))
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Reverted { .. }));
        assert!(store.select_count() > selects_before);
        assert!(!controller.snapshot().bill(id).unwrap().is_paid);
        assert_eq!(
            controller.snapshot().state(),
            &LoadState::Ready { month: month("2025-01") }
        );
    }

    #[tokio::test]
    async fn test_failed_update_on_stale_month_restores_bill() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;
        let id = controller.snapshot().bills()[0].id.unwrap();

        store.fail(StoreOp::Select).await;
        controller.select_month(month("2025-02")).await;
        store.fail(StoreOp::Update).await;

        let outcome = controller
            .update_bill(id, BillPatch::paid(true))
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Reverted { .. }));
        let snapshot = controller.snapshot();
        assert!(!snapshot.bill(id).unwrap().is_paid);
        assert!(matches!(snapshot.state(), LoadState::Failed { month: m, .. } if *m == month("2025-02")));
        store.recover(StoreOp::Select).await;
        let stored = store.select_month(month("2025-01")).await.unwrap();
        assert!(!stored.iter().find(|b| b.id == Some(id)).unwrap().is_paid);
    }

    #[tokio::test]
    async fn test_failed_update_with_failed_refetch_restores_bill() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;
        let id = controller.snapshot().bills()[0].id.unwrap();

        store.fail(StoreOp::Update).await;
        store.fail(StoreOp::Select).await;
        let outcome = controller
            .update_bill(id, BillPatch::paid(true))
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Reverted { .. }));
        let snapshot = controller.snapshot();
        assert!(!snapshot.bill(id).unwrap().is_paid);
        assert!(matches!(snapshot.state(), LoadState::Failed { .. }));
        assert_eq!(snapshot.bills().len(), 4);
    }

    #[tokio::test]
    async fn test_ambiguous_update_without_refetch_is_unknown() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;

        store.time_out_after_apply(StoreOp::Update).await;
        store.fail(StoreOp::Select).await;
        let outcome = controller
            .update_all_rates(Rates::new(6_000.0, 90_000.0))
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Unknown { .. }));
        assert!(controller
            .snapshot()
            .bills()
            .iter()
            .all(|b| b.electricity_rate == Some(5_000.0)));
    }

    #[test]
    fn test_rollback_skips_replaced_month() {
        let mut billing = MonthlyBilling::new(month("2025-01"));
        let ticket = billing.begin_load(month("2025-01"));
        let january = Bill {
            id: Some(1),
            ..Bill::draft(1, month("2025-01"))
        };
        billing.finish_load(ticket, Ok(MonthLoad::Existing(vec![january])));

        let edit = billing.apply_local(1, &BillPatch::paid(true)).unwrap();
        assert!(billing.bill(1).unwrap().is_paid);

        let ticket = billing.begin_load(month("2025-02"));
        let february = Bill {
            id: Some(1),
            is_paid: true,
            ..Bill::draft(1, month("2025-02"))
        };
        billing.finish_load(ticket, Ok(MonthLoad::Existing(vec![february.clone()])));

        billing.rollback(&edit);
        assert_eq!(billing.bills(), &[february]);
    }

    #[tokio::test]
    async fn test_ambiguous_update_reports_unknown() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;
        let id = controller.snapshot().bills()[0].id.unwrap();

        store.time_out_after_apply(StoreOp::Update).await;
        let outcome = controller
            .update_bill(id, BillPatch::paid(true))
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Unknown { .. }));
        // The write did land, and the refetch shows it.
        assert!(controller.snapshot().bill(id).unwrap().is_paid);
    }

    #[tokio::test]
    async fn test_update_unknown_bill_is_rejected() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;

        let err = controller
            .update_bill(999, BillPatch::paid(true))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::UnknownBill(999)));
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_update_all_rates() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;

        let outcome = controller
            .update_all_rates(Rates::new(3_500.0, 100_000.0))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Confirmed);

        for bill in store.select_month(month("2025-01")).await.unwrap() {
            assert_eq!(bill.electricity_rate, Some(3_500.0));
            assert_eq!(bill.water_rate, Some(100_000.0));
        }
        assert!(controller
            .snapshot()
            .bills()
            .iter()
            .all(|b| b.electricity_rate == Some(3_500.0)));
    }

    #[tokio::test]
    async fn test_update_all_rates_failure_reverts() {
        let (store, controller) = controller(MemoryStore::new(), "2025-01");
        controller.select_month(month("2025-01")).await;
        store.fail(StoreOp::Update).await;

        let outcome = controller
            .update_all_rates(Rates::new(9_999.0, 1.0))
            .await
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Reverted { .. }));
        assert!(controller
            .snapshot()
            .bills()
            .iter()
            .all(|b| b.electricity_rate == Some(5_000.0)));
    }

    #[tokio::test]
    async fn test_update_all_rates_needs_a_loaded_month() {
        let (_store, controller) = controller(MemoryStore::new(), "2025-01");
        let err = controller
            .update_all_rates(Rates::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NothingLoaded));

        let err = controller
            .update_all_rates(Rates::new(-5.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidRates(_)));
    }

    /// Reports an empty month once while another writer seeds it behind
    /// our back.
    struct RacingStore {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl BillStore for RacingStore {
        async fn select_month(&self, month: MonthKey) -> StoreResult<Vec<Bill>> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let rival = BillSeeder::new().plan(month, &[]);
                self.inner.insert(rival.drafts()).await?;
                return Ok(Vec::new());
            }
            self.inner.select_month(month).await
        }

        async fn select_months(&self, months: &[MonthKey]) -> StoreResult<Vec<Bill>> {
            self.inner.select_months(months).await
        }

        async fn insert(&self, drafts: &[Bill]) -> StoreResult<Vec<Bill>> {
            self.inner.insert(drafts).await
        }

        async fn update_by_id(&self, id: i64, patch: &BillPatch) -> StoreResult<()> {
            self.inner.update_by_id(id, patch).await
        }

        async fn update_month(&self, month: MonthKey, patch: &BillPatch) -> StoreResult<()> {
            self.inner.update_month(month, patch).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_seed_is_already_seeded() {
        let store = RacingStore {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        };

        let load = load_month(&store, &BillSeeder::new(), month("2025-06"))
            .await
            .unwrap();

        assert!(matches!(load, MonthLoad::AlreadySeeded(_)));
        assert_eq!(load.bills().len(), 4);
        assert_eq!(store.inner.len().await, 4);
    }

    #[tokio::test]
    async fn test_controller_works_behind_dyn_store() {
        let store: Arc<dyn BillStore> = Arc::new(MemoryStore::new());
        let controller = BillingController::new(store, month("2025-01"));

        let spawned = controller.clone();
        let handle = tokio::spawn(async move { spawned.select_month(month("2025-01")).await });
        assert_eq!(handle.await.unwrap(), LoadApplied::Applied);
        assert_eq!(controller.snapshot().bills().len(), 4);
    }
}
