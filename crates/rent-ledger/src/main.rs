use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    DefaultTerminal, Frame,
};
use rent_ledger_core::data_structures::room_name;
use rent_ledger_core::prelude::*;
use rent_ledger_core::{
    AnalyticsWindow, BillingError, JsonFileStore, LoadApplied, MemoryStore, MonthAnalytics,
    MonthlyBilling, RestStore, ROOM_IDS,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::interval;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod form;
mod format;
mod widgets;

use config::{AppConfig, BackendKind};
use form::{BillForm, RatesForm};
use widgets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Management,
    Analytics,
}

#[derive(Debug, Clone)]
pub enum Popup {
    EditBill(BillForm),
    Rates(RatesForm),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

#[derive(Parser, Debug)]
#[clap(author = "Red", version, about)]
struct Args {
    /// Month to open, as YYYY-MM (defaults to the current month)
    #[arg(short = 'm', long = "month")]
    month: Option<MonthKey>,

    /// Storage backend; saved to the config file when given
    #[arg(short = 'b', long = "backend", value_enum)]
    backend: Option<BackendKind>,

    /// JSON file used by the file backend
    #[arg(short = 'd', long = "data-file")]
    data_file: Option<String>,

    /// Config file (defaults to ~/.config/rent-ledger/config.json)
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Log verbosity; repeat for more
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(log_file: &Path, verbose: u8) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "rent_ledger={0},rent_ledger_core={0}",
                    log_level
                ))
            }),
        )
        // stdout belongs to the terminal UI
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

fn build_store(config: &AppConfig, backend: BackendKind) -> Result<Arc<dyn BillStore>> {
    match backend {
        BackendKind::Rest => {
            let rest = config.rest_config().context(
                "REST backend selected but no URL configured (set rest.url or SUPABASE_URL)",
            )?;
            Ok(Arc::new(RestStore::new(rest)?))
        }
        BackendKind::File => Ok(Arc::new(JsonFileStore::new(config.data_file_path()))),
        BackendKind::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

pub struct AppState {
    pub billing: MonthlyBilling,
    pub backend: BackendKind,
    pub tab: Tab,
    pub selected_room: usize,
    pub popup: Option<Popup>,
    pub analytics_window: AnalyticsWindow,
    pub analytics: Option<Vec<MonthAnalytics>>,
    pub analytics_month: Option<MonthKey>,
    pub analytics_loading: bool,
    pub analytics_error: Option<String>,
    pub status: Option<StatusMessage>,
    pub pending_writes: usize,
    pub spinner_state: usize,
    pub last_update: Option<DateTime<Local>>,
}

impl AppState {
    fn new(month: MonthKey, backend: BackendKind, analytics_window: AnalyticsWindow) -> Self {
        Self {
            billing: MonthlyBilling::new(month),
            backend,
            tab: Tab::Management,
            selected_room: 0,
            popup: None,
            analytics_window,
            analytics: None,
            analytics_month: None,
            analytics_loading: false,
            analytics_error: None,
            status: None,
            pending_writes: 0,
            spinner_state: 0,
            last_update: None,
        }
    }

    fn update_spinner(&mut self) {
        self.spinner_state = (self.spinner_state + 1) % 10;
    }

    pub fn get_spinner_char(&self) -> char {
        match self.spinner_state {
            0 => '⠋',
            1 => '⠙',
            2 => '⠹',
            3 => '⠸',
            4 => '⠼',
            5 => '⠴',
            6 => '⠦',
            7 => '⠧',
            8 => '⠇',
            9 => '⠏',
            _ => '⠋',
        }
    }

    pub fn is_busy(&self) -> bool {
        self.billing.is_loading() || self.pending_writes > 0 || self.analytics_loading
    }

    pub fn selected_room_id(&self) -> i64 {
        ROOM_IDS[self.selected_room.min(ROOM_IDS.len() - 1)]
    }

    /// The bill shown for `room_id`, if the displayed month has one.
    pub fn bill_for_room(&self, room_id: i64) -> Option<&Bill> {
        self.billing.bills().iter().find(|b| b.room_id == room_id)
    }

    pub fn selected_bill(&self) -> Option<&Bill> {
        self.bill_for_room(self.selected_room_id())
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: false,
        });
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: true,
        });
    }

    /// Edits only apply to the selected month's own rows.
    fn can_edit(&mut self) -> bool {
        if !self.billing.is_stale() {
            return true;
        }
        match self.billing.bills_month() {
            Some(shown) => self.set_error(format!(
                "Showing {} while {} is not loaded; press r to retry",
                shown,
                self.billing.selected_month()
            )),
            None => self.set_error("Nothing loaded yet"),
        }
        false
    }

    fn invalidate_analytics(&mut self) {
        self.analytics_month = None;
    }

    fn report_update(&mut self, what: &str, result: Result<UpdateOutcome, BillingError>) {
        self.pending_writes = self.pending_writes.saturating_sub(1);
        self.invalidate_analytics();
        match result {
            Ok(UpdateOutcome::Confirmed) => {
                self.last_update = Some(Local::now());
                self.set_status(format!("Saved {}", what));
            }
            Ok(UpdateOutcome::Reverted { error }) => {
                self.set_error(format!("Saving {} failed, change discarded: {}", what, error));
            }
            Ok(UpdateOutcome::Unknown { error }) => {
                self.set_error(format!(
                    "Saving {} may not have completed: {}",
                    what, error
                ));
            }
            Err(err) => self.set_error(err.to_string()),
        }
    }
}

enum Action {
    None,
    Quit,
    Load(MonthKey),
    UpdateBill { id: i64, patch: BillPatch, what: String },
    UpdateRates(Rates),
}

pub struct App {
    state: Arc<Mutex<AppState>>,
    controller: BillingController<dyn BillStore>,
    exit: bool,
}

impl App {
    pub fn new(
        store: Arc<dyn BillStore>,
        backend: BackendKind,
        month: MonthKey,
        analytics_window: AnalyticsWindow,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::new(month, backend, analytics_window))),
            controller: BillingController::new(store, month),
            exit: false,
        }
    }

    pub async fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        self.load(self.controller.selected_month());

        let mut tick_interval = interval(Duration::from_millis(100));

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.sync();
                    terminal.draw(|frame| self.draw(frame))?;
                }

                polled = async {
                    if event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        event::read().ok()
                    } else {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        None
                    }
                } => {
                    if let Some(event) = polled {
                        self.handle_event(event);
                    }
                }
            }

            if self.exit {
                break;
            }
        }

        Ok(())
    }

    /// Pulls the controller's state into the view and starts an analytics
    /// fetch when the analytics tab needs one.
    fn sync(&self) {
        let snapshot = self.controller.snapshot();
        let mut fetch = None;

        if let Ok(mut state) = self.state.lock() {
            state.update_spinner();
            let selected = snapshot.selected_month();
            state.billing = snapshot;

            if state.tab == Tab::Analytics
                && !state.analytics_loading
                && state.analytics_month != Some(selected)
            {
                state.analytics_loading = true;
                fetch = Some((selected, state.analytics_window));
            }
        }

        if let Some((month, window)) = fetch {
            self.spawn_analytics(month, window);
        }
    }

    fn load(&self, month: MonthKey) {
        let ticket = self.controller.start_load(month);
        let controller = self.controller.clone();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let applied = controller.complete_load(ticket).await;
            if applied == LoadApplied::Applied {
                if let Ok(mut state) = state.lock() {
                    state.last_update = Some(Local::now());
                    state.invalidate_analytics();
                }
            }
        });
    }

    fn spawn_analytics(&self, month: MonthKey, window: AnalyticsWindow) {
        let controller = self.controller.clone();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let result = controller.analytics(window).await;
            if let Ok(mut state) = state.lock() {
                state.analytics_loading = false;
                state.analytics_month = Some(month);
                match result {
                    Ok(analytics) => {
                        state.analytics = Some(analytics);
                        state.analytics_error = None;
                    }
                    Err(err) => {
                        tracing::warn!("Analytics for {} failed: {}", month, err);
                        state.analytics_error = Some(err.to_string());
                    }
                }
            }
        });
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Quit => self.exit = true,
            Action::Load(month) => self.load(month),
            Action::UpdateBill { id, patch, what } => {
                let controller = self.controller.clone();
                let state = Arc::clone(&self.state);
                tokio::spawn(async move {
                    let result = controller.update_bill(id, patch).await;
                    if let Ok(mut state) = state.lock() {
                        state.report_update(&what, result);
                    }
                });
            }
            Action::UpdateRates(rates) => {
                let controller = self.controller.clone();
                let state = Arc::clone(&self.state);
                tokio::spawn(async move {
                    let result = controller.update_all_rates(rates).await;
                    if let Ok(mut state) = state.lock() {
                        state.report_update("rates", result);
                    }
                });
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();

        if let Ok(state) = self.state.lock() {
            match state.tab {
                Tab::Management => {
                    let chunks = Layout::default()
                        .direction(Direction::Vertical)
                        .constraints([
                            Constraint::Length(3),
                            Constraint::Min(14),
                            Constraint::Length(6),
                            Constraint::Length(1),
                        ])
                        .split(area);

                    HeaderWidget::render(frame, chunks[0], &state);
                    RoomCardsWidget::render(frame, chunks[1], &state);
                    StatisticsWidget::render(frame, chunks[2], &state);
                    ShortcutsWidget::render(frame, chunks[3], &state);
                }
                Tab::Analytics => {
                    let chunks = Layout::default()
                        .direction(Direction::Vertical)
                        .constraints([
                            Constraint::Length(3),
                            Constraint::Min(10),
                            Constraint::Length(1),
                        ])
                        .split(area);

                    HeaderWidget::render(frame, chunks[0], &state);
                    AnalyticsWidget::render(frame, chunks[1], &state);
                    ShortcutsWidget::render(frame, chunks[2], &state);
                }
            }

            match &state.popup {
                Some(Popup::EditBill(form)) => DetailPopupWidget::render(frame, area, form),
                Some(Popup::Rates(form)) => RatesPopupWidget::render(frame, area, form),
                None => {}
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        if let Event::Key(key_event) = event {
            if key_event.kind == KeyEventKind::Press {
                let action = self.handle_key(key_event);
                self.dispatch(action);
            }
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        let Ok(mut state) = self.state.lock() else {
            return Action::None;
        };

        match state.popup.take() {
            Some(Popup::EditBill(form)) => Self::handle_edit_key(&mut state, form, key),
            Some(Popup::Rates(form)) => Self::handle_rates_key(&mut state, form, key),
            None => self.handle_main_key(&mut state, key),
        }
    }

    fn handle_main_key(&self, state: &mut AppState, key: KeyEvent) -> Action {
        let month = self.controller.selected_month();

        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Esc => {
                state.status = None;
                Action::None
            }
            KeyCode::Tab => {
                state.tab = match state.tab {
                    Tab::Management => Tab::Analytics,
                    Tab::Analytics => Tab::Management,
                };
                Action::None
            }
            KeyCode::Left => Action::Load(month.previous()),
            KeyCode::Right => Action::Load(month.next()),
            KeyCode::Char('t') => Action::Load(MonthKey::current()),
            KeyCode::Char('r') => {
                state.invalidate_analytics();
                Action::Load(month)
            }
            KeyCode::Up => {
                state.selected_room = (state.selected_room + ROOM_IDS.len() - 1) % ROOM_IDS.len();
                Action::None
            }
            KeyCode::Down => {
                state.selected_room = (state.selected_room + 1) % ROOM_IDS.len();
                Action::None
            }
            KeyCode::Char(c @ '1'..='4') => {
                state.selected_room = (c as usize) - ('1' as usize);
                Action::None
            }
            KeyCode::Enter => {
                if !state.can_edit() {
                    return Action::None;
                }
                match state.selected_bill().map(BillForm::new) {
                    Some(form) => state.popup = Some(Popup::EditBill(form)),
                    None => {
                        let room = state.selected_room_id();
                        state.set_error(format!("No bill for {} yet", room_name(room)));
                    }
                }
                Action::None
            }
            KeyCode::Char('p') => {
                if !state.can_edit() {
                    return Action::None;
                }
                let Some((id, is_paid, what)) = state
                    .selected_bill()
                    .and_then(|bill| bill.id.map(|id| (id, bill.is_paid, bill.room_name())))
                else {
                    return Action::None;
                };
                state.pending_writes += 1;
                Action::UpdateBill {
                    id,
                    patch: BillPatch::paid(!is_paid),
                    what,
                }
            }
            KeyCode::Char('R') => {
                if !state.can_edit() {
                    return Action::None;
                }
                let current = state
                    .billing
                    .bills()
                    .first()
                    .map(Rates::for_bill)
                    .unwrap_or_default();
                state.popup = Some(Popup::Rates(RatesForm::new(current)));
                Action::None
            }
            _ => Action::None,
        }
    }

    fn handle_edit_key(state: &mut AppState, mut form: BillForm, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => return Action::None,
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) => form.input(c),
            KeyCode::Enter => {
                let patch = match form.to_patch() {
                    Ok(patch) => patch,
                    Err(err) => {
                        form.set_error(err);
                        state.popup = Some(Popup::EditBill(form));
                        return Action::None;
                    }
                };
                let Some(id) = form.bill_id() else {
                    form.set_error("This bill has not been saved yet");
                    state.popup = Some(Popup::EditBill(form));
                    return Action::None;
                };
                if patch.is_empty() {
                    return Action::None;
                }
                state.pending_writes += 1;
                return Action::UpdateBill {
                    id,
                    patch,
                    what: form.original().room_name(),
                };
            }
            _ => {}
        }

        state.popup = Some(Popup::EditBill(form));
        Action::None
    }

    fn handle_rates_key(state: &mut AppState, mut form: RatesForm, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => return Action::None,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(c) => form.input(c),
            KeyCode::Enter => match form.to_rates() {
                Ok(rates) => {
                    state.pending_writes += 1;
                    return Action::UpdateRates(rates);
                }
                Err(err) => form.set_error(err),
            },
            _ => {}
        }

        state.popup = Some(Popup::Rates(form));
        Action::None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::config_path(args.config.as_deref());
    let mut config = AppConfig::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: {:#}; using defaults", e);
        AppConfig::default()
    });

    // An explicit backend becomes the new default
    if let Some(backend) = args.backend {
        config.backend = Some(backend);
        if let Err(e) = config.save(&config_path) {
            eprintln!("Warning: Could not save config: {}", e);
        }
    }

    if let Some(data_file) = args.data_file {
        config.data_file = data_file;
    }
    config.apply_env(
        std::env::var("SUPABASE_URL").ok(),
        std::env::var("SUPABASE_KEY").ok(),
    );

    if let Err(e) = init_logging(&config.log_file_path(), args.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    let backend = config.resolve_backend();
    let store = build_store(&config, backend)?;
    let month = args.month.unwrap_or_else(MonthKey::current);
    tracing::info!("Opening {} with the {} backend", month, backend.name());

    let mut terminal = ratatui::init();
    let mut app = App::new(store, backend, month, config.analytics_window);

    let result = app.run(&mut terminal).await;

    ratatui::restore();

    result
}
