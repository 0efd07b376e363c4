// src/lib.rs
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

// --- Declare modules ---
pub mod calendar;
pub mod catalog;
mod config;
pub mod db;
pub mod embed;
pub mod profile;
pub mod remote;
pub mod search;
pub mod session;
pub mod viewer;

// --- Expose public types ---
pub use calendar::{CalendarDay, CalendarStrip, CompletionSet, WeekDirection, WeekStart};
pub use catalog::{CatalogError, Exercise, ProgramCatalog, TrainingProgram};
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, BackendConfig, Config, ConfigError, StandardColor, Theme,
};
pub use db::{get_db_path as get_db_path_util, DbError, SessionRecord};
pub use embed::resolve_embed_url;
pub use profile::ProfileSummary;
pub use remote::{DataSource, FetchError, RestClient};
pub use search::{ExerciseSearch, LoadState, SearchResults};
pub use session::{
    Advance, CompletedSession, SessionError, SessionEvent, SessionObserver, SessionPhase,
    SessionPlayer,
};
pub use viewer::{ExerciseDetailViewer, ExerciseView};

/// Logs every session transition.
fn trace_session_event(event: &SessionEvent) {
    match event {
        SessionEvent::Completed {
            program,
            date,
            newly_recorded,
        } => info!(
            "Completed '{}' on {} (new training day: {})",
            program, date, newly_recorded
        ),
        other => debug!("Session event: {:?}", other),
    }
}

/// Owns everything a training session touches: config, local store, catalog,
/// completion set, calendar strip, session player and detail viewer.
pub struct TrainingService {
    pub config: Config,
    pub conn: Connection,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    catalog: ProgramCatalog,
    completions: CompletionSet,
    calendar: CalendarStrip,
    player: SessionPlayer,
    viewer: ExerciseDetailViewer,
}

impl TrainingService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let conn = db::open_db(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        Self::from_parts(config, conn, db_path, config_path)
    }

    /// Builds a service over an already opened connection. Creates tables, loads the
    /// program catalog and the recorded training days.
    pub fn from_parts(
        config: Config,
        conn: Connection,
        db_path: PathBuf,
        config_path: PathBuf,
    ) -> Result<Self> {
        db::init_db(&conn).context("Failed to initialize database schema")?;

        let catalog = match &config.programs_file {
            Some(path) => ProgramCatalog::load(path)
                .with_context(|| format!("Failed to load training programs from {path:?}"))?,
            None => ProgramCatalog::builtin(),
        };
        let completions: CompletionSet = db::list_completions(&conn)
            .context("Failed to load completed training days")?
            .into_iter()
            .collect();
        info!(
            "Loaded {} program(s) and {} training day(s)",
            catalog.list_programs().len(),
            completions.len()
        );

        let mut player = SessionPlayer::new();
        player.subscribe(trace_session_event);

        Ok(Self {
            calendar: CalendarStrip::new(today(), config.week_start),
            config,
            conn,
            db_path,
            config_path,
            catalog,
            completions,
            player,
            viewer: ExerciseDetailViewer::new(),
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config)
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.player.subscribe(observer);
    }

    // --- Calendar ---

    pub const fn calendar(&self) -> &CalendarStrip {
        &self.calendar
    }

    pub const fn completions(&self) -> &CompletionSet {
        &self.completions
    }

    pub fn week_days(&self) -> Vec<CalendarDay> {
        self.calendar.days(&self.completions)
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.calendar.select_date(date);
    }

    pub fn advance_week(&mut self, direction: WeekDirection) {
        self.calendar.advance_week(direction);
    }

    pub fn shift_weeks(&mut self, weeks: i64) {
        self.calendar.shift_weeks(weeks);
    }

    pub fn is_completed(&self, date: NaiveDate) -> bool {
        self.calendar.is_completed(date, &self.completions)
    }

    // --- Catalog ---

    pub fn list_programs(&self) -> &[TrainingProgram] {
        self.catalog.list_programs()
    }

    // --- Session ---

    pub fn phase(&self) -> SessionPhase {
        self.player.phase()
    }

    pub const fn player(&self) -> &SessionPlayer {
        &self.player
    }

    /// "Train now": opens program selection. A finished session is cleared first.
    pub fn start_training(&mut self) -> Result<(), SessionError> {
        if self.player.phase() == SessionPhase::Completed {
            self.player.reset()?;
        }
        self.player.start()
    }

    /// Starts the named program.
    /// # Errors
    /// - Unknown program name.
    /// - `SessionError::InvalidProgram` for a program without exercises.
    pub fn select_program(&mut self, name: &str) -> Result<&Exercise> {
        let program = self
            .catalog
            .find_program(name)
            .with_context(|| format!("No training program named '{}'", name.trim()))?;
        self.player.select_program(program)?;
        self.player
            .current_exercise()
            .context("Session started without a current exercise")
    }

    pub fn record_note(&mut self, text: &str) -> Result<(), SessionError> {
        self.player.record_note(text)
    }

    pub fn record_note_for(&mut self, exercise: &str, text: &str) -> Result<(), SessionError> {
        self.player.record_note_for(exercise, text)
    }

    /// Advances the session; finishing it marks today on the calendar.
    pub fn advance(&mut self) -> Result<Advance> {
        self.advance_on(today())
    }

    /// Like `advance`, recording completion on `date`. The finished session and its
    /// notes are stored locally before the player moves on; if the store fails the
    /// session stays on its last exercise with notes intact, so the call can be retried.
    pub fn advance_on(&mut self, date: NaiveDate) -> Result<Advance> {
        if let Some(pending) = self.player.pending_completion(&self.completions, date) {
            db::record_session(&mut self.conn, &pending).with_context(|| {
                format!("Failed to store completed session '{}'", pending.program_name)
            })?;
        }
        Ok(self.player.advance(&mut self.completions, date)?)
    }

    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.player.cancel()
    }

    /// Returns the player to idle after a completed session.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        self.player.reset()
    }

    pub fn session_history(&self, limit: u32) -> Result<Vec<SessionRecord>> {
        db::list_sessions(&self.conn, limit).context("Failed to list completed sessions")
    }

    // --- Exercise detail ---

    /// Opens the detail view of an exercise of the running program, or of the catalog.
    /// Does not affect the running session.
    pub fn view_exercise(&mut self, name: &str) -> Result<&ExerciseView> {
        let session = self.player.state();
        let exercise = session
            .and_then(|s| s.program().exercise(name))
            .or_else(|| self.catalog.find_exercise(name))
            .with_context(|| format!("No exercise named '{}'", name.trim()))?;
        let note = session.and_then(|s| s.note(&exercise.name));
        let shown = viewer::view(exercise, &self.config.embed_origin, note);
        Ok(self.viewer.open(shown))
    }

    pub fn close_exercise_view(&mut self) -> Option<ExerciseView> {
        self.viewer.close()
    }

    pub const fn exercise_view(&self) -> Option<&ExerciseView> {
        self.viewer.current()
    }

    // --- Remote ---

    /// Client for the configured backend.
    /// # Errors
    /// `ConfigError::BackendNotConfigured` when the URL or API key is missing.
    pub fn data_source(&self) -> Result<RestClient> {
        let backend = &self.config.backend;
        let (Some(url), Some(api_key)) = (&backend.url, &backend.api_key) else {
            return Err(ConfigError::BackendNotConfigured(self.config_path.clone()).into());
        };
        let client = RestClient::new(url.as_str(), api_key.as_str())
            .with_access_token(backend.access_token.clone())
            .with_timeout(Duration::from_secs(backend.timeout_secs))
            .context("Failed to build HTTP client")?;
        Ok(client)
    }

    /// # Errors
    /// `ConfigError::UserNotSet` when no user id is configured.
    pub fn user_id(&self) -> Result<&str, ConfigError> {
        self.config
            .backend
            .user_id
            .as_deref()
            .ok_or_else(|| ConfigError::UserNotSet(self.config_path.clone()))
    }

    pub async fn load_profile<S: DataSource>(&self, source: &S) -> Result<ProfileSummary> {
        let user_id = self.user_id()?;
        profile::load_profile(source, user_id)
            .await
            .with_context(|| format!("Failed to load profile of user {user_id}"))
    }

    /// Pushes a completion date to the backend when `backend.sync_completions` is set.
    /// Returns whether anything was sent.
    pub async fn sync_completion<S: DataSource>(&self, source: &S, date: NaiveDate) -> Result<bool> {
        if !self.config.backend.sync_completions {
            return Ok(false);
        }
        let user_id = self.user_id()?;
        source
            .record_completion(user_id, date)
            .await
            .with_context(|| format!("Failed to sync completion of {date}"))?;
        Ok(true)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
