pub mod api;
pub mod commands;
pub mod db;
pub mod events;
pub mod models;
pub mod poller;
pub mod report;
pub mod repository;
pub mod session;
pub mod settings;
pub mod timer;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use api::HttpSessionClient;
use db::Database;
use events::EventBus;
use models::{Appointment, Child, Doctor, Stimulus};
use report::ReportLoader;
use repository::CachedRepository;
use session::GazeSessionController;
use settings::{default_settings_path, Settings, SettingsStore};

/// Shared services of one dashboard process.
pub struct Dashboard {
    pub settings: Settings,
    pub client: Arc<HttpSessionClient>,
    pub cache: Option<Database>,
    pub events: EventBus,
}

impl Dashboard {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = HttpSessionClient::new(&settings.api_base_url, settings.request_timeout())
            .with_context(|| format!("invalid backend url '{}'", settings.api_base_url))?;

        let cache = settings
            .cache_path
            .clone()
            .map(Database::new)
            .transpose()
            .context("failed to open local result cache")?;

        Ok(Self {
            settings,
            client: Arc::new(client),
            cache,
            events: EventBus::default(),
        })
    }

    pub fn session_controller(&self) -> GazeSessionController<HttpSessionClient> {
        GazeSessionController::new(self.client.clone(), self.events.clone(), &self.settings)
    }

    pub fn report_loader(&self) -> ReportLoader<HttpSessionClient> {
        ReportLoader::new(
            self.client.clone(),
            self.cache.clone(),
            self.events.clone(),
            self.settings.retry_policy(),
        )
    }

    pub fn children(&self) -> CachedRepository<Child, HttpSessionClient> {
        CachedRepository::new(self.client.clone())
    }

    pub fn doctors(&self) -> CachedRepository<Doctor, HttpSessionClient> {
        CachedRepository::new(self.client.clone())
    }

    pub fn stimuli(&self) -> CachedRepository<Stimulus, HttpSessionClient> {
        CachedRepository::new(self.client.clone())
    }

    pub fn appointments(&self) -> CachedRepository<Appointment, HttpSessionClient> {
        CachedRepository::new(self.client.clone())
    }
}

/// Process entry point used by the `gazeboard` binary.
pub async fn run(args: Vec<String>) -> Result<()> {
    // Reads RUST_LOG; GAZEBOARD_DEBUG raises the floor to debug.
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();

    let command = commands::parse(&args)?;
    if command == commands::Command::Help {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let store = SettingsStore::new(default_settings_path())?;
    let settings = store.effective();
    log::info!(
        "gazeboard starting against {} (settings: {})",
        settings.api_base_url,
        store.path().display()
    );

    let command = match command {
        commands::Command::Config { api_url } => return commands::configure(&store, api_url),
        other => other,
    };

    let dashboard = Dashboard::new(settings)?;
    commands::execute(&dashboard, command).await
}
