//! Command-line surface of the `gazeboard` binary.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    api::HttpSessionClient,
    events::DashboardEvent,
    models::{GazeResult, SessionType},
    report::DataSource,
    repository::{ListQuery, SortDirection},
    session::GazeSessionController,
    settings::SettingsStore,
    Dashboard,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const USAGE: &str = "\
usage: gazeboard <command>

commands:
  session <child> <stimulus> [type] [--capture-secs N]
      start a capture, stop it after N seconds (default 30) or on Ctrl-C,
      wait for processing and print the report
  report <child>          print the latest result for a child
  results                 print every result
  config [--api-url URL]  show settings, or store a new backend url
  children|doctors|stimuli|appointments [search] [--page N] [--desc]
      list records with optional case-insensitive search
  help                    show this message";

const DEFAULT_CAPTURE_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Children,
    Doctors,
    Stimuli,
    Appointments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Session {
        child_id: String,
        stimulus_id: String,
        session_type: SessionType,
        capture: Duration,
    },
    Report {
        child_id: String,
    },
    Results,
    Config {
        api_url: Option<String>,
    },
    List {
        collection: Collection,
        query: ListQuery,
    },
    Help,
}

pub fn parse(args: &[String]) -> Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    match name.as_str() {
        "session" => parse_session(rest),
        "report" => match rest {
            [child_id] => Ok(Command::Report {
                child_id: child_id.clone(),
            }),
            _ => bail!("usage: gazeboard report <child>"),
        },
        "results" => Ok(Command::Results),
        "config" => match rest {
            [] => Ok(Command::Config { api_url: None }),
            [flag, url] if flag == "--api-url" => Ok(Command::Config {
                api_url: Some(url.clone()),
            }),
            _ => bail!("usage: gazeboard config [--api-url URL]"),
        },
        "children" => parse_list(Collection::Children, rest),
        "doctors" => parse_list(Collection::Doctors, rest),
        "stimuli" => parse_list(Collection::Stimuli, rest),
        "appointments" => parse_list(Collection::Appointments, rest),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
}

fn parse_session(args: &[String]) -> Result<Command> {
    let mut positional = Vec::new();
    let mut capture_secs = DEFAULT_CAPTURE_SECS;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--capture-secs" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--capture-secs needs a value"))?;
            capture_secs = value
                .parse()
                .with_context(|| format!("invalid capture length '{value}'"))?;
        } else {
            positional.push(arg.as_str());
        }
    }

    let (child_id, stimulus_id, session_type) = match positional.as_slice() {
        [child, stimulus] => (*child, *stimulus, SessionType::default()),
        [child, stimulus, kind] => (*child, *stimulus, kind.parse()?),
        _ => bail!("usage: gazeboard session <child> <stimulus> [type] [--capture-secs N]"),
    };

    Ok(Command::Session {
        child_id: child_id.to_string(),
        stimulus_id: stimulus_id.to_string(),
        session_type,
        capture: Duration::from_secs(capture_secs),
    })
}

fn parse_list(collection: Collection, args: &[String]) -> Result<Command> {
    let mut query = ListQuery::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--page" => {
                let value = iter.next().ok_or_else(|| anyhow!("--page needs a value"))?;
                query.page = value
                    .parse()
                    .with_context(|| format!("invalid page '{value}'"))?;
            }
            "--desc" => query.direction = SortDirection::Descending,
            search if query.search.is_none() => query.search = Some(search.to_string()),
            extra => bail!("unexpected argument '{extra}'"),
        }
    }

    Ok(Command::List { collection, query })
}

/// Print the effective settings or persist a new backend url.
pub fn configure(store: &SettingsStore, api_url: Option<String>) -> Result<()> {
    if let Some(api_url) = api_url {
        HttpSessionClient::new(&api_url, Duration::from_secs(1))
            .with_context(|| format!("refusing to store invalid url '{api_url}'"))?;
        let updated = store.settings().with_api_url(Some(api_url));
        store.update(updated)?;
        log_info!("settings saved to {}", store.path().display());
    }
    print_json(&store.effective());
    Ok(())
}

pub async fn execute(dashboard: &Dashboard, command: Command) -> Result<()> {
    match command {
        Command::Session {
            child_id,
            stimulus_id,
            session_type,
            capture,
        } => run_session(dashboard, &child_id, &stimulus_id, session_type, capture).await,
        Command::Report { child_id } => show_report(dashboard, &child_id).await,
        Command::Results => show_results(dashboard).await,
        Command::List { collection, query } => show_listing(dashboard, collection, &query).await,
        Command::Config { .. } => bail!("config is handled before the dashboard starts"),
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

async fn run_session(
    dashboard: &Dashboard,
    child_id: &str,
    stimulus_id: &str,
    session_type: SessionType,
    capture: Duration,
) -> Result<()> {
    let mut receiver = dashboard.events.subscribe();
    let mut controller = dashboard.session_controller();

    let handle = controller
        .start_session(child_id, stimulus_id, session_type)
        .await?;
    log_info!(
        "capturing session {} for {}s (Ctrl-C stops early)",
        handle.session_id,
        capture.as_secs()
    );

    let capture_end = tokio::time::sleep(capture);
    tokio::pin!(capture_end);
    loop {
        tokio::select! {
            _ = &mut capture_end => break,
            _ = tokio::signal::ctrl_c() => break,
            event = receiver.recv() => {
                if let Some(event) = next_event(event)? {
                    print_event(&event);
                }
            }
        }
    }

    if let Err(err) = controller.stop_session().await {
        shutdown(&mut controller).await;
        return Err(err);
    }

    let route = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                shutdown(&mut controller).await;
                bail!("interrupted while waiting for processing");
            }
            event = receiver.recv() => match next_event(event)? {
                Some(DashboardEvent::Navigate { route }) => break route,
                Some(event) => print_event(&event),
                None => {}
            }
        }
    };

    shutdown(&mut controller).await;
    log_info!("processing finished; opening {route}");
    show_report(dashboard, &handle.child_id).await
}

async fn shutdown(controller: &mut GazeSessionController<HttpSessionClient>) {
    if let Err(err) = controller.shutdown().await {
        log_warn!("session teardown failed: {err:#}");
    }
}

fn next_event(received: Result<DashboardEvent, RecvError>) -> Result<Option<DashboardEvent>> {
    match received {
        Ok(event) => Ok(Some(event)),
        Err(RecvError::Lagged(skipped)) => {
            log_warn!("event printer lagged; skipped {skipped} events");
            Ok(None)
        }
        Err(RecvError::Closed) => bail!("event bus closed"),
    }
}

fn print_event(event: &DashboardEvent) {
    match event {
        DashboardEvent::TimerTick { elapsed_secs, paused } => {
            let marker = if *paused { " (paused)" } else { "" };
            println!(
                "[timer] {:02}:{:02}{marker}",
                elapsed_secs / 60,
                elapsed_secs % 60
            );
        }
        DashboardEvent::Notification { level, message } => {
            println!("[{level:?}] {message}");
        }
        DashboardEvent::Notice { message } => println!("[notice] {message}"),
        other => print_json(other),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => log_warn!("failed to render output: {err}"),
    }
}

async fn show_report(dashboard: &Dashboard, child_id: &str) -> Result<()> {
    let Some(source) = dashboard.report_loader().load(child_id).await else {
        bail!("report loading was cancelled");
    };
    if let Some(notice) = source.notice() {
        println!("[notice] {notice}");
    }

    let Some(result) = source.data() else {
        println!("No result available for child {child_id}.");
        return Ok(());
    };
    print_result(dashboard, result, source.is_live());
    Ok(())
}

fn print_result(dashboard: &Dashboard, result: &GazeResult, live: bool) {
    println!(
        "Result {} for child {}{}",
        result.id,
        result.child_id,
        if live { "" } else { " (cached)" }
    );
    println!("  predicted class: {}", result.predicted_class);
    println!("  confidence:      {:.1}%", result.confidence_percent());
    println!("  risk level:      {}", result.risk_level.label());
    println!("  guidance:        {}", result.risk_level.guidance());
    println!("  recorded at:     {}", result.created_at);

    let assets = [
        ("scanpath", &result.scanpath_path),
        ("heatmap", &result.heatmap_path),
        ("gaze data", &result.gaze_data_path),
    ];
    for (label, path) in assets {
        let Some(path) = path else { continue };
        match dashboard.client.asset_url(path) {
            Ok(url) => println!("  {label:<15}  {url}"),
            Err(err) => log_warn!("cannot resolve {label} path '{path}': {err}"),
        }
    }
}

async fn show_results(dashboard: &Dashboard) -> Result<()> {
    let Some(source) = dashboard.report_loader().load_all().await else {
        bail!("result loading was cancelled");
    };
    if let Some(notice) = source.notice() {
        println!("[notice] {notice}");
    }

    let results = source.data().map(Vec::as_slice).unwrap_or_default();
    if results.is_empty() {
        println!("No results yet.");
    }
    for result in results {
        println!(
            "{:<8} child {:<8} {:<10} {:>5.1}%  {}",
            result.id,
            result.child_id,
            result.risk_level.label(),
            result.confidence_percent(),
            result.created_at
        );
    }
    if matches!(source, DataSource::Fallback { .. }) {
        log_info!("listed {} cached results", results.len());
    }
    Ok(())
}

async fn show_listing(dashboard: &Dashboard, collection: Collection, query: &ListQuery) -> Result<()> {
    match collection {
        Collection::Children => {
            let children = dashboard.children().list().await?;
            let today = Local::now().date_naive();
            let page = query.apply(&children, |child| child.name.to_lowercase());
            for child in &page.items {
                println!(
                    "{:<8} {:<30} {}",
                    child.id,
                    child.name,
                    child.age_on(today).describe()
                );
            }
            print_footer(page.page, page.total_pages, page.total_items);
        }
        Collection::Doctors => {
            let doctors = dashboard.doctors().list().await?;
            let page = query.apply(&doctors, |doctor| doctor.name.to_lowercase());
            for doctor in &page.items {
                println!(
                    "{:<8} {:<30} {}",
                    doctor.id,
                    doctor.name,
                    doctor.specialization.as_deref().unwrap_or("-")
                );
            }
            print_footer(page.page, page.total_pages, page.total_items);
        }
        Collection::Stimuli => {
            let stimuli = dashboard.stimuli().list().await?;
            let page = query.apply(&stimuli, |stimulus| stimulus.title.to_lowercase());
            for stimulus in &page.items {
                let duration = stimulus
                    .duration_secs
                    .map(|secs| format!("{secs}s"))
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<8} {:<30} {duration:>6}", stimulus.id, stimulus.title);
            }
            print_footer(page.page, page.total_pages, page.total_items);
        }
        Collection::Appointments => {
            let appointments = dashboard.appointments().list().await?;
            let page = query.apply(&appointments, |appointment| appointment.scheduled_at.clone());
            for appointment in &page.items {
                println!(
                    "{:<8} {:<20} child {:<8} doctor {:<8} {:?}",
                    appointment.id,
                    appointment.scheduled_at,
                    appointment.child_id,
                    appointment.doctor_id,
                    appointment.status
                );
            }
            print_footer(page.page, page.total_pages, page.total_items);
        }
    }
    Ok(())
}

fn print_footer(page: usize, total_pages: usize, total_items: usize) {
    println!("page {page}/{total_pages} ({total_items} total)");
}
