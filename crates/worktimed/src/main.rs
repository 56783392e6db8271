//! worktimed - The work-time policy service
//!
//! Command-line front end and background runner. It wires together:
//! - Configuration loading
//! - Store initialization
//! - The work-time service
//! - Periodic expired-override cleanup (`run`)
//!
//! Every one-shot command prints a `{status, data?, message?}` envelope.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use worktime_api::{GlobalPolicyRecord, Response, ScheduleOverrideRequest, API_VERSION};
use worktime_config::{load_config_or_default, parse_days, parse_time, RawDays, WorkTimeConfig};
use worktime_core::{ExceptionCandidate, WorkTimeService};
use worktime_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use worktime_util::{default_config_path, local_now, EntityId, WorkTimeError};

/// worktimed - Work-time policy service
#[derive(Parser, Debug)]
#[command(name = "worktimed")]
#[command(about = "Work-time policy evaluation and exception management", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/worktime/config.toml)
    #[arg(short, long, env = "WORKTIME_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set WORKTIME_DATA_DIR env var)
    #[arg(short, long, env = "WORKTIME_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level, used when RUST_LOG is unset
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change the global policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Manage entities
    Entity {
        #[command(subcommand)]
        action: EntityAction,
    },

    /// Manage per-entity exceptions
    Exception {
        #[command(subcommand)]
        action: ExceptionAction,
    },

    /// Fleet-wide override counts
    Summary,

    /// Remove expired overrides once
    Cleanup,

    /// Enforcement status for an entity (or the global policy)
    Status {
        #[arg(long)]
        entity: Option<String>,
    },

    /// Ask whether an application may run right now
    Allowed {
        package: String,

        #[arg(long)]
        entity: Option<String>,
    },

    /// Run in the foreground, cleaning up expired overrides periodically
    Run,
}

#[derive(Subcommand, Debug)]
enum PolicyAction {
    Show,

    /// Update fields of the global policy; unset flags keep their value
    Set {
        #[arg(long)]
        enabled: Option<bool>,

        /// HH:MM
        #[arg(long)]
        start: Option<String>,

        /// HH:MM
        #[arg(long)]
        end: Option<String>,

        /// "weekdays", "weekends", "all", "mon,wed,fri" or a bitmask
        #[arg(long)]
        days: Option<String>,

        /// "*" or comma-separated application identifiers
        #[arg(long)]
        apps_during_work: Option<String>,

        #[arg(long)]
        apps_outside_work: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum EntityAction {
    /// Register an entity (or rename it)
    Add {
        id: String,

        #[arg(long)]
        name: Option<String>,
    },

    /// List all entities with their evaluated state
    List,

    /// Evaluate a single entity
    Show { id: String },

    /// Put an entity on its own schedule; unset flags follow the global policy
    Schedule {
        id: String,

        /// HH:MM
        #[arg(long)]
        start: Option<String>,

        /// HH:MM
        #[arg(long)]
        end: Option<String>,

        /// Bitmask, or comma-separated day names and bit values
        #[arg(long)]
        days: Option<String>,

        #[arg(long)]
        apps_during_work: Option<String>,

        #[arg(long)]
        apps_outside_work: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ExceptionAction {
    /// Create or replace an entity's exception
    Add {
        id: String,

        /// YYYY-MM-DD
        #[arg(long)]
        date_from: String,

        /// HH:MM
        #[arg(long)]
        time_from: String,

        /// YYYY-MM-DD
        #[arg(long)]
        date_to: String,

        /// HH:MM
        #[arg(long)]
        time_to: String,
    },

    /// Remove an entity's override data
    Remove { id: String },
}

/// Wired-up service state
struct App {
    config: WorkTimeConfig,
    store: Arc<dyn Store>,
    service: WorkTimeService,
}

impl App {
    fn new(args: &Args, config: WorkTimeConfig) -> Result<Self> {
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(worktime_util::DB_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        debug!(db_path = %db_path.display(), "Store initialized");

        let service = WorkTimeService::new(store.clone(), config.default_policy.clone());

        Ok(Self {
            config,
            store,
            service,
        })
    }

    /// Execute a one-shot command and render its envelope
    fn execute(&self, command: Command) -> Result<(String, bool)> {
        let now = local_now();

        match command {
            Command::Policy { action } => match action {
                PolicyAction::Show => render(self.service.global_policy()),
                PolicyAction::Set {
                    enabled,
                    start,
                    end,
                    days,
                    apps_during_work,
                    apps_outside_work,
                } => {
                    let result = self.service.global_policy().and_then(|current| {
                        let updated = apply_policy_update(
                            current,
                            PolicyUpdate {
                                enabled,
                                start,
                                end,
                                days,
                                apps_during_work,
                                apps_outside_work,
                            },
                        )?;
                        self.service.save_global_policy(updated)
                    });
                    render(result)
                }
            },

            Command::Entity { action } => match action {
                EntityAction::Add { id, name } => {
                    render(self.service.register_entity(&EntityId::new(id), name.as_deref()))
                }
                EntityAction::List => render(self.service.list_entities(&now)),
                EntityAction::Show { id } => {
                    render(self.service.evaluate_entity(&EntityId::new(id), &now))
                }
                EntityAction::Schedule {
                    id,
                    start,
                    end,
                    days,
                    apps_during_work,
                    apps_outside_work,
                } => {
                    let result = schedule_request(
                        id,
                        PolicyUpdate {
                            enabled: None,
                            start,
                            end,
                            days,
                            apps_during_work,
                            apps_outside_work,
                        },
                    )
                    .and_then(|request| self.service.save_schedule_override(&request));
                    render(result)
                }
            },

            Command::Exception { action } => match action {
                ExceptionAction::Add {
                    id,
                    date_from,
                    time_from,
                    date_to,
                    time_to,
                } => {
                    let candidate = ExceptionCandidate::new(date_from, time_from, date_to, time_to);
                    render(self.service.save_exception(&EntityId::new(id), &candidate, &now))
                }
                ExceptionAction::Remove { id } => {
                    render(self.service.remove_exception(&EntityId::new(id)))
                }
            },

            Command::Summary => render(self.service.fleet_summary(&now)),

            Command::Cleanup => render(self.service.cleanup_expired(&now)),

            Command::Status { entity } => {
                let entity = entity.map(EntityId::new);
                let result = self
                    .service
                    .effective_policy(entity.as_ref(), &now)
                    .map(|policy| policy.status(&now));
                render(result)
            }

            Command::Allowed { package, entity } => {
                let entity = entity.map(EntityId::new);
                render(self.service.is_app_allowed(entity.as_ref(), &package, &now))
            }

            Command::Run => render::<()>(Err(WorkTimeError::validation(
                "run is not a one-shot command",
            ))),
        }
    }

    async fn run(&self) -> Result<()> {
        self.store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        let mut cleanup_timer = tokio::time::interval(self.config.service.cleanup_interval);

        info!(
            cleanup_interval_secs = self.config.service.cleanup_interval.as_secs(),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                _ = cleanup_timer.tick() => {
                    match self.service.cleanup_expired(&local_now()) {
                        Ok(removed) if !removed.is_empty() => {
                            info!(count = removed.len(), "Removed expired overrides");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Cleanup failed"),
                    }
                }
            }
        }

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }
}

/// Optional edits to the global policy
#[derive(Debug, Default)]
struct PolicyUpdate {
    enabled: Option<bool>,
    start: Option<String>,
    end: Option<String>,
    days: Option<String>,
    apps_during_work: Option<String>,
    apps_outside_work: Option<String>,
}

fn apply_policy_update(
    mut policy: GlobalPolicyRecord,
    update: PolicyUpdate,
) -> Result<GlobalPolicyRecord, WorkTimeError> {
    if let Some(enabled) = update.enabled {
        policy.enabled = enabled;
    }
    if let Some(start) = update.start {
        policy.start_time = parse_time(&start).map_err(WorkTimeError::validation)?;
    }
    if let Some(end) = update.end {
        policy.end_time = parse_time(&end).map_err(WorkTimeError::validation)?;
    }
    if let Some(days) = update.days {
        policy.days_of_week = parse_days(&days_arg(&days)).map_err(WorkTimeError::validation)?;
    }
    if let Some(apps) = update.apps_during_work {
        policy.allowed_apps_during_work = apps;
    }
    if let Some(apps) = update.apps_outside_work {
        policy.allowed_apps_outside_work = apps;
    }
    Ok(policy)
}

/// Build an entity schedule from the same flags `policy set` takes
fn schedule_request(id: String, update: PolicyUpdate) -> Result<ScheduleOverrideRequest, WorkTimeError> {
    let time = |value: Option<String>| {
        value
            .map(|v| parse_time(&v).map_err(WorkTimeError::validation))
            .transpose()
    };

    Ok(ScheduleOverrideRequest {
        start_time: time(update.start)?,
        end_time: time(update.end)?,
        days_of_week: update.days,
        allowed_apps_during_work: update.apps_during_work,
        allowed_apps_outside_work: update.apps_outside_work,
        ..ScheduleOverrideRequest::new(id)
    })
}

/// Interpret a `--days` argument the way the config file does
fn days_arg(value: &str) -> RawDays {
    if let Ok(mask) = value.trim().parse::<i64>() {
        return RawDays::Mask(mask);
    }
    if value.contains(',') {
        return RawDays::List(value.split(',').map(|d| d.trim().to_string()).collect());
    }
    RawDays::Preset(value.trim().to_string())
}

/// Serialize a result as an envelope. The flag is true for `OK`.
fn render<T: Serialize>(result: Result<T, WorkTimeError>) -> Result<(String, bool)> {
    let response = Response::from_result(result);
    let ok = response.is_ok();
    let json = serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
    Ok((json, ok))
}

fn init_logging(args: &Args, config: &WorkTimeConfig) {
    let level = args
        .log_level
        .clone()
        .or_else(|| config.service.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // stdout carries the envelopes, logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    init_logging(&args, &config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_version = API_VERSION,
        config_path = %args.config.display(),
        "worktimed starting"
    );

    let app = App::new(&args, config)?;

    if matches!(args.command, Command::Run) {
        app.run().await?;
        return Ok(ExitCode::SUCCESS);
    }

    let (output, ok) = app.execute(args.command)?;
    println!("{}", output);

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(1) })
}
