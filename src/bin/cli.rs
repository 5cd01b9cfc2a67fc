//! dataval CLI
//!
//! Terminal front-end for the data-validation dashboard.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dataval_dashboard::{
    dashboard::Dashboard,
    error::{AppError, Result},
    models::{Config, ObjectCount},
    render,
    services::HttpBackend,
};

/// dataval - Data Validation Dashboard
#[derive(Parser, Debug)]
#[command(
    name = "dataval",
    version,
    about = "Inspect and triage data-validation results"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "dataval.toml")]
    config: PathBuf,

    /// Override `[api].base_url`
    #[arg(long)]
    base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the App → Model → Validator status tree
    Summary {
        /// Also fetch model record counts for the unvalidated column
        #[arg(long)]
        counts: bool,
    },

    /// List the failing objects of a validator
    Failing {
        validator_id: u64,

        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },

    /// Mark a failing object as allowed to fail
    Allow {
        validator_id: u64,
        object_id: u64,

        /// Clear the flag instead of setting it
        #[arg(long)]
        revoke: bool,
    },

    /// Set the justification text of a failing object
    Justify {
        validator_id: u64,
        object_id: u64,
        text: String,
    },

    /// Validate the configuration file
    CheckConfig,
}

/// Initialize logging from the verbosity flag or the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Bootstrap and open `validator_id`, loading pages until `object_id` is
/// present or the list is exhausted.
async fn locate(dashboard: &mut Dashboard, validator_id: u64, object_id: u64) -> Result<()> {
    if !dashboard.bootstrap().await {
        return Err(AppError::precondition("could not load validators"));
    }
    if !dashboard.open_drilldown(validator_id).await {
        return Err(AppError::precondition(format!(
            "validator {validator_id} has no failing objects to open"
        )));
    }
    loop {
        let Some(cursor) = dashboard.cursor(validator_id) else {
            return Err(AppError::precondition("drill-down closed unexpectedly"));
        };
        if cursor.page().get(object_id).is_some() {
            return Ok(());
        }
        if !cursor.can_load_more() || !dashboard.load_more(validator_id).await {
            return Err(AppError::not_found(format!(
                "failing object {object_id} of validator {validator_id}"
            )));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // logging is configured from the file, so report a load failure afterwards
    let (mut config, load_error) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    init_logging(cli.verbose, &config.logging.level);
    if let Some(e) = load_error {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
    }

    if let Command::CheckConfig = cli.command {
        log::info!("Validating {}...", cli.config.display());
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK ({})", config.api.base_url);
        return Ok(());
    }

    config.validate()?;
    let backend = Arc::new(HttpBackend::new(&config.api)?);
    log::info!("Using API at {}", backend.base_url());
    let mut dashboard = Dashboard::new(backend, &config);

    match cli.command {
        Command::Summary { counts } => {
            if !dashboard.bootstrap().await {
                return Err(AppError::precondition("could not load validators"));
            }
            if counts {
                let known = dashboard.fetch_object_counts().await;
                log::info!("Fetched {} model record counts", known);
            }
            let tree = dashboard.summary();
            println!(
                "{}",
                render::render_tree(&tree, |app, model| {
                    if counts {
                        dashboard.object_count(app, model)
                    } else {
                        ObjectCount::Unknown
                    }
                })
            );
        }

        Command::Failing {
            validator_id,
            pages,
        } => {
            if !dashboard.bootstrap().await {
                return Err(AppError::precondition("could not load validators"));
            }
            let Some(validator) = dashboard.validator(validator_id) else {
                return Err(AppError::not_found(format!("validator {validator_id}")));
            };
            let total = dashboard.object_count(&validator.app_label, &validator.model_name);
            println!("{}", render::validator_row(validator, total));
            let details = render::exception_detail(validator);
            if !details.is_empty() {
                println!("{}", details.join("\n"));
                return Ok(());
            }

            if dashboard.open_drilldown(validator_id).await {
                for _ in 1..pages {
                    if !dashboard.load_more(validator_id).await {
                        break;
                    }
                }
            }
            if let Some(cursor) = dashboard.cursor(validator_id) {
                println!("{}", render::render_failing_objects(cursor));
            }
        }

        Command::Allow {
            validator_id,
            object_id,
            revoke,
        } => {
            locate(&mut dashboard, validator_id, object_id).await?;
            let reconciliation = dashboard.set_allowed_to_fail(object_id, validator_id, !revoke)?;
            if reconciliation.is_empty() {
                log::info!("Failing object {} already in that state", object_id);
            }
            dashboard.settle().await;

            if let Some(validator) = dashboard.validator(validator_id) {
                println!("{}", render::validator_row(validator, ObjectCount::Unknown));
            }
        }

        Command::Justify {
            validator_id,
            object_id,
            text,
        } => {
            locate(&mut dashboard, validator_id, object_id).await?;
            dashboard.edit_justification(validator_id, object_id, &text)?;
            dashboard.blur_justification(validator_id, object_id, &text)?;
            log::info!(
                "Waiting {:?} for the justification to be committed...",
                config.editing.debounce_window()
            );
            dashboard.settle().await;

            if let Some(object) = dashboard
                .cursor(validator_id)
                .and_then(|cursor| cursor.page().get(object_id))
            {
                println!("{}", render::failing_object_row(object));
            }
        }

        Command::CheckConfig => {}
    }

    log::info!("Done!");

    Ok(())
}
