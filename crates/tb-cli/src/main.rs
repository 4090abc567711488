use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use tb_cli::commands::settings::SettingsUpdate;
use tb_cli::commands::watch::SyncSetup;
use tb_cli::commands::{
    events, export, import, meters, period, reset, settings, status, sync, timeline, tracking,
    watch,
};
use tb_cli::{App, Cli, Commands, Config, EventsAction, MetersAction, SyncAction, selected_provider};

/// Load config and open the account.
fn open_app(config_path: Option<&Path>) -> Result<(App, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let app = App::open(&config)?;
    Ok((app, config))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (app, config) = open_app(cli.config.as_deref())?;
    let App {
        mut controller,
        store,
    } = app;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Status => status::run(&mut out, &controller)?,
        Commands::Meters(action) => match action {
            MetersAction::List { ids } => meters::list(&mut out, &controller, *ids)?,
            MetersAction::Add { name, factor } => {
                meters::add(&mut out, &mut controller, name, *factor)?;
            }
            MetersAction::Rename { meter, name } => {
                meters::rename(&mut out, &mut controller, meter, name)?;
            }
            MetersAction::Remove { meter } => meters::remove(&mut out, &mut controller, meter)?,
            MetersAction::Reorder { meters: keys } => {
                meters::reorder(&mut out, &mut controller, keys)?;
            }
        },
        Commands::Start { meter, comment } => {
            tracking::start(&mut out, &mut controller, meter, comment.as_deref())?;
        }
        Commands::Stop => tracking::stop(&mut out, &mut controller)?,
        Commands::Events(action) => match action {
            EventsAction::List { limit, ids } => events::list(&mut out, &controller, *limit, *ids)?,
            EventsAction::Edit { event, start, end } => {
                events::edit(&mut out, &mut controller, event, start, end)?;
            }
            EventsAction::Delete { event } => events::delete(&mut out, &mut controller, event)?,
        },
        Commands::Timeline { hours, json } => timeline::run(&mut out, &controller, *hours, *json)?,
        Commands::Period { value } => period::run(&mut out, &mut controller, value.as_deref())?,
        Commands::Settings {
            language,
            notifications,
            tutorial_completed,
        } => {
            let update = SettingsUpdate {
                language: language.clone(),
                notifications: *notifications,
                tutorial_completed: *tutorial_completed,
            };
            settings::run(&mut out, &mut controller, update)?;
        }
        Commands::Export { output } => match output {
            Some(path) => export::to_file(path, &controller)?,
            None => export::run(&mut out, &controller)?,
        },
        Commands::Import { input } => {
            let payload = import::read_payload(input)?;
            import::run(&mut out, &mut controller, &payload)?;
        }
        Commands::Reset { yes } => reset::run(&mut out, &mut controller, *yes)?,
        Commands::Sync(action) => {
            let provider = selected_provider(&config.sync)?
                .context("no sync provider configured; set sync.url or sync.directory")?;
            let shared = Arc::new(Mutex::new(controller));
            let rt = runtime()?;
            rt.block_on(async {
                match action {
                    SyncAction::Push => sync::push(&mut out, &shared, provider.as_ref()).await,
                    SyncAction::Pull => sync::pull(&mut out, &shared, provider.as_ref()).await,
                }
            })?;
            flush_shared(&shared);
            return Ok(());
        }
        Commands::Watch => {
            let setup = selected_provider(&config.sync)?.map(|provider| SyncSetup {
                provider,
                store,
                timing: config.sync.timing(),
            });
            let shared = Arc::new(Mutex::new(controller));
            let rt = runtime()?;
            let applied = rt.block_on(watch::serve(
                BufReader::new(tokio::io::stdin()),
                &mut out,
                &shared,
                setup,
            ))?;
            tracing::debug!(applied, "device input closed");
            flush_shared(&shared);
            return Ok(());
        }
    }

    out.flush()?;
    controller.flush();
    Ok(())
}

/// Waits for pending saves of a controller shared with async tasks.
fn flush_shared(controller: &Mutex<tb_core::AccountController>) {
    match controller.lock() {
        Ok(controller) => controller.flush(),
        Err(poisoned) => poisoned.into_inner().flush(),
    }
}
