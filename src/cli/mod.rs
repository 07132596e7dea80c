pub mod dates;
pub mod output;
pub mod shutdown;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use dates::{parse_day, parse_month, DateStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    cloud::{mirror::ManualWalkMirror, rest::RestBackend, ConfiguredIdentity},
    config::AppConfig,
    detector::WalkingGoalDetector,
    health::{export::ExportHealthProvider, goal::GoalChecker},
    repository::WalkRepository,
    stats,
    storage::walk_storage::WalkStorageImpl,
    sync::{
        installation::{InstallationTracker, INSTALLATION_FILE_NAME},
        SyncCoordinator,
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, LOG_PREFIX},
    },
};

const DATE_HELP: &str =
    "Day to use. Examples are \"today\", \"yesterday\", \"15/03/2025\", \"3 days ago\"";

#[derive(Parser, Debug)]
#[command(name = "Layzbug", version, long_about = None)]
#[command(about = "Tracks the days you went for a walk", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging to stdout")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Pull manual walks from the cloud and detect walks from health data")]
    Sync,
    #[command(about = "Mark a day as walked")]
    Mark {
        #[arg(help = DATE_HELP)]
        date: String,
    },
    #[command(about = "Mark a day as not walked")]
    Unmark {
        #[arg(help = DATE_HELP)]
        date: String,
    },
    #[command(about = "Flip the walked status of a day")]
    Toggle {
        #[arg(help = DATE_HELP)]
        date: String,
    },
    #[command(about = "Show the last seven days")]
    Week,
    #[command(about = "Show a month calendar")]
    Month {
        #[arg(help = "Month as YYYY-MM. Defaults to the current month")]
        month: Option<String>,
    },
    #[command(about = "Show walks per month for a year")]
    History {
        #[arg(help = "Defaults to the current year")]
        year: Option<i32>,
    },
    #[command(about = "Run walk detection for a single day")]
    Detect {
        #[arg(help = DATE_HELP)]
        date: String,
        #[arg(long, help = "Store the result unless the day was set manually")]
        save: bool,
    },
    #[command(about = "Sync, then apply cloud changes as they happen until Ctrl-C")]
    Watch,
    #[command(about = "Forget the installation date. The next sync starts from the current year")]
    ResetInstall,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(LOG_PREFIX, &app_dir, logging_level, args.log)?;

    let config = AppConfig::load(&app_dir)?;
    let mut coordinator = open_coordinator(&app_dir, &config).await?;
    let now = Local::now();
    let today = now.date_naive();

    match args.commands {
        Commands::Sync => {
            let report = coordinator.start_initial_sync().await;
            output::print_report(&report);
        }
        Commands::Mark { date } => {
            let date = parse_day(&date, args.date_style, now)?;
            coordinator
                .repository_mut()
                .update_manual_walk(date, true)
                .await?;
            println!("{date} marked as walked");
        }
        Commands::Unmark { date } => {
            let date = parse_day(&date, args.date_style, now)?;
            coordinator
                .repository_mut()
                .update_manual_walk(date, false)
                .await?;
            println!("{date} marked as not walked");
        }
        Commands::Toggle { date } => {
            let date = parse_day(&date, args.date_style, now)?;
            let current = coordinator.repository().get_walk_status(date).await?;
            coordinator.toggle_day(date, current).await?;
            println!("{date} walked: {}", !current);
        }
        Commands::Week => {
            let repository = coordinator.repository_mut();
            output::print_stat(&stats::yearly_walks(repository, today.year()).await?);
            output::print_stat(&stats::month_walks(repository, today.year(), today.month()).await?);
            output::print_week(&stats::weekly_days(repository, today).await?);
        }
        Commands::Month { month } => {
            let (year, month) = match month {
                Some(month) => parse_month(&month)?,
                None => (today.year(), today.month()),
            };
            let repository = coordinator.repository_mut();
            output::print_stat(&stats::month_walks(repository, year, month).await?);
            output::print_calendar(&stats::calendar_days(repository, year, month).await?);
        }
        Commands::History { year } => {
            let year = year.unwrap_or(today.year());
            let repository = coordinator.repository_mut();
            let years = repository.get_available_years().await?;
            let months = stats::month_stats(repository, year, today).await?;
            output::print_history(&years, &months, stats::year_total(&months));
        }
        Commands::Detect { date, save } => {
            let date = parse_day(&date, args.date_style, now)?;
            let evaluation = coordinator.checker().evaluate(date).await?;
            output::print_evaluation(&evaluation);
            if save
                && !coordinator
                    .repository_mut()
                    .update_walk_from_detector(date, evaluation.goal_met)
                    .await?
            {
                println!("{date} was set manually, keeping it");
            }
        }
        Commands::Watch => {
            let report = coordinator.start_initial_sync().await;
            output::print_report(&report);

            let shutdown_token = CancellationToken::new();
            tokio::join!(shutdown::detect_shutdown(shutdown_token.clone()), async {
                coordinator.watch_cloud(shutdown_token.clone()).await;
                shutdown_token.cancel();
            });
        }
        Commands::ResetInstall => {
            coordinator.installation().reset_installation_date().await?;
            println!("Installation date reset");
        }
    }

    coordinator.repository_mut().flush_pending().await;
    info!("Done");
    Ok(())
}

/// Wires the stores, the cloud mirror and the health provider together.
async fn open_coordinator(
    app_dir: &Path,
    config: &AppConfig,
) -> Result<SyncCoordinator<WalkStorageImpl>> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let identity = Arc::new(ConfiguredIdentity::new(config.user_id.clone()));
    let mirror = match &config.cloud {
        Some(cloud) => ManualWalkMirror::new(
            Arc::new(RestBackend::new(cloud, config.sync.poll_interval())?),
            identity,
        ),
        None => ManualWalkMirror::disabled(identity),
    };

    let storage = WalkStorageImpl::new(app_dir.join("walks"))?;
    let repository = WalkRepository::open(storage, Arc::new(mirror), clock.clone()).await?;

    let provider = ExportHealthProvider::new(config.health_dir(app_dir));
    let checker = GoalChecker::new(
        Box::new(provider),
        WalkingGoalDetector::new(config.detector),
    );

    let installation =
        InstallationTracker::new(app_dir.join(INSTALLATION_FILE_NAME), clock.clone());

    Ok(SyncCoordinator::new(
        repository,
        checker,
        installation,
        clock,
        config.sync,
    ))
}
