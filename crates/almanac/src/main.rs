//! Almanac: calendar backend with durable reminders.
//!
//! `serve` runs the HTTP API and the reminder scheduler in one process:
//! events are stored in SQLite, each bound to a one-shot job that fires a
//! mail notification at the event's start time. Pending jobs survive
//! restarts; past-due jobs fire on startup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use almanac_notify::{LogMailer, Mailer, NotificationDispatcher, SmtpMailer};
use almanac_scheduler::{JobExecutor, Scheduler, SystemClock};
use almanac_store::Database;
use almanac_web::{AppState, EventService, create_router};

#[derive(Parser)]
#[command(name = "almanac")]
#[command(about = "Calendar backend with durable reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server and the reminder scheduler
    Serve {
        /// SQLite database path
        #[arg(long, env = "ALMANAC_DB", default_value = "almanac.db")]
        db: String,

        /// HTTP listen address
        #[arg(long, env = "ALMANAC_LISTEN", default_value = "0.0.0.0:5001")]
        listen: String,

        /// Secret for signing access tokens
        #[arg(long, env = "ALMANAC_JWT_SECRET")]
        jwt_secret: String,

        /// SMTP relay host (reminders are logged instead of sent if unset)
        #[arg(long, env = "ALMANAC_SMTP_HOST")]
        smtp_host: Option<String>,

        /// SMTP username
        #[arg(long, env = "ALMANAC_SMTP_USERNAME")]
        smtp_username: Option<String>,

        /// SMTP password
        #[arg(long, env = "ALMANAC_SMTP_PASSWORD")]
        smtp_password: Option<String>,

        /// Sender address for reminder mail
        #[arg(long, env = "ALMANAC_MAIL_FROM")]
        mail_from: Option<String>,

        /// holidayapi.com API key (holiday routes 500 without it)
        #[arg(long, env = "ALMANAC_HOLIDAY_API_KEY")]
        holiday_api_key: Option<String>,

        /// Re-run the overlap check when an event is updated
        #[arg(long, env = "ALMANAC_CHECK_OVERLAP_ON_UPDATE")]
        check_overlap_on_update: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "almanac=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            db,
            listen,
            jwt_secret,
            smtp_host,
            smtp_username,
            smtp_password,
            mail_from,
            holiday_api_key,
            check_overlap_on_update,
        } => {
            serve(
                &db,
                &listen,
                jwt_secret,
                smtp_host,
                smtp_username,
                smtp_password,
                mail_from,
                holiday_api_key,
                check_overlap_on_update,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn serve(
    db_path: &str,
    listen: &str,
    jwt_secret: String,
    smtp_host: Option<String>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    mail_from: Option<String>,
    holiday_api_key: Option<String>,
    check_overlap_on_update: bool,
) -> Result<()> {
    let db = Arc::new(Database::open(db_path).map_err(|e| miette::miette!("{}", e))?);

    let scheduler = Scheduler::new(Arc::clone(&db), Arc::new(SystemClock));
    scheduler
        .load_jobs()
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    let mailer: Arc<dyn Mailer> = match (smtp_host, smtp_username, smtp_password, mail_from) {
        (Some(host), Some(username), Some(password), Some(from)) => Arc::new(
            SmtpMailer::new(&host, &username, &password, &from)
                .map_err(|e| miette::miette!("{}", e))?,
        ),
        _ => {
            warn!("SMTP not fully configured, reminders will only be logged");
            Arc::new(LogMailer)
        }
    };

    let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&db), mailer));
    let executor: JobExecutor = Arc::new(move |job| {
        let dispatcher = Arc::clone(&dispatcher);
        Box::pin(async move {
            dispatcher
                .dispatch(job.event_id)
                .await
                .map_err(|e| e.to_string())
        })
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_loop = scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler_loop.run(shutdown_rx, executor).await;
    });

    let service =
        EventService::new(Arc::clone(&db), scheduler).with_update_overlap_check(check_overlap_on_update);
    let state = Arc::new(AppState {
        db,
        service,
        jwt_secret,
        holiday_api_key,
        http: reqwest::Client::new(),
    });
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    info!(listen, db = db_path, "almanac started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    // Stop the scheduler loop before exiting
    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;

    Ok(())
}
