//! AUTORENT — rent hashing rigs on Betarigs, pay with Coinbase.
//!
//! Entry point. Parses flags, initialises structured logging, loads the
//! keyring, builds the platform clients and runs one batch.
//!
//! Example, renting 10 Mh/s of X11 for 3 hours at up to
//! 0.0004 BTC/Mh/day:
//!
//! ```text
//! autorent --algo x11 --mhs 10 --duration 3 --maxprice 0.0004 \
//!     --poolurl stratum2.suchpool.pw:3335 --wname Toorop.Miner1 --wpassword x
//! ```

use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use autorent::config::{AppConfig, Keyring};
use autorent::engine::controller::{self, RunContext, RunOutcome, RunReport, RunRequest};
use autorent::platforms::betarigs::BetarigsClient;
use autorent::platforms::coinbase::CoinbaseClient;
use autorent::platforms::{PaymentProvider, RigMarketplace};
use autorent::types::{Algorithm, PoolConfig, SearchCriteria};

/// Rent rigs on Betarigs and pay for them from Coinbase.
///
/// Needs a keyring.txt (next to the executable unless --keyring is given)
/// holding, one per line: your Coinbase API key, your Coinbase API secret,
/// your Betarigs API key.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mining algorithm (scrypt, keccak, scrypt-n, sha256, x11, blake256, x13, x15)
    #[arg(long)]
    algo: Algorithm,

    /// Max mining power to rent, in Mh/s
    #[arg(long)]
    mhs: Decimal,

    /// Rental duration in hours
    #[arg(long)]
    duration: u32,

    /// Maximum rig price in BTC/Mh/day
    #[arg(long)]
    maxprice: Decimal,

    /// Pool url as host:port, e.g. stratum1.suchpool.pw:3335
    #[arg(long)]
    poolurl: String,

    /// Pool worker name
    #[arg(long)]
    wname: String,

    /// Pool worker password
    #[arg(long)]
    wpassword: String,

    /// Simulate rentals and payments instead of making them
    #[arg(long)]
    dryrun: bool,

    /// Optional TOML tuning file
    #[arg(long)]
    config: Option<String>,

    /// Keyring location (defaults to keyring.txt next to the executable)
    #[arg(long, env = "AUTORENT_KEYRING")]
    keyring: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();
    init_logging(args.verbose);

    match run_app(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Run aborted");
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_app(args: Args) -> Result<()> {
    let cfg = AppConfig::load_or_default(args.config.as_deref())?;

    let request = RunRequest {
        criteria: SearchCriteria {
            algorithm: args.algo,
            speed_mhs: args.mhs,
            duration_hours: args.duration,
            max_price: args.maxprice,
        },
        pool: PoolConfig {
            url: args.poolurl,
            worker_name: args.wname,
            worker_password: args.wpassword,
        },
        dry_run: args.dryrun,
    };
    request.validate()?;

    let keyring_path = match args.keyring {
        Some(p) => p,
        None => Keyring::default_path()?,
    };
    let keyring = Keyring::load(&keyring_path)?;

    let marketplace: Arc<dyn RigMarketplace> =
        Arc::new(BetarigsClient::new(keyring.marketplace_key, &cfg.marketplace)?);
    let payments: Arc<dyn PaymentProvider> = Arc::new(CoinbaseClient::new(
        keyring.payment_key,
        keyring.payment_secret,
        &cfg.payments,
    )?);

    info!(
        algo = %request.criteria.algorithm,
        mhs = %request.criteria.speed_mhs,
        duration = request.criteria.duration_hours,
        maxprice = %request.criteria.max_price,
        marketplace = marketplace.name(),
        payments = payments.name(),
        dry_run = request.dry_run,
        "AUTORENT starting up"
    );

    let ctx = RunContext {
        marketplace,
        payments,
        settlement: cfg.settlement,
    };

    match controller::run(&ctx, &request).await? {
        RunOutcome::NothingFound => info!("Nothing to rent. Bye."),
        RunOutcome::Completed(report) => log_run_report(&report),
    }

    Ok(())
}

/// Log a human-readable run summary.
fn log_run_report(report: &RunReport) {
    for failure in &report.reservations.failures {
        warn!(rig_id = failure.rig_id, reason = %failure.reason, "Rig not rented");
    }
    for failed in &report.settlement.failed {
        warn!(
            rental_id = failed.rental.id,
            amount = %failed.rental.amount,
            to = %failed.rental.payment_address,
            reason = %failed.reason,
            "Rental left unpaid"
        );
    }
    for rental in &report.settlement.deferred {
        warn!(
            rental_id = rental.id,
            amount = %rental.amount,
            to = %rental.payment_address,
            "Rental not paid before the deadline, pay it manually"
        );
    }

    info!(
        rigs = report.selection.len(),
        rented = report.reservations.rentals.len(),
        simulated = report.reservations.simulated,
        rent_failures = report.reservations.failures.len(),
        paid = report.settlement.paid.len(),
        unpaid = report.settlement.failed.len(),
        deferred = report.settlement.deferred.len(),
        total_paid = %report.settlement.total_paid(),
        "All my jobs are done. Bye."
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "autorent=debug" } else { "autorent=info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let json_logging = std::env::var("AUTORENT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
