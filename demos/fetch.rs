/**
 * Logs in, skims the newest messages in a mailbox and prints what it found.
 *
 * Settings are taken from the command line or, failing that, from the environment
 * (a `.env` file in the working directory is loaded first):
 * - IMAP_SERVER
 * - IMAP_PORT (defaults to 993)
 * - IMAP_USER
 * - IMAP_PASSWORD
 *
 * Set RUST_LOG=imap_skim=trace to see the conversation.
 */
use std::error::Error;
use std::time::Duration;

use clap::Parser;
use imap_skim::{ClientBuilder, FetchConfig, SessionConfig, Status, IMAPS_PORT};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, env = "IMAP_SERVER")]
    server: String,

    #[arg(long, env = "IMAP_PORT", default_value_t = IMAPS_PORT)]
    port: u16,

    #[arg(long, env = "IMAP_USER")]
    username: String,

    #[arg(long, env = "IMAP_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, default_value = "INBOX")]
    mailbox: String,

    #[arg(long, default_value = "ALL")]
    criteria: String,

    /// How many of the newest matches to fetch
    #[arg(long, default_value_t = 5)]
    count: usize,

    /// Only print messages whose subject, sender or body contain this
    #[arg(long)]
    keyword: Option<String>,

    /// Seconds to wait for each command
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Only accept tagged completion lines
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    let args = Args::parse();

    let timeout = Duration::from_secs(args.timeout);
    let config = if args.strict {
        SessionConfig::strict()
    } else {
        SessionConfig::default()
    };

    let mut session = ClientBuilder::new(args.server.as_str(), args.port)
        .connect_timeout(timeout)
        .config(config.with_timeout(Some(timeout)))
        .native_tls()?;

    let login = session.login(&args.username, &args.password)?;
    if matches!(login.status(), Some(Status::No | Status::Bad)) {
        eprintln!("login rejected: {}", login.as_str().trim_end());
        session.logout()?;
        return Ok(());
    }

    let fetch = FetchConfig::default()
        .with_mailbox(args.mailbox)
        .with_criteria(args.criteria)
        .with_count(args.count);
    let report = session.fetch_recent(&fetch)?;

    println!(
        "{} messages found, {} parsed",
        report.found,
        report.parsed()
    );
    for record in &report.records {
        if let Some(keyword) = &args.keyword {
            if !record.matches(keyword) {
                continue;
            }
        }
        println!("----");
        println!("{}", record);
    }

    session.logout()?;
    Ok(())
}
