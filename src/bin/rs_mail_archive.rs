use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use rs_mail_archive::auth::session::Session;
use rs_mail_archive::config::{config_dir, ensure_private_dir, load_config};
use rs_mail_archive::mail::gmail_client::GmailClient;
use rs_mail_archive::store::dir_archive::DirArchive;
use rs_mail_archive::sync::engine::{SyncEngine, SyncOptions};
use rs_mail_archive::sync::governor::RateGovernor;

#[derive(Parser)]
#[command(name = "rs_mail_archive", version)]
#[command(about = "Archive new Gmail messages to a local directory, one file per message", long_about = None)]
struct Cli {}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli {} = Cli::parse();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let conf_dir = config_dir()?;
    ensure_private_dir(&conf_dir).context("Unable to create config dir")?;

    let cfg = load_config(&conf_dir).context("Configuration error")?;

    let mail_dir = cfg.mail_dir(&conf_dir);
    ensure_private_dir(&mail_dir).context("Failed to make mail dir")?;

    let session = Session::establish(&cfg, &conf_dir)?;
    let gmail = GmailClient::new(cfg.api_base(), cfg.user_id(), session)?;

    let labels = gmail.list_labels().context("Unable to retrieve labels")?;
    if labels.is_empty() {
        println!("No labels found.");
    } else {
        println!("Labels:");
        for l in &labels {
            println!("- {}", l.name);
        }
    }

    println!("{}", mail_dir.display());

    let mut engine = SyncEngine::new(
        gmail,
        DirArchive::new(&mail_dir),
        RateGovernor::new(cfg.throttle()),
        SyncOptions {
            include_spam_trash: cfg.include_spam_trash(),
            stop_at_first_known: cfg.stop_at_first_known(),
        },
    );
    let report = engine.run().context("Failed to archive mail")?;

    println!(
        "Archived {} new messages across {} pages",
        report.fetched.len(),
        report.pages_listed
    );
    Ok(())
}
