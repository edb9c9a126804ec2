use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use planstore::cli::{Cli, Command};
use planstore::config::Config;
use planstore::{Entry, PlanStatus, PlanStore, StoredPlan};

fn setup_logging() -> Result<()> {
    // Store diagnostics arrive as `log` records through tracing's log feature
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    Ok(())
}

fn colored_status(status: PlanStatus) -> ColoredString {
    match status {
        PlanStatus::Pending => status.as_str().yellow(),
        PlanStatus::Completed => status.as_str().green(),
        PlanStatus::Rejected => status.as_str().red(),
    }
}

fn print_summary(stored: &StoredPlan) {
    println!(
        "{} {} {} {} ({} entries)",
        stored.task_id.cyan(),
        stored.plan.id.dimmed(),
        colored_status(stored.plan.status),
        stored.plan.kind,
        stored.plan.files.len()
    );
}

fn print_entries(entries: &[Entry]) {
    for (i, entry) in entries.iter().enumerate() {
        match entry {
            Entry::Rename(r) => println!("  {:>3}. {} -> {}", i + 1, r.from, r.to),
            Entry::Recognition(r) => {
                println!("  {:>3}. S{:02}E{:02} {}", i + 1, r.season, r.episode, r.path)
            }
        }
    }
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let plans_dir = cli.dir.unwrap_or(config.plans_dir);

    info!("planstore starting in {}", plans_dir.display());
    let mut store = PlanStore::open(&plans_dir);

    match cli.command {
        Command::List { status } => {
            let plans = match status {
                Some(status) => store.list_by_status(status)?,
                None => store.scan_all()?,
            };
            if plans.is_empty() {
                println!("No plans found");
            } else {
                for stored in &plans {
                    print_summary(stored);
                }
            }
        }
        Command::Show { task_id } => {
            let plan = store
                .read_plan(&task_id)?
                .ok_or_else(|| eyre::eyre!("No plan staged under task {}", task_id))?;
            println!("Plan: {}", plan.id.cyan());
            println!("  Kind: {}", plan.kind);
            println!("  Status: {}", colored_status(plan.status));
            println!("  Folder: {}", plan.media_folder_path);
            print_entries(&plan.files);
        }
        Command::Find { plan_id } => {
            let stored = store
                .find_by_plan_id(&plan_id)?
                .ok_or_else(|| eyre::eyre!("Plan not found: {}", plan_id))?;
            print_summary(&stored);
            println!("  File: {}", stored.path.display());
        }
    }

    Ok(())
}
