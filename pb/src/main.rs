use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, info};

use planbridge::bridge::ClientEvent;
use planbridge::cli::{Cli, Command, PlanCommand, TaskCommand};
use planbridge::config::Config;
use planbridge::daemon::run_daemon;
use planbridge::events::{ASK_FOR_CONFIRMATION, GET_SELECTED_MEDIA_METADATA};
use planbridge::ipc::{DaemonClient, PlanSummary};
use planstore::{Entry, PlanStatus};

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planbridge")
        .join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = parse_level(cli_log_level.or(config_log_level));

    // Appended: the daemon and one-shot commands share the file
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("planbridge.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn parse_data(data: Option<String>) -> Result<Value> {
    match data {
        Some(raw) => serde_json::from_str(&raw).context("--data is not valid JSON"),
        None => Ok(Value::Null),
    }
}

fn colored_status(status: PlanStatus) -> ColoredString {
    match status {
        PlanStatus::Pending => status.as_str().yellow(),
        PlanStatus::Completed => status.as_str().green(),
        PlanStatus::Rejected => status.as_str().red(),
    }
}

fn print_plan(summary: &PlanSummary) {
    let plan = &summary.plan;
    println!("Task: {}", summary.task_id.cyan());
    println!("  Plan: {}", plan.id);
    println!("  Kind: {}", plan.kind);
    println!("  Status: {}", colored_status(plan.status));
    println!("  Folder: {}", plan.media_folder_path);
    for (i, entry) in plan.files.iter().enumerate() {
        match entry {
            Entry::Rename(r) => println!("  {:>3}. {} -> {}", i + 1, r.from, r.to),
            Entry::Recognition(r) => println!("  {:>3}. S{:02}E{:02} {}", i + 1, r.season, r.episode, r.path),
        }
    }
}

/// Console front-end: print frames and answer requests from flags
async fn cmd_attach(client: &DaemonClient, client_id: &str, confirm: bool, folder: Option<String>) -> Result<()> {
    let mut attached = client.attach(client_id).await?;
    println!("{} Attached as {}", "✓".green(), client_id.cyan());

    while let Some(frame) = attached.next_frame().await? {
        match frame {
            ClientEvent::Event { event, data } => {
                println!("{} {} {}", "event".blue(), event.bold(), data);
            }
            ClientEvent::Request {
                event,
                data,
                correlation_id,
            } => {
                println!("{} {} {}", "request".yellow(), event.bold(), data);
                let answer = match event.as_str() {
                    ASK_FOR_CONFIRMATION => json!({ "confirmed": confirm }),
                    GET_SELECTED_MEDIA_METADATA => folder
                        .as_ref()
                        .map(|f| json!({ "mediaFolderPath": f }))
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                debug!(%correlation_id, %answer, "cmd_attach: answering");
                attached.respond(&correlation_id, answer).await?;
            }
        }
    }

    println!("Daemon closed the connection");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(socket) = cli.socket {
        config.ipc.socket_path = socket;
    }

    let client = DaemonClient::with_socket_path(config.ipc.socket_path.clone())
        .with_request_timeout(config.bridge.request_timeout())
        .with_max_message_size(config.ipc.max_message_size);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve => {
            println!("planbridge listening on {}", config.ipc.socket_path.display());
            run_daemon(&config).await?;
        }
        Command::Ping => {
            let version = client.ping().await?;
            println!("{} daemon is alive (v{})", "✓".green(), version);
        }
        Command::Stop => {
            client.shutdown().await?;
            println!("{} daemon stopping", "✓".green());
        }
        Command::Status => {
            let (clients, metrics) = client.status().await?;
            if clients.is_empty() {
                println!("No clients attached");
            } else {
                println!("Clients: {}", clients.join(", ").cyan());
            }
            println!("Pending requests: {}", metrics.pending_requests);
            println!("Requests sent: {}", metrics.requests_sent);
            println!("Responses matched: {}", metrics.responses_matched);
            println!("Late responses: {}", metrics.late_responses);
            println!("Timeouts: {}", metrics.request_timeouts);
            println!("Cancelled: {}", metrics.requests_cancelled);
            println!("Broadcasts sent: {}", metrics.broadcasts_sent);
        }
        Command::Attach {
            client_id,
            confirm,
            folder,
        } => cmd_attach(&client, &client_id, confirm, folder).await?,
        Command::Task { command } => match command {
            TaskCommand::Begin { folder, kind } => {
                let task_id = client.begin_task(&folder, kind).await?;
                println!("{}", task_id);
            }
            TaskCommand::AddRename { task_id, from, to } => {
                client.add_entry(&task_id, Entry::rename(from, to)).await?;
            }
            TaskCommand::AddRecognition {
                task_id,
                season,
                episode,
                path,
            } => {
                client
                    .add_entry(&task_id, Entry::recognition(season, episode, path))
                    .await?;
            }
            TaskCommand::End { task_id } => {
                let path = client.end_task(&task_id).await?;
                println!("{} Plan ready: {}", "✓".green(), path);
            }
        },
        Command::Plan { command } => match command {
            PlanCommand::Status { plan_id, status } => {
                let summary = client.update_plan_status(&plan_id, status).await?;
                println!(
                    "{} Plan {} is now {}",
                    "✓".green(),
                    summary.plan.id,
                    colored_status(summary.plan.status)
                );
            }
            PlanCommand::Show { task_id } => print_plan(&client.get_plan(&task_id).await?),
            PlanCommand::Pending => {
                let plans = client.list_pending().await?;
                if plans.is_empty() {
                    println!("No pending plans");
                }
                for summary in &plans {
                    println!(
                        "{} {} {} ({} entries)",
                        summary.task_id.cyan(),
                        summary.plan.id.dimmed(),
                        summary.plan.kind,
                        summary.plan.files.len()
                    );
                }
            }
        },
        Command::Retrieve {
            event,
            data,
            client_id,
            timeout_ms,
        } => {
            let answer = client
                .retrieve(
                    &event,
                    parse_data(data)?,
                    client_id.as_deref(),
                    timeout_ms.map(Duration::from_millis),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        Command::Broadcast { event, data, client_id } => {
            client
                .broadcast_message(&event, parse_data(data)?, client_id.as_deref())
                .await?;
        }
    }

    Ok(())
}
