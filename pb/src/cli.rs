//! CLI argument parsing for planbridge

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use planstore::{PlanKind, PlanStatus};

#[derive(Parser, Debug)]
#[command(name = "pb")]
#[command(author, version, about = "Stage media file plans and route them through a connected UI for approval", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Daemon socket (overrides config)
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the daemon in the foreground
    Serve,

    /// Check that the daemon is alive
    Ping,

    /// Ask the daemon to stop
    Stop,

    /// Show connected clients and bridge counters
    Status,

    /// Attach as a console front-end and print what the daemon sends
    Attach {
        /// Client id to register under
        #[arg(long, default_value = "console")]
        client_id: String,

        /// Answer confirmation requests with yes
        #[arg(long)]
        confirm: bool,

        /// Folder to report as the current selection
        #[arg(long)]
        folder: Option<String>,
    },

    /// Build a plan task
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Inspect or decide plans
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },

    /// Send a request to a front-end and print its answer
    Retrieve {
        /// Event name
        event: String,

        /// JSON payload
        #[arg(short, long)]
        data: Option<String>,

        /// Target client (default: first connected)
        #[arg(long)]
        client_id: Option<String>,

        /// Timeout in milliseconds (default: configured request timeout)
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Push an event to front-ends
    Broadcast {
        /// Event name
        event: String,

        /// JSON payload
        #[arg(short, long)]
        data: Option<String>,

        /// Target client (default: all)
        #[arg(long)]
        client_id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Start staging a plan
    Begin {
        /// Media folder the plan operates in
        folder: String,

        /// rename-media-file or recognize-media-file
        #[arg(short, long, default_value = "rename-media-file")]
        kind: PlanKind,
    },

    /// Add a rename entry
    AddRename { task_id: String, from: String, to: String },

    /// Add a recognition entry
    AddRecognition {
        task_id: String,
        season: u32,
        episode: u32,
        path: String,
    },

    /// Finish staging and notify front-ends
    End { task_id: String },
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    /// Approve or reject a plan by plan id
    Status {
        plan_id: String,

        /// completed or rejected
        status: PlanStatus,
    },

    /// Show the plan staged under a task id
    Show { task_id: String },

    /// List plans awaiting a decision
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_begin() {
        let cli = Cli::try_parse_from(["pb", "task", "begin", "/media/Show", "--kind", "recognize-media-file"]).unwrap();
        match cli.command {
            Command::Task {
                command: TaskCommand::Begin { folder, kind },
            } => {
                assert_eq!(folder, "/media/Show");
                assert_eq!(kind, PlanKind::RecognizeMediaFile);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_plan_status() {
        let cli = Cli::try_parse_from(["pb", "-l", "debug", "plan", "status", "p-1", "rejected"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(
            cli.command,
            Command::Plan {
                command: PlanCommand::Status {
                    status: PlanStatus::Rejected,
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_bad_status_rejected() {
        assert!(Cli::try_parse_from(["pb", "plan", "status", "p-1", "maybe"]).is_err());
    }
}
