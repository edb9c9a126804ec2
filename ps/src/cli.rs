//! CLI argument parsing for planstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::PlanStatus;

#[derive(Parser, Debug)]
#[command(name = "ps")]
#[command(author, version, about = "Inspect staged media file plans", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Plans directory (overrides config)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List plans
    List {
        /// Only plans with this status (pending, completed, rejected)
        #[arg(short, long)]
        status: Option<PlanStatus>,
    },

    /// Print the plan staged under a task id
    Show {
        /// Task id (file stem)
        #[arg(required = true)]
        task_id: String,
    },

    /// Locate a plan by its plan id
    Find {
        /// Plan id
        #[arg(required = true)]
        plan_id: String,
    },
}
