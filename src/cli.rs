//! Command-line interface parsing for the dare admin console
//!
//! With no subcommand the interactive browser starts. The other subcommands run
//! a single lookup and print JSON.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::MAX_REQUEST_SIZE;
use crate::data::{DareFilter, DareStatus, NotificationType, SubmissionStatus};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid dare status: '{0}'. Valid statuses: unverified, censored, open, accepted, completed, failed, withdrawn, expired")]
    InvalidStatus(String),

    #[error("Invalid submission status: '{0}'. Valid statuses: PENDING, APPROVED, REJECTED, WINNER, all")]
    InvalidSubmissionStatus(String),

    /// Submission filters only exist for accepted dares
    #[error("--submission-status requires --status accepted")]
    SubmissionStatusRequiresAccepted,

    #[error("Limit must be an integer between 1 and 1000, got {0}")]
    InvalidLimit(usize),

    #[error("At least one {0} is required")]
    MissingArguments(&'static str),

    #[error("Invalid notification type: '{0}'. Examples: DARE_APPROVED, SUBMISSION_WINNER, GENERAL_ALERT")]
    InvalidNotificationType(String),
}

/// Dare admin console - moderate dares from the terminal
#[derive(Parser, Debug)]
#[command(name = "dareadmin")]
#[command(about = "Admin console for browsing and moderating dares")]
#[command(version)]
pub struct Cli {
    /// Path to a JSON config file (default: <config dir>/dareadmin/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (RUST_LOG overrides)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Browse dares interactively (default)
    Browse,

    /// Look up wallet profiles through the batched cache
    Profiles {
        #[arg(value_name = "WALLET")]
        wallets: Vec<String>,
    },

    /// Fetch dare metadata from IPFS
    Metadata {
        #[arg(value_name = "CID")]
        cids: Vec<String>,
    },

    /// List dares page by page
    ///
    /// Examples:
    ///   dareadmin dares --status open
    ///   dareadmin dares --status accepted --submission-status pending --pages 3
    Dares {
        #[arg(long, value_name = "STATUS")]
        status: Option<String>,

        #[arg(long, value_name = "STATUS")]
        submission_status: Option<String>,

        /// Rows per page (1-1000)
        #[arg(long)]
        limit: Option<usize>,

        /// Number of pages to walk
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },

    /// Show aggregate dare statistics with payouts in SOL and USD
    Stats,

    /// Send a notification to a wallet
    ///
    /// Examples:
    ///   dareadmin notify <WALLET> dare-approved --dare-mint <MINT>
    ///   dareadmin notify <WALLET> general_alert --remarks "Check your dares"
    Notify {
        #[arg(value_name = "WALLET")]
        wallet: String,

        /// Notification type, e.g. DARE_APPROVED (any case)
        #[arg(value_name = "TYPE")]
        kind: String,

        #[arg(long, value_name = "MINT")]
        dare_mint: Option<String>,

        #[arg(long)]
        remarks: Option<String>,
    },

    /// Show the current SOL/USD price
    Price {
        /// Also convert this many lamports to SOL and USD
        #[arg(long)]
        lamports: Option<u64>,
    },
}

impl Cli {
    /// The subcommand to run; `browse` when none was given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Browse)
    }
}

/// Parses a `--status` argument
pub fn parse_status_arg(s: &str) -> Result<DareStatus, CliError> {
    s.parse().map_err(|_| CliError::InvalidStatus(s.to_string()))
}

/// Parses a `--submission-status` argument
pub fn parse_submission_status_arg(s: &str) -> Result<SubmissionStatus, CliError> {
    s.parse()
        .map_err(|_| CliError::InvalidSubmissionStatus(s.to_string()))
}

/// Builds the listing filter from `dares` arguments
pub fn dare_filter_from_args(
    status: Option<&str>,
    submission_status: Option<&str>,
) -> Result<DareFilter, CliError> {
    let status = status.map(parse_status_arg).transpose()?;
    let submission_status = submission_status
        .map(parse_submission_status_arg)
        .transpose()?;

    if submission_status.is_some() && status != Some(DareStatus::Accepted) {
        return Err(CliError::SubmissionStatusRequiresAccepted);
    }

    Ok(DareFilter {
        status,
        submission_status,
    })
}

/// Parses the `TYPE` argument of `notify`
pub fn parse_notification_type_arg(s: &str) -> Result<NotificationType, CliError> {
    s.parse()
        .map_err(|_| CliError::InvalidNotificationType(s.to_string()))
}

pub fn validate_limit(limit: usize) -> Result<usize, CliError> {
    if limit == 0 || limit > MAX_REQUEST_SIZE {
        Err(CliError::InvalidLimit(limit))
    } else {
        Ok(limit)
    }
}
