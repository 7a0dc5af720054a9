//! Command-line definitions

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gclean",
    version,
    about = "Mirror a Gmail mailbox locally and bulk-delete from it safely"
)]
pub struct Cli {
    /// SQLite store location (overrides GCLEAN_DB and settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `mail=debug,info`
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Google account to sign in with
    #[arg(long, global = true, value_name = "EMAIL")]
    pub account: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest a date window from Gmail into the local store
    Load(LoadCmd),
    /// Select stored messages by sender and subject, optionally deleting them
    Select(SelectCmd),
    /// Per-sender message counts
    Summary(SummaryCmd),
    /// Manage senders that are never selected or deleted
    Retain(RetainCmd),
    /// Search Gmail directly, optionally deleting the matches
    Live(LiveCmd),
}

#[derive(Args, Debug)]
pub struct LoadCmd {
    /// Calendar year to load
    #[arg(conflicts_with_all = ["after", "before"], required_unless_present_all = ["after", "before"])]
    pub year: Option<i32>,

    /// First day of the window (YYYY-MM-DD, inclusive)
    #[arg(long, requires = "before", value_parser = parse_date)]
    pub after: Option<NaiveDate>,

    /// Day after the window (YYYY-MM-DD, exclusive)
    #[arg(long, requires = "after", value_parser = parse_date)]
    pub before: Option<NaiveDate>,

    /// Continue an interrupted load from its checkpoint
    #[arg(long)]
    pub resume: bool,
}

#[derive(Args, Debug)]
pub struct SelectCmd {
    /// Sender substring (repeatable)
    #[arg(long = "from", value_name = "SENDER")]
    pub senders: Vec<String>,

    /// File with one sender per line (`#` comments allowed)
    #[arg(long, value_name = "FILE")]
    pub from_file: Option<PathBuf>,

    /// Subject substring (repeatable)
    #[arg(long = "subject", value_name = "SUBJECT")]
    pub subjects: Vec<String>,

    /// Also write the selected lines to a file
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Permanently delete the selection after confirmation
    #[arg(long)]
    pub delete: bool,
}

#[derive(Args, Debug)]
pub struct SummaryCmd {
    /// Count messages already deleted
    #[arg(long)]
    pub include_deleted: bool,
}

#[derive(Args, Debug)]
pub struct RetainCmd {
    #[command(subcommand)]
    pub command: RetainCommand,
}

#[derive(Subcommand, Debug)]
pub enum RetainCommand {
    /// List retained senders
    List,
    /// Retain senders (exact address match)
    Add {
        #[arg(required = true)]
        addrs: Vec<String>,
    },
    /// Stop retaining senders
    Remove {
        #[arg(required = true)]
        addrs: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct LiveCmd {
    /// Subject to match (repeatable)
    #[arg(long = "subject", value_name = "SUBJECT")]
    pub subjects: Vec<String>,

    /// Sender to match (repeatable)
    #[arg(long = "from", value_name = "SENDER")]
    pub senders: Vec<String>,

    /// Only messages newer than a duration (e.g. 7d, 3m, 1y)
    #[arg(long, value_name = "DURATION")]
    pub newer_than: Option<String>,

    /// Only messages older than a duration (e.g. 7d, 3m, 1y)
    #[arg(long, value_name = "DURATION")]
    pub older_than: Option<String>,

    /// Permanently delete the matches after confirmation
    #[arg(long)]
    pub delete: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .map_err(|_| format!("invalid date {s:?}, expected YYYY-MM-DD"))
}
