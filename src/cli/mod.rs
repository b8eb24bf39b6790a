pub mod commands;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::analytics::TimeRange;

#[derive(Parser, Debug)]
#[command(name = "crampwave")]
#[command(about = "Session controller for a cramp-relief vibration wearable", long_about = None)]
pub struct Cli {
    /// Directory for the database and settings file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a live session against the device, then save it
    Session(SessionArgs),
    /// List stored sessions and their trend
    History {
        #[arg(long)]
        owner: String,
        #[arg(long, default_value = "week")]
        range: TimeRange,
    },
    /// Show or edit the owner's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Print the effective settings, optionally changing them first
    Settings {
        /// TCP address of the device bridge; empty string selects the simulator
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        device_id: Option<String>,
        #[arg(long)]
        reconnect_delay_ms: Option<u64>,
    },
}

#[derive(clap::Args, Debug)]
pub struct SessionArgs {
    /// Signed-in owner; saving requires one
    #[arg(long)]
    pub owner: Option<String>,

    /// How long to run the live loop before stopping
    #[arg(long, default_value_t = 30)]
    pub seconds: u64,

    /// Drive the device at a fixed level instead of auto mode
    #[arg(long)]
    pub manual: Option<u8>,

    /// Planned duration recorded with the session, in minutes
    #[arg(long, default_value_t = 15)]
    pub planned: u32,

    /// Perceived intensity, 1-10
    #[arg(long, default_value_t = 5)]
    pub intensity: u8,

    #[arg(long)]
    pub notes: Option<String>,

    /// Stop without saving
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    Show {
        #[arg(long)]
        owner: String,
    },
    Set {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        cycle_length: Option<u32>,
        #[arg(long)]
        pain_level: Option<u8>,
        #[arg(long)]
        medications: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        last_period: Option<NaiveDate>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_history_range() {
        let cli = Cli::try_parse_from(["crampwave", "history", "--owner", "o1", "--range", "month"])
            .unwrap();
        match cli.command {
            Commands::History { owner, range } => {
                assert_eq!(owner, "o1");
                assert_eq!(range, TimeRange::Month);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_profile_dates() {
        let cli = Cli::try_parse_from([
            "crampwave",
            "--ephemeral",
            "profile",
            "set",
            "--owner",
            "o1",
            "--name",
            "Asha",
            "--last-period",
            "2026-10-01",
        ])
        .unwrap();
        assert!(cli.ephemeral);
        match cli.command {
            Commands::Profile {
                action: ProfileAction::Set { last_period, .. },
            } => assert_eq!(last_period, NaiveDate::from_ymd_opt(2026, 10, 1)),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
