use clap::{Parser, ValueEnum};
use marksync_engine::{SyncMode, SyncOptions};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "marksync")]
#[command(version, about = "Keep Diigo bookmarks and a directory of org files in sync")]
pub struct Cli {
    /// Directory to sync [default: $MARKSYNC_DIR or the current directory]
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Fetch every remote record and compare all fields
    #[arg(short = 'a', long, conflicts_with = "reset")]
    pub full: bool,

    /// Rewrite every local file from the remote store
    #[arg(long)]
    pub reset: bool,

    /// Apply local changes only; never modify the remote store
    #[arg(long)]
    pub safe: bool,

    /// Apply the plan without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Push tag-only differences upstream without asking
    #[arg(long = "tags-only")]
    pub tags_only: bool,

    /// How to settle records that differ on both sides
    #[arg(long = "on-conflict", value_enum, default_value_t = OnConflict::Ask)]
    pub on_conflict: OnConflict,

    /// Stop fetching after this many remote records
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnConflict {
    Ask,
    Local,
    Remote,
    Abort,
}

impl Cli {
    pub fn sync_options(&self) -> SyncOptions {
        let mode = if self.reset {
            SyncMode::Reset
        } else if self.full {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        };

        SyncOptions::new(mode)
            .with_safe(self.safe)
            .with_auto_confirm(self.yes)
            .with_tag_normalization(self.tags_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_incremental() {
        let cli = Cli::parse_from(["marksync"]);
        let options = cli.sync_options();
        assert_eq!(options.mode, SyncMode::Incremental);
        assert!(!options.safe);
        assert_eq!(cli.on_conflict, OnConflict::Ask);
    }

    #[test]
    fn flags_map_to_options() {
        let cli = Cli::parse_from([
            "marksync",
            "--full",
            "--safe",
            "--yes",
            "--tags-only",
            "--on-conflict",
            "remote",
            "--limit",
            "20",
        ]);
        let options = cli.sync_options();
        assert_eq!(options.mode, SyncMode::Full);
        assert!(options.safe && options.auto_confirm && options.tag_normalization_only);
        assert_eq!(cli.on_conflict, OnConflict::Remote);
        assert_eq!(cli.limit, Some(20));
    }

    #[test]
    fn full_and_reset_conflict() {
        assert!(Cli::try_parse_from(["marksync", "--full", "--reset"]).is_err());
        let cli = Cli::parse_from(["marksync", "--reset"]);
        assert_eq!(cli.sync_options().mode, SyncMode::Reset);
    }
}
