//! Command-line surface of `kptv-sync`

use clap::{Parser, Subcommand};
use core_catalog::{ProviderFilter, ProviderId, UserId};
use core_sync::IgnoreFields;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kptv-sync",
    version,
    about = "IPTV provider sync",
    after_help = "Examples:\n  kptv-sync sync\n  kptv-sync sync --user-id 1\n  kptv-sync sync --provider-id 32\n  kptv-sync testmissing --check-all\n  kptv-sync fixup --ignore logo,channel\n  kptv-sync cleanup"
)]
pub struct Cli {
    #[command(subcommand)]
    pub action: Action,

    /// Filter by user ID
    #[arg(long, global = true)]
    pub user_id: Option<i64>,

    /// Filter by provider ID
    #[arg(long, global = true)]
    pub provider_id: Option<i64>,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Check all streams including inactive (testmissing only)
    #[arg(long, global = true, default_value_t = false)]
    pub check_all: bool,

    /// Fields to ignore during fixup (comma-separated: tvg_id, logo, tvg_group, name, channel)
    #[arg(long, global = true, value_parser = parse_ignore)]
    pub ignore: Option<IgnoreFields>,

    /// Configuration file (JSON)
    #[arg(long, global = true, env = "KPTV_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Sync streams from providers (updates only original names and active state)
    Sync,
    /// Check for streams providers no longer serve
    #[command(name = "testmissing")]
    TestMissing,
    /// Propagate metadata across matching streams
    Fixup,
    /// Remove orphaned and duplicate streams
    Cleanup,
}

fn parse_ignore(raw: &str) -> Result<IgnoreFields, String> {
    IgnoreFields::parse(raw).map_err(|e| e.to_string())
}

impl Cli {
    pub fn filter(&self) -> ProviderFilter {
        ProviderFilter {
            user_id: self.user_id.map(UserId),
            provider_id: self.provider_id.map(ProviderId),
        }
    }

    /// Options given to an action that does not use them.
    pub fn notes(&self) -> Vec<&'static str> {
        let mut notes = Vec::new();
        if self.ignore.is_some() && self.action != Action::Fixup {
            notes.push("--ignore only applies to fixup action");
        }
        if self.check_all && self.action != Action::TestMissing {
            notes.push("--check-all only applies to testmissing action");
        }
        if self.action == Action::Cleanup && (self.user_id.is_some() || self.provider_id.is_some()) {
            notes.push("cleanup always runs over the whole catalog");
        }
        notes
    }

    pub fn ignore_fields(&self) -> IgnoreFields {
        self.ignore.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::MetadataField;

    #[test]
    fn test_options_anywhere() {
        let cli = Cli::try_parse_from([
            "kptv-sync",
            "--user-id",
            "1",
            "fixup",
            "--ignore",
            "logo, channel",
        ])
        .unwrap();

        assert_eq!(cli.action, Action::Fixup);
        assert_eq!(cli.filter(), ProviderFilter::for_user(UserId(1)));
        let ignore = cli.ignore_fields();
        assert!(ignore.contains(MetadataField::Logo));
        assert!(ignore.contains(MetadataField::Channel));
        assert!(!ignore.contains(MetadataField::Name));
        assert!(cli.notes().is_empty());
    }

    #[test]
    fn test_testmissing_name() {
        let cli = Cli::try_parse_from(["kptv-sync", "testmissing", "--check-all"]).unwrap();
        assert_eq!(cli.action, Action::TestMissing);
        assert!(cli.check_all);
        assert!(cli.notes().is_empty());
    }

    #[test]
    fn test_invalid_ignore_field_is_rejected() {
        let err = Cli::try_parse_from(["kptv-sync", "fixup", "--ignore", "logo,colour"])
            .unwrap_err()
            .to_string();
        assert!(err.contains("colour"));
    }

    #[test]
    fn test_invalid_action_is_rejected() {
        assert!(Cli::try_parse_from(["kptv-sync", "resync"]).is_err());
        assert!(Cli::try_parse_from(["kptv-sync"]).is_err());
    }

    #[test]
    fn test_notes_for_unused_options() {
        let cli = Cli::try_parse_from([
            "kptv-sync",
            "sync",
            "--check-all",
            "--ignore",
            "logo",
            "--provider-id",
            "32",
        ])
        .unwrap();

        assert_eq!(cli.filter(), ProviderFilter::for_provider(ProviderId(32)));
        assert_eq!(
            cli.notes(),
            vec![
                "--ignore only applies to fixup action",
                "--check-all only applies to testmissing action",
            ]
        );
    }
}
