//! Clap derive structures for the `nsodiff` CLI.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use nsodiff_config::Settings;
use nsodiff_core::{Mode, SyncAction};

/// nsodiff -- compare NSO CDB configuration with live device configuration
#[derive(Debug, Parser)]
#[command(
    name = "nsodiff",
    version,
    about = "Compare Cisco NSO CDB configuration with live device configuration",
    long_about = "Builds a throwaway device group on a staging NSO, syncs it, and for every\n\
        device the controller reports as synced captures the CDB configuration\n\
        (RESTCONF) and the running configuration (NETCONF), then writes an HTML\n\
        side-by-side diff per device.\n\n\
        Without --netconf or --nso a full reconciliation is run."
)]
pub struct Cli {
    /// Capture live running configuration only; never contact the controller
    #[arg(long, conflicts_with = "nso")]
    pub netconf: bool,

    /// Capture CDB configuration only; skip NETCONF and diffs
    #[arg(long)]
    pub nso: bool,

    /// Inventory file (staging-nso + staging-devices)
    #[arg(long, short = 'i', env = "NSODIFF_INVENTORY", default_value = "inventory.yaml")]
    pub inventory: PathBuf,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, env = "NSODIFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for captures and diff reports
    #[arg(long)]
    pub reports_dir: Option<PathBuf>,

    /// Timeout in seconds for controller requests and NETCONF steps
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Accept self-signed controller certificates
    #[arg(long, short = 'k')]
    pub insecure: bool,

    /// NSO action used to classify devices
    #[arg(long, value_enum)]
    pub sync_action: Option<SyncActionArg>,

    /// Column at which diff lines wrap (0 disables wrapping)
    #[arg(long)]
    pub wrap_column: Option<usize>,

    /// When to use color output
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors; suppress the summary
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SyncActionArg {
    /// Pull device configuration into the CDB
    SyncFrom,
    /// Compare only; leave the CDB untouched
    CheckSync,
}

impl From<SyncActionArg> for SyncAction {
    fn from(arg: SyncActionArg) -> Self {
        match arg {
            SyncActionArg::SyncFrom => Self::SyncFrom,
            SyncActionArg::CheckSync => Self::CheckSync,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.netconf {
            Mode::LiveOnly
        } else if self.nso {
            Mode::ControllerOnly
        } else {
            Mode::Reconcile
        }
    }

    /// Apply flag overrides on top of file and environment settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(ref dir) = self.reports_dir {
            settings.reports_dir.clone_from(dir);
        }
        if let Some(secs) = self.timeout {
            settings.controller.timeout = secs;
            settings.netconf.timeout = secs;
        }
        if self.insecure {
            settings.controller.insecure = true;
        }
        if let Some(action) = self.sync_action {
            settings.controller.sync_action = action.into();
        }
        if let Some(column) = self.wrap_column {
            settings.wrap_column = column;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_select_mode() {
        let parse = |args: &[&str]| Cli::try_parse_from(args).unwrap().mode();
        assert_eq!(parse(&["nsodiff"]), Mode::Reconcile);
        assert_eq!(parse(&["nsodiff", "--netconf"]), Mode::LiveOnly);
        assert_eq!(parse(&["nsodiff", "--nso"]), Mode::ControllerOnly);
    }

    #[test]
    fn netconf_and_nso_are_exclusive() {
        let err = Cli::try_parse_from(["nsodiff", "--netconf", "--nso"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from([
            "nsodiff",
            "--timeout",
            "5",
            "-k",
            "--sync-action",
            "check-sync",
            "--reports-dir",
            "/tmp/out",
        ])
        .unwrap();
        let mut settings = Settings::default();

        cli.apply(&mut settings);

        assert_eq!(settings.controller.timeout, 5);
        assert_eq!(settings.netconf.timeout, 5);
        assert!(settings.controller.insecure);
        assert_eq!(settings.controller.sync_action, SyncAction::CheckSync);
        assert_eq!(settings.reports_dir, PathBuf::from("/tmp/out"));
    }
}
