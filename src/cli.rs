//! Command-line flags.  Exit codes come from clap: 0 for `--help` and
//! `--version`, 2 when parsing fails.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Overrides;

/// Keeps a hosts-file in sync with the running Docker containers.
///
/// Without `--daemon` or `--clean` the hosts-file is refreshed once from the
/// currently running containers.
#[derive(Parser, Debug)]
#[command(name = "dockerdns")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Keep running and follow Docker container events.
    #[arg(short, long, conflicts_with = "clean")]
    pub daemon: bool,

    /// Remove all managed entries from the hosts-file and exit.
    #[arg(short, long)]
    pub clean: bool,

    /// Domain suffix for container hostnames (default: docker).
    #[arg(short = 's', long = "domain", value_name = "SUFFIX")]
    pub domain: Option<String>,

    /// Alternate hosts-file path (default: /etc/hosts).
    #[arg(short = 'f', long = "hosts-file", value_name = "FILE")]
    pub hosts_file: Option<PathBuf>,

    /// Send SIGHUP to this process after every change.
    #[arg(short = 'u', long = "notify", value_name = "PROCESS")]
    pub notify: Option<String>,

    /// Docker network to take container addresses from.
    #[arg(long, value_name = "NETWORK")]
    pub network: Option<String>,

    /// Path to a dockerdns.toml configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Refresh once and exit.
    Update,
    Daemon,
    Clean,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.clean {
            Mode::Clean
        } else if self.daemon {
            Mode::Daemon
        } else {
            Mode::Update
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            hosts_file: self.hosts_file.clone(),
            domain: self.domain.clone(),
            notify_process: self.notify.clone(),
            network_name: self.network.clone(),
            log_level: self.log_level.clone(),
        }
    }
}
