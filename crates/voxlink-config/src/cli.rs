//! Command-line argument parsing for the voxlink client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// voxlink command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "voxlink", about = "Voxel sandbox world-sync client")]
pub struct CliArgs {
    /// Server address.
    #[arg(long)]
    pub server: Option<String>,

    /// Server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Render distance in chunks.
    #[arg(long)]
    pub render_distance: Option<u32>,

    /// Login name.
    #[arg(long)]
    pub login: Option<String>,

    /// Password.
    #[arg(long)]
    pub password: Option<String>,

    /// Play without connecting to a server.
    #[arg(long)]
    pub offline: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.server {
            self.network.server_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(rd) = args.render_distance {
            self.world.render_distance = rd;
        }
        if let Some(ref login) = args.login {
            self.account.login = login.clone();
        }
        if let Some(ref password) = args.password {
            self.account.password = password.clone();
        }
        if args.offline {
            self.network.offline = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            server: Some("192.168.1.1".to_string()),
            render_distance: Some(4),
            login: Some("alex".to_string()),
            offline: true,
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.server_address, "192.168.1.1");
        assert_eq!(config.world.render_distance, 4);
        assert_eq!(config.account.login, "alex");
        assert!(config.network.offline);
        // Non-overridden fields retain defaults
        assert_eq!(config.network.server_port, 7777);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from(["voxlink", "--port", "9000", "--offline"]);
        assert_eq!(args.port, Some(9000));
        assert!(args.offline);
        assert!(args.server.is_none());
    }
}
