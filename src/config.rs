//! Typed configuration surface for the chat relay (spec §6).
//!
//! Unlike the teacher's `toml`-backed, file-driven [`Config`], this
//! crate's CLI is positional-only and there is no persistence (spec
//! §6: "Environment: none. Persistence: none") — but the architectural
//! role is the same: built once in `main`, passed down, never a
//! process global.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

/// `server <host> <port> [<peer_host> <peer_port>]...` (spec §6).
#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// Address to bind the relay's UDP socket on.
    host: String,

    /// Port to bind the relay's UDP socket on.
    port: u16,

    /// Alternating `<peer_host> <peer_port>` pairs, one per neighbor
    /// known at startup (spec §3 "Peer ... created at startup from the
    /// neighbor argument list").
    peers: Vec<String>,

    /// Logging verbosity.
    #[arg(long, default_value = "info")]
    log_level: LogLevel,
}

/// One neighbor server known at startup (spec §3 Peer lifecycle).
#[derive(Debug, Clone)]
pub struct PeerArg {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub peers: Vec<PeerArg>,
    pub log_level: LogLevel,
}

impl Config {
    /// Parse argv into a [`Config`]. A malformed invocation (missing
    /// positional args, odd-length peer tail, unresolvable host) is a
    /// fatal startup error (spec §7.4). Uses `try_parse` rather than
    /// `Cli::parse`, which calls `std::process::exit` internally and
    /// would bypass spec §6's "Exit status: 0 on any failure" for a
    /// malformed invocation (the reference's own usage/argument checks
    /// in `main` all `return 0`, matching `duckchat_v2/server.c`).
    pub fn load() -> Result<Self> {
        let cli = Cli::try_parse().map_err(|err| anyhow::anyhow!("{err}"))?;
        Self::from_cli(cli)
    }

    fn from_cli(cli: Cli) -> Result<Self> {
        let bind = resolve(&cli.host, cli.port)
            .with_context(|| format!("failed to resolve bind address {}:{}", cli.host, cli.port))?;

        if cli.peers.len() % 2 != 0 {
            bail!("peer arguments must come in <host> <port> pairs, got an odd count");
        }

        let mut peers = Vec::with_capacity(cli.peers.len() / 2);
        for pair in cli.peers.chunks_exact(2) {
            let host = &pair[0];
            let port: u16 = pair[1]
                .parse()
                .with_context(|| format!("invalid peer port {:?}", pair[1]))?;
            let addr = resolve(host, port)
                .with_context(|| format!("failed to resolve peer address {host}:{port}"))?;
            peers.push(PeerArg { addr });
        }

        Ok(Self {
            bind,
            peers,
            log_level: cli.log_level,
        })
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .with_context(|| format!("no address found for {host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_peer_tail_is_rejected() {
        let cli = Cli {
            host: "127.0.0.1".into(),
            port: 5000,
            peers: vec!["127.0.0.1".into()],
            log_level: LogLevel::Info,
        };
        assert!(Config::from_cli(cli).is_err());
    }

    #[test]
    fn well_formed_peer_pairs_resolve() {
        let cli = Cli {
            host: "127.0.0.1".into(),
            port: 5000,
            peers: vec!["127.0.0.1".into(), "5001".into()],
            log_level: LogLevel::Info,
        };
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].addr.port(), 5001);
    }

    #[test]
    fn invalid_peer_port_is_rejected() {
        let cli = Cli {
            host: "127.0.0.1".into(),
            port: 5000,
            peers: vec!["127.0.0.1".into(), "not-a-port".into()],
            log_level: LogLevel::Info,
        };
        assert!(Config::from_cli(cli).is_err());
    }

    #[test]
    fn missing_positional_args_is_a_try_parse_error_not_a_process_exit() {
        let result = Cli::try_parse_from(["chatrelay-server"]);
        assert!(result.is_err());
    }
}
