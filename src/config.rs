use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::eth;

pub const DEFAULT_NETWORK: &str = "goerli";

#[derive(Parser, Debug)]
#[clap(name = "mpc-console", version, about)]
pub struct Cli {
    /// Path to configuration file
    #[clap(long, default_value = "./mpc-console.toml")]
    pub config: PathBuf,

    /// Override coordinator base URL
    #[clap(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Override Infura project identifier
    #[clap(long, env = "INFURA_PROJECT_ID")]
    pub infura_project_id: Option<String>,

    /// Override Ethereum network name
    #[clap(long)]
    pub network: Option<String>,

    /// Use this JSON-RPC endpoint instead of Infura
    #[clap(long)]
    pub rpc_url: Option<String>,

    /// Log verbosity
    #[clap(long, default_value = "info")]
    pub log_level: LevelFilter,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List wallet configurations
    Configs,
    /// Show which participants are online
    Online,
    /// Generate a new wallet (DKG)
    Generate,
    /// Refresh the key shares of a wallet (DKF)
    Refresh {
        #[clap(long)]
        address: String,
    },
    /// Show a wallet's balance
    Balance {
        #[clap(long)]
        address: String,
    },
    /// Send ETH from a wallet
    Send {
        #[clap(long)]
        from: String,
        #[clap(long)]
        to: String,
        /// Amount in ether, e.g. 0.05
        #[clap(long)]
        eth: String,
    },
    /// Follow the coordinator's live log
    Logs {
        /// Render interval in milliseconds
        #[clap(long, default_value_t = 250)]
        poll_ms: u64,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_url: Option<String>,
    infura_project_id: Option<String>,
    network: Option<String>,
    rpc_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub infura_project_id: Option<String>,
    pub network: String,
    pub rpc_url: Option<String>,
}

impl Config {
    /// Explicit RPC URL if set, otherwise the Infura endpoint for the network.
    pub fn eth_rpc_url(&self) -> Option<String> {
        self.rpc_url.clone().or_else(|| {
            self.infura_project_id
                .as_deref()
                .map(|id| eth::infura_url(&self.network, id))
        })
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let file = match fs::read_to_string(&cli.config) {
        Ok(content) => toml::from_str::<FileConfig>(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", cli.config))?,
        Err(e) if e.kind() == ErrorKind::NotFound => FileConfig::default(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file: {:?}", cli.config))
        }
    };

    // CLI and environment win over the file
    let api_url = cli
        .api_url
        .clone()
        .or(file.api_url)
        .filter(|url| !url.is_empty())
        .context("API_URL is not set (use --api-url, API_URL or the config file)")?;

    Ok(Config {
        api_url,
        infura_project_id: cli.infura_project_id.clone().or(file.infura_project_id),
        network: cli
            .network
            .clone()
            .or(file.network)
            .unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
        rpc_url: cli.rpc_url.clone().or(file.rpc_url),
    })
}
