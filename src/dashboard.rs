use crate::api::ApiClient;
use crate::error::{ConsoleError, Result};
use crate::eth::{self, EthClient};
use crate::types::{ApiResponse, WalletConfig};
use crate::units;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Transient message shown to the user once an action completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub notification: Notification,
    pub tx_link: Option<String>,
}

/// In-memory dashboard session: known configurations, the selected wallet
/// and its last fetched balance.
pub struct Dashboard {
    api: ApiClient,
    eth: Option<EthClient>,
    network: String,
    configs: BTreeMap<String, WalletConfig>,
    selected: Option<String>,
    balance: u128,
}

impl Dashboard {
    pub fn new(api: ApiClient, eth: Option<EthClient>, network: &str) -> Self {
        Self {
            api,
            eth,
            network: network.to_string(),
            configs: BTreeMap::new(),
            selected: None,
            balance: 0,
        }
    }

    pub fn configs(&self) -> impl Iterator<Item = &WalletConfig> {
        self.configs.values()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_config(&self) -> Option<&WalletConfig> {
        self.selected.as_ref().and_then(|a| self.configs.get(a))
    }

    /// Last fetched balance of the selected wallet, in wei.
    pub fn balance(&self) -> u128 {
        self.balance
    }

    pub async fn load_configs(&mut self) -> Notification {
        let response = self.api.get_configs().await;
        match decode::<Vec<WalletConfig>>(&response) {
            Ok(configs) => {
                self.configs = configs
                    .into_iter()
                    .map(|c| (c.address.clone(), c))
                    .collect();
                info!("Loaded {} wallet configurations", self.configs.len());
                Notification::success(format!(
                    "Loaded {} wallet configurations",
                    self.configs.len()
                ))
            }
            Err(reason) => Notification::error(format!("Error loading configs: {}", reason)),
        }
    }

    pub async fn generate_config(&mut self) -> Notification {
        let response = self.api.start_dkg().await;
        match decode::<WalletConfig>(&response) {
            Ok(config) => {
                info!("Generated configuration for {}", config.address);
                self.upsert(config);
                Notification::success("New keys configuration generated successfully")
            }
            Err(reason) => Notification::error(format!("Error generating config: {}", reason)),
        }
    }

    /// Refreshes the key shares of the selected wallet. No-op without a selection.
    pub async fn refresh_config(&mut self) -> Option<Notification> {
        let address = self.selected.clone()?;
        let response = self.api.start_dkf(&address).await;
        let notification = match decode::<WalletConfig>(&response) {
            Ok(config) => {
                info!("Refreshed configuration for {}", config.address);
                self.upsert(config);
                Notification::success("Keys configuration refreshed successfully")
            }
            Err(reason) => Notification::error(format!("Error refreshing config: {}", reason)),
        };
        Some(notification)
    }

    /// Selects a wallet without touching the network.
    pub fn choose(&mut self, address: &str) {
        if !self.configs.is_empty() && !self.configs.contains_key(address) {
            warn!("Selected address {} is not a known configuration", address);
        }
        self.selected = Some(address.to_string());
        self.balance = 0;
    }

    /// Selects a wallet and fetches its balance.
    pub async fn select(&mut self, address: &str) -> Result<u128> {
        self.choose(address);
        self.refresh_balance().await
    }

    pub async fn refresh_balance(&mut self) -> Result<u128> {
        let address = self
            .selected
            .as_deref()
            .ok_or_else(|| ConsoleError::ConfigError("no wallet selected".to_string()))?;
        let eth = self.eth.as_ref().ok_or_else(|| {
            ConsoleError::ConfigError("no Ethereum provider configured".to_string())
        })?;
        self.balance = eth.get_balance(address).await?;
        Ok(self.balance)
    }

    /// Validates and submits a transfer from the selected wallet.
    ///
    /// Validation failures are reported as warnings and never reach the
    /// backend.
    pub async fn send_eth(&mut self, to: &str, eth_amount: &str) -> SendOutcome {
        let Some(from) = self.selected.clone() else {
            return SendOutcome {
                notification: Notification::warning("Select a wallet first"),
                tx_link: None,
            };
        };

        let amount = match validate_send(eth_amount, to, self.balance) {
            Ok(amount) => amount,
            Err(notification) => {
                warn!("Transfer rejected: {}", notification.message);
                return SendOutcome {
                    notification,
                    tx_link: None,
                };
            }
        };

        let response = self.api.send_eth(&from, to, amount).await;
        if response.error {
            return SendOutcome {
                notification: Notification::error(format!(
                    "Error sending ETH: {}",
                    response.data_text()
                )),
                tx_link: None,
            };
        }

        let tx_id = response.data_text();
        info!("Transfer submitted: {}", tx_id);
        SendOutcome {
            notification: Notification::success("ETH amount was successfully sent"),
            tx_link: Some(eth::tx_link(&self.network, &tx_id)),
        }
    }

    fn upsert(&mut self, config: WalletConfig) {
        self.configs.insert(config.address.clone(), config);
    }
}

/// Checks a transfer request against the known balance; returns the amount in wei.
pub fn validate_send(
    eth_amount: &str,
    to: &str,
    balance: u128,
) -> std::result::Result<u128, Notification> {
    let amount = match units::parse_ether(eth_amount) {
        Ok(amount) if amount > 0 => amount,
        Ok(_) => return Err(Notification::warning("ETH value should be greater than 0")),
        Err(_) if eth_amount.is_empty() => {
            return Err(Notification::warning("ETH value should be greater than 0"))
        }
        Err(e) => return Err(Notification::warning(e.to_string())),
    };
    if !units::is_address(to) {
        return Err(Notification::warning("Address should be valid ETH address"));
    }
    if amount > balance {
        return Err(Notification::warning(
            "Balance should be greater than amount to send",
        ));
    }
    Ok(amount)
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> std::result::Result<T, String> {
    if response.error {
        return Err(response.data_text());
    }
    serde_json::from_value(response.data.clone()).map_err(|e| e.to_string())
}
