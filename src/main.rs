use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use simple_logger::SimpleLogger;
use std::io;
use std::time::Duration;

use mpc_console::api::ApiClient;
use mpc_console::config::{self, Command, Config};
use mpc_console::dashboard::{Dashboard, Notification, Severity};
use mpc_console::eth::EthClient;
use mpc_console::event_stream::EventStreamClient;
use mpc_console::log_view::LogView;
use mpc_console::units;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = config::Cli::parse();

    SimpleLogger::new().with_level(cli.log_level).init()?;

    info!("Starting mpc-console");

    // Load configuration
    let config = config::load_config(&cli)?;
    info!("Using coordinator at {}", config.api_url);

    let api = ApiClient::new(&config.api_url)?;

    match cli.command {
        Command::Configs => {
            let mut dashboard = open_dashboard(api, &config)?;
            report(dashboard.load_configs().await)?;
            for wallet in dashboard.configs() {
                println!(
                    "{}  session={}  participants={}",
                    wallet.address,
                    wallet.session_id,
                    wallet.participants.join(", ")
                );
            }
        }

        Command::Online => match api.get_online().await {
            Some(online) => {
                for (participant, is_online) in online {
                    println!("{}: {}", participant, if is_online { "online" } else { "offline" });
                }
            }
            None => bail!("Unable to load online participants"),
        },

        Command::Generate => {
            let mut dashboard = open_dashboard(api, &config)?;
            report(dashboard.generate_config().await)?;
            for wallet in dashboard.configs() {
                println!("Address: {}", wallet.address);
                println!("Session ID: {}", wallet.session_id);
                println!("Participants: {}", wallet.participants.join(", "));
            }
        }

        Command::Refresh { address } => {
            let mut dashboard = open_dashboard(api, &config)?;
            report(dashboard.load_configs().await)?;
            dashboard.choose(&address);
            if let Some(notification) = dashboard.refresh_config().await {
                report(notification)?;
            }
            if let Some(wallet) = dashboard.selected_config() {
                println!("Session ID: {}", wallet.session_id);
                println!("Participants: {}", wallet.participants.join(", "));
            }
        }

        Command::Balance { address } => {
            let mut dashboard = open_dashboard(api, &config)?;
            let balance = dashboard.select(&address).await?;
            println!("Balance: {} ETH", units::format_ether(balance));
        }

        Command::Send { from, to, eth } => {
            let mut dashboard = open_dashboard(api, &config)?;
            let balance = dashboard.select(&from).await?;
            info!("Balance of {}: {} ETH", from, units::format_ether(balance));

            let outcome = dashboard.send_eth(&to, &eth).await;
            report(outcome.notification)?;
            if let Some(link) = outcome.tx_link {
                println!("Check your transaction: {}", link);
            }
        }

        Command::Logs { poll_ms } => {
            let client = EventStreamClient::new()?;
            let view = LogView::mount(&client, &api.sse_url());
            let mut stdout = io::stdout();
            view.render_until(&mut stdout, Duration::from_millis(poll_ms), async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
            view.unmount();
            info!("Log view closed");
        }
    }

    Ok(())
}

fn open_dashboard(api: ApiClient, config: &Config) -> Result<Dashboard> {
    let eth = config
        .eth_rpc_url()
        .map(|url| EthClient::new(&url))
        .transpose()?;
    Ok(Dashboard::new(api, eth, &config.network))
}

fn report(notification: Notification) -> Result<()> {
    match notification.severity {
        Severity::Success => {
            println!("{}", notification.message);
            Ok(())
        }
        Severity::Warning | Severity::Error => bail!("{}", notification),
    }
}
