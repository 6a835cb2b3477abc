//! Subcommand bodies. Each builds what it needs from [`BridgeConfig`] and
//! returns on completion or cancellation.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use zecbridge::{
    Asset, BridgeConfig, BridgeForm, ChainKind, Direction, FileStore, PriceClient, PriceFeed,
    ProviderRegistry, SolanaRpc, Stage, Token, WalletSession, WatchOnlyProvider,
};

use crate::cli::{BridgeArgs, EstimateArgs, PricesArgs};
use crate::error::CliError;
use crate::output;

pub async fn run_prices(
    config: &BridgeConfig,
    args: &PricesArgs,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let client = PriceClient::new(&config.price_api_url);

    if !args.watch {
        let prices = client.fetch_prices().await?;
        return output::write_prices(&prices, args.json, &mut io::stdout().lock());
    }

    let feed = PriceFeed::new(client, config.price_interval);
    let mut rx = feed.subscribe();
    feed.start();
    info!(interval = ?config.price_interval, "watching prices");

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let prices = *rx.borrow_and_update();
                output::write_prices(&prices, args.json, &mut io::stdout().lock())?;
            }
            _ = cancel.cancelled() => break,
        }
    }
    feed.close();
    Ok(())
}

pub async fn run_balance(config: &BridgeConfig, pubkey: &str) -> Result<(), CliError> {
    zecbridge::wallet::provider::validate_address(ChainKind::Solana, pubkey)?;
    let rpc = SolanaRpc::new(&config.solana_rpc_url);
    let sol = rpc.get_balance(pubkey).await?;
    println!("{sol:.9} SOL");
    Ok(())
}

pub async fn run_estimate(config: &BridgeConfig, args: &EstimateArgs) -> Result<(), CliError> {
    let prices = PriceClient::new(&config.price_api_url).fetch_prices().await?;

    let form = form_for(config, args.token, &args.amount, args.withdraw);
    let receive = form.receive_estimate(&prices);
    let receive_symbol = if args.withdraw {
        args.token.symbol()
    } else {
        Asset::Zec.symbol()
    };
    output::write_estimate(
        &mut io::stdout().lock(),
        &receive,
        receive_symbol,
        form.usd_value(&prices),
    )
}

pub async fn run_connect(
    config: &BridgeConfig,
    state_dir: &Path,
    chain: ChainKind,
    address: &str,
) -> Result<(), CliError> {
    let provider = WatchOnlyProvider::new(chain, address)?;
    let registry = ProviderRegistry::new().with(Arc::new(provider));
    let session = open_session(config, state_dir, registry);

    let state = session.connect(chain).await?;
    if chain == ChainKind::Solana {
        session.refresh_balances().await;
    }
    info!(chain = %chain, address = %state.address, "session saved");
    output::write_status(&session.state(), &mut io::stdout().lock())
}

pub async fn run_status(config: &BridgeConfig, state_dir: &Path) -> Result<(), CliError> {
    let session = open_session(config, state_dir, ProviderRegistry::new());
    if session.state().is_chain(ChainKind::Solana) {
        session.refresh_balances().await;
    }
    output::write_status(&session.state(), &mut io::stdout().lock())
}

pub async fn run_disconnect(config: &BridgeConfig, state_dir: &Path) -> Result<(), CliError> {
    let session = open_session(config, state_dir, ProviderRegistry::new());
    session.disconnect().await;
    output::write_status(&session.state(), &mut io::stdout().lock())
}

pub async fn run_bridge(
    config: &BridgeConfig,
    state_dir: &Path,
    args: &BridgeArgs,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let session = open_session(config, state_dir, ProviderRegistry::new());
    let wallet = session.state();

    let form = form_for(config, args.token, &args.amount, args.withdraw);
    form.set_destination(args.destination.clone());

    let mut rx = form.subscribe();
    rx.borrow_and_update();
    let run = form.submit(&wallet)?;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let stage = rx.borrow_and_update().stage;
                println!("{}", output::stage_line(stage));
                if stage == Stage::Idle {
                    break;
                }
            }
            _ = cancel.cancelled() => {
                form.close();
                break;
            }
        }
    }
    run.await?;
    Ok(())
}

fn open_session(config: &BridgeConfig, state_dir: &Path, registry: ProviderRegistry) -> WalletSession {
    WalletSession::new(config, registry, Arc::new(FileStore::new(state_dir)))
}

fn form_for(config: &BridgeConfig, token: Token, amount: &str, withdraw: bool) -> BridgeForm {
    let form = BridgeForm::new(config.fee_factor);
    form.select_token(token);
    if withdraw {
        form.set_direction(Direction::Withdraw);
    }
    form.set_amount(amount);
    form
}
