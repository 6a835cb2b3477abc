use std::io::Write;

use zecbridge::bridge::estimate::{ESTIMATED_TIME, NETWORK_FEE_USD};
use zecbridge::wallet::widget::short_address;
use zecbridge::{Asset, ChainKind, Stage, TokenPrices, WalletState};

use crate::error::CliError;

/// Write one price snapshot.
///
/// TSV: one `SYMBOL \t price` line per asset. JSON: a single object line.
pub fn write_prices<W: Write>(
    prices: &TokenPrices,
    json_mode: bool,
    writer: &mut W,
) -> Result<(), CliError> {
    if json_mode {
        serde_json::to_writer(&mut *writer, prices)?;
        writer.write_all(b"\n")?;
    } else {
        for asset in Asset::ALL {
            writeln!(writer, "{}\t{:.2}", asset.symbol(), prices.get(asset))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Receive estimate block printed by `zb estimate`.
pub fn write_estimate<W: Write>(
    writer: &mut W,
    receive: &str,
    receive_symbol: &str,
    usd_value: f64,
) -> Result<(), CliError> {
    writeln!(writer, "receive\t{receive} {receive_symbol}")?;
    writeln!(writer, "value\t${usd_value:.2}")?;
    writeln!(writer, "fee\t${NETWORK_FEE_USD:.2}")?;
    writeln!(writer, "time\t{ESTIMATED_TIME}")?;
    writer.flush()?;
    Ok(())
}

/// Session summary printed by `zb status` and `zb connect`.
pub fn write_status<W: Write>(state: &WalletState, writer: &mut W) -> Result<(), CliError> {
    match state.wallet_type.filter(|_| state.is_connected) {
        None => writeln!(writer, "disconnected")?,
        Some(chain) => {
            writeln!(
                writer,
                "{}\t{}\t{}",
                chain.display_name(),
                short_address(&state.address),
                state.address
            )?;
            let balance = match chain {
                ChainKind::Solana => state.sol_balance.map(|b| (b, "SOL")),
                ChainKind::Ethereum => state.eth_balance.map(|b| (b, "ETH")),
                ChainKind::Bitcoin => state.btc_balance.map(|b| (b, "BTC")),
            };
            if let Some((amount, symbol)) = balance {
                writeln!(writer, "balance\t{amount:.4} {symbol}")?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Progress line for a bridge stage.
pub fn stage_line(stage: Stage) -> &'static str {
    match stage {
        Stage::Idle => "idle",
        Stage::Signing => "signing transaction",
        Stage::Confirming => "confirming on chain",
        Stage::Complete => "assets bridged",
    }
}
