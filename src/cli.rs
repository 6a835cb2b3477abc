use std::path::PathBuf;

use clap::{Parser, Subcommand};
use zecbridge::{ChainKind, Token};

/// zb: terminal client for the ZEC bridge SDK.
#[derive(Parser, Debug)]
#[command(name = "zb", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Directory holding the persisted wallet session
    #[arg(long, default_value = ".zb", global = true)]
    pub state_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print USD prices for BTC, ETH, SOL, BNB and ZEC
    Prices(PricesArgs),

    /// Print the SOL balance of a Solana account
    Balance {
        /// Base58 public key
        pubkey: String,
    },

    /// Estimate how much the other side of the bridge receives
    Estimate(EstimateArgs),

    /// Open a watch-only wallet session for an address
    Connect {
        /// solana, ethereum or bitcoin
        chain: ChainKind,
        address: String,
    },

    /// Show the persisted wallet session
    Status,

    /// Forget the persisted wallet session
    Disconnect,

    /// Play the scripted bridge run against the current session
    Bridge(BridgeArgs),
}

#[derive(Parser, Debug)]
pub struct PricesArgs {
    /// Keep polling and print every new snapshot
    #[arg(long)]
    pub watch: bool,

    /// Output as JSON instead of TSV
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct EstimateArgs {
    /// ETH, SOL, BNB or BTC
    pub token: Token,

    pub amount: String,

    /// Quote ZEC -> token instead of token -> ZEC
    #[arg(long)]
    pub withdraw: bool,
}

#[derive(Parser, Debug)]
pub struct BridgeArgs {
    /// ETH, SOL, BNB or BTC
    pub token: Token,

    pub amount: String,

    /// Receiving address on the destination chain
    pub destination: String,

    /// Bridge ZEC -> token instead of token -> ZEC
    #[arg(long)]
    pub withdraw: bool,
}
