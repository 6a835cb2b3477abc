use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Chain family a wallet session is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Solana,
    Ethereum,
    Bitcoin,
}

impl ChainKind {
    pub const ALL: [ChainKind; 3] = [ChainKind::Ethereum, ChainKind::Solana, ChainKind::Bitcoin];

    /// Human-readable chain name.
    pub fn display_name(self) -> &'static str {
        match self {
            ChainKind::Solana => "Solana",
            ChainKind::Ethereum => "Ethereum",
            ChainKind::Bitcoin => "Bitcoin",
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainKind::Solana => "solana",
            ChainKind::Ethereum => "ethereum",
            ChainKind::Bitcoin => "bitcoin",
        };
        f.write_str(s)
    }
}

impl FromStr for ChainKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solana" | "sol" => Ok(ChainKind::Solana),
            "ethereum" | "eth" => Ok(ChainKind::Ethereum),
            "bitcoin" | "btc" => Ok(ChainKind::Bitcoin),
            other => Err(BridgeError::Validation(format!("unknown chain: {other}"))),
        }
    }
}

/// Every asset the price feed tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Sol,
    Bnb,
    Zec,
}

impl Asset {
    pub const ALL: [Asset; 5] = [Asset::Btc, Asset::Eth, Asset::Sol, Asset::Bnb, Asset::Zec];

    /// CoinGecko coin id.
    pub fn coingecko_id(self) -> &'static str {
        match self {
            Asset::Btc => "bitcoin",
            Asset::Eth => "ethereum",
            Asset::Sol => "solana",
            Asset::Bnb => "binancecoin",
            Asset::Zec => "zcash",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Sol => "SOL",
            Asset::Bnb => "BNB",
            Asset::Zec => "ZEC",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Public-chain token selectable on the bridge form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    #[default]
    Eth,
    Sol,
    Bnb,
    Btc,
}

impl Token {
    pub const ALL: [Token; 4] = [Token::Eth, Token::Sol, Token::Bnb, Token::Btc];

    pub fn asset(self) -> Asset {
        match self {
            Token::Eth => Asset::Eth,
            Token::Sol => Asset::Sol,
            Token::Bnb => Asset::Bnb,
            Token::Btc => Asset::Btc,
        }
    }

    pub fn symbol(self) -> &'static str {
        self.asset().symbol()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Token {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ETH" => Ok(Token::Eth),
            "SOL" => Ok(Token::Sol),
            "BNB" => Ok(Token::Bnb),
            "BTC" => Ok(Token::Btc),
            other => Err(BridgeError::Validation(format!(
                "unsupported token: {other} (expected ETH, SOL, BNB or BTC)"
            ))),
        }
    }
}

/// Bridge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Public chain token -> shielded ZEC.
    #[default]
    Deposit,
    /// Shielded ZEC -> public chain token.
    Withdraw,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Deposit => Direction::Withdraw,
            Direction::Withdraw => Direction::Deposit,
        }
    }
}
