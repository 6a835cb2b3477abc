//! Bridge form controller.
//!
//! Holds the transient form fields and drives the scripted progress run.
//! Reads wallet state only to gate the call-to-action and to fill the
//! "max" shortcut.

use std::fmt;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::estimate::{self, ZERO_ESTIMATE};
use super::script::{self, Stage, BRIDGE_SCRIPT};
use crate::prices::TokenPrices;
use crate::types::{Asset, ChainKind, Direction, Token};
use crate::wallet::state::WalletState;

/// Transient form fields. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub token: Token,
    pub direction: Direction,
    pub amount: String,
    pub destination: String,
    pub stage: Stage,
}

impl FormState {
    pub fn is_bridging(&self) -> bool {
        self.stage != Stage::Idle
    }
}

/// Why a submit was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitBlocked {
    #[error("wallet not connected")]
    WalletNotConnected,
    #[error("amount is empty")]
    MissingAmount,
    #[error("destination address is empty")]
    MissingDestination,
    #[error("a bridge run is already in progress")]
    AlreadyBridging,
}

/// What the main action button says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallToAction {
    ConnectWallet,
    EnterAmount,
    EnterDestination,
    Signing,
    Confirming,
    Bridged,
    InitiateBridge,
}

impl CallToAction {
    pub fn label(self) -> &'static str {
        match self {
            CallToAction::ConnectWallet => "CONNECT WALLET",
            CallToAction::EnterAmount => "ENTER AMOUNT",
            CallToAction::EnterDestination => "ENTER DESTINATION",
            CallToAction::Signing => "SIGNING TRANSACTION...",
            CallToAction::Confirming => "CONFIRMING ON CHAIN...",
            CallToAction::Bridged => "ASSETS BRIDGED",
            CallToAction::InitiateBridge => "INITIATE BRIDGE",
        }
    }
}

impl fmt::Display for CallToAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct BridgeForm {
    state_tx: watch::Sender<FormState>,
    fee_factor: f64,
    cancel: CancellationToken,
}

impl BridgeForm {
    pub fn new(fee_factor: f64) -> Self {
        let (state_tx, _) = watch::channel(FormState::default());
        Self {
            state_tx,
            fee_factor,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> FormState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FormState> {
        self.state_tx.subscribe()
    }

    pub fn select_token(&self, token: Token) {
        self.state_tx.send_modify(|s| s.token = token);
    }

    /// Flip deposit/withdraw. The destination is cleared because address
    /// formats differ between the two sides.
    pub fn swap_direction(&self) {
        self.state_tx.send_modify(|s| {
            s.direction = s.direction.flipped();
            s.destination.clear();
        });
    }

    pub fn set_direction(&self, direction: Direction) {
        if self.state_tx.borrow().direction != direction {
            self.swap_direction();
        }
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        let amount = amount.into();
        self.state_tx.send_modify(|s| s.amount = amount);
    }

    pub fn set_destination(&self, destination: impl Into<String>) {
        let destination = destination.into();
        self.state_tx.send_modify(|s| s.destination = destination);
    }

    /// Spendable balance for the current selection.
    ///
    /// Only a SOL deposit from a connected Solana session has a balance;
    /// every other combination reports 0.
    pub fn wallet_balance(&self, wallet: &WalletState) -> f64 {
        let s = self.state_tx.borrow();
        if s.direction == Direction::Deposit
            && s.token == Token::Sol
            && wallet.is_chain(ChainKind::Solana)
        {
            wallet.sol_balance.unwrap_or(0.0)
        } else {
            0.0
        }
    }

    /// Put the whole balance into the amount field. Does nothing at zero.
    pub fn fill_max(&self, wallet: &WalletState) -> bool {
        let balance = self.wallet_balance(wallet);
        if balance > 0.0 {
            self.set_amount(format!("{balance:.6}"));
            true
        } else {
            false
        }
    }

    /// Text next to the "MAX" shortcut.
    pub fn max_label(&self, wallet: &WalletState) -> String {
        match self.wallet_balance(wallet) {
            b if b > 0.0 => format!("{b:.4}"),
            _ => ZERO_ESTIMATE.into(),
        }
    }

    pub fn receive_estimate(&self, prices: &TokenPrices) -> String {
        let s = self.state_tx.borrow();
        estimate::receive_estimate(
            &s.amount,
            prices.get(s.token.asset()),
            prices.get(Asset::Zec),
            s.direction,
            self.fee_factor,
        )
    }

    /// USD value of the amount on the sending side.
    pub fn usd_value(&self, prices: &TokenPrices) -> f64 {
        let s = self.state_tx.borrow();
        let price = match s.direction {
            Direction::Deposit => prices.get(s.token.asset()),
            Direction::Withdraw => prices.get(Asset::Zec),
        };
        estimate::usd_value(&s.amount, price)
    }

    pub fn destination_placeholder(&self) -> String {
        let s = self.state_tx.borrow();
        match s.direction {
            Direction::Deposit => "Z-Address (zs1...)".into(),
            Direction::Withdraw => format!("{} Address", s.token),
        }
    }

    pub fn call_to_action(&self, wallet: &WalletState) -> CallToAction {
        let s = self.state_tx.borrow();
        if !wallet.is_connected {
            return CallToAction::ConnectWallet;
        }
        if s.amount.is_empty() {
            return CallToAction::EnterAmount;
        }
        if s.destination.is_empty() {
            return CallToAction::EnterDestination;
        }
        match s.stage {
            Stage::Signing => CallToAction::Signing,
            Stage::Confirming => CallToAction::Confirming,
            Stage::Complete => CallToAction::Bridged,
            Stage::Idle => CallToAction::InitiateBridge,
        }
    }

    /// Start the scripted bridge run.
    ///
    /// The stage moves to signing before this returns; the remaining steps
    /// play out on a background task whose handle is returned. The run
    /// cannot be aborted except by tearing the controller down.
    pub fn submit(&self, wallet: &WalletState) -> Result<JoinHandle<()>, SubmitBlocked> {
        let mut blocked = None;
        self.state_tx.send_if_modified(|s| {
            blocked = if !wallet.is_connected {
                Some(SubmitBlocked::WalletNotConnected)
            } else if s.amount.is_empty() {
                Some(SubmitBlocked::MissingAmount)
            } else if s.destination.is_empty() {
                Some(SubmitBlocked::MissingDestination)
            } else if s.is_bridging() {
                Some(SubmitBlocked::AlreadyBridging)
            } else {
                None
            };
            if blocked.is_some() {
                return false;
            }
            script::apply_step(s, &BRIDGE_SCRIPT[0]);
            true
        });
        if let Some(reason) = blocked {
            return Err(reason);
        }

        {
            let s = self.state_tx.borrow();
            info!(
                token = %s.token,
                direction = ?s.direction,
                amount = %s.amount,
                "bridge simulation started"
            );
        }

        let start = Instant::now();
        Ok(tokio::spawn(script::play(
            self.state_tx.clone(),
            &BRIDGE_SCRIPT[1..],
            start,
            self.cancel.child_token(),
        )))
    }

    /// Tear down: stops any running script.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Default for BridgeForm {
    fn default() -> Self {
        Self::new(crate::config::BridgeConfig::default().fee_factor)
    }
}

impl Drop for BridgeForm {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
