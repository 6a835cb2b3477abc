//! The scripted bridge run.
//!
//! A fixed table of timed stage transitions. Nothing here touches the
//! network or a wallet, and no step can fail.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::form::FormState;

/// Bridge progress counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Stage {
    #[default]
    Idle = 0,
    Signing = 1,
    Confirming = 2,
    Complete = 3,
}

impl Stage {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One timed transition, relative to submission.
#[derive(Debug, Clone, Copy)]
pub struct ScriptStep {
    pub at: Duration,
    pub stage: Stage,
    /// Clear amount and destination when this step fires.
    pub clear_form: bool,
}

pub static BRIDGE_SCRIPT: [ScriptStep; 4] = [
    ScriptStep {
        at: Duration::ZERO,
        stage: Stage::Signing,
        clear_form: false,
    },
    ScriptStep {
        at: Duration::from_millis(2000),
        stage: Stage::Confirming,
        clear_form: false,
    },
    ScriptStep {
        at: Duration::from_millis(5500),
        stage: Stage::Complete,
        clear_form: false,
    },
    ScriptStep {
        at: Duration::from_millis(8000),
        stage: Stage::Idle,
        clear_form: true,
    },
];

pub(crate) fn apply_step(state: &mut FormState, step: &ScriptStep) {
    state.stage = step.stage;
    if step.clear_form {
        state.amount.clear();
        state.destination.clear();
    }
}

/// Play `steps` against the form, each at `start + step.at`.
///
/// Only `cancel` (controller teardown) stops the run early.
pub(crate) async fn play(
    tx: watch::Sender<FormState>,
    steps: &'static [ScriptStep],
    start: Instant,
    cancel: CancellationToken,
) {
    for step in steps {
        tokio::select! {
            _ = time::sleep_until(start + step.at) => {}
            _ = cancel.cancelled() => {
                debug!("bridge script torn down");
                return;
            }
        }
        debug!(stage = step.stage.as_u8(), "bridge stage");
        tx.send_modify(|s| apply_step(s, step));
    }
    info!("bridge simulation finished");
}
