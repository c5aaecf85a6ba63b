//! Estado de la corrida y resultado entregado al caller.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::output::OutputTable;
use crate::errors::ComposerError;

/// Transiciones válidas: `Pending -> Running -> {Committed, Reverted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Committed,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub run_id: Uuid,
    pub committed: bool,
    /// Sólo presente si la corrida hizo commit.
    pub outputs: Option<OutputTable>,
    pub failure_reason: Option<ComposerError>,
    /// Fingerprint determinista de la corrida (sólo en commit).
    pub fingerprint: Option<String>,
}

impl ExecutionOutcome {
    pub(crate) fn committed(run_id: Uuid, outputs: OutputTable, fingerprint: String) -> Self {
        Self { run_id,
               committed: true,
               outputs: Some(outputs),
               failure_reason: None,
               fingerprint: Some(fingerprint) }
    }

    pub(crate) fn reverted(run_id: Uuid, reason: ComposerError) -> Self {
        Self { run_id,
               committed: false,
               outputs: None,
               failure_reason: Some(reason),
               fingerprint: None }
    }

    pub fn state(&self) -> RunState {
        if self.committed {
            RunState::Committed
        } else {
            RunState::Reverted
        }
    }

    pub fn output_amount(&self, step: usize, field: usize) -> Option<U256> {
        self.outputs.as_ref()?.amount(step, field)
    }
}
