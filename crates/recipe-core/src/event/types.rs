//! Tipos de evento de una corrida y estructura `RunEvent`.
//!
//! Rol en el contexto de ejecución:
//! - Cada corrida emite eventos append-only a un `EventStore`.
//! - Los eventos sólo llevan hashes de outputs, nunca los bytes: los outputs
//!   intermedios no son visibles fuera de la corrida.
//! - `RunEventKind` es el contrato observable y estable del contexto.
use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ComposerError;
use crate::model::ActionKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEventKind {
    /// Primer evento de un `run_id`: fija el hash de la receta.
    RunInitialized { recipe_name: String, recipe_hash: String, action_count: usize },
    /// Se despachó un paso. No implica éxito.
    ActionStarted { index: usize, kind: ActionKind, target: Address },
    ActionFinished { index: usize, kind: ActionKind, output_hash: Option<String> },
    ActionFailed { index: usize, kind: ActionKind, error: ComposerError },
    FlashOpened { asset: Address, amount: U256, fee: U256 },
    FlashClosed { asset: Address, repaid: U256 },
    /// Cierre exitoso con el fingerprint agregado de la corrida.
    RunCommitted { fingerprint: String },
    /// Cierre fallido: ningún efecto de la corrida persiste.
    RunReverted { reason: ComposerError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64,
    pub run_id: Uuid,
    pub kind: RunEventKind,
    pub ts: DateTime<Utc>, // metadato (no entra en fingerprint)
}
