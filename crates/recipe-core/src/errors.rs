//! Errores del composer.
//!
//! Un único enum cubre los errores de construcción/encode (nunca llegan al
//! contexto de ejecución) y los errores de ejecución (siempre terminan en un
//! `ExecutionOutcome` revertido). Es `Clone + Serialize` porque viaja dentro
//! de los eventos de la corrida y del outcome.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ActionKind;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum ComposerError {
    #[error("invalid reference: action {action} references step {step} (must precede it)")]
    InvalidReference { action: usize, step: usize },
    #[error("invalid reference token `{0}`")]
    InvalidReferenceToken(String),
    #[error("unresolved reference: step {step} field {field} has no recorded output")]
    UnresolvedReference { step: usize, field: usize },
    #[error("quoted amount {amount} not found in template ({template_len} bytes)")]
    AmountNotFoundInTemplate { amount: U256, template_len: usize },
    #[error("remote operation failed at step {index} ({kind}): {info}")]
    RemoteOperationFailed { index: usize, kind: ActionKind, info: String },
    #[error("flash loan unpaid for {asset}: required {required}, available {available}")]
    FlashLoanUnpaid { asset: Address, required: U256, available: U256 },
    #[error("bounds violation at asset {index}: realized {realized}, min {min}, max {max:?}")]
    BoundsViolation { index: usize, realized: U256, min: U256, max: Option<U256> },
    #[error("asset count mismatch: requested {requested}, realized {realized}")]
    AssetCountMismatch { requested: usize, realized: usize },
    #[error("schema mismatch for {kind}: {reason}")]
    SchemaMismatch { kind: ActionKind, reason: String },
    #[error("malformed flash-loan bracket: {0}")]
    MalformedFlashBracket(String),
    #[error("unknown action kind `{0}`")]
    UnknownActionKind(String),
    #[error("malformed recipe message: {0}")]
    MalformedWire(String),
    #[error("no target registered for action kind {0}")]
    UnregisteredAction(ActionKind),
    #[error("no quote for {sell_asset} -> {buy_asset}: {reason}")]
    QuoteUnavailable { sell_asset: Address, buy_asset: Address, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
}

impl ComposerError {
    /// `true` para los errores que se detectan antes de entrar en `Running`.
    pub fn is_construction_error(&self) -> bool {
        matches!(self,
                 Self::InvalidReference { .. }
                 | Self::InvalidReferenceToken(_)
                 | Self::SchemaMismatch { .. }
                 | Self::MalformedFlashBracket(_)
                 | Self::UnknownActionKind(_)
                 | Self::MalformedWire(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_reference_message_names_both_indices() {
        let err = ComposerError::InvalidReference { action: 2, step: 3 };
        assert_eq!(err.to_string(), "invalid reference: action 2 references step 3 (must precede it)");
        assert!(err.is_construction_error());
    }

    #[test]
    fn runtime_errors_are_not_construction_errors() {
        let err = ComposerError::UnresolvedReference { step: 0, field: 1 };
        assert!(!err.is_construction_error());
        let err = ComposerError::RemoteOperationFailed { index: 1,
                                                          kind: ActionKind::Swap,
                                                          info: "no route".into() };
        assert_eq!(err.to_string(), "remote operation failed at step 1 (swap): no route");
    }
}
