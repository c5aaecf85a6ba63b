//! Slots de input: un literal de bytes o una referencia al output de un paso
//! previo.
//!
//! Las palabras de ancho fijo siguen la codificación ABI: `uint256`
//! big-endian de 32 bytes y direcciones rellenadas a la izquierda.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::WORD_SIZE;
use crate::errors::ComposerError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Literal(Vec<u8>),
    /// Campo `field` del output registrado por el paso `step`.
    Reference { step: usize, field: usize },
}

impl Slot {
    pub fn amount(amount: U256) -> Self {
        Slot::Literal(encode_amount(amount).to_vec())
    }

    pub fn address(address: Address) -> Self {
        Slot::Literal(encode_address(address).to_vec())
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Slot::Literal(bytes.into())
    }

    /// Primer campo del output del paso `step` (0-based).
    pub fn step(step: usize) -> Self {
        Slot::Reference { step, field: 0 }
    }

    pub fn field(step: usize, field: usize) -> Self {
        Slot::Reference { step, field }
    }

    /// Parsea la sintaxis posicional de los callers: `$N` es el output del
    /// N-ésimo paso (1-based, campo 0) y `$N.F` selecciona el campo `F`.
    pub fn parse_token(token: &str) -> Result<Self, ComposerError> {
        let invalid = || ComposerError::InvalidReferenceToken(token.to_string());
        let body = token.trim().strip_prefix('$').ok_or_else(invalid)?;
        let (step_raw, field_raw) = match body.split_once('.') {
            Some((s, f)) => (s, Some(f)),
            None => (body, None),
        };
        let position: usize = step_raw.parse().map_err(|_| invalid())?;
        if position == 0 {
            return Err(invalid());
        }
        let field = match field_raw {
            Some(f) => f.parse().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(Slot::Reference { step: position - 1, field })
    }

    pub fn reference(&self) -> Option<(usize, usize)> {
        match self {
            Slot::Reference { step, field } => Some((*step, *field)),
            Slot::Literal(_) => None,
        }
    }

    pub fn literal(&self) -> Option<&[u8]> {
        match self {
            Slot::Literal(b) => Some(b),
            Slot::Reference { .. } => None,
        }
    }
}

impl From<U256> for Slot {
    fn from(amount: U256) -> Self {
        Slot::amount(amount)
    }
}

impl From<Address> for Slot {
    fn from(address: Address) -> Self {
        Slot::address(address)
    }
}

pub fn encode_amount(amount: U256) -> [u8; WORD_SIZE] {
    amount.to_be_bytes::<WORD_SIZE>()
}

pub fn encode_address(address: Address) -> [u8; WORD_SIZE] {
    address.into_word().0
}

pub fn decode_amount(word: &[u8]) -> Option<U256> {
    (word.len() == WORD_SIZE).then(|| U256::from_be_slice(word))
}

/// Decodifica una palabra como dirección; los 12 bytes altos deben ser cero.
pub fn decode_address(word: &[u8]) -> Option<Address> {
    if word.len() != WORD_SIZE || word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_word(B256::from_slice(word)))
}
