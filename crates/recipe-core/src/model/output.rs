//! Tabla de outputs de una corrida: paso → bytes registrados.
//!
//! Vive sólo durante una ejecución del contexto. Cada output es una
//! concatenación de palabras de 32 bytes; el campo `f` es la palabra `f`.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::constants::WORD_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTable {
    entries: BTreeMap<usize, Vec<u8>>,
}

impl OutputTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, step: usize, output: Vec<u8>) {
        self.entries.insert(step, output);
    }

    pub fn get(&self, step: usize) -> Option<&[u8]> {
        self.entries.get(&step).map(Vec::as_slice)
    }

    /// Palabra `field` del output del paso `step`, si existe completa.
    pub fn field(&self, step: usize, field: usize) -> Option<&[u8]> {
        let output = self.get(step)?;
        let start = field.checked_mul(WORD_SIZE)?;
        output.get(start..start.checked_add(WORD_SIZE)?)
    }

    pub fn amount(&self, step: usize, field: usize) -> Option<U256> {
        self.field(step, field).map(U256::from_be_slice)
    }

    pub fn contains(&self, step: usize) -> bool {
        self.entries.contains_key(&step)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

/// Concatena palabras `uint256` en un output.
pub fn words(values: &[U256]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes::<WORD_SIZE>()).collect()
}
