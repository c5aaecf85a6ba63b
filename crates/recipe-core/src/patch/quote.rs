//! Contrato del servicio de quotes (colaborador externo).
//!
//! Los quotes se piden antes de construir la receta; el contexto de ejecución
//! nunca llama a este servicio.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::PatchSpec;
use crate::errors::ComposerError;

/// Resultado de un quote: blob opaco más el amount sobre el que se armó.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub sell_asset: Address,
    pub buy_asset: Address,
    pub template: Vec<u8>,
    pub quoted_amount: U256,
}

impl Quote {
    pub fn patch_spec(&self) -> Result<PatchSpec, ComposerError> {
        PatchSpec::derive(&self.template, self.quoted_amount)
    }
}

pub trait QuoteService {
    fn get_quote(&self, sell_asset: Address, buy_asset: Address, amount: U256, route: &str)
                 -> Result<Quote, ComposerError>;
}
