//! Reference Resolver: `Slot` + `OutputTable` -> bytes concretos.

use crate::errors::ComposerError;
use crate::model::{OutputTable, Slot};

/// Función pura. Un literal siempre resuelve; una referencia falla con
/// `UnresolvedReference` si el paso no registró output (no ejecutó todavía o
/// se construyó con `without_output`) o si el campo no existe.
pub fn resolve(slot: &Slot, outputs: &OutputTable) -> Result<Vec<u8>, ComposerError> {
    match slot {
        Slot::Literal(bytes) => Ok(bytes.clone()),
        Slot::Reference { step, field } => outputs.field(*step, *field)
                                                  .map(<[u8]>::to_vec)
                                                  .ok_or(ComposerError::UnresolvedReference { step: *step,
                                                                                              field: *field }),
    }
}

pub fn resolve_all(slots: &[Slot], outputs: &OutputTable) -> Result<Vec<Vec<u8>>, ComposerError> {
    slots.iter().map(|s| resolve(s, outputs)).collect()
}
