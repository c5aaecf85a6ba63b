//! Contrato con el substrate que ejecuta las operaciones remotas.
//!
//! El substrate garantiza "falla => sin efecto parcial de esa llamada" y
//! expone checkpoints para que el contexto pueda deshacer la corrida entera.

use alloy_primitives::{Address, U256};

use crate::model::ActionKind;

/// Resultado de una invocación remota. Un fallo es un valor, no un abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `output` son palabras de 32 bytes concatenadas (o `None`).
    Success { output: Option<Vec<u8>> },
    Failure { info: String },
}

impl Invocation {
    pub fn success(output: Vec<u8>) -> Self {
        Invocation::Success { output: Some(output) }
    }

    pub fn empty() -> Self {
        Invocation::Success { output: None }
    }

    pub fn failure(info: impl Into<String>) -> Self {
        Invocation::Failure { info: info.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Invocation::Success { .. })
    }
}

/// Marca opaca devuelta por `checkpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checkpoint(pub u64);

pub trait OperationSubstrate {
    /// Despacha `kind` al `target` con los inputs ya resueltos.
    fn invoke(&mut self, target: Address, kind: ActionKind, inputs: &[Vec<u8>]) -> Invocation;

    /// Balance de la cuenta dueña de la corrida.
    fn balance_of(&self, asset: Address) -> U256;

    /// Abre un punto de restauración antes de `Running`.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Descarta todos los efectos posteriores al checkpoint.
    fn rollback(&mut self, checkpoint: Checkpoint);

    /// Confirma los efectos (commit).
    fn release(&mut self, checkpoint: Checkpoint);
}

impl<S> OperationSubstrate for &mut S where S: OperationSubstrate + ?Sized
{
    fn invoke(&mut self, target: Address, kind: ActionKind, inputs: &[Vec<u8>]) -> Invocation {
        (**self).invoke(target, kind, inputs)
    }

    fn balance_of(&self, asset: Address) -> U256 {
        (**self).balance_of(asset)
    }

    fn checkpoint(&mut self) -> Checkpoint {
        (**self).checkpoint()
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        (**self).rollback(checkpoint)
    }

    fn release(&mut self, checkpoint: Checkpoint) {
        (**self).release(checkpoint)
    }
}
