//! `Recipe`: secuencia ordenada e inmutable de acciones que se ejecuta como
//! unidad atómica.
//!
//! `Recipe::new` es un constructor de valor sin validación (no toca ningún
//! recurso externo). `RecipeBuilder::then` rechaza referencias hacia adelante
//! en el momento de agregar cada acción, y `validate` (invocado también por
//! `encode`/`decode`) re-chequea referencias y el bracket de flash loan.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::kind::ActionKind;
use crate::errors::ComposerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    name: String,
    actions: Vec<Action>,
}

impl Recipe {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self { name: name.into(),
               actions }
    }

    pub fn builder(name: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder { name: name.into(),
                        actions: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Chequeos estructurales completos: referencias sólo hacia atrás y
    /// bracket de flash loan bien formado.
    pub fn validate(&self) -> Result<(), ComposerError> {
        for (index, action) in self.actions.iter().enumerate() {
            check_references(index, action)?;
        }
        check_flash_bracket(&self.actions)
    }

    /// Codifica la receta al mensaje wire (ver `encoding`).
    pub fn encode(&self) -> Result<Vec<u8>, ComposerError> {
        crate::encoding::encode(self)
    }

    /// Hash blake3 del mensaje codificado. Dos recetas iguales producen el
    /// mismo hash.
    pub fn recipe_hash(&self) -> Result<String, ComposerError> {
        Ok(crate::hashing::hash_bytes(&self.encode()?))
    }
}

/// Builder que valida cada acción contra su posición al agregarla.
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    name: String,
    actions: Vec<Action>,
}

impl RecipeBuilder {
    pub fn then(mut self, action: Action) -> Result<Self, ComposerError> {
        check_references(self.actions.len(), &action)?;
        self.actions.push(action);
        Ok(self)
    }

    pub fn build(self) -> Result<Recipe, ComposerError> {
        let recipe = Recipe::new(self.name, self.actions);
        check_flash_bracket(recipe.actions())?;
        Ok(recipe)
    }
}

/// Una referencia `(step, _)` en la acción `index` es válida sólo si
/// `step < index`.
pub(crate) fn check_references(index: usize, action: &Action) -> Result<(), ComposerError> {
    match action.references().find(|(step, _)| *step >= index) {
        Some((step, _)) => Err(ComposerError::InvalidReference { action: index, step }),
        None => Ok(()),
    }
}

/// Si hay un `flash-begin`, debe ser la primera acción y única, y debe
/// existir exactamente un `flash-end` como acción terminal.
pub fn check_flash_bracket(actions: &[Action]) -> Result<(), ComposerError> {
    let begins: Vec<usize> = positions(actions, ActionKind::FlashBegin);
    let ends: Vec<usize> = positions(actions, ActionKind::FlashEnd);
    match (begins.as_slice(), ends.as_slice()) {
        ([], []) => Ok(()),
        ([], _) => Err(ComposerError::MalformedFlashBracket("flash-end without flash-begin".into())),
        ([0], [end]) if *end == actions.len() - 1 => Ok(()),
        ([0], []) => Err(ComposerError::MalformedFlashBracket("flash-begin without terminal flash-end".into())),
        ([0], [_]) => Err(ComposerError::MalformedFlashBracket("flash-end must be the last action".into())),
        ([0], _) => Err(ComposerError::MalformedFlashBracket(format!("expected one flash-end, found {}", ends.len()))),
        ([_], _) => Err(ComposerError::MalformedFlashBracket("flash-begin must be the first action".into())),
        _ => Err(ComposerError::MalformedFlashBracket(format!("expected one flash-begin, found {}", begins.len()))),
    }
}

fn positions(actions: &[Action], kind: ActionKind) -> Vec<usize> {
    actions.iter()
           .enumerate()
           .filter(|(_, a)| a.kind() == kind)
           .map(|(i, _)| i)
           .collect()
}
