//! Modelo de recetas: kinds, slots, acciones, recetas y resultados.

pub mod action;
pub mod kind;
pub mod outcome;
pub mod output;
pub mod recipe;
pub mod slot;

pub use action::{Action, PatchBinding};
pub use kind::{ActionKind, ParamType};
pub use outcome::{ExecutionOutcome, RunState};
pub use output::OutputTable;
pub use recipe::{Recipe, RecipeBuilder};
pub use slot::Slot;
