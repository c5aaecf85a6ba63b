//! recipe-core: composición atómica de operaciones multi-paso
//!
//! Una `Recipe` es una lista ordenada de `Action`s que se ejecuta completa o
//! no deja rastro. Cada acción puede consumir el output de pasos anteriores
//! mediante referencias posicionales (`$N`, `$N.F`).
//!
//! ## Notas de diseño
//! - Las referencias sólo apuntan hacia atrás; se validan al construir, al
//!   codificar y al decodificar, nunca durante la ejecución.
//! - El `ExecutionContext` toma un checkpoint del substrate antes del primer
//!   paso; cualquier fallo hace rollback y la `OutputTable` no se expone.
//! - Un flash loan abre en la primera acción y cierra en la última; el
//!   cierre exige `amount + fee` disponible antes de despachar el repago.
//! - La calldata de quotes se parchea con el amount real en ejecución
//!   (`PatchSpec`); el template original no se modifica.
//! - Configuración explícita (`ComposerConfig`), sin estado global salvo la
//!   carga única de `.env`.
pub mod bounds;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod patch;

pub use bounds::{AmountBounds, BoundsPolicy};
pub use config::{ComposerConfig, Registry};
pub use encoding::{decode, encode};
pub use engine::{Checkpoint, ExecutionContext, FlashBracket, Invocation, OperationSubstrate};
pub use errors::ComposerError;
pub use event::{EventStore, InMemoryEventStore, RunEvent, RunEventKind};
pub use model::{Action, ActionKind, ExecutionOutcome, OutputTable, PatchBinding, Recipe, RecipeBuilder, RunState, Slot};
pub use patch::{PatchSpec, Quote, QuoteService};

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn dai() -> Address {
        Address::repeat_byte(0xda)
    }

    fn coll() -> Address {
        Address::repeat_byte(0xc0)
    }

    // [flash-begin(DAI, 1000), swap(DAI->COLL, $1), supply(COLL, <ref>), borrow(DAI, 1000), flash-end]
    fn leverage(supply_amount: Slot) -> Result<Recipe, ComposerError> {
        let actions = vec![Action::flash_begin(dai(), Action::amount(1000))?,
                           Action::swap(dai(), coll(), Slot::parse_token("$1")?, vec![])?,
                           Action::supply(coll(), supply_amount)?,
                           Action::borrow(dai(), Action::amount(1000))?,
                           Action::flash_end()?];
        actions.into_iter()
               .try_fold(Recipe::builder("leverage"), |b, a| b.then(a))?
               .build()
    }

    #[test]
    fn supply_may_reference_the_swap_but_not_the_borrow() {
        let ok = leverage(Slot::parse_token("$2").unwrap()).unwrap();
        assert!(encode(&ok).is_ok());
        assert_eq!(ok.actions()[2].inputs()[1], Slot::step(1));

        let err = leverage(Slot::parse_token("$4").unwrap()).unwrap_err();
        assert_eq!(err, ComposerError::InvalidReference { action: 2, step: 3 });

        // Sin el builder, el encoder rechaza la misma receta.
        let unchecked = Recipe::new("leverage",
                                    vec![Action::flash_begin(dai(), Action::amount(1000)).unwrap(),
                                         Action::swap(dai(), coll(), Slot::step(0), vec![]).unwrap(),
                                         Action::supply(coll(), Slot::step(3)).unwrap(),
                                         Action::borrow(dai(), Action::amount(1000)).unwrap(),
                                         Action::flash_end().unwrap()]);
        assert_eq!(encode(&unchecked), Err(ComposerError::InvalidReference { action: 2, step: 3 }));
    }
}
