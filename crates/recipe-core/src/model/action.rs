//! `Action`: un paso de la receta con su kind, sus slots y (opcionalmente) el
//! binding de patch de la calldata que vino de un quote.
//!
//! Toda `Action` construida respeta el esquema de su kind: aridad correcta,
//! literales de 32 bytes en parámetros de palabra y referencias sólo en esos
//! parámetros. Es inmutable una vez construida.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::kind::{ActionKind, ParamType};
use super::slot::Slot;
use crate::constants::WORD_SIZE;
use crate::errors::ComposerError;
use crate::patch::{PatchSpec, Quote};

/// Asocia un `PatchSpec` al literal `slot` de la acción. En ejecución el
/// contexto resuelve `amount` y reemplaza el literal por `spec.apply(amount)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchBinding {
    pub slot: usize,
    pub spec: PatchSpec,
    pub amount: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActionRepr")]
pub struct Action {
    kind: ActionKind,
    inputs: Vec<Slot>,
    produces_output: bool,
    patch: Option<PatchBinding>,
}

// Forma serde sin validar; toda deserialización pasa por `from_parts`.
#[derive(Deserialize)]
struct ActionRepr {
    kind: ActionKind,
    inputs: Vec<Slot>,
    produces_output: bool,
    patch: Option<PatchBinding>,
}

impl TryFrom<ActionRepr> for Action {
    type Error = ComposerError;

    fn try_from(repr: ActionRepr) -> Result<Self, Self::Error> {
        Self::from_parts(repr.kind, repr.inputs, repr.produces_output, repr.patch)
    }
}

impl Action {
    /// Construye una acción validando los inputs contra el esquema del kind.
    pub fn new(kind: ActionKind, inputs: Vec<Slot>) -> Result<Self, ComposerError> {
        check_schema(kind, &inputs)?;
        Ok(Self { kind,
                  inputs,
                  produces_output: kind.produces_output(),
                  patch: None })
    }

    pub(crate) fn from_parts(kind: ActionKind,
                             inputs: Vec<Slot>,
                             produces_output: bool,
                             patch: Option<PatchBinding>)
                             -> Result<Self, ComposerError> {
        let action = Self::new(kind, inputs)?;
        let action = if produces_output { action } else { action.without_output() };
        match patch {
            Some(binding) => action.with_patch(binding),
            None => Ok(action),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn inputs(&self) -> &[Slot] {
        &self.inputs
    }

    pub fn produces_output(&self) -> bool {
        self.produces_output
    }

    pub fn patch(&self) -> Option<&PatchBinding> {
        self.patch.as_ref()
    }

    /// Marca la acción para que no registre output en la tabla.
    pub fn without_output(mut self) -> Self {
        self.produces_output = false;
        self
    }

    /// Adjunta un binding de patch. El slot debe ser el literal `Bytes` cuyo
    /// contenido es exactamente el template del spec.
    pub fn with_patch(mut self, binding: PatchBinding) -> Result<Self, ComposerError> {
        let kind = self.kind;
        let schema = kind.schema();
        let mismatch = |reason: String| ComposerError::SchemaMismatch { kind, reason };
        if schema.get(binding.slot) != Some(&ParamType::Bytes) {
            return Err(mismatch(format!("patch slot {} is not a bytes parameter", binding.slot)));
        }
        if self.inputs[binding.slot].literal() != Some(binding.spec.template()) {
            return Err(mismatch(format!("patch slot {} does not hold the patch template", binding.slot)));
        }
        check_word_slot(kind, "patch amount", &binding.amount)?;
        self.patch = Some(binding);
        Ok(self)
    }

    /// Todas las referencias de la acción (inputs y amount del patch).
    pub fn references(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.inputs
            .iter()
            .chain(self.patch.as_ref().map(|p| &p.amount))
            .filter_map(Slot::reference)
    }

    pub fn flash_begin(asset: impl Into<Slot>, amount: impl Into<Slot>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::FlashBegin, vec![asset.into(), amount.into()])
    }

    pub fn flash_end() -> Result<Self, ComposerError> {
        Self::new(ActionKind::FlashEnd, vec![])
    }

    pub fn supply(asset: impl Into<Slot>, amount: impl Into<Slot>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::Supply, vec![asset.into(), amount.into()])
    }

    pub fn withdraw(asset: impl Into<Slot>, amount: impl Into<Slot>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::Withdraw, vec![asset.into(), amount.into()])
    }

    pub fn borrow(asset: impl Into<Slot>, amount: impl Into<Slot>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::Borrow, vec![asset.into(), amount.into()])
    }

    pub fn payback(asset: impl Into<Slot>, amount: impl Into<Slot>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::Payback, vec![asset.into(), amount.into()])
    }

    /// Swap con calldata fija (vacía si el substrate no la necesita).
    pub fn swap(sell: Address, buy: Address, amount: impl Into<Slot>, calldata: Vec<u8>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::Swap,
                  vec![Slot::address(sell), Slot::address(buy), amount.into(), Slot::Literal(calldata)])
    }

    /// Swap cuya calldata viene de un quote: deriva el `PatchSpec` y lo
    /// liga al mismo slot de amount, de modo que el blob lleve el amount real
    /// conocido recién en ejecución.
    pub fn swap_with_quote(amount: impl Into<Slot>, quote: &Quote) -> Result<Self, ComposerError> {
        let amount = amount.into();
        let spec = quote.patch_spec()?;
        let action = Self::swap(quote.sell_asset, quote.buy_asset, amount.clone(), quote.template.clone())?;
        action.with_patch(PatchBinding { slot: 3,
                                         spec,
                                         amount })
    }

    pub fn pull_token(asset: Address, from: Address, amount: impl Into<Slot>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::PullToken,
                  vec![Slot::address(asset), Slot::address(from), amount.into()])
    }

    pub fn send_token(asset: Address, to: Address, amount: impl Into<Slot>) -> Result<Self, ComposerError> {
        Self::new(ActionKind::SendToken, vec![Slot::address(asset), Slot::address(to), amount.into()])
    }

    /// Atajo para amounts `u128` en tests y demos.
    pub fn amount(value: u128) -> Slot {
        Slot::amount(U256::from(value))
    }
}

fn check_schema(kind: ActionKind, inputs: &[Slot]) -> Result<(), ComposerError> {
    let schema = kind.schema();
    if inputs.len() != schema.len() {
        return Err(ComposerError::SchemaMismatch { kind,
                                                   reason: format!("expected {} inputs, got {}",
                                                                   schema.len(),
                                                                   inputs.len()) });
    }
    for (i, (slot, ty)) in inputs.iter().zip(schema).enumerate() {
        if ty.is_word() {
            check_word_slot(kind, &format!("input {i}"), slot)?;
        } else if slot.reference().is_some() {
            return Err(ComposerError::SchemaMismatch { kind,
                                                       reason: format!("input {i} is bytes and cannot be a reference") });
        }
    }
    Ok(())
}

fn check_word_slot(kind: ActionKind, what: &str, slot: &Slot) -> Result<(), ComposerError> {
    match slot {
        Slot::Literal(b) if b.len() != WORD_SIZE => {
            Err(ComposerError::SchemaMismatch { kind,
                                                reason: format!("{what} must be a {WORD_SIZE}-byte word, got {} bytes",
                                                                b.len()) })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn arity_is_checked() {
        let err = Action::new(ActionKind::Supply, vec![Slot::address(asset(1))]).unwrap_err();
        assert!(matches!(err, ComposerError::SchemaMismatch { kind: ActionKind::Supply, .. }));
    }

    #[test]
    fn word_params_require_32_bytes() {
        let err = Action::supply(asset(1), Slot::bytes(vec![1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("input 1 must be a 32-byte word"));
    }

    #[test]
    fn bytes_params_reject_references() {
        let err = Action::new(ActionKind::Swap,
                              vec![Slot::address(asset(1)), Slot::address(asset(2)), Slot::step(0), Slot::step(0)])
                  .unwrap_err();
        assert!(err.to_string().contains("cannot be a reference"));
    }

    #[test]
    fn references_include_patch_amount() {
        let template = [vec![0xab; 4], Slot::amount(U256::from(10u64)).literal().unwrap().to_vec()].concat();
        let quote = Quote { sell_asset: asset(1),
                            buy_asset: asset(2),
                            template,
                            quoted_amount: U256::from(10u64) };
        let action = Action::swap_with_quote(Slot::field(1, 0), &quote).unwrap();
        assert_eq!(action.patch().unwrap().spec.amount_offsets(), &[4]);
        // amount input + patch amount
        assert_eq!(action.references().collect::<Vec<_>>(), vec![(1, 0), (1, 0)]);
    }

    #[test]
    fn patch_must_target_template_literal() {
        let amount = U256::from(10u64);
        let template = Slot::amount(amount).literal().unwrap().to_vec();
        let spec = PatchSpec::derive(&template, amount).unwrap();
        let action = Action::swap(asset(1), asset(2), amount, vec![0u8; 32]).unwrap();
        let err = action.clone()
                        .with_patch(PatchBinding { slot: 3,
                                                   spec: spec.clone(),
                                                   amount: Slot::step(0) })
                        .unwrap_err();
        assert!(err.to_string().contains("does not hold the patch template"));
        let err = action.with_patch(PatchBinding { slot: 2,
                                                   spec,
                                                   amount: Slot::step(0) })
                        .unwrap_err();
        assert!(err.to_string().contains("not a bytes parameter"));
    }

    #[test]
    fn deserialization_runs_the_schema_check() {
        let err = serde_json::from_str::<Action>(r#"{"kind":"FlashBegin","inputs":[],"produces_output":true,"patch":null}"#)
                      .unwrap_err();
        assert!(err.to_string().contains("expected 2 inputs, got 0"), "{err}");

        let action = Action::supply(asset(1), Action::amount(5)).unwrap().without_output();
        let back: Action = serde_json::from_str(&serde_json::to_string(&action).unwrap()).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn deserialized_patch_must_match_the_template() {
        let amount = U256::from(10u64);
        let quote = Quote { sell_asset: asset(1),
                            buy_asset: asset(2),
                            template: Slot::amount(amount).literal().unwrap().to_vec(),
                            quoted_amount: amount };
        let action = Action::swap_with_quote(Slot::step(0), &quote).unwrap();
        let mut json = serde_json::to_value(&action).unwrap();
        json["patch"]["spec"]["amount_offsets"] = serde_json::json!([16]);
        assert!(serde_json::from_value::<Action>(json.clone()).is_err());

        json["patch"]["spec"]["amount_offsets"] = serde_json::json!([0]);
        json["inputs"][3] = serde_json::to_value(Slot::bytes(vec![0u8; 32])).unwrap();
        let err = serde_json::from_value::<Action>(json).unwrap_err();
        assert!(err.to_string().contains("does not hold the patch template"), "{err}");
    }

    #[test]
    fn flash_end_has_no_inputs_and_no_output() {
        let action = Action::flash_end().unwrap();
        assert!(action.inputs().is_empty());
        assert!(!action.produces_output());
        assert!(Action::supply(asset(1), Action::amount(5)).unwrap().produces_output());
    }
}
