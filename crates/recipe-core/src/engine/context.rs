//! `ExecutionContext`: corre una receta como unidad atómica sobre un
//! `OperationSubstrate`.
//!
//! Máquina de estados `Pending -> Running -> {Committed, Reverted}`. Las
//! acciones corren estrictamente en orden; la primera falla revierte la
//! corrida completa (rollback al checkpoint tomado al entrar en `Running`) y
//! ninguna acción posterior se despacha. Si la receta abre un flash loan, el
//! contexto exige `balance_of(asset) >= amount + fee` antes de despachar el
//! `flash-end`.

use alloy_primitives::Address;
use log::{debug, info, warn};
use serde_json::json;
use uuid::Uuid;

use super::flash::FlashBracket;
use super::resolver::{resolve, resolve_all};
use super::substrate::{Invocation, OperationSubstrate};
use crate::config::ComposerConfig;
use crate::constants::ENGINE_VERSION;
use crate::encoding::decode;
use crate::errors::ComposerError;
use crate::event::{EventStore, InMemoryEventStore, RunEvent, RunEventKind};
use crate::hashing::{hash_bytes, hash_value};
use crate::model::output::words;
use crate::model::slot::{decode_address, decode_amount, encode_address, encode_amount};
use crate::model::{Action, ActionKind, ExecutionOutcome, OutputTable, Recipe, RunState};

#[derive(Debug)]
pub struct ExecutionContext<S, E = InMemoryEventStore>
    where S: OperationSubstrate,
          E: EventStore
{
    substrate: S,
    config: ComposerConfig,
    event_store: E,
    state: RunState,
    last_run: Option<Uuid>,
}

impl<S> ExecutionContext<S, InMemoryEventStore> where S: OperationSubstrate
{
    /// Contexto con store de eventos en memoria.
    pub fn new(substrate: S, config: ComposerConfig) -> Self {
        Self::with_event_store(substrate, config, InMemoryEventStore::default())
    }
}

impl<S, E> ExecutionContext<S, E>
    where S: OperationSubstrate,
          E: EventStore
{
    pub fn with_event_store(substrate: S, config: ComposerConfig, event_store: E) -> Self {
        Self { substrate,
               config,
               event_store,
               state: RunState::Pending,
               last_run: None }
    }

    /// Estado de la última corrida (`Pending` si nunca corrió).
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    pub fn substrate_mut(&mut self) -> &mut S {
        &mut self.substrate
    }

    pub fn event_store(&self) -> &E {
        &self.event_store
    }

    pub fn last_run_id(&self) -> Option<Uuid> {
        self.last_run
    }

    /// Eventos de la última corrida.
    pub fn events(&self) -> Vec<RunEvent> {
        self.last_run.map(|id| self.event_store.list(id)).unwrap_or_default()
    }

    /// Decodifica y ejecuta un mensaje. Un mensaje mal formado (referencias,
    /// bracket, wire) se rechaza con `Err` sin llegar a `Running`.
    pub fn submit(&mut self, message: &[u8]) -> Result<ExecutionOutcome, ComposerError> {
        let recipe = decode(message)?;
        self.run(&recipe)
    }

    /// Valida y ejecuta una receta ya construida.
    pub fn execute(&mut self, recipe: &Recipe) -> Result<ExecutionOutcome, ComposerError> {
        recipe.validate()?;
        self.run(recipe)
    }

    fn run(&mut self, recipe: &Recipe) -> Result<ExecutionOutcome, ComposerError> {
        let recipe_hash = recipe.recipe_hash()?;
        let run_id = Uuid::new_v4();
        self.last_run = Some(run_id);
        self.state = RunState::Pending;
        self.event_store.append_kind(run_id,
                                     RunEventKind::RunInitialized { recipe_name: recipe.name().to_string(),
                                                                    recipe_hash: recipe_hash.clone(),
                                                                    action_count: recipe.len() });

        let checkpoint = self.substrate.checkpoint();
        self.state = RunState::Running;
        info!("run {run_id}: recipe `{}` started ({} actions)", recipe.name(), recipe.len());

        match self.run_actions(run_id, recipe) {
            Ok((outputs, output_hashes)) => {
                self.substrate.release(checkpoint);
                let fingerprint = hash_value(&json!({
                                                 "engine_version": ENGINE_VERSION,
                                                 "recipe_hash": recipe_hash,
                                                 "output_hashes": output_hashes
                                             }));
                self.event_store
                    .append_kind(run_id, RunEventKind::RunCommitted { fingerprint: fingerprint.clone() });
                self.state = RunState::Committed;
                info!("run {run_id}: committed");
                Ok(ExecutionOutcome::committed(run_id, outputs, fingerprint))
            }
            Err(reason) => {
                self.substrate.rollback(checkpoint);
                self.event_store
                    .append_kind(run_id, RunEventKind::RunReverted { reason: reason.clone() });
                self.state = RunState::Reverted;
                warn!("run {run_id}: reverted: {reason}");
                Ok(ExecutionOutcome::reverted(run_id, reason))
            }
        }
    }

    fn run_actions(&mut self,
                   run_id: Uuid,
                   recipe: &Recipe)
                   -> Result<(OutputTable, Vec<Option<String>>), ComposerError> {
        let mut outputs = OutputTable::new();
        let mut output_hashes = Vec::with_capacity(recipe.len());
        let mut bracket: Option<FlashBracket> = None;

        for (index, action) in recipe.actions().iter().enumerate() {
            match self.run_action(run_id, index, action, &outputs, &mut bracket) {
                Ok(output) => {
                    let output = output.filter(|_| action.produces_output());
                    let output_hash = output.as_deref().map(hash_bytes);
                    self.event_store.append_kind(run_id,
                                                 RunEventKind::ActionFinished { index,
                                                                                kind: action.kind(),
                                                                                output_hash: output_hash.clone() });
                    if let Some(bytes) = output {
                        outputs.record(index, bytes);
                    }
                    output_hashes.push(output_hash);
                }
                Err(error) => {
                    self.event_store.append_kind(run_id,
                                                 RunEventKind::ActionFailed { index,
                                                                              kind: action.kind(),
                                                                              error: error.clone() });
                    return Err(error);
                }
            }
        }

        if let Some(open) = bracket {
            return Err(ComposerError::MalformedFlashBracket(format!("flash loan of {} never closed", open.asset)));
        }
        Ok((outputs, output_hashes))
    }

    /// Resuelve, parchea y despacha la acción `index`. Devuelve el output que
    /// la acción registraría.
    fn run_action(&mut self,
                  run_id: Uuid,
                  index: usize,
                  action: &Action,
                  outputs: &OutputTable,
                  bracket: &mut Option<FlashBracket>)
                  -> Result<Option<Vec<u8>>, ComposerError> {
        let kind = action.kind();
        let target = self.config.registry.target(kind)?;
        let mut inputs = resolve_all(action.inputs(), outputs)?;

        if let Some(binding) = action.patch() {
            let word = resolve(&binding.amount, outputs)?;
            let amount = decode_amount(&word).ok_or_else(|| schema_error(kind, "patch amount is not a word"))?;
            debug!("step {index}: patching {} offset(s) with amount {amount}",
                   binding.spec.amount_offsets().len());
            let slot = inputs.get_mut(binding.slot)
                             .ok_or_else(|| schema_error(kind, "patch slot out of range"))?;
            *slot = binding.spec.apply(amount);
        }

        match kind {
            ActionKind::FlashBegin => {
                let asset = inputs.first()
                                  .and_then(|w| decode_address(w))
                                  .ok_or_else(|| schema_error(kind, "input 0 is not an address"))?;
                let amount = inputs.get(1)
                                   .and_then(|w| decode_amount(w))
                                   .ok_or_else(|| schema_error(kind, "input 1 is not an amount"))?;
                let opened = FlashBracket::open(asset, amount, self.config.flash_fee_bps);
                self.dispatch(run_id, index, target, kind, &inputs)?;
                info!("step {index}: flash loan opened: {amount} of {asset} (fee {})", opened.fee);
                self.event_store.append_kind(run_id,
                                             RunEventKind::FlashOpened { asset,
                                                                         amount,
                                                                         fee: opened.fee });
                *bracket = Some(opened);
                Ok(Some(words(&[opened.amount, opened.fee])))
            }
            ActionKind::FlashEnd => {
                let open = bracket.take()
                                  .ok_or_else(|| ComposerError::MalformedFlashBracket("flash-end without open flash loan".into()))?;
                let required = open.check_closure(self.substrate.balance_of(open.asset))?;
                let repay = [encode_address(open.asset).to_vec(), encode_amount(required).to_vec()];
                self.dispatch(run_id, index, target, kind, &repay)?;
                info!("step {index}: flash loan closed: repaid {required} of {}", open.asset);
                self.event_store
                    .append_kind(run_id, RunEventKind::FlashClosed { asset: open.asset, repaid: required });
                Ok(None)
            }
            _ => self.dispatch(run_id, index, target, kind, &inputs),
        }
    }

    fn dispatch(&mut self,
                run_id: Uuid,
                index: usize,
                target: Address,
                kind: ActionKind,
                inputs: &[Vec<u8>])
                -> Result<Option<Vec<u8>>, ComposerError> {
        self.event_store
            .append_kind(run_id, RunEventKind::ActionStarted { index, kind, target });
        debug!("step {index}: dispatching {kind} to {target}");
        match self.substrate.invoke(target, kind, inputs) {
            Invocation::Success { output } => Ok(output),
            Invocation::Failure { info } => Err(ComposerError::RemoteOperationFailed { index, kind, info }),
        }
    }
}

fn schema_error(kind: ActionKind, reason: &str) -> ComposerError {
    ComposerError::SchemaMismatch { kind,
                                    reason: reason.to_string() }
}
