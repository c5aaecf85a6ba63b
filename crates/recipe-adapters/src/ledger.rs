//! `LedgerSubstrate`: substrate en memoria para una sola cuenta.
//!
//! Modela balances de la cuenta, colateral y deuda en un mercado de lending,
//! wallets externas (origen de `pull-token`, destino de `send-token`), un pool
//! de flash loans y una tabla de precios fija para swaps. Los checkpoints
//! guardan una copia completa del estado; `rollback` la restaura, de modo que
//! la atomicidad de la corrida es observable desde afuera.
//!
//! Cada operación trabaja sobre una copia del estado y sólo la publica si
//! tuvo éxito: una llamada fallida no deja efectos parciales.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use log::{debug, warn};
use recipe_core::constants::BPS_DENOMINATOR;
use recipe_core::model::output::words;
use recipe_core::model::slot::{decode_address, decode_amount, encode_amount};
use recipe_core::patch::find_offsets;
use recipe_core::{ActionKind, Checkpoint, Invocation, OperationSubstrate};
use thiserror::Error;

use crate::prices::PriceTable;

pub const DEFAULT_MAX_LTV_BPS: u32 = 8_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("malformed input {0}")]
    MalformedInput(usize),
    #[error("insufficient balance of {asset}: need {needed}, have {available}")]
    InsufficientBalance { asset: Address, needed: U256, available: U256 },
    #[error("insufficient collateral of {asset}: need {needed}, have {available}")]
    InsufficientCollateral { asset: Address, needed: U256, available: U256 },
    #[error("payback of {asset} exceeds debt {debt}")]
    ExcessPayback { asset: Address, debt: U256 },
    #[error("position unhealthy: debt value {debt_value} above limit {limit}")]
    Unhealthy { debt_value: U256, limit: U256 },
    #[error("insufficient flash liquidity of {asset}: need {needed}, pool {available}")]
    FlashLiquidity { asset: Address, needed: U256, available: U256 },
    #[error("no route {sell} -> {buy}")]
    NoRoute { sell: Address, buy: Address },
    #[error("stale calldata: sold amount {0} not present")]
    StaleCalldata(U256),
    #[error("injected failure")]
    Injected,
}

/// Estado observable del ledger (lo que se snapshottea).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub balances: BTreeMap<Address, U256>,
    pub collateral: BTreeMap<Address, U256>,
    pub debt: BTreeMap<Address, U256>,
    /// Wallets externas: `(owner, asset) -> amount`.
    pub wallets: BTreeMap<(Address, Address), U256>,
    /// Liquidez del lender de flash loans por activo.
    pub flash_pool: BTreeMap<Address, U256>,
    pub flash_outstanding: BTreeMap<Address, U256>,
}

impl LedgerState {
    pub fn balance(&self, asset: Address) -> U256 {
        get(&self.balances, &asset)
    }

    pub fn collateral_of(&self, asset: Address) -> U256 {
        get(&self.collateral, &asset)
    }

    pub fn debt_of(&self, asset: Address) -> U256 {
        get(&self.debt, &asset)
    }

    pub fn wallet(&self, owner: Address, asset: Address) -> U256 {
        get(&self.wallets, &(owner, asset))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedgerSubstrate {
    state: LedgerState,
    prices: PriceTable,
    /// Precio de referencia por activo para el chequeo de salud.
    oracle: BTreeMap<Address, U256>,
    max_ltv_bps: u32,
    snapshots: Vec<(Checkpoint, LedgerState)>,
    next_checkpoint: u64,
    // Fuera del estado: no se revierten.
    calls: usize,
    fail_on_call: Option<usize>,
    fail_on_kind: Option<ActionKind>,
}

impl LedgerSubstrate {
    pub fn new(prices: PriceTable) -> Self {
        Self { prices,
               max_ltv_bps: DEFAULT_MAX_LTV_BPS,
               ..Default::default() }
    }

    pub fn with_balance(mut self, asset: Address, amount: U256) -> Self {
        self.state.balances.insert(asset, amount);
        self
    }

    pub fn with_collateral(mut self, asset: Address, amount: U256) -> Self {
        self.state.collateral.insert(asset, amount);
        self
    }

    pub fn with_wallet(mut self, owner: Address, asset: Address, amount: U256) -> Self {
        self.state.wallets.insert((owner, asset), amount);
        self
    }

    pub fn with_flash_liquidity(mut self, asset: Address, amount: U256) -> Self {
        self.state.flash_pool.insert(asset, amount);
        self
    }

    pub fn with_oracle_price(mut self, asset: Address, price: u64) -> Self {
        self.oracle.insert(asset, U256::from(price));
        self
    }

    pub fn with_max_ltv_bps(mut self, bps: u32) -> Self {
        self.max_ltv_bps = bps;
        self
    }

    /// Hace fallar la llamada `n` (0-based, contada desde el último checkpoint).
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Hace fallar toda llamada del kind indicado.
    pub fn fail_on(mut self, kind: ActionKind) -> Self {
        self.fail_on_kind = Some(kind);
        self
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Llamadas desde el último checkpoint (incluye las fallidas).
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn apply(&self, kind: ActionKind, inputs: &[Vec<u8>]) -> Result<(LedgerState, Option<Vec<u8>>), LedgerError> {
        let mut next = self.state.clone();
        let output = match kind {
            ActionKind::FlashBegin => {
                let (asset, amount) = (input_address(inputs, 0)?, input_amount(inputs, 1)?);
                let pool = get(&next.flash_pool, &asset);
                if pool < amount {
                    return Err(LedgerError::FlashLiquidity { asset,
                                                             needed: amount,
                                                             available: pool });
                }
                next.flash_pool.insert(asset, pool - amount);
                credit(&mut next.balances, asset, amount);
                credit(&mut next.flash_outstanding, asset, amount);
                Some(words(&[amount]))
            }
            ActionKind::FlashEnd => {
                let (asset, repay) = (input_address(inputs, 0)?, input_amount(inputs, 1)?);
                debit(&mut next.balances, asset, repay)?;
                credit(&mut next.flash_pool, asset, repay);
                next.flash_outstanding.remove(&asset);
                None
            }
            ActionKind::Supply => {
                let asset = input_address(inputs, 0)?;
                let amount = or_all(input_amount(inputs, 1)?, next.balance(asset));
                debit(&mut next.balances, asset, amount)?;
                credit(&mut next.collateral, asset, amount);
                Some(words(&[amount]))
            }
            ActionKind::Withdraw => {
                let asset = input_address(inputs, 0)?;
                let amount = or_all(input_amount(inputs, 1)?, next.collateral_of(asset));
                let available = next.collateral_of(asset);
                if available < amount {
                    return Err(LedgerError::InsufficientCollateral { asset,
                                                                     needed: amount,
                                                                     available });
                }
                next.collateral.insert(asset, available - amount);
                credit(&mut next.balances, asset, amount);
                self.check_health(&next)?;
                Some(words(&[amount]))
            }
            ActionKind::Borrow => {
                let (asset, amount) = (input_address(inputs, 0)?, input_amount(inputs, 1)?);
                credit(&mut next.debt, asset, amount);
                credit(&mut next.balances, asset, amount);
                self.check_health(&next)?;
                Some(words(&[amount]))
            }
            ActionKind::Payback => {
                let asset = input_address(inputs, 0)?;
                let debt = next.debt_of(asset);
                let amount = or_all(input_amount(inputs, 1)?, debt.min(next.balance(asset)));
                if amount > debt {
                    return Err(LedgerError::ExcessPayback { asset, debt });
                }
                debit(&mut next.balances, asset, amount)?;
                next.debt.insert(asset, debt - amount);
                Some(words(&[amount]))
            }
            ActionKind::Swap => {
                let (sell, buy) = (input_address(inputs, 0)?, input_address(inputs, 1)?);
                // La calldata lleva el amount pedido (MAX incluido), no el resuelto.
                let requested = input_amount(inputs, 2)?;
                let calldata = inputs.get(3).ok_or(LedgerError::MalformedInput(3))?;
                if !calldata.is_empty() && find_offsets(calldata, &encode_amount(requested)).is_empty() {
                    return Err(LedgerError::StaleCalldata(requested));
                }
                let sold = or_all(requested, next.balance(sell));
                let bought = self.prices.convert(sell, buy, sold).ok_or(LedgerError::NoRoute { sell, buy })?;
                debit(&mut next.balances, sell, sold)?;
                credit(&mut next.balances, buy, bought);
                Some(words(&[bought, sold]))
            }
            ActionKind::PullToken => {
                let (asset, from) = (input_address(inputs, 0)?, input_address(inputs, 1)?);
                let amount = input_amount(inputs, 2)?;
                let held = next.wallet(from, asset);
                if held < amount {
                    return Err(LedgerError::InsufficientBalance { asset,
                                                                  needed: amount,
                                                                  available: held });
                }
                next.wallets.insert((from, asset), held - amount);
                credit(&mut next.balances, asset, amount);
                Some(words(&[amount]))
            }
            ActionKind::SendToken => {
                let (asset, to) = (input_address(inputs, 0)?, input_address(inputs, 1)?);
                let amount = or_all(input_amount(inputs, 2)?, next.balance(asset));
                debit(&mut next.balances, asset, amount)?;
                credit(&mut next.wallets, (to, asset), amount);
                Some(words(&[amount]))
            }
        };
        Ok((next, output))
    }

    /// `sum(debt * price) <= sum(collateral * price) * ltv`.
    fn check_health(&self, state: &LedgerState) -> Result<(), LedgerError> {
        let value = |book: &BTreeMap<Address, U256>| {
            book.iter()
                .map(|(asset, amount)| amount.saturating_mul(get(&self.oracle, asset)))
                .fold(U256::ZERO, |acc, v| acc.saturating_add(v))
        };
        let debt_value = value(&state.debt);
        let limit = value(&state.collateral).saturating_mul(U256::from(self.max_ltv_bps)) / U256::from(BPS_DENOMINATOR);
        if debt_value > limit {
            return Err(LedgerError::Unhealthy { debt_value, limit });
        }
        Ok(())
    }
}

impl OperationSubstrate for LedgerSubstrate {
    fn invoke(&mut self, _target: Address, kind: ActionKind, inputs: &[Vec<u8>]) -> Invocation {
        let call = self.calls;
        self.calls += 1;
        let result = if self.fail_on_call == Some(call) || self.fail_on_kind == Some(kind) {
            Err(LedgerError::Injected)
        } else {
            self.apply(kind, inputs)
        };
        match result {
            Ok((next, output)) => {
                debug!("ledger: {kind} ok (call {call})");
                self.state = next;
                Invocation::Success { output }
            }
            Err(e) => {
                warn!("ledger: {kind} failed (call {call}): {e}");
                Invocation::failure(e.to_string())
            }
        }
    }

    fn balance_of(&self, asset: Address) -> U256 {
        self.state.balance(asset)
    }

    fn checkpoint(&mut self) -> Checkpoint {
        let checkpoint = Checkpoint(self.next_checkpoint);
        self.next_checkpoint += 1;
        self.calls = 0;
        self.snapshots.push((checkpoint, self.state.clone()));
        checkpoint
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        if let Some(pos) = self.snapshots.iter().position(|(c, _)| *c == checkpoint) {
            self.snapshots.truncate(pos + 1);
            if let Some((_, state)) = self.snapshots.pop() {
                self.state = state;
            }
        }
    }

    fn release(&mut self, checkpoint: Checkpoint) {
        if let Some(pos) = self.snapshots.iter().position(|(c, _)| *c == checkpoint) {
            self.snapshots.truncate(pos);
        }
    }
}

fn get<K: Ord>(book: &BTreeMap<K, U256>, key: &K) -> U256 {
    book.get(key).copied().unwrap_or_default()
}

fn credit<K: Ord>(book: &mut BTreeMap<K, U256>, key: K, amount: U256) {
    let entry = book.entry(key).or_default();
    *entry = entry.saturating_add(amount);
}

fn debit(book: &mut BTreeMap<Address, U256>, asset: Address, amount: U256) -> Result<(), LedgerError> {
    let available = get(book, &asset);
    if available < amount {
        return Err(LedgerError::InsufficientBalance { asset,
                                                      needed: amount,
                                                      available });
    }
    book.insert(asset, available - amount);
    Ok(())
}

/// `uint256::MAX` significa "todo lo disponible".
fn or_all(requested: U256, available: U256) -> U256 {
    if requested == U256::MAX {
        available
    } else {
        requested
    }
}

fn input_address(inputs: &[Vec<u8>], i: usize) -> Result<Address, LedgerError> {
    inputs.get(i).and_then(|w| decode_address(w)).ok_or(LedgerError::MalformedInput(i))
}

fn input_amount(inputs: &[Vec<u8>], i: usize) -> Result<U256, LedgerError> {
    inputs.get(i).and_then(|w| decode_amount(w)).ok_or(LedgerError::MalformedInput(i))
}
