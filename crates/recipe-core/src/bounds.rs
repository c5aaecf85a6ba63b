//! Bounds Validator: aserciones post-ejecución sobre deltas realizados en
//! operaciones multi-activo (retiros de pools).
//!
//! Funciones puras sobre balances antes/después. El contexto de ejecución no
//! las invoca: la política aceptable depende de cada primitiva financiera y
//! la elige el caller.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::constants::BPS_DENOMINATOR;
use crate::errors::ComposerError;

/// Política de bounds para un retiro multi-activo.
///
/// `Exact` y `RemoveOneCoin` son políticas distintas a propósito: en la
/// segunda sólo el activo primario (índice 0) tiene piso; el resto sólo techo,
/// porque el pool puede devolver cero de ellos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundsPolicy {
    /// `delta_i >= m_i - m_i * s`.
    Proportional { slippage_bps: u32 },
    /// `m_i - m_i * s <= delta_i <= m_i`.
    Exact { slippage_bps: u32 },
    /// Índice 0: `delta_0 >= m_0 - m_0 * s`. Resto: `delta_i <= m_i`.
    RemoveOneCoin { slippage_bps: u32 },
}

/// Rango aceptable para un activo; `max = None` es sin techo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBounds {
    pub min: U256,
    pub max: Option<U256>,
}

impl AmountBounds {
    pub fn contains(&self, value: U256) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }
}

/// `floor(value * bps / 10_000)` con `bps` acotado a 10_000, sin overflow.
pub fn bps_share(value: U256, bps: u32) -> U256 {
    let bps = U256::from(bps.min(BPS_DENOMINATOR));
    let denom = U256::from(BPS_DENOMINATOR);
    // v * bps / D == (v / D) * bps + (v % D) * bps / D
    (value / denom) * bps + (value % denom) * bps / denom
}

/// `m - floor(m * bps / 10_000)`.
pub fn lower_bound(minimum: U256, slippage_bps: u32) -> U256 {
    minimum - bps_share(minimum, slippage_bps)
}

impl BoundsPolicy {
    pub fn slippage_bps(&self) -> u32 {
        match *self {
            BoundsPolicy::Proportional { slippage_bps }
            | BoundsPolicy::Exact { slippage_bps }
            | BoundsPolicy::RemoveOneCoin { slippage_bps } => slippage_bps,
        }
    }

    /// Bounds del activo `index` dado su mínimo pedido `minimum`.
    pub fn bounds_for(&self, index: usize, minimum: U256) -> AmountBounds {
        let lower = lower_bound(minimum, self.slippage_bps());
        match self {
            BoundsPolicy::Proportional { .. } => AmountBounds { min: lower, max: None },
            BoundsPolicy::Exact { .. } => AmountBounds { min: lower,
                                                         max: Some(minimum) },
            BoundsPolicy::RemoveOneCoin { .. } if index == 0 => AmountBounds { min: lower, max: None },
            BoundsPolicy::RemoveOneCoin { .. } => AmountBounds { min: U256::ZERO,
                                                                 max: Some(minimum) },
        }
    }
}

/// Deltas por activo `after - before`, saturando en cero.
pub fn realized_deltas(before: &[U256], after: &[U256]) -> Result<Vec<U256>, ComposerError> {
    if before.len() != after.len() {
        return Err(ComposerError::AssetCountMismatch { requested: before.len(),
                                                       realized: after.len() });
    }
    Ok(before.iter().zip(after).map(|(b, a)| a.saturating_sub(*b)).collect())
}

/// Devuelve la primera violación como `BoundsViolation`.
pub fn check(policy: BoundsPolicy, requested: &[U256], realized: &[U256]) -> Result<(), ComposerError> {
    if requested.len() != realized.len() {
        return Err(ComposerError::AssetCountMismatch { requested: requested.len(),
                                                       realized: realized.len() });
    }
    for (index, (&minimum, &delta)) in requested.iter().zip(realized).enumerate() {
        let bounds = policy.bounds_for(index, minimum);
        if !bounds.contains(delta) {
            return Err(ComposerError::BoundsViolation { index,
                                                        realized: delta,
                                                        min: bounds.min,
                                                        max: bounds.max });
        }
    }
    Ok(())
}

/// Atajo: deltas desde balances y chequeo en un solo paso.
pub fn check_balances(policy: BoundsPolicy,
                      requested: &[U256],
                      before: &[U256],
                      after: &[U256])
                      -> Result<(), ComposerError> {
    let realized = realized_deltas(before, after)?;
    check(policy, requested, &realized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn proportional_one_percent() {
        let policy = BoundsPolicy::Proportional { slippage_bps: 100 };
        let m = [u(1000), u(1000)];
        assert!(check(policy, &m, &[u(991), u(1000)]).is_ok());
        assert!(check(policy, &m, &[u(990), u(1000)]).is_ok());
        assert_eq!(check(policy, &m, &[u(989), u(1000)]),
                   Err(ComposerError::BoundsViolation { index: 0,
                                                        realized: u(989),
                                                        min: u(990),
                                                        max: None }));
        // sin techo
        assert!(check(policy, &m, &[u(5000), u(5000)]).is_ok());
    }

    #[test]
    fn exact_with_zero_slippage_pins_the_value() {
        let policy = BoundsPolicy::Exact { slippage_bps: 0 };
        assert!(check(policy, &[u(500)], &[u(500)]).is_ok());
        assert!(check(policy, &[u(500)], &[u(499)]).is_err());
        assert_eq!(check(policy, &[u(500)], &[u(501)]),
                   Err(ComposerError::BoundsViolation { index: 0,
                                                        realized: u(501),
                                                        min: u(500),
                                                        max: Some(u(500)) }));
    }

    #[test]
    fn remove_one_coin_is_asymmetric() {
        let policy = BoundsPolicy::RemoveOneCoin { slippage_bps: 1 };
        let m = [u(10_000), u(10_000), u(10_000)];
        // secundarios pueden ser cero
        assert!(check(policy, &m, &[u(9_999), u(0), u(0)]).is_ok());
        assert!(check(policy, &m, &[u(9_998), u(0), u(0)]).is_err());
        let err = check(policy, &m, &[u(10_000), u(0), u(10_001)]).unwrap_err();
        assert!(matches!(err, ComposerError::BoundsViolation { index: 2, .. }));
        // el primario no tiene techo
        assert!(check(policy, &m, &[u(20_000), u(0), u(0)]).is_ok());
    }

    #[test]
    fn lower_bound_handles_extremes() {
        assert_eq!(lower_bound(U256::MAX, 0), U256::MAX);
        assert_eq!(lower_bound(U256::MAX, 10_000), U256::ZERO);
        assert_eq!(lower_bound(u(1000), 10), u(999));
        assert_eq!(lower_bound(u(9), 100), u(9));
    }

    #[test]
    fn deltas_saturate_and_counts_must_match() {
        assert_eq!(realized_deltas(&[u(10), u(5)], &[u(15), u(1)]).unwrap(), vec![u(5), u(0)]);
        assert_eq!(realized_deltas(&[u(1)], &[]),
                   Err(ComposerError::AssetCountMismatch { requested: 1, realized: 0 }));
        assert!(check_balances(BoundsPolicy::Proportional { slippage_bps: 100 },
                               &[u(1000), u(1000)],
                               &[u(0), u(50)],
                               &[u(991), u(1050)]).is_ok());
    }
}
