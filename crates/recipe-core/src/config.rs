//! Configuración del composer desde variables de entorno.
//!
//! El registro `kind -> target` es un valor explícito que se inyecta en el
//! `ExecutionContext`; no hay lookup global de direcciones por nombre.
//! Variables: `RECIPE_FLASH_FEE_BPS`, `RECIPE_SLIPPAGE_BPS`, `RECIPE_REGISTRY`.

use std::collections::BTreeMap;
use std::env;

use alloy_primitives::Address;
use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::constants::BPS_DENOMINATOR;
use crate::errors::ComposerError;
use crate::model::ActionKind;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_FLASH_FEE_BPS: u32 = 0;
pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;

/// Mapa `ActionKind -> dirección del target` que recibe cada dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    targets: BTreeMap<ActionKind, Address>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direcciones placeholder deterministas (último byte = tag del kind).
    pub fn with_defaults() -> Self {
        let targets = ActionKind::ALL.iter()
                                     .map(|k| (*k, Address::with_last_byte(k.tag())))
                                     .collect();
        Self { targets }
    }

    pub fn register(mut self, kind: ActionKind, target: Address) -> Self {
        self.insert(kind, target);
        self
    }

    pub fn insert(&mut self, kind: ActionKind, target: Address) -> Option<Address> {
        self.targets.insert(kind, target)
    }

    pub fn target(&self, kind: ActionKind) -> Result<Address, ComposerError> {
        self.targets.get(&kind).copied().ok_or(ComposerError::UnregisteredAction(kind))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Parsea `Kind=0xaddr;Kind=0xaddr`. Entradas vacías se ignoran.
    pub fn parse(raw: &str) -> Result<Self, ComposerError> {
        let mut registry = Self::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (kind, addr) = entry.split_once('=')
                                    .ok_or_else(|| ComposerError::Config(format!("registry entry `{entry}` lacks `=`")))?;
            let kind: ActionKind = kind.parse()?;
            let addr: Address = addr.trim()
                                    .parse()
                                    .map_err(|e| ComposerError::Config(format!("bad address for {kind}: {e}")))?;
            registry.insert(kind, addr);
        }
        Ok(registry)
    }

    /// Sobrescribe con las entradas de `other`.
    pub fn merge(mut self, other: Registry) -> Self {
        self.targets.extend(other.targets);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerConfig {
    /// Fee del flash loan en basis points (0 para lenders tipo vault).
    pub flash_fee_bps: u32,
    /// Tolerancia por defecto para `BoundsPolicy`.
    pub slippage_bps: u32,
    pub registry: Registry,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self { flash_fee_bps: DEFAULT_FLASH_FEE_BPS,
               slippage_bps: DEFAULT_SLIPPAGE_BPS,
               registry: Registry::with_defaults() }
    }
}

impl ComposerConfig {
    pub fn from_env() -> Result<Self, ComposerError> {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de una fuente arbitraria (tests).
    pub fn from_vars<F>(get: F) -> Result<Self, ComposerError>
        where F: Fn(&str) -> Option<String>
    {
        let flash_fee_bps = bps_var(&get, "RECIPE_FLASH_FEE_BPS", DEFAULT_FLASH_FEE_BPS)?;
        let slippage_bps = bps_var(&get, "RECIPE_SLIPPAGE_BPS", DEFAULT_SLIPPAGE_BPS)?;
        let registry = match get("RECIPE_REGISTRY") {
            Some(raw) => Registry::with_defaults().merge(Registry::parse(&raw)?),
            None => Registry::with_defaults(),
        };
        Ok(Self { flash_fee_bps,
                  slippage_bps,
                  registry })
    }

    pub fn with_flash_fee_bps(mut self, bps: u32) -> Self {
        self.flash_fee_bps = bps;
        self
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }
}

fn bps_var<F>(get: &F, key: &str, default: u32) -> Result<u32, ComposerError>
    where F: Fn(&str) -> Option<String>
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    let bps: u32 = raw.trim()
                      .parse()
                      .map_err(|_| ComposerError::Config(format!("{key}=`{raw}` is not an integer")))?;
    if bps > BPS_DENOMINATOR {
        return Err(ComposerError::Config(format!("{key}={bps} exceeds {BPS_DENOMINATOR} bps")));
    }
    Ok(bps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = ComposerConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(cfg, ComposerConfig::default());
        assert_eq!(cfg.registry.len(), ActionKind::ALL.len());
        assert_eq!(cfg.registry.target(ActionKind::Swap).unwrap(), Address::with_last_byte(0x20));
    }

    #[test]
    fn registry_overrides_defaults() {
        let raw = "swap=0x00000000000000000000000000000000000000aa; ";
        let cfg = ComposerConfig::from_vars(vars(&[("RECIPE_FLASH_FEE_BPS", "9"), ("RECIPE_REGISTRY", raw)])).unwrap();
        assert_eq!(cfg.flash_fee_bps, 9);
        assert_eq!(cfg.registry.target(ActionKind::Swap).unwrap(), Address::with_last_byte(0xaa));
        assert_eq!(cfg.registry.target(ActionKind::Supply).unwrap(), Address::with_last_byte(0x10));
    }

    #[test]
    fn malformed_values_are_config_errors() {
        assert!(matches!(ComposerConfig::from_vars(vars(&[("RECIPE_SLIPPAGE_BPS", "abc")])),
                         Err(ComposerError::Config(_))));
        assert!(matches!(ComposerConfig::from_vars(vars(&[("RECIPE_FLASH_FEE_BPS", "10001")])),
                         Err(ComposerError::Config(_))));
        assert!(matches!(Registry::parse("swap"), Err(ComposerError::Config(_))));
        assert!(matches!(Registry::parse("teleport=0x00"), Err(ComposerError::UnknownActionKind(_))));
    }

    #[test]
    fn missing_target_is_reported() {
        let registry = Registry::new().register(ActionKind::Supply, Address::ZERO);
        assert_eq!(registry.target(ActionKind::Borrow), Err(ComposerError::UnregisteredAction(ActionKind::Borrow)));
    }
}
