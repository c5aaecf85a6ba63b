//! Conjunto cerrado de operaciones remotas que una receta puede invocar.
//!
//! Cada `ActionKind` fija su esquema de inputs (`ParamType`), los campos de
//! output que escribe en la `OutputTable` y un tag estable para el wire.
//! Un kind desconocido es un error de construcción, nunca de ejecución.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ComposerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    FlashBegin,
    FlashEnd,
    Supply,
    Withdraw,
    Borrow,
    Payback,
    Swap,
    PullToken,
    SendToken,
}

/// Tipo de un parámetro del esquema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Dirección codificada como palabra de 32 bytes.
    Address,
    /// Amount `uint256` big-endian de 32 bytes.
    Amount,
    /// Blob opaco de longitud arbitraria (p.ej. calldata de un quote).
    Bytes,
}

impl ParamType {
    /// Sólo los parámetros de ancho fijo aceptan referencias.
    pub fn is_word(self) -> bool {
        matches!(self, ParamType::Address | ParamType::Amount)
    }
}

use self::ParamType::{Address as A, Amount as N, Bytes as B};

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [ActionKind::FlashBegin,
                                      ActionKind::FlashEnd,
                                      ActionKind::Supply,
                                      ActionKind::Withdraw,
                                      ActionKind::Borrow,
                                      ActionKind::Payback,
                                      ActionKind::Swap,
                                      ActionKind::PullToken,
                                      ActionKind::SendToken];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::FlashBegin => "flash-begin",
            ActionKind::FlashEnd => "flash-end",
            ActionKind::Supply => "supply",
            ActionKind::Withdraw => "withdraw",
            ActionKind::Borrow => "borrow",
            ActionKind::Payback => "payback",
            ActionKind::Swap => "swap",
            ActionKind::PullToken => "pull-token",
            ActionKind::SendToken => "send-token",
        }
    }

    /// Tag estable usado en el formato wire.
    pub fn tag(self) -> u8 {
        match self {
            ActionKind::FlashBegin => 0x01,
            ActionKind::FlashEnd => 0x02,
            ActionKind::Supply => 0x10,
            ActionKind::Withdraw => 0x11,
            ActionKind::Borrow => 0x12,
            ActionKind::Payback => 0x13,
            ActionKind::Swap => 0x20,
            ActionKind::PullToken => 0x30,
            ActionKind::SendToken => 0x31,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, ComposerError> {
        Self::ALL.iter()
                 .copied()
                 .find(|k| k.tag() == tag)
                 .ok_or_else(|| ComposerError::UnknownActionKind(format!("tag 0x{tag:02x}")))
    }

    /// Esquema ordenado de inputs.
    ///
    /// `FlashEnd` no declara inputs: el contexto le pasa el activo y el monto a
    /// devolver a partir del bracket abierto.
    pub fn schema(self) -> &'static [ParamType] {
        match self {
            ActionKind::FlashBegin => &[A, N],
            ActionKind::FlashEnd => &[],
            ActionKind::Supply | ActionKind::Withdraw | ActionKind::Borrow | ActionKind::Payback => &[A, N],
            ActionKind::Swap => &[A, A, N, B],
            ActionKind::PullToken | ActionKind::SendToken => &[A, A, N],
        }
    }

    /// Nombres de los campos (palabras de 32 bytes) que escribe en la tabla.
    pub fn output_fields(self) -> &'static [&'static str] {
        match self {
            ActionKind::FlashBegin => &["amount", "fee"],
            ActionKind::FlashEnd => &[],
            ActionKind::Supply => &["supplied"],
            ActionKind::Withdraw => &["withdrawn"],
            ActionKind::Borrow => &["borrowed"],
            ActionKind::Payback => &["repaid"],
            ActionKind::Swap => &["bought", "sold"],
            ActionKind::PullToken => &["pulled"],
            ActionKind::SendToken => &["sent"],
        }
    }

    pub fn produces_output(self) -> bool {
        !self.output_fields().is_empty()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.iter()
                 .copied()
                 .find(|k| k.name() == wanted)
                 .ok_or_else(|| ComposerError::UnknownActionKind(s.to_string()))
    }
}
