//! Recipe Encoder / Decoder.
//!
//! El encoding es determinista (misma receta → mismos bytes) y nunca
//! materializa referencias: sólo transporta `(step, field)`.

mod wire;

pub use wire::{decode, encode};
