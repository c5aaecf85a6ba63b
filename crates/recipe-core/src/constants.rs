//! Constantes del composer.
//!
//! `ENGINE_VERSION` entra en el fingerprint de cada corrida y `WIRE_VERSION`
//! en el byte que sigue al prefijo mágico; cambiarlas invalida hashes y
//! mensajes previos de forma determinista.

/// Versión lógica del motor. Forma parte del fingerprint de la corrida.
pub const ENGINE_VERSION: &str = "R1.0";

/// Prefijo mágico del mensaje de receta.
pub const WIRE_MAGIC: &[u8; 4] = b"RCPE";

/// Versión del formato wire.
pub const WIRE_VERSION: u8 = 1;

/// Ancho fijo (big-endian) de un amount o dirección codificada.
pub const WORD_SIZE: usize = 32;

/// Denominador de las tasas expresadas en basis points.
pub const BPS_DENOMINATOR: u32 = 10_000;
