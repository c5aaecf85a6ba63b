//! Execution Context y sus piezas: resolver de referencias, bracket de flash
//! loan y contrato del substrate remoto.

pub mod context;
pub mod flash;
pub mod resolver;
pub mod substrate;

pub use context::ExecutionContext;
pub use flash::{flash_fee, FlashBracket};
pub use resolver::{resolve, resolve_all};
pub use substrate::{Checkpoint, Invocation, OperationSubstrate};
