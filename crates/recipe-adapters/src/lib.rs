//! recipe-adapters: implementaciones en memoria de los colaboradores externos
//! del composer (substrate de operaciones y servicio de quotes).
pub mod ledger;
pub mod prices;
pub mod quote;
pub mod tokens;

pub use ledger::{LedgerError, LedgerState, LedgerSubstrate};
pub use prices::PriceTable;
pub use quote::StaticQuoteService;
