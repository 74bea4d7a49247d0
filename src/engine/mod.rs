// 8.0: offer book engine. coordinates the offer store, the liability ledger and the
// change delta across one ledger close at a time.
// deterministic, single writer, no external I/O.

mod audit;
mod config;
mod core;
mod mutations;
mod queries;
mod results;
mod shared;

pub use config::EngineConfig;
pub use core::OfferBook;
pub use mutations::{NewOffer, OfferUpdate};
pub use results::{
    AuditReport, EngineError, ErrorKind, LedgerCloseSummary, LiabilityMismatch, MutationOutcome,
    MutationStage,
};
pub use shared::SharedOfferBook;
