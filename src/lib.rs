// offer-ledger: offer book and liabilities core for a replicated ledger.
// liabilities-first architecture: no offer is stored unless its reservations fit.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, OfferId, LedgerSeq, Asset
//   1.7  price.rs: rational price, exact compare, big_divide rounding
//   2.x  selector.rs: best-offer selection, price levels
//   3.x  offer.rs: offer entity, flags, liabilities per offer
//   4.x  id_pool.rs: offer id assignment with checkpoints
//   5.x  events.rs: state transition events for audit
//   6.x  config.rs: network params, env presets
//   8.x  engine/: offer book: ledger close, mutations, queries, audit, shared access
//   9.x  liabilities.rs: acquire/release, reserve and trust-limit invariants
//   10.x balances.rs: account + trust-line records, balance provider
//   11.x entries.rs: ledger keys and entries for the change delta
//   12.x delta.rs: per-close change coalescing and revert images
//   13.x table.rs: offer persistence session, in-memory book index
//   14.x store.rs: offer store create/update/delete + slow scans

// core ledger modules
pub mod balances;
pub mod liabilities;
pub mod offer;
pub mod price;
pub mod types;

// persistence modules
pub mod delta;
pub mod entries;
pub mod selector;
pub mod store;
pub mod table;

// orchestration modules
pub mod config;
pub mod engine;
pub mod events;
pub mod id_pool;

// re exports for convenience
pub use balances::*;
pub use engine::*;
pub use events::*;
pub use liabilities::*;
pub use offer::*;
pub use price::*;
pub use types::*;
pub use config::{ConfigError, Environment, NetworkConfig};
pub use delta::{ChangeRecorder, DeltaError, EntryChange, LedgerDelta};
pub use entries::{LedgerEntry, LedgerKey, OfferRecord};
pub use id_pool::IdPool;
pub use selector::PriceLevel;
pub use store::{OfferStore, StoreError};
pub use table::{MemoryOfferTable, OfferTable};
