// 8.0 engine/core.rs: the offer book. holds the offer store, balance records, id pool and
// the open ledger close. every write happens inside begin_ledger .. commit/abort.

use super::config::EngineConfig;
use super::results::{EngineError, LedgerCloseSummary};
use crate::balances::BalanceStore;
use crate::delta::LedgerDelta;
use crate::entries::{LedgerEntry, LedgerKey};
use crate::events::{
    Event, EventCollector, EventEmitter, EventPayload, HaltedEvent, LedgerAbortedEvent,
    LedgerClosedEvent,
};
use crate::id_pool::{IdCheckpoint, IdPool};
use crate::store::OfferStore;
use crate::types::{LedgerSeq, Timestamp};
use tracing::{error, info};

/// State of the ledger close currently being applied.
#[derive(Debug)]
pub(super) struct OpenLedger {
    pub(super) seq: LedgerSeq,
    pub(super) close_time: Timestamp,
    pub(super) delta: LedgerDelta,
    pub(super) ids: IdCheckpoint,
}

/** 8.1: main book struct. all state lives here */
#[derive(Debug)]
pub struct OfferBook {
    pub(super) config: EngineConfig,
    pub(super) store: OfferStore,
    pub(super) balances: BalanceStore,
    pub(super) id_pool: IdPool,
    pub(super) open: Option<OpenLedger>,
    pub(super) last_closed: LedgerSeq,
    pub(super) halted: Option<String>,
    pub(super) events: EventCollector,
}

impl OfferBook {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.network.validate()?;
        let store = OfferStore::default().with_full_scan(config.network.allow_full_scan);
        let balances = BalanceStore::new(config.network.base_reserve);
        let events = EventCollector::with_limit(config.max_events);
        Ok(Self {
            config,
            store,
            balances,
            id_pool: IdPool::new(),
            open: None,
            last_closed: LedgerSeq::GENESIS,
            halted: None,
            events,
        })
    }

    /// Replaces the balance records. The book's base reserve wins over the store's.
    pub fn with_balances(mut self, mut balances: BalanceStore) -> Self {
        balances.set_base_reserve(self.config.network.base_reserve);
        self.balances = balances;
        self
    }

    pub fn with_id_pool(mut self, id_pool: IdPool) -> Self {
        self.id_pool = id_pool;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    /// Direct access for the surrounding ledger (payments, trust changes).
    /// Writes made here are not part of the open close's delta.
    pub fn balances_mut(&mut self) -> &mut BalanceStore {
        &mut self.balances
    }

    pub fn store(&self) -> &OfferStore {
        &self.store
    }

    pub fn id_pool(&self) -> &IdPool {
        &self.id_pool
    }

    pub fn last_closed(&self) -> LedgerSeq {
        self.last_closed
    }

    pub fn open_ledger(&self) -> Option<LedgerSeq> {
        self.open.as_ref().map(|open| open.seq)
    }

    /// Changes recorded so far in the open close.
    pub fn pending_delta(&self) -> Option<&LedgerDelta> {
        self.open.as_ref().map(|open| &open.delta)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    // ---- ledger close lifecycle ----

    pub fn begin_ledger(&mut self, close_time: Timestamp) -> Result<LedgerSeq, EngineError> {
        self.ensure_running()?;
        if let Some(open) = &self.open {
            return Err(EngineError::LedgerAlreadyOpen(open.seq));
        }
        let seq = self
            .last_closed
            .next()
            .ok_or(EngineError::SequenceExhausted(self.last_closed))?;

        self.open = Some(OpenLedger {
            seq,
            close_time,
            delta: LedgerDelta::new(seq),
            ids: self.id_pool.checkpoint(),
        });
        info!(ledger_seq = %seq, "Ledger close opened");
        Ok(seq)
    }

    pub fn commit_ledger(&mut self) -> Result<LedgerCloseSummary, EngineError> {
        self.ensure_running()?;
        if self.open.is_none() {
            return Err(EngineError::NoOpenLedger);
        }

        if self.config.network.audit_on_commit {
            if let Err(e) = self.reconcile_liabilities() {
                return Err(self.fail(e));
            }
        }

        let open = self.open.take().ok_or(EngineError::NoOpenLedger)?;
        let created = open.delta.count_created();
        let updated = open.delta.count_updated();
        let deleted = open.delta.count_deleted();
        let changes = open
            .delta
            .changes()
            .map(|(key, change)| (key.clone(), change.clone()))
            .collect();

        self.last_closed = open.seq;
        let summary = LedgerCloseSummary {
            ledger_seq: open.seq,
            close_time: open.close_time,
            changes,
            created,
            updated,
            deleted,
        };

        info!(
            ledger_seq = %open.seq,
            created,
            updated,
            deleted,
            "Ledger close committed"
        );
        self.emit_event_at(
            open.seq,
            open.close_time,
            EventPayload::LedgerClosed(LedgerClosedEvent {
                created,
                updated,
                deleted,
            }),
        );
        Ok(summary)
    }

    /// Reverts everything the open close did. Returns the number of entities restored.
    pub fn abort_ledger(&mut self) -> Result<usize, EngineError> {
        let open = self.open.take().ok_or(EngineError::NoOpenLedger)?;
        Ok(self.revert(open, "aborted by caller"))
    }

    /// Operator action after a fatal error has been investigated.
    pub fn clear_halt(&mut self) {
        if let Some(reason) = self.halted.take() {
            info!(%reason, "Halt cleared");
        }
    }

    pub(super) fn ensure_running(&self) -> Result<(), EngineError> {
        match &self.halted {
            Some(reason) => Err(EngineError::Halted(reason.clone())),
            None => Ok(()),
        }
    }

    /// Routes an error out of a mutation. Fatal errors abort the open close
    /// and halt the book before being handed back.
    pub(super) fn fail(&mut self, err: EngineError) -> EngineError {
        if !err.is_fatal() {
            return err;
        }
        let reason = err.to_string();
        error!(%reason, "Fatal inconsistency, aborting ledger close");
        if let Some(open) = self.open.take() {
            self.revert(open, &reason);
        }
        self.halted = Some(reason.clone());
        self.emit_event(EventPayload::Halted(HaltedEvent { reason }));
        err
    }

    fn revert(&mut self, open: OpenLedger, reason: &str) -> usize {
        let images = open.delta.revert_images();
        let reverted = images.len();

        for (key, image) in images {
            match (key, image) {
                (LedgerKey::Account(id), Some(LedgerEntry::Account(acc))) => {
                    self.balances.restore_account(&id, Some(acc));
                }
                (LedgerKey::Account(id), None) => self.balances.restore_account(&id, None),
                (LedgerKey::TrustLine { account_id, asset }, Some(LedgerEntry::TrustLine(tl))) => {
                    self.balances.restore_trust_line(&account_id, &asset, Some(tl));
                }
                (LedgerKey::TrustLine { account_id, asset }, None) => {
                    self.balances.restore_trust_line(&account_id, &asset, None);
                }
                (LedgerKey::Offer(key), Some(LedgerEntry::Offer(rec))) => self.store.restore(&key, Some(rec)),
                (LedgerKey::Offer(key), None) => self.store.restore(&key, None),
                (key, Some(entry)) => {
                    error!(?key, entry_key = ?entry.key(), "Before-image does not match its key");
                }
            }
        }
        self.id_pool.restore(open.ids);

        info!(ledger_seq = %open.seq, reverted, %reason, "Ledger close aborted");
        self.emit_event_at(
            open.seq,
            open.close_time,
            EventPayload::LedgerAborted(LedgerAbortedEvent {
                reverted_entries: reverted,
                reason: reason.to_string(),
            }),
        );
        reverted
    }

    // ---- events ----

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let (seq, time) = match &self.open {
            Some(open) => (open.seq, open.close_time),
            None => (self.last_closed, Timestamp::from_millis(0)),
        };
        self.emit_event_at(seq, time, payload);
    }

    fn emit_event_at(&mut self, seq: LedgerSeq, time: Timestamp, payload: EventPayload) {
        let event = Event::new(self.events.next_id(), seq, time, payload);
        self.events.emit(event);
    }
}
