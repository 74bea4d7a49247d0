// 5.0: every offer mutation and ledger-close transition produces an event. used for audit
// trails and for notifying whatever sits above the book. EventPayload lists all event types.

use crate::engine::ErrorKind;
use crate::price::Price;
use crate::types::{AccountId, Asset, LedgerSeq, OfferId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub ledger_seq: LedgerSeq,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, ledger_seq: LedgerSeq, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            ledger_seq,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Offer events
    OfferCreated(OfferCreatedEvent),
    OfferUpdated(OfferUpdatedEvent),
    OfferDeleted(OfferDeletedEvent),
    MutationRejected(MutationRejectedEvent),

    // Ledger-close events
    LedgerClosed(LedgerClosedEvent),
    LedgerAborted(LedgerAbortedEvent),
    Halted(HaltedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferCreatedEvent {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub passive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferUpdatedEvent {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    pub old_amount: i64,
    pub new_amount: i64,
    pub old_price: Price,
    pub new_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferDeletedEvent {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    pub remaining_amount: i64,
    pub reason: DeleteReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteReason {
    Cancelled,
    ZeroAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationRejectedEvent {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerClosedEvent {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerAbortedEvent {
    pub reverted_entries: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltedEvent {
    pub reason: String,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

/// Keeps the most recent events, dropping the oldest past `limit`.
#[derive(Debug)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
    limit: usize,
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCollector {
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            limit,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
        if self.events.len() > self.limit {
            let drain_count = self.events.len() - self.limit;
            self.events.drain(0..drain_count);
        }
    }
}
