/// Event records for the deterministic kernel.
///
/// Every scheduled effect is an `Event`: an immutable record naming the
/// sender, the receiver, the simulated times of creation and delivery,
/// and the message payload. Events are minted only by the scheduling
/// path and ordered by a composite key that makes runs reproducible
/// even under arbitrarily many simultaneous events.

use std::cmp::Ordering;

use crate::message::{EventMessage, MessageVariant};
use crate::time::SimTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// A monotonically increasing sequence number, unique within a run.
///
/// Assigned when an event is scheduled. It is the last tiebreaker of
/// the global ordering key, so two events that agree on time and
/// receiver are delivered in scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each `Simulator` owns exactly one. The kernel is single-threaded,
/// so the counter is trivially deterministic.
#[derive(Debug, Clone)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }

    /// Ensure that every future ID is greater than `id`.
    ///
    /// Used when restoring a heap snapshot that preserved its original
    /// sequence numbers.
    pub fn resume_past(&mut self, id: EventId) {
        self.next = self.next.max(id.0 + 1);
    }
}

impl Default for EventIdGen {
    fn default() -> Self {
        Self::new()
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A scheduled future delivery of one message to one object.
///
/// Constructed only by the kernel's scheduling path; user code never
/// mutates an event. The heap orders events by
/// `(receive_time, receiver_priority, receiver, id)`, which is total
/// because IDs are unique. Within a frontier — events tied on time and
/// receiver — delivery order is `(sender_priority, sender, id)`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Event<M> {
    /// Sequence number assigned at scheduling time.
    pub id: EventId,

    /// Simulated time at which the event was scheduled.
    pub creation_time: SimTime,

    /// Simulated time at which the event fires.
    pub receive_time: SimTime,

    /// Name of the sending object.
    pub sender: String,

    /// Priority key of the sending object at scheduling time.
    pub sender_priority: i32,

    /// Name of the receiving object.
    pub receiver: String,

    /// Priority key of the receiving object.
    pub receiver_priority: i32,

    /// The message payload; moved to the receiver at dispatch.
    pub message: M,
}

impl<M: EventMessage> Event<M> {
    /// The variant tag of the carried message.
    #[inline]
    pub fn variant(&self) -> MessageVariant {
        self.message.variant()
    }
}

impl<M> Event<M> {
    /// The global ordering key (§ heap order).
    #[inline]
    pub(crate) fn heap_key(&self) -> (SimTime, i32, &str, EventId) {
        (
            self.receive_time,
            self.receiver_priority,
            self.receiver.as_str(),
            self.id,
        )
    }

    /// The within-frontier delivery key.
    #[inline]
    pub(crate) fn delivery_key(&self) -> (i32, &str, EventId) {
        (self.sender_priority, self.sender.as_str(), self.id)
    }

    /// Convert into the form handed to a handler, moving the message.
    pub(crate) fn into_delivered(self) -> Delivered<M> {
        Delivered {
            id: self.id,
            sender: self.sender,
            creation_time: self.creation_time,
            receive_time: self.receive_time,
            message: self.message,
        }
    }
}

// Events compare by ordering key only; payloads are opaque to the heap.
impl<M> PartialEq for Event<M> {
    fn eq(&self, other: &Self) -> bool {
        self.heap_key() == other.heap_key()
    }
}

impl<M> Eq for Event<M> {}

/// Ordering: smallest `(receive_time, receiver_priority, receiver, id)`
/// first.
///
/// Rust's `BinaryHeap` is a *max*-heap, so the natural ordering is
/// **reversed** here to turn it into a min-heap.
impl<M> Ord for Event<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that BinaryHeap pops the *smallest* key first.
        other.heap_key().cmp(&self.heap_key())
    }
}

impl<M> PartialOrd for Event<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M: EventMessage> std::fmt::Display for Event<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {} {} ({})",
            self.receive_time,
            self.sender,
            self.receiver,
            self.variant(),
            self.id
        )
    }
}

// ── Delivered ─────────────────────────────────────────────────────────

/// An event as seen by the receiving handler.
///
/// The receiver identity is implicit (it is the handling object); the
/// message is moved in and consumed exactly once.
#[derive(Debug)]
pub struct Delivered<M> {
    /// Sequence number of the originating event.
    pub id: EventId,

    /// Name of the sending object.
    pub sender: String,

    /// Simulated time at which the event was scheduled.
    pub creation_time: SimTime,

    /// Simulated time at which the event fired.
    pub receive_time: SimTime,

    /// The message payload.
    pub message: M,
}

impl<M: EventMessage> Delivered<M> {
    /// The variant tag of the carried message.
    #[inline]
    pub fn variant(&self) -> MessageVariant {
        self.message.variant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Msg {
        Ping,
    }

    impl EventMessage for Msg {
        fn variant(&self) -> MessageVariant {
            MessageVariant::new("Ping")
        }
    }

    fn event(id: u64, at: f64, receiver: &str, receiver_priority: i32) -> Event<Msg> {
        Event {
            id: EventId::new(id),
            creation_time: SimTime::ZERO,
            receive_time: SimTime::new(at),
            sender: "src".into(),
            sender_priority: 0,
            receiver: receiver.into(),
            receiver_priority,
            message: Msg::Ping,
        }
    }

    #[test]
    fn test_id_gen_monotonic() {
        let mut gen = EventIdGen::new();
        let a = gen.next_id();
        let b = gen.next_id();
        let c = gen.next_id();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(c.raw(), 2);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_id_gen_resume_past() {
        let mut gen = EventIdGen::new();
        gen.resume_past(EventId::new(41));
        assert_eq!(gen.next_id().raw(), 42);
        // Resuming backwards never rewinds the counter.
        gen.resume_past(EventId::new(3));
        assert_eq!(gen.next_id().raw(), 43);
    }

    #[test]
    fn test_ordering_by_time() {
        let e1 = event(0, 10.0, "a", 0);
        let e2 = event(1, 20.0, "a", 0);
        // e1 has the smaller key → in reversed ordering e1 > e2.
        assert!(e1 > e2);
    }

    #[test]
    fn test_tie_broken_by_receiver_priority() {
        let urgent = event(1, 5.0, "b", -1);
        let lazy = event(0, 5.0, "a", 3);
        assert!(urgent > lazy);
    }

    #[test]
    fn test_tie_broken_by_receiver_name_then_id() {
        let e_a = event(7, 5.0, "alpha", 0);
        let e_b = event(3, 5.0, "beta", 0);
        assert!(e_a > e_b);

        let first = event(3, 5.0, "alpha", 0);
        let later = event(9, 5.0, "alpha", 0);
        assert!(first > later);
    }

    #[test]
    fn test_delivery_key_uses_sender_fields() {
        let mut e = event(4, 5.0, "c", 0);
        e.sender = "a".into();
        e.sender_priority = 2;
        assert_eq!(e.delivery_key(), (2, "a", EventId::new(4)));
    }

    #[test]
    fn test_into_delivered_moves_message() {
        let e = event(11, 6.0, "a", 0);
        let d = e.into_delivered();
        assert_eq!(d.id, EventId::new(11));
        assert_eq!(d.sender, "src");
        assert_eq!(d.creation_time, SimTime::ZERO);
        assert_eq!(d.receive_time, SimTime::new(6.0));
        assert_eq!(d.variant().name(), "Ping");
    }

    #[test]
    fn test_display() {
        let e = event(42, 6.0, "worker", 0);
        assert_eq!(format!("{}", e), "T=6 src -> worker Ping (E#42)");
    }
}
