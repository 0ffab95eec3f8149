/// The global event list.
///
/// A min-priority structure over the composite ordering key
/// `(receive_time, receiver_priority, receiver, id)`, implemented as a
/// `BinaryHeap` with reversed `Ord` on `Event`. Because sequence
/// numbers are strictly increasing and the key is total, two runs with
/// the same schedule always pop events in the same order.

use std::collections::BinaryHeap;

use crate::event::Event;
use crate::message::EventMessage;
use crate::time::SimTime;

/// The pending-event heap owned by a `Simulator`.
///
/// Scheduling-time validation (causality, declared variants) happens
/// before an event reaches `push`; the heap itself only maintains
/// order. `push` costs `O(log n)`; `pop_frontier` costs `O(k log n)`
/// for a frontier of `k` events.
#[derive(Debug, Clone)]
pub struct EventHeap<M> {
    heap: BinaryHeap<Event<M>>,
}

impl<M> EventHeap<M> {
    /// Create a new, empty heap.
    pub fn new() -> Self {
        EventHeap {
            heap: BinaryHeap::new(),
        }
    }

    /// Insert an event.
    pub fn push(&mut self, event: Event<M>) {
        self.heap.push(event);
    }

    /// The receive time of the minimum event, or `None` when empty.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.receive_time)
    }

    /// The receiver of the minimum event, or `None` when empty.
    pub fn peek_receiver(&self) -> Option<&str> {
        self.heap.peek().map(|e| e.receiver.as_str())
    }

    /// Pop every event tied with the minimum on *both* receive time and
    /// receiver.
    ///
    /// Simultaneous events addressed to different receivers are not
    /// batched together; they come out of separate calls, ordered by
    /// receiver priority then name. The returned frontier is sorted
    /// into delivery order — `(sender_priority, sender, id)` — which is
    /// the order handlers observe.
    pub fn pop_frontier(&mut self) -> Vec<Event<M>> {
        let Some(first) = self.heap.pop() else {
            return Vec::new();
        };
        let time = first.receive_time;
        let mut frontier = vec![first];

        loop {
            let tied = matches!(self.heap.peek(),
                Some(next) if next.receive_time == time && next.receiver == frontier[0].receiver);
            if !tied {
                break;
            }
            if let Some(next) = self.heap.pop() {
                frontier.push(next);
            }
        }

        if frontier.len() > 1 {
            frontier.sort_by(|a, b| a.delivery_key().cmp(&b.delivery_key()));
        }
        frontier
    }

    /// Returns `true` if no events are pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drop all pending events.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Drain all events in global order.
    pub fn drain_ordered(&mut self) -> Vec<Event<M>> {
        let mut events = Vec::with_capacity(self.heap.len());
        while let Some(e) = self.heap.pop() {
            events.push(e);
        }
        events
    }

    /// Rebuild the heap from a list of events, e.g. a restored
    /// snapshot. Existing contents are discarded.
    pub fn restore(&mut self, events: Vec<Event<M>>) {
        self.heap = events.into_iter().collect();
    }
}

impl<M: Clone> EventHeap<M> {
    /// A non-destructive copy of the pending events in global order.
    pub fn snapshot(&self) -> Vec<Event<M>> {
        self.clone().drain_ordered()
    }
}

impl<M: EventMessage> EventHeap<M> {
    /// Render the pending events as a human-readable table, sorted in
    /// global order. Returns `None` when the heap is empty.
    pub fn render(&self) -> Option<String> {
        if self.heap.is_empty() {
            return None;
        }
        let mut events: Vec<&Event<M>> = self.heap.iter().collect();
        events.sort_by(|a, b| a.heap_key().cmp(&b.heap_key()));

        let mut table = String::from("t(send)\tt(event)\tsender\treceiver\tvariant");
        for e in events {
            table.push_str(&format!(
                "\n{}\t{}\t{}\t{}\t{}",
                e.creation_time.value(),
                e.receive_time.value(),
                e.sender,
                e.receiver,
                e.variant()
            ));
        }
        Some(table)
    }
}

impl<M> Default for EventHeap<M> {
    fn default() -> Self {
        Self::new()
    }
}
