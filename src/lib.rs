//! # Chronon — Deterministic Discrete-Event Simulation Kernel
//!
//! A library for advancing user-defined models by executing timestamped
//! events in global non-decreasing time order. Events are messages
//! between long-lived simulation objects; between events, simulated
//! time jumps forward to the next scheduled one. No async, no threads,
//! no wall-clock coupling — determinism follows from a total ordering
//! key and a single synchronous run loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────┐
//! │         Simulator           │ ← lifecycle + run loop
//! │  ┌──────────────────────┐  │
//! │  │      EventHeap        │  │ ← global event list (min-heap)
//! │  └──────────────────────┘  │
//! │  ┌──────────────────────┐  │
//! │  │  SimObject/Behavior   │  │ ← handler tables + send-lists
//! │  └──────────────────────┘  │
//! │  ┌──────────────────────┐  │
//! │  │       SimTime         │  │ ← simulated clock
//! │  └──────────────────────┘  │
//! └────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use chronon::{Behavior, EventMessage, MessageVariant, SimObject, SimTime, Simulator};
//!
//! enum Msg {
//!     Ping,
//! }
//!
//! impl EventMessage for Msg {
//!     fn variant(&self) -> MessageVariant {
//!         MessageVariant::new("Ping")
//!     }
//! }
//!
//! const PING: MessageVariant = MessageVariant::new("Ping");
//!
//! let mut sim = Simulator::new();
//! let behavior = Behavior::<u32, Msg>::new()
//!     .sends(PING)
//!     .on_init(|_, ctx| {
//!         ctx.send_event(6.0, "clock", Msg::Ping)?;
//!         Ok(())
//!     })
//!     .on(PING, |ticks, ctx, _| {
//!         *ticks += 1;
//!         ctx.send_event(6.0, "clock", Msg::Ping)?;
//!         Ok(())
//!     });
//! sim.add_object(SimObject::new("clock", 0u32, behavior))?;
//!
//! sim.initialize()?;
//! let summary = sim.run(SimTime::new(25.0))?;
//! assert_eq!(summary.num_events, 4);
//! assert_eq!(*sim.object::<u32>("clock").unwrap(), 4);
//! # Ok::<(), chronon::SimError>(())
//! ```
//!
//! Simultaneous events are delivered deterministically: events tied on
//! time and receiver form a *frontier*, handled either per-variant in
//! `(sender priority, sender name, sequence)` order or by one batch
//! handler call when the receiver installs one.

pub mod error;
pub mod event;
pub mod message;
pub mod metadata;
pub mod object;
pub mod scheduler;
pub mod simulator;
pub mod time;

// Re-exports for convenience.
pub use error::{HandlerError, SimError, SimResult};
pub use event::{Delivered, Event, EventId};
pub use message::{EventMessage, MessageVariant};
pub use metadata::{RunSummary, TerminationReason};
pub use object::{Behavior, ObjectContext, SimObject};
pub use scheduler::EventHeap;
pub use simulator::{EventObserver, Simulator, StopFlag};
pub use time::SimTime;
