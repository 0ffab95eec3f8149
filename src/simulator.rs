/// The simulator: run loop, lifecycle, and invariant enforcement.
///
/// Owns the global event list, the registered objects, and the current
/// simulated time. The run loop repeatedly pops the tied-event frontier
/// for the next-ordered receiver, dispatches it, and advances time.
/// The loop is purely synchronous and single-threaded — determinism
/// follows from the total ordering key alone.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventIdGen};
use crate::message::EventMessage;
use crate::metadata::{RunSummary, RunTimer, TerminationReason};
use crate::object::{Directory, ErasedObject, ObjectContext, SimObject};
use crate::scheduler::EventHeap;
use crate::time::SimTime;

// ── Stop flag ─────────────────────────────────────────────────────────

/// Cooperative cancellation flag.
///
/// Cloneable and settable from anywhere — including another thread
/// running a wall-clock watchdog — and checked by the run loop at
/// every frontier boundary, alongside the stop condition.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once a stop has been requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear the flag so the simulator can run again.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

// ── Observer ─────────────────────────────────────────────────────────

/// Callback invoked once per event, immediately before delivery.
///
/// The seam for external collaborators — checkpointing, visualization,
/// trace logging — none of which the core depends on.
pub trait EventObserver<M> {
    /// Called for every dispatched event, in delivery order.
    fn event_dispatched(&mut self, event: &Event<M>);
}

/// An observer backed by a closure — convenient for tests and one-off
/// instrumentation.
impl<M, F> EventObserver<M> for F
where
    F: FnMut(&Event<M>),
{
    fn event_dispatched(&mut self, event: &Event<M>) {
        (self)(event);
    }
}

// ── Simulator ────────────────────────────────────────────────────────

/// A self-contained discrete-event simulator.
///
/// Multiple simulators may coexist in one process; there is no shared
/// state between instances. The lifecycle is
/// `add_object* → initialize → run* → reset`, after which the
/// simulator may be reused for a new model.
///
/// The stop condition is consulted (and the stop flag checked) at each
/// frontier boundary *before* time advances, so on a clean stop the
/// final simulated time is the last dispatched time and no further
/// events fire.
pub struct Simulator<M> {
    time: SimTime,
    start_time: SimTime,
    heap: EventHeap<M>,
    objects: BTreeMap<String, Box<dyn ErasedObject<M>>>,
    /// Registration order; drives init/teardown sequencing.
    order: Vec<String>,
    directory: Directory,
    ids: EventIdGen,
    stop_condition: Option<Box<dyn FnMut(SimTime) -> bool>>,
    stop_flag: StopFlag,
    observers: Vec<Box<dyn EventObserver<M>>>,
    profiling: bool,
    counts: BTreeMap<String, u64>,
    timer: Option<RunTimer>,
    initialized: bool,
    running: bool,
}

impl<M: EventMessage + 'static> Simulator<M> {
    /// Create a simulator starting at time zero.
    pub fn new() -> Self {
        Simulator {
            time: SimTime::ZERO,
            start_time: SimTime::ZERO,
            heap: EventHeap::new(),
            objects: BTreeMap::new(),
            order: Vec::new(),
            directory: Directory::new(),
            ids: EventIdGen::new(),
            stop_condition: None,
            stop_flag: StopFlag::new(),
            observers: Vec::new(),
            profiling: false,
            counts: BTreeMap::new(),
            timer: None,
            initialized: false,
            running: false,
        }
    }

    /// Create a simulator whose clock starts at `start` instead of
    /// zero.
    pub fn starting_at(start: SimTime) -> SimResult<Self> {
        if start.is_nan() {
            return Err(SimError::TimeNotANumber);
        }
        let mut sim = Self::new();
        sim.time = start;
        sim.start_time = start;
        Ok(sim)
    }

    // ── Registration ─────────────────────────────────────

    /// Register a simulation object. Errors on duplicate names and on
    /// behaviors with conflicting handler registrations.
    pub fn add_object<O: 'static>(&mut self, object: SimObject<O, M>) -> SimResult<()> {
        if self.directory.contains_key(object.name()) {
            return Err(SimError::DuplicateObjectName(object.name().to_string()));
        }
        if let Some(variant) = object.behavior.duplicate() {
            return Err(SimError::DuplicateHandler { variant });
        }
        let info = object.info();
        debug!(object = %info.name, priority = info.priority, "object registered");
        self.order.push(info.name.clone());
        self.objects.insert(info.name.clone(), Box::new(object));
        self.directory.insert(info.name.clone(), info);
        Ok(())
    }

    /// Register several objects of the same state type.
    pub fn add_objects<O: 'static>(
        &mut self,
        objects: impl IntoIterator<Item = SimObject<O, M>>,
    ) -> SimResult<()> {
        for object in objects {
            self.add_object(object)?;
        }
        Ok(())
    }

    /// Remove a registered object.
    ///
    /// Errors if the name is unknown, or while a run cycle is active
    /// (between `initialize` and `reset`).
    pub fn remove_object(&mut self, name: &str) -> SimResult<()> {
        if self.initialized {
            return Err(SimError::ObjectInUse(name.to_string()));
        }
        if self.directory.remove(name).is_none() {
            return Err(SimError::UnknownObject(name.to_string()));
        }
        self.objects.remove(name);
        self.order.retain(|n| n != name);
        Ok(())
    }

    /// Returns `true` if an object with this name is registered.
    pub fn contains_object(&self, name: &str) -> bool {
        self.directory.contains_key(name)
    }

    /// Registered object names, in registration order.
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Borrow an object's state, downcast to its concrete type.
    pub fn object<O: 'static>(&self, name: &str) -> Option<&O> {
        self.objects.get(name)?.state_any().downcast_ref::<O>()
    }

    /// Mutably borrow an object's state, downcast to its concrete
    /// type.
    pub fn object_mut<O: 'static>(&mut self, name: &str) -> Option<&mut O> {
        self.objects
            .get_mut(name)?
            .state_any_mut()
            .downcast_mut::<O>()
    }

    // ── Configuration ────────────────────────────────────

    /// Install the stop condition, a predicate over the current
    /// simulated time consulted at each frontier boundary.
    pub fn set_stop_condition(&mut self, predicate: impl FnMut(SimTime) -> bool + 'static) {
        self.stop_condition = Some(Box::new(predicate));
    }

    /// Remove the stop condition.
    pub fn clear_stop_condition(&mut self) {
        self.stop_condition = None;
    }

    /// A clone of the cooperative stop flag, usable from outside the
    /// run loop.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    /// Request a cooperative stop; honored at the next frontier
    /// boundary.
    pub fn request_stop(&self) {
        self.stop_flag.request();
    }

    /// Register an observer notified of every dispatched event.
    pub fn add_observer(&mut self, observer: impl EventObserver<M> + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Enable or disable per-object event counting in the run summary.
    pub fn enable_profiling(&mut self, enabled: bool) {
        self.profiling = enabled;
    }

    // ── Introspection ────────────────────────────────────

    /// The current simulated time.
    pub fn current_time(&self) -> SimTime {
        self.time
    }

    /// Number of pending events in the global event list.
    pub fn pending_events(&self) -> usize {
        self.heap.len()
    }

    /// Render the pending events as a table, or `None` when the heap
    /// is empty.
    pub fn render_pending(&self) -> Option<String> {
        self.heap.render()
    }

    /// The pending events in global order — the checkpoint hook.
    pub fn snapshot_heap(&self) -> Vec<Event<M>>
    where
        M: Clone,
    {
        self.heap.snapshot()
    }

    /// Rebuild the heap from a snapshot, preserving sequence numbers
    /// verbatim so a restored run replays identically.
    ///
    /// Errors if any snapshot event would fire before the current
    /// time.
    pub fn restore_heap(&mut self, events: Vec<Event<M>>) -> SimResult<()> {
        for event in &events {
            if event.receive_time.is_nan() {
                return Err(SimError::TimeNotANumber);
            }
            if event.receive_time < self.time {
                return Err(SimError::StaleSnapshot {
                    now: self.time,
                    requested: event.receive_time,
                });
            }
        }
        let max_id = events.iter().map(|e| e.id).max();
        self.heap.restore(events);
        if let Some(id) = max_id {
            self.ids.resume_past(id);
        }
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────

    /// Initialize a run cycle: call each object's pre-run callback in
    /// registration order and start the wall-clock timer.
    ///
    /// Idempotent per run cycle — a second call before `reset` is a
    /// no-op.
    pub fn initialize(&mut self) -> SimResult<()> {
        if self.initialized {
            return Ok(());
        }
        self.timer = Some(RunTimer::start());
        self.counts.clear();
        self.time = self.start_time;
        debug!(objects = self.order.len(), "initializing simulation");

        let order = self.order.clone();
        for name in order {
            let Some(info) = self.directory.get(&name) else {
                continue;
            };
            let mut ctx = ObjectContext {
                now: self.time,
                acting: info,
                directory: &self.directory,
                heap: &mut self.heap,
                ids: &mut self.ids,
                stop: &self.stop_flag,
            };
            if let Some(object) = self.objects.get_mut(&name) {
                object.init(&mut ctx)?;
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Run until the heap drains, the next event would pass
    /// `max_time`, or a stop is triggered.
    ///
    /// Precondition failures return `Err`; a fatal error *inside* the
    /// loop terminates the run and is reported in the summary's
    /// termination reason. Repeated calls continue from where the
    /// previous run stopped.
    pub fn run(&mut self, max_time: SimTime) -> SimResult<RunSummary> {
        if max_time.is_nan() {
            return Err(SimError::TimeNotANumber);
        }
        if !self.initialized {
            return Err(SimError::NotInitialized);
        }
        if self.running {
            return Err(SimError::AlreadyRunning);
        }

        debug!(max_time = max_time.value(), "run starting");
        self.running = true;
        let (loop_reason, dispatched) = self.run_loop(max_time);
        self.running = false;

        let mut reason = loop_reason;
        if let Err(e) = self.run_teardown() {
            if !reason.is_error() {
                reason = TerminationReason::Error(e);
            }
        }

        let timer = *self.timer.get_or_insert_with(RunTimer::start);
        let summary = RunSummary {
            num_events: dispatched,
            start_wall_time: timer.start_wall_time(),
            duration: timer.elapsed(),
            final_sim_time: self.time,
            termination_reason: reason,
            per_object_counts: self.profiling.then(|| self.counts.clone()),
        };
        debug!(
            num_events = summary.num_events,
            final_time = summary.final_sim_time.value(),
            reason = %summary.termination_reason,
            "run halted"
        );
        Ok(summary)
    }

    fn run_loop(&mut self, max_time: SimTime) -> (TerminationReason, u64) {
        let mut dispatched: u64 = 0;

        let reason = loop {
            if self.stop_flag.is_requested() {
                break TerminationReason::StopRequested;
            }
            let Some(next_time) = self.heap.peek_time() else {
                break TerminationReason::NoEvents;
            };
            if next_time > max_time {
                break TerminationReason::MaxTimeReached;
            }
            // Consulted before time advances: on a stop, the final
            // time is the last dispatched time and the pending
            // frontier never fires.
            if let Some(condition) = self.stop_condition.as_mut() {
                if condition(self.time) {
                    break TerminationReason::StopConditionMet;
                }
            }

            self.time = next_time;
            let frontier = self.heap.pop_frontier();
            let Some(receiver) = frontier.first().map(|e| e.receiver.clone()) else {
                continue;
            };
            trace!(
                receiver = %receiver,
                time = next_time.value(),
                events = frontier.len(),
                "executing frontier"
            );
            for event in &frontier {
                for observer in &mut self.observers {
                    observer.event_dispatched(event);
                }
            }

            let before = dispatched;
            let result = self.dispatch_frontier(&receiver, frontier, &mut dispatched);
            if self.profiling {
                *self.counts.entry(receiver).or_default() += dispatched - before;
            }
            if let Err(e) = result {
                break TerminationReason::Error(e);
            }
        };
        (reason, dispatched)
    }

    fn dispatch_frontier(
        &mut self,
        receiver: &str,
        frontier: Vec<Event<M>>,
        handled: &mut u64,
    ) -> SimResult<()> {
        let Some(info) = self.directory.get(receiver) else {
            return Err(SimError::UnknownReceiver(receiver.to_string()));
        };
        let mut ctx = ObjectContext {
            now: self.time,
            acting: info,
            directory: &self.directory,
            heap: &mut self.heap,
            ids: &mut self.ids,
            stop: &self.stop_flag,
        };
        let Some(object) = self.objects.get_mut(receiver) else {
            return Err(SimError::UnknownReceiver(receiver.to_string()));
        };
        object.dispatch(&mut ctx, frontier, handled)
    }

    fn run_teardown(&mut self) -> SimResult<()> {
        let order = self.order.clone();
        for name in order {
            let Some(info) = self.directory.get(&name) else {
                continue;
            };
            let mut ctx = ObjectContext {
                now: self.time,
                acting: info,
                directory: &self.directory,
                heap: &mut self.heap,
                ids: &mut self.ids,
                stop: &self.stop_flag,
            };
            if let Some(object) = self.objects.get_mut(&name) {
                object.teardown(&mut ctx)?;
            }
        }
        Ok(())
    }

    /// Discard the heap, drop all object registrations, and restore
    /// the clock and sequence counter to their defaults. The simulator
    /// may then be reused for a new model.
    pub fn reset(&mut self) {
        self.heap.clear();
        self.objects.clear();
        self.directory.clear();
        self.order.clear();
        self.ids = EventIdGen::new();
        self.time = self.start_time;
        self.counts.clear();
        self.stop_condition = None;
        self.stop_flag.clear();
        self.timer = None;
        self.initialized = false;
    }
}

impl<M: EventMessage + 'static> Default for Simulator<M> {
    fn default() -> Self {
        Self::new()
    }
}
