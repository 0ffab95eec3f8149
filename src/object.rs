/// Simulation objects and message dispatch.
///
/// A simulation object pairs user state with a declared `Behavior`: a
/// handler table keyed by message variant, an optional batch handler
/// for simultaneous events, a declared send-list, and lifecycle
/// callbacks. Objects never share memory — all interaction goes
/// through events scheduled via the `ObjectContext` handed to every
/// handler.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{HandlerError, SimError, SimResult};
use crate::event::{Delivered, Event, EventId, EventIdGen};
use crate::message::{EventMessage, MessageVariant};
use crate::scheduler::EventHeap;
use crate::simulator::StopFlag;
use crate::time::SimTime;

// ── Handler signatures ───────────────────────────────────────────────

/// A per-variant event handler.
///
/// Receives the object's state, the scheduling context, and the
/// delivered event (message moved in). Returning an error aborts the
/// run; kernel errors propagated with `?` keep their original tag.
pub type Handler<O, M> =
    Box<dyn FnMut(&mut O, &mut ObjectContext<'_, M>, Delivered<M>) -> Result<(), HandlerError>>;

/// A batch handler: one call per frontier of simultaneous events at
/// this object, in delivery order.
pub type BatchHandler<O, M> = Box<
    dyn FnMut(&mut O, &mut ObjectContext<'_, M>, Vec<Delivered<M>>) -> Result<(), HandlerError>,
>;

/// A lifecycle callback (pre-run init / post-run teardown).
pub type LifecycleHook<O, M> =
    Box<dyn FnMut(&mut O, &mut ObjectContext<'_, M>) -> Result<(), HandlerError>>;

// ── Behavior ─────────────────────────────────────────────────────────

/// The declared behavior of a simulation object.
///
/// Routing facts are fixed at registration: the handler table defines
/// which variants the object can receive, and the send-list defines
/// which variants it may emit. Both are checked on every `send_event`.
///
/// # Example
///
/// ```rust,ignore
/// let behavior = Behavior::new()
///     .sends(MessageVariant::new("Pong"))
///     .on(MessageVariant::new("Ping"), |state: &mut Paddle, ctx, event| {
///         state.hits += 1;
///         ctx.send_event(1.0, &event.sender, Msg::Pong)?;
///         Ok(())
///     });
/// ```
pub struct Behavior<O, M> {
    handlers: BTreeMap<MessageVariant, Handler<O, M>>,
    batch: Option<BatchHandler<O, M>>,
    batch_receives: BTreeSet<MessageVariant>,
    sends: BTreeSet<MessageVariant>,
    init: Option<LifecycleHook<O, M>>,
    teardown: Option<LifecycleHook<O, M>>,
    // First duplicate registration, reported by `Simulator::add_object`.
    duplicate: Option<MessageVariant>,
}

impl<O, M> Behavior<O, M> {
    /// An empty behavior: receives nothing, sends nothing.
    pub fn new() -> Self {
        Behavior {
            handlers: BTreeMap::new(),
            batch: None,
            batch_receives: BTreeSet::new(),
            sends: BTreeSet::new(),
            init: None,
            teardown: None,
            duplicate: None,
        }
    }

    /// Register the handler for one message variant.
    ///
    /// Registering the same variant twice is an error surfaced at
    /// `add_object` time.
    pub fn on(
        mut self,
        variant: MessageVariant,
        handler: impl FnMut(&mut O, &mut ObjectContext<'_, M>, Delivered<M>) -> Result<(), HandlerError>
            + 'static,
    ) -> Self {
        if self.handlers.insert(variant, Box::new(handler)).is_some() {
            self.duplicate.get_or_insert(variant);
        }
        self
    }

    /// Install a batch handler.
    ///
    /// When present it replaces per-variant dispatch: every frontier of
    /// simultaneous events at this object arrives as one ordered
    /// vector, regardless of the variants it mixes.
    pub fn on_batch(
        mut self,
        handler: impl FnMut(&mut O, &mut ObjectContext<'_, M>, Vec<Delivered<M>>) -> Result<(), HandlerError>
            + 'static,
    ) -> Self {
        self.batch = Some(Box::new(handler));
        self
    }

    /// Extend the batch-handler domain with a variant that has no
    /// per-variant handler. Only meaningful together with `on_batch`;
    /// without a batch handler the variant remains unreceivable.
    pub fn receives(mut self, variant: MessageVariant) -> Self {
        self.batch_receives.insert(variant);
        self
    }

    /// Declare a variant this object may send. `send_event` rejects
    /// variants missing from the declared set.
    pub fn sends(mut self, variant: MessageVariant) -> Self {
        self.sends.insert(variant);
        self
    }

    /// Set the pre-run callback, called once by `Simulator::initialize`
    /// after all objects are registered. The usual place to schedule
    /// initial events.
    pub fn on_init(
        mut self,
        hook: impl FnMut(&mut O, &mut ObjectContext<'_, M>) -> Result<(), HandlerError> + 'static,
    ) -> Self {
        self.init = Some(Box::new(hook));
        self
    }

    /// Set the post-run callback, called once after the run loop halts.
    pub fn on_teardown(
        mut self,
        hook: impl FnMut(&mut O, &mut ObjectContext<'_, M>) -> Result<(), HandlerError> + 'static,
    ) -> Self {
        self.teardown = Some(Box::new(hook));
        self
    }

    /// The set of variants this behavior can receive: the handler
    /// table's keys, plus the extra batch domain when a batch handler
    /// is installed.
    pub(crate) fn receivable(&self) -> BTreeSet<MessageVariant> {
        let mut set: BTreeSet<MessageVariant> = self.handlers.keys().copied().collect();
        if self.batch.is_some() {
            set.extend(self.batch_receives.iter().copied());
        }
        set
    }

    pub(crate) fn duplicate(&self) -> Option<MessageVariant> {
        self.duplicate
    }
}

impl<O, M> Default for Behavior<O, M> {
    fn default() -> Self {
        Self::new()
    }
}

// ── SimObject ────────────────────────────────────────────────────────

/// A simulation object: user state plus declared behavior, registered
/// under a unique name.
///
/// The optional priority key orders simultaneous events across
/// receivers (smaller runs first); it defaults to 0.
pub struct SimObject<O, M> {
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) state: O,
    pub(crate) behavior: Behavior<O, M>,
}

impl<O, M> SimObject<O, M> {
    /// Create an object from a name, its state, and its behavior.
    pub fn new(name: impl Into<String>, state: O, behavior: Behavior<O, M>) -> Self {
        SimObject {
            name: name.into(),
            priority: 0,
            state,
            behavior,
        }
    }

    /// Set the priority key used to order simultaneous events across
    /// receivers.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The object's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The routing facts published to the simulator's directory.
    pub(crate) fn info(&self) -> ObjectInfo {
        ObjectInfo {
            name: self.name.clone(),
            priority: self.priority,
            receivable: self.behavior.receivable(),
            sends: self.behavior.sends.clone(),
        }
    }
}

// ── Directory ────────────────────────────────────────────────────────

/// Routing facts for one registered object, consulted on every send.
#[derive(Debug, Clone)]
pub(crate) struct ObjectInfo {
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) receivable: BTreeSet<MessageVariant>,
    pub(crate) sends: BTreeSet<MessageVariant>,
}

/// Name → routing facts for all registered objects.
pub(crate) type Directory = BTreeMap<String, ObjectInfo>;

// ── ObjectContext ────────────────────────────────────────────────────

/// The scheduling interface handed to handlers and lifecycle hooks.
///
/// Borrowing the context mutably is the only way user code can affect
/// the simulation: reading the current time, scheduling events, and
/// requesting a cooperative stop. An object must not mutate any state
/// other than its own except through these operations.
pub struct ObjectContext<'a, M> {
    pub(crate) now: SimTime,
    pub(crate) acting: &'a ObjectInfo,
    pub(crate) directory: &'a Directory,
    pub(crate) heap: &'a mut EventHeap<M>,
    pub(crate) ids: &'a mut EventIdGen,
    pub(crate) stop: &'a StopFlag,
}

impl<'a, M: EventMessage> ObjectContext<'a, M> {
    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Name of the acting object.
    #[inline]
    pub fn name(&self) -> &str {
        &self.acting.name
    }

    /// Schedule `message` for `receiver` at `now + delay`.
    ///
    /// `delay` must be non-negative; zero is allowed and produces a
    /// simultaneous event that fires in a later frontier of the same
    /// tick.
    pub fn send_event(&mut self, delay: f64, receiver: &str, message: M) -> SimResult<EventId> {
        if delay.is_nan() {
            return Err(SimError::TimeNotANumber);
        }
        if delay < 0.0 {
            return Err(SimError::NegativeDelay { delay });
        }
        self.send_event_at(self.now.plus(delay), receiver, message)
    }

    /// Schedule `message` for `receiver` at the absolute time `at`.
    ///
    /// Fails with `PastScheduling` if `at` is before the current time;
    /// the heap is left unchanged on any error.
    pub fn send_event_at(&mut self, at: SimTime, receiver: &str, message: M) -> SimResult<EventId> {
        if at.is_nan() {
            return Err(SimError::TimeNotANumber);
        }
        if at < self.now {
            return Err(SimError::PastScheduling {
                now: self.now,
                requested: at,
            });
        }

        let variant = message.variant();
        if !self.acting.sends.contains(&variant) {
            return Err(SimError::UndeclaredSentVariant {
                sender: self.acting.name.clone(),
                variant,
            });
        }
        let target = self
            .directory
            .get(receiver)
            .ok_or_else(|| SimError::UnknownReceiver(receiver.to_string()))?;
        if !target.receivable.contains(&variant) {
            return Err(SimError::NoHandlerForVariant {
                receiver: target.name.clone(),
                variant,
            });
        }

        let id = self.ids.next_id();
        tracing::trace!(
            sender = %self.acting.name,
            receiver = %target.name,
            %variant,
            send_time = self.now.value(),
            receive_time = at.value(),
            "send"
        );
        self.heap.push(Event {
            id,
            creation_time: self.now,
            receive_time: at,
            sender: self.acting.name.clone(),
            sender_priority: self.acting.priority,
            receiver: target.name.clone(),
            receiver_priority: target.priority,
            message,
        });
        Ok(id)
    }

    /// Number of pending events in the global event list.
    pub fn pending_events(&self) -> usize {
        self.heap.len()
    }

    /// Request a cooperative stop; honored at the next frontier
    /// boundary.
    pub fn request_stop(&self) {
        self.stop.request();
    }
}

// ── Erased object + dispatch ─────────────────────────────────────────

/// Object-safe view of a registered `SimObject<O, M>`, letting the
/// simulator own objects of different state types in one map.
pub(crate) trait ErasedObject<M> {
    fn init(&mut self, ctx: &mut ObjectContext<'_, M>) -> SimResult<()>;
    fn teardown(&mut self, ctx: &mut ObjectContext<'_, M>) -> SimResult<()>;

    /// Deliver one frontier, incrementing `handled` once per event
    /// actually handed to user code.
    fn dispatch(
        &mut self,
        ctx: &mut ObjectContext<'_, M>,
        frontier: Vec<Event<M>>,
        handled: &mut u64,
    ) -> SimResult<()>;

    /// Downcast support for state inspection.
    fn state_any(&self) -> &dyn Any;
    fn state_any_mut(&mut self) -> &mut dyn Any;
}

impl<O: 'static, M: EventMessage + 'static> ErasedObject<M> for SimObject<O, M> {
    fn init(&mut self, ctx: &mut ObjectContext<'_, M>) -> SimResult<()> {
        if let Some(hook) = self.behavior.init.as_mut() {
            hook(&mut self.state, ctx).map_err(|e| SimError::from_handler(&self.name, None, e))?;
        }
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut ObjectContext<'_, M>) -> SimResult<()> {
        if let Some(hook) = self.behavior.teardown.as_mut() {
            hook(&mut self.state, ctx).map_err(|e| SimError::from_handler(&self.name, None, e))?;
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        ctx: &mut ObjectContext<'_, M>,
        frontier: Vec<Event<M>>,
        handled: &mut u64,
    ) -> SimResult<()> {
        if let Some(batch) = self.behavior.batch.as_mut() {
            // Batch dispatch: one invocation, counted as the size of
            // the frontier.
            let size = frontier.len() as u64;
            let delivered: Vec<Delivered<M>> =
                frontier.into_iter().map(Event::into_delivered).collect();
            batch(&mut self.state, ctx, delivered)
                .map_err(|e| SimError::from_handler(&self.name, None, e))?;
            *handled += size;
            return Ok(());
        }

        for event in frontier {
            let variant = event.variant();
            let handler = self.behavior.handlers.get_mut(&variant).ok_or_else(|| {
                SimError::NoHandlerForVariant {
                    receiver: self.name.clone(),
                    variant,
                }
            })?;
            handler(&mut self.state, ctx, event.into_delivered())
                .map_err(|e| SimError::from_handler(&self.name, Some(variant), e))?;
            *handled += 1;
        }
        Ok(())
    }

    fn state_any(&self) -> &dyn Any {
        &self.state
    }

    fn state_any_mut(&mut self) -> &mut dyn Any {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventId;

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Ping,
        Pong,
    }

    impl EventMessage for Msg {
        fn variant(&self) -> MessageVariant {
            match self {
                Msg::Ping => MessageVariant::new("Ping"),
                Msg::Pong => MessageVariant::new("Pong"),
            }
        }
    }

    const PING: MessageVariant = MessageVariant::new("Ping");
    const PONG: MessageVariant = MessageVariant::new("Pong");

    struct Counter {
        seen: u32,
    }

    /// Build a two-entry directory and hand a context for `acting` to
    /// the closure.
    fn with_context<R>(f: impl FnOnce(&mut ObjectContext<'_, Msg>) -> R) -> R {
        let mut directory = Directory::new();
        directory.insert(
            "a".into(),
            ObjectInfo {
                name: "a".into(),
                priority: 0,
                receivable: [PONG].into(),
                sends: [PING].into(),
            },
        );
        directory.insert(
            "b".into(),
            ObjectInfo {
                name: "b".into(),
                priority: 0,
                receivable: [PING].into(),
                sends: [PONG].into(),
            },
        );
        let acting = directory.get("a").cloned().unwrap();
        let mut heap = EventHeap::new();
        let mut ids = EventIdGen::new();
        let stop = StopFlag::new();
        let mut ctx = ObjectContext {
            now: SimTime::new(5.0),
            acting: &acting,
            directory: &directory,
            heap: &mut heap,
            ids: &mut ids,
            stop: &stop,
        };
        f(&mut ctx)
    }

    #[test]
    fn test_behavior_tracks_duplicate_registrations() {
        let behavior: Behavior<Counter, Msg> = Behavior::new()
            .on(PING, |_, _, _| Ok(()))
            .on(PING, |_, _, _| Ok(()));
        assert_eq!(behavior.duplicate(), Some(PING));
    }

    #[test]
    fn test_receivable_ignores_batch_domain_without_batch_handler() {
        let behavior: Behavior<Counter, Msg> =
            Behavior::new().on(PING, |_, _, _| Ok(())).receives(PONG);
        assert_eq!(behavior.receivable(), [PING].into());

        let with_batch: Behavior<Counter, Msg> = Behavior::new()
            .on(PING, |_, _, _| Ok(()))
            .receives(PONG)
            .on_batch(|_, _, _| Ok(()));
        assert_eq!(with_batch.receivable(), [PING, PONG].into());
    }

    #[test]
    fn test_object_info_snapshot() {
        let obj = SimObject::new(
            "relay",
            Counter { seen: 0 },
            Behavior::<Counter, Msg>::new()
                .on(PING, |_, _, _| Ok(()))
                .sends(PONG),
        )
        .with_priority(3);
        let info = obj.info();
        assert_eq!(info.name, "relay");
        assert_eq!(info.priority, 3);
        assert_eq!(info.receivable, [PING].into());
        assert_eq!(info.sends, [PONG].into());
    }

    #[test]
    fn test_send_event_happy_path() {
        with_context(|ctx| {
            let id = ctx.send_event(2.0, "b", Msg::Ping).unwrap();
            assert_eq!(id, EventId::new(0));
            assert_eq!(ctx.pending_events(), 1);
            assert_eq!(ctx.heap.peek_time(), Some(SimTime::new(7.0)));
        });
    }

    #[test]
    fn test_send_event_zero_delay_allowed() {
        with_context(|ctx| {
            ctx.send_event(0.0, "b", Msg::Ping).unwrap();
            assert_eq!(ctx.heap.peek_time(), Some(SimTime::new(5.0)));
        });
    }

    #[test]
    fn test_send_event_rejects_negative_delay() {
        with_context(|ctx| {
            let err = ctx.send_event(-1.0, "b", Msg::Ping).unwrap_err();
            assert!(matches!(err, SimError::NegativeDelay { .. }));
            assert_eq!(ctx.pending_events(), 0);
        });
    }

    #[test]
    fn test_send_event_at_rejects_past() {
        with_context(|ctx| {
            let err = ctx
                .send_event_at(SimTime::new(4.0), "b", Msg::Ping)
                .unwrap_err();
            assert!(matches!(err, SimError::PastScheduling { .. }));
            assert_eq!(ctx.pending_events(), 0);
        });
    }

    #[test]
    fn test_send_event_rejects_nan() {
        with_context(|ctx| {
            assert!(matches!(
                ctx.send_event(f64::NAN, "b", Msg::Ping),
                Err(SimError::TimeNotANumber)
            ));
            assert!(matches!(
                ctx.send_event_at(SimTime::new(f64::NAN), "b", Msg::Ping),
                Err(SimError::TimeNotANumber)
            ));
        });
    }

    #[test]
    fn test_send_event_rejects_undeclared_variant() {
        with_context(|ctx| {
            // "a" declares only Ping.
            let err = ctx.send_event(1.0, "b", Msg::Pong).unwrap_err();
            match err {
                SimError::UndeclaredSentVariant { sender, variant } => {
                    assert_eq!(sender, "a");
                    assert_eq!(variant, PONG);
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(ctx.pending_events(), 0);
        });
    }

    #[test]
    fn test_send_event_rejects_unknown_receiver() {
        with_context(|ctx| {
            let err = ctx.send_event(1.0, "ghost", Msg::Ping).unwrap_err();
            assert!(matches!(err, SimError::UnknownReceiver(name) if name == "ghost"));
        });
    }

    #[test]
    fn test_send_event_rejects_unhandled_variant_at_receiver() {
        with_context(|ctx| {
            // "a" itself only receives Pong, so Ping to "a" must fail.
            let err = ctx.send_event(1.0, "a", Msg::Ping).unwrap_err();
            assert!(matches!(err, SimError::NoHandlerForVariant { .. }));
        });
    }

    #[test]
    fn test_dispatch_counts_and_routes_by_variant() {
        let mut obj = SimObject::new(
            "b",
            Counter { seen: 0 },
            Behavior::<Counter, Msg>::new().on(PING, |state, _, delivered| {
                assert_eq!(delivered.message, Msg::Ping);
                state.seen += 1;
                Ok(())
            }),
        );

        with_context(|ctx| {
            let frontier = vec![
                Event {
                    id: EventId::new(0),
                    creation_time: SimTime::ZERO,
                    receive_time: SimTime::new(5.0),
                    sender: "a".into(),
                    sender_priority: 0,
                    receiver: "b".into(),
                    receiver_priority: 0,
                    message: Msg::Ping,
                },
                Event {
                    id: EventId::new(1),
                    creation_time: SimTime::ZERO,
                    receive_time: SimTime::new(5.0),
                    sender: "a".into(),
                    sender_priority: 0,
                    receiver: "b".into(),
                    receiver_priority: 0,
                    message: Msg::Ping,
                },
            ];
            let mut handled = 0;
            obj.dispatch(ctx, frontier, &mut handled).unwrap();
            assert_eq!(handled, 2);
        });
        assert_eq!(obj.state.seen, 2);
    }

    #[test]
    fn test_dispatch_missing_handler_is_fatal() {
        let mut obj = SimObject::new(
            "b",
            Counter { seen: 0 },
            Behavior::<Counter, Msg>::new().on(PING, |_, _, _| Ok(())),
        );
        with_context(|ctx| {
            let frontier = vec![Event {
                id: EventId::new(0),
                creation_time: SimTime::ZERO,
                receive_time: SimTime::new(5.0),
                sender: "a".into(),
                sender_priority: 0,
                receiver: "b".into(),
                receiver_priority: 0,
                message: Msg::Pong,
            }];
            let mut handled = 0;
            let err = obj.dispatch(ctx, frontier, &mut handled).unwrap_err();
            assert!(matches!(err, SimError::NoHandlerForVariant { .. }));
            assert_eq!(handled, 0);
        });
    }

    #[test]
    fn test_batch_handler_replaces_per_event_dispatch() {
        let mut obj = SimObject::new(
            "b",
            Counter { seen: 0 },
            Behavior::<Counter, Msg>::new()
                .receives(PING)
                .receives(PONG)
                .on_batch(|state, _, batch| {
                    state.seen += batch.len() as u32;
                    Ok(())
                }),
        );
        with_context(|ctx| {
            let frontier = vec![
                Event {
                    id: EventId::new(0),
                    creation_time: SimTime::ZERO,
                    receive_time: SimTime::new(5.0),
                    sender: "a".into(),
                    sender_priority: 0,
                    receiver: "b".into(),
                    receiver_priority: 0,
                    message: Msg::Ping,
                },
                Event {
                    id: EventId::new(1),
                    creation_time: SimTime::ZERO,
                    receive_time: SimTime::new(5.0),
                    sender: "a".into(),
                    sender_priority: 0,
                    receiver: "b".into(),
                    receiver_priority: 0,
                    message: Msg::Pong,
                },
            ];
            let mut handled = 0;
            obj.dispatch(ctx, frontier, &mut handled).unwrap();
            assert_eq!(handled, 2);
        });
        assert_eq!(obj.state.seen, 2);
    }

    #[test]
    fn test_user_error_is_wrapped_with_context() {
        let mut obj = SimObject::new(
            "b",
            Counter { seen: 0 },
            Behavior::<Counter, Msg>::new().on(PING, |_, _, _| Err("spring broke".into())),
        );
        with_context(|ctx| {
            let frontier = vec![Event {
                id: EventId::new(0),
                creation_time: SimTime::ZERO,
                receive_time: SimTime::new(5.0),
                sender: "a".into(),
                sender_priority: 0,
                receiver: "b".into(),
                receiver_priority: 0,
                message: Msg::Ping,
            }];
            let mut handled = 0;
            let err = obj.dispatch(ctx, frontier, &mut handled).unwrap_err();
            match err {
                SimError::UserHandler { object, variant, .. } => {
                    assert_eq!(object, "b");
                    assert_eq!(variant, Some(PING));
                }
                other => panic!("unexpected error: {other}"),
            }
        });
    }
}
