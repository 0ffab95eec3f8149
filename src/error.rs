//! Structured error types for the simulation kernel.
//!
//! All fallible public APIs return `Result<T, SimError>`. Scheduling
//! errors are raised synchronously from the `send_event` path and abort
//! the enclosing handler; dispatch-time errors abort the run and are
//! reported in the run summary's termination reason.

use thiserror::Error;

use crate::message::MessageVariant;
use crate::time::SimTime;

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Error type returned from user handler code.
///
/// Scheduling errors (`SimError`) propagate through it transparently
/// via `?`; any other error is wrapped as [`SimError::UserHandler`]
/// when the dispatcher surfaces it.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The top-level error type for the simulation kernel.
#[derive(Debug, Error)]
pub enum SimError {
    // ── Registration errors ───────────────────────────────

    /// Attempted to register an object under a name already in use.
    #[error("cannot add object '{0}', name already in use")]
    DuplicateObjectName(String),

    /// An object name was referenced but is not registered.
    #[error("no object named '{0}' is registered")]
    UnknownObject(String),

    /// A behavior registered two handlers for the same variant.
    #[error("duplicate handler registration for '{variant}' messages")]
    DuplicateHandler { variant: MessageVariant },

    /// Attempted to remove an object while a run cycle is active.
    #[error("cannot remove object '{0}' between initialize and reset")]
    ObjectInUse(String),

    // ── Scheduling errors ─────────────────────────────────

    /// `send_event` named a receiver that does not exist.
    #[error("unknown receiver '{0}'")]
    UnknownReceiver(String),

    /// An object sent a variant missing from its declared send-list.
    #[error("'{sender}' is not declared to send '{variant}' messages")]
    UndeclaredSentVariant {
        sender: String,
        variant: MessageVariant,
    },

    /// The receiver cannot handle the variant being sent to it.
    #[error("'{receiver}' has no handler for '{variant}' messages")]
    NoHandlerForVariant {
        receiver: String,
        variant: MessageVariant,
    },

    /// `send_event` was called with a negative delay.
    #[error("negative delay ({delay}) in send_event")]
    NegativeDelay { delay: f64 },

    /// Attempted to schedule an event before the current time.
    #[error("cannot schedule an event at {requested} when the current time is {now}")]
    PastScheduling { now: SimTime, requested: SimTime },

    /// A time or delay argument was NaN.
    #[error("time value is NaN")]
    TimeNotANumber,

    // ── Lifecycle errors ──────────────────────────────────

    /// `run` was called before `initialize`.
    #[error("simulator has not been initialized")]
    NotInitialized,

    /// `run` was re-entered while a run is in progress.
    #[error("simulator is already running")]
    AlreadyRunning,

    /// A restored heap snapshot contained an event in the past.
    #[error("snapshot event at {requested} is earlier than the current time {now}")]
    StaleSnapshot { now: SimTime, requested: SimTime },

    // ── User code errors ──────────────────────────────────

    /// An error raised by user handler code; the run aborts and the
    /// cause is attached.
    #[error("handler on '{object}' failed{ctx}: {source}", ctx = variant_suffix(.variant))]
    UserHandler {
        object: String,
        variant: Option<MessageVariant>,
        #[source]
        source: HandlerError,
    },
}

fn variant_suffix(variant: &Option<MessageVariant>) -> String {
    match variant {
        Some(v) => format!(" handling '{v}'"),
        None => String::new(),
    }
}

impl SimError {
    /// Convert an error escaping a user handler into a `SimError`.
    ///
    /// Kernel errors (e.g. a scheduling violation propagated with `?`)
    /// pass through unwrapped so they keep their original tag; anything
    /// else is wrapped as [`SimError::UserHandler`].
    pub(crate) fn from_handler(
        object: &str,
        variant: Option<MessageVariant>,
        error: HandlerError,
    ) -> SimError {
        match error.downcast::<SimError>() {
            Ok(sim) => *sim,
            Err(other) => SimError::UserHandler {
                object: object.to_string(),
                variant,
                source: other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_duplicate_name() {
        let e = SimError::DuplicateObjectName("clock".into());
        assert_eq!(e.to_string(), "cannot add object 'clock', name already in use");
    }

    #[test]
    fn test_display_past_scheduling() {
        let e = SimError::PastScheduling {
            now: SimTime::new(10.0),
            requested: SimTime::new(3.0),
        };
        assert!(e.to_string().contains("T=3"));
        assert!(e.to_string().contains("T=10"));
    }

    #[test]
    fn test_display_undeclared_variant() {
        let e = SimError::UndeclaredSentVariant {
            sender: "a".into(),
            variant: MessageVariant::new("X"),
        };
        assert_eq!(e.to_string(), "'a' is not declared to send 'X' messages");
    }

    #[test]
    fn test_from_handler_passes_sim_errors_through() {
        let inner: HandlerError = Box::new(SimError::NegativeDelay { delay: -1.0 });
        let e = SimError::from_handler("a", None, inner);
        assert!(matches!(e, SimError::NegativeDelay { .. }));
    }

    #[test]
    fn test_from_handler_wraps_foreign_errors() {
        let inner: HandlerError = "model ran out of fuel".into();
        let e = SimError::from_handler("tank", Some(MessageVariant::new("Burn")), inner);
        match &e {
            SimError::UserHandler { object, variant, .. } => {
                assert_eq!(object, "tank");
                assert_eq!(*variant, Some(MessageVariant::new("Burn")));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(e.to_string().contains("ran out of fuel"));
    }

    #[test]
    fn test_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(SimError::NotInitialized);
        assert!(!e.to_string().is_empty());
    }
}
