//! Message typing for events.
//!
//! Every event carries a user-defined message; the message's *variant*
//! decides which handler runs at the receiver. A simulation picks one
//! message type `M: EventMessage` — typically an enum with one arm per
//! variant — and the whole kernel is generic over it.

/// The discriminant of a message variant.
///
/// A cheap, `Copy`, totally ordered tag used as the key of handler
/// tables and as the subject of send-list validation. Variants compare
/// by name, which keeps dispatch order independent of declaration
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageVariant(&'static str);

impl MessageVariant {
    /// Declare a variant tag.
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        MessageVariant(name)
    }

    /// The variant's name.
    #[inline]
    pub fn name(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for MessageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Trait implemented by a simulation's message type.
///
/// The kernel never inspects payload fields; it only asks each value
/// for its variant tag to route it. Payloads are moved from sender to
/// receiver — if a sender needs to keep a copy, it clones explicitly
/// before sending.
///
/// # Example
///
/// ```rust
/// use chronon::{EventMessage, MessageVariant};
///
/// enum Traffic {
///     Request { bytes: u64 },
///     Response,
/// }
///
/// impl EventMessage for Traffic {
///     fn variant(&self) -> MessageVariant {
///         match self {
///             Traffic::Request { .. } => MessageVariant::new("Request"),
///             Traffic::Response => MessageVariant::new("Response"),
///         }
///     }
/// }
/// ```
pub trait EventMessage {
    /// The variant tag of this message value.
    fn variant(&self) -> MessageVariant;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_equality() {
        assert_eq!(MessageVariant::new("Ping"), MessageVariant::new("Ping"));
        assert_ne!(MessageVariant::new("Ping"), MessageVariant::new("Pong"));
    }

    #[test]
    fn test_variant_orders_by_name() {
        let a = MessageVariant::new("Ack");
        let b = MessageVariant::new("Ping");
        assert!(a < b);
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(format!("{}", MessageVariant::new("Ping")), "Ping");
    }

    #[test]
    fn test_enum_message_reports_variant() {
        enum Msg {
            Ping,
            Data(u8),
        }
        impl EventMessage for Msg {
            fn variant(&self) -> MessageVariant {
                match self {
                    Msg::Ping => MessageVariant::new("Ping"),
                    Msg::Data(_) => MessageVariant::new("Data"),
                }
            }
        }

        assert_eq!(Msg::Ping.variant().name(), "Ping");
        assert_eq!(Msg::Data(7).variant().name(), "Data");
    }
}
