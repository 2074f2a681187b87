//! Event log for deobfuscation activity.
//!
//! Techniques record what they found and what they changed into an [`EventLog`].
//! The engine keeps one log per run and exposes it through
//! [`crate::deobfuscation::DeobfuscationResult`].

use std::fmt;

use strum::{AsRefStr, Display};

/// Why a call site was left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// An argument could not be folded to a constant.
    UnresolvedArgument,
    /// The decoder name is rebound in an enclosing scope.
    Shadowed,
    /// The live decoder returned something other than a string.
    NonString,
    /// The live decoder threw.
    Threw,
    /// The call shape is not supported (spread arguments, optional call, arity).
    Unsupported,
}

/// Category of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// A string pool was detected.
    PoolFound,
    /// A reader function was detected.
    DecoderCandidate,
    /// A candidate returned a string on a trial call.
    DecoderValidated,
    /// A candidate was tried and rejected.
    DecoderRejected,
    /// A call site was replaced by a literal.
    SiteRewritten,
    /// A call site was left unchanged.
    SiteSkipped(SkipReason),
    /// Prelude evaluation or a decoder call failed in the sandbox.
    SandboxFailure,
    /// A technique recognised an encoding it does not decode.
    EncodingDetected,
    /// A boolean idiom was replaced.
    IdiomNormalized,
    /// The obfuscator's version marker was removed.
    MarkerRemoved,
    /// A technique failed and was skipped for the round.
    TechniqueFailed,
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Identifier of the technique that recorded the event.
    pub technique: &'static str,
    /// What happened.
    pub kind: EventKind,
    /// Free-form detail, usually a name or an excerpt.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.technique, self.kind, self.message)
    }
}

/// Ordered collection of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    ///
    /// # Arguments
    ///
    /// * `technique` - Identifier of the recording technique.
    /// * `kind` - Event category.
    /// * `message` - Detail text.
    pub fn record(&mut self, technique: &'static str, kind: EventKind, message: impl Into<String>) {
        self.events.push(Event {
            technique,
            kind,
            message: message.into(),
        });
    }

    /// Moves all events of `other` to the end of this log.
    pub fn merge(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Number of events of the given kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|event| event.kind == kind).count()
    }

    /// Number of skipped call sites, regardless of reason.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event.kind, EventKind::SiteSkipped(_)))
            .count()
    }

    /// Iterates over all events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut log = EventLog::new();
        log.record("string_pool", EventKind::PoolFound, "_0x1a2b");
        log.record("string_pool", EventKind::SiteRewritten, "d(1)");
        log.record("string_pool", EventKind::SiteRewritten, "d(2)");
        log.record(
            "string_pool",
            EventKind::SiteSkipped(SkipReason::Shadowed),
            "d(x)",
        );

        let mut other = EventLog::new();
        other.record("aaencode", EventKind::EncodingDetected, "glyph encoding");
        log.merge(other);

        assert_eq!(log.len(), 5);
        assert_eq!(log.count(EventKind::SiteRewritten), 2);
        assert_eq!(log.skipped(), 1);
        assert_eq!(log.iter().last().map(|e| e.technique), Some("aaencode"));
    }

    #[test]
    fn test_display() {
        let event = Event {
            technique: "string_pool",
            kind: EventKind::SiteSkipped(SkipReason::UnresolvedArgument),
            message: "d(x)".into(),
        };
        assert_eq!(event.to_string(), "[string_pool] site_skipped: d(x)");
        assert_eq!(SkipReason::UnresolvedArgument.as_ref(), "unresolved_argument");
    }
}
