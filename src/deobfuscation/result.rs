//! Outcome of a deobfuscation run.

use std::time::Duration;

use crate::deobfuscation::events::{EventKind, EventLog};

/// What happened in one pipeline round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    /// One-based round number.
    pub round: usize,
    /// Ids of the techniques whose heuristic matched the round's input.
    pub detected: Vec<&'static str>,
    /// Ids of the techniques whose output differed from their input.
    pub changed_by: Vec<&'static str>,
    /// Ids of the techniques that failed and were skipped.
    pub failed: Vec<&'static str>,
}

impl RoundReport {
    /// Returns `true` if any technique changed the code.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.changed_by.is_empty()
    }
}

/// Result of [`crate::deobfuscation::DeobfuscationEngine::deobfuscate`].
#[derive(Debug, Clone)]
pub struct DeobfuscationResult {
    /// The final source text.
    pub code: String,
    /// One report per executed round.
    pub rounds: Vec<RoundReport>,
    /// `true` if the last round changed nothing.
    pub converged: bool,
    /// Everything the techniques recorded.
    pub events: EventLog,
    /// Wall-clock time of the whole run.
    pub total_time: Duration,
}

impl DeobfuscationResult {
    /// Returns `true` if any round changed the code.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.rounds.iter().any(RoundReport::changed)
    }

    /// One-line summary of the run.
    ///
    /// Returns `"No changes"` if nothing was rewritten.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        let rewritten = self.events.count(EventKind::SiteRewritten);
        if rewritten > 0 {
            parts.push(format!("{rewritten} call sites decoded"));
        }
        let skipped = self.events.skipped();
        if skipped > 0 {
            parts.push(format!("{skipped} skipped"));
        }
        let validated = self.events.count(EventKind::DecoderValidated);
        if validated > 0 {
            parts.push(format!("{validated} decoders"));
        }
        let idioms = self.events.count(EventKind::IdiomNormalized);
        if idioms > 0 {
            parts.push(format!("{idioms} idioms normalized"));
        }
        let failures = self.events.count(EventKind::TechniqueFailed)
            + self.events.count(EventKind::SandboxFailure);
        if failures > 0 {
            parts.push(format!("{failures} failures"));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            format!(
                "{} in {} round{} ({:.2?}{})",
                parts.join(", "),
                self.rounds.len(),
                if self.rounds.len() == 1 { "" } else { "s" },
                self.total_time,
                if self.converged { "" } else { ", round cap reached" }
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(round: usize, changed_by: Vec<&'static str>) -> RoundReport {
        RoundReport {
            round,
            detected: changed_by.clone(),
            changed_by,
            failed: Vec::new(),
        }
    }

    #[test]
    fn test_summary_without_changes() {
        let result = DeobfuscationResult {
            code: String::new(),
            rounds: vec![report(1, vec![])],
            converged: true,
            events: EventLog::new(),
            total_time: Duration::from_millis(3),
        };
        assert!(!result.changed());
        assert_eq!(result.summary(), "No changes");
    }

    #[test]
    fn test_summary_with_rewrites() {
        let mut events = EventLog::new();
        events.record("string_pool", EventKind::DecoderValidated, "d");
        events.record("string_pool", EventKind::SiteRewritten, "d(1)");
        events.record("string_pool", EventKind::SiteRewritten, "d(2)");
        let result = DeobfuscationResult {
            code: String::new(),
            rounds: vec![report(1, vec!["string_pool"]), report(2, vec![])],
            converged: true,
            events,
            total_time: Duration::from_millis(3),
        };
        assert!(result.changed());
        let summary = result.summary();
        assert!(summary.starts_with("2 call sites decoded, 1 decoders in 2 rounds"));
        assert!(!summary.contains("round cap"));
    }
}
