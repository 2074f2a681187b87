use jsdeob::deobfuscation::{DeobfuscationResult, EventKind};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
    } else {
        display_fn(data);
    }
    Ok(())
}

/// Per-file entry of the JSON report.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub output: Option<String>,
    pub changed: bool,
    pub converged: bool,
    pub rounds: usize,
    pub time_ms: u128,
    pub stats: StatsReport,
    pub events: Vec<EventReport>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct StatsReport {
    pub pools_found: usize,
    pub decoders_validated: usize,
    pub sites_rewritten: usize,
    pub sites_skipped: usize,
    pub idioms_normalized: usize,
    pub sandbox_failures: usize,
    pub technique_failures: usize,
}

#[derive(Debug, Serialize)]
pub struct EventReport {
    pub technique: &'static str,
    pub kind: String,
    pub message: String,
}

impl FileReport {
    /// Report for a file that went through the engine.
    pub fn decoded(file: String, output: String, result: &DeobfuscationResult) -> Self {
        let events = &result.events;
        Self {
            file,
            output: Some(output),
            changed: result.changed(),
            converged: result.converged,
            rounds: result.rounds.len(),
            time_ms: result.total_time.as_millis(),
            stats: StatsReport {
                pools_found: events.count(EventKind::PoolFound),
                decoders_validated: events.count(EventKind::DecoderValidated),
                sites_rewritten: events.count(EventKind::SiteRewritten),
                sites_skipped: events.skipped(),
                idioms_normalized: events.count(EventKind::IdiomNormalized),
                sandbox_failures: events.count(EventKind::SandboxFailure),
                technique_failures: events.count(EventKind::TechniqueFailed),
            },
            events: events
                .iter()
                .map(|event| EventReport {
                    technique: event.technique,
                    kind: event.kind.to_string(),
                    message: event.message.clone(),
                })
                .collect(),
            error: None,
        }
    }

    /// Report for a file that could not be read or written.
    pub fn failed(file: String, error: &anyhow::Error) -> Self {
        Self {
            file,
            output: None,
            changed: false,
            converged: false,
            rounds: 0,
            time_ms: 0,
            stats: StatsReport::default(),
            events: Vec::new(),
            error: Some(format!("{error:#}")),
        }
    }
}
