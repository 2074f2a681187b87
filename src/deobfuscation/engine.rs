//! Main deobfuscation engine.
//!
//! The [`DeobfuscationEngine`] is the main entry point for deobfuscating
//! JavaScript sources. It runs the registered techniques in rounds until the code
//! stops changing.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use log::{debug, info, warn};

use crate::deobfuscation::{
    config::EngineConfig,
    events::{EventKind, EventLog},
    registry::TechniqueRegistry,
    result::{DeobfuscationResult, RoundReport},
    technique::Technique,
    techniques::{GlyphTechnique, PunctuationTechnique, StringPoolTechnique},
};

/// Main deobfuscation engine.
///
/// The engine orchestrates the pipeline as an explicit fold over rounds:
///
/// 1. **Detection**: Ask every technique whether its encoding is present
/// 2. **Processing**: Feed the current code through each matching technique in order
/// 3. **Fixed point**: Stop after the first round in which nothing changed, or at
///    [`EngineConfig::max_rounds`]
///
/// A technique that returns an error or panics is logged and treated as a no-op for
/// that round. Nothing a technique does can abort the run, so the worst outcome is
/// the unchanged input.
///
/// # Example
///
/// ```rust
/// use jsdeob::deobfuscation::{DeobfuscationEngine, EngineConfig};
///
/// let engine = DeobfuscationEngine::new(EngineConfig::default());
/// let result = engine.deobfuscate("console.log('plain');");
/// assert_eq!(result.code, "console.log('plain');");
/// assert!(result.converged);
/// println!("{}", result.summary());
/// ```
pub struct DeobfuscationEngine {
    /// Configuration.
    config: EngineConfig,
    /// Techniques in execution order.
    registry: TechniqueRegistry,
}

impl Default for DeobfuscationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DeobfuscationEngine {
    /// Creates a new engine with the built-in techniques enabled by `config`.
    ///
    /// The string pool technique runs first, since unwinding it is most likely to
    /// expose further layers, followed by the glyph and punctuation detectors.
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration controlling round limits, techniques, etc.
    ///
    /// # Returns
    ///
    /// A new `DeobfuscationEngine` instance ready to process sources.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let mut registry = TechniqueRegistry::new();
        if config.enable_string_pool {
            registry.register(Arc::new(StringPoolTechnique::new(config.clone())));
        }
        if config.enable_glyph {
            registry.register(Arc::new(GlyphTechnique::new()));
        }
        if config.enable_punctuation {
            registry.register(Arc::new(PunctuationTechnique::new(
                config.punctuation_density,
            )));
        }
        Self { config, registry }
    }

    /// Creates an engine without any technique registered.
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration.
    #[must_use]
    pub fn empty(config: EngineConfig) -> Self {
        Self {
            config,
            registry: TechniqueRegistry::new(),
        }
    }

    /// Registers a technique after the existing ones.
    ///
    /// # Arguments
    ///
    /// * `technique` - The technique to register, wrapped in an `Arc` for shared ownership.
    pub fn register(&mut self, technique: Arc<dyn Technique>) {
        self.registry.register(technique);
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the registered techniques.
    #[must_use]
    pub fn registry(&self) -> &TechniqueRegistry {
        &self.registry
    }

    /// Runs the pipeline on one source text.
    ///
    /// # Arguments
    ///
    /// * `code` - The source to deobfuscate.
    ///
    /// # Returns
    ///
    /// A [`DeobfuscationResult`] with the final code, per-round reports and events.
    #[must_use]
    pub fn deobfuscate(&self, code: &str) -> DeobfuscationResult {
        let start = Instant::now();
        let mut events = EventLog::new();
        let mut rounds: Vec<RoundReport> = Vec::new();
        let mut converged = false;

        let mut current = code.to_string();
        for round in 1..=self.config.max_rounds {
            let (next, report) = self.run_round(round, current, &mut events);
            current = next;
            let changed = report.changed();
            debug!(
                "round {round}: detected {:?}, changed by {:?}",
                report.detected, report.changed_by
            );
            rounds.push(report);
            if !changed {
                converged = true;
                break;
            }
        }

        DeobfuscationResult {
            code: current,
            rounds,
            converged,
            events,
            total_time: start.elapsed(),
        }
    }

    /// Applies every matching technique once, in order.
    fn run_round(&self, round: usize, code: String, events: &mut EventLog) -> (String, RoundReport) {
        let mut report = RoundReport {
            round,
            detected: Vec::new(),
            changed_by: Vec::new(),
            failed: Vec::new(),
        };

        let mut current = code;
        for technique in self.registry.iter() {
            let id = technique.id();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if !technique.detect(&current) {
                    return Ok(None);
                }
                let mut local = EventLog::new();
                technique
                    .process(&current, &mut local)
                    .map(|output| Some((output, local)))
            }));

            match outcome {
                Ok(Ok(None)) => {}
                Ok(Ok(Some((output, local)))) => {
                    report.detected.push(id);
                    events.merge(local);
                    if output != current {
                        info!("{} changed the code in round {round}", technique.name());
                        report.changed_by.push(id);
                        current = output;
                    }
                }
                Ok(Err(error)) => {
                    report.detected.push(id);
                    report.failed.push(id);
                    warn!("technique '{id}' failed: {error}");
                    events.record(id, EventKind::TechniqueFailed, error.to_string());
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    report.failed.push(id);
                    warn!("technique '{id}' panicked: {message}");
                    events.record(id, EventKind::TechniqueFailed, message);
                }
            }
        }
        (current, report)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
