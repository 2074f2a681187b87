//! String pool with index decoders (jsjiami v7 style).
//!
//! The obfuscator moves every string literal into one array and replaces each use
//! with a call like `_0x1f2e(0x1a3, 'kX$2')`. The decoder usually rotates the array
//! at startup, subtracts an offset from the index and decrypts the entry with the
//! key. Rather than reimplementing any of that, this technique runs the setup code
//! in a [`crate::sandbox::Sandbox`] and asks the live decoder for each string.
//!
//! # Stages
//!
//! 1. **Detection**: [`crate::analysis::Detector`] finds pools and reader functions
//! 2. **Prelude**: [`crate::analysis::Prelude`] collects the statements the decoders
//!    depend on
//! 3. **Validation**: each candidate is tried in a throwaway sandbox and kept only
//!    if it returns strings
//! 4. **Rewriting**: eligible call sites outside the prelude are folded and replaced
//!    with the live decoder's output
//! 5. **Cleanup**: optional boolean idiom normalisation and marker removal
//!
//! Any failure along the way (unparseable input, a prelude that throws, a timeout)
//! leaves the input untouched.

mod cleanup;
mod rewriter;
mod validator;

pub use validator::ValidatedDecoder;

use log::{debug, info, warn};

use crate::{
    analysis::{Detection, Detector, Prelude},
    deobfuscation::{
        config::EngineConfig,
        events::{EventKind, EventLog},
        technique::Technique,
    },
    js::{parse, Program},
    sandbox::Sandbox,
    Error, Result,
};

/// Identifier of the string pool technique.
pub(crate) const TECHNIQUE_ID: &str = "string_pool";

/// Resolves decoder calls against a string pool.
///
/// # Example
///
/// ```rust
/// use jsdeob::deobfuscation::{EngineConfig, EventLog, StringPoolTechnique, Technique};
///
/// let source = "var p = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
///               function d(i) { return p[i - 2]; }\n\
///               console.log(d(3));";
/// let technique = StringPoolTechnique::new(EngineConfig::default());
/// assert!(technique.detect(source));
///
/// let mut events = EventLog::new();
/// let output = technique.process(source, &mut events)?;
/// assert!(output.ends_with("console.log('b');"));
/// # Ok::<(), jsdeob::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct StringPoolTechnique {
    config: EngineConfig,
}

impl StringPoolTechnique {
    /// Creates the technique.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the pool threshold, trial indices, sandbox limits and cleanup
    ///   options.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Detects pools and readers, failing if either is missing.
    fn detection(&self, program: &Program) -> Result<Detection> {
        let detection = Detector::new(program, self.config.min_pool_size).detect();
        if detection.pools.is_empty() {
            return Err(Error::PatternNotFound("string pool"));
        }
        if detection.decoders.is_empty() {
            return Err(Error::PatternNotFound("pool reader"));
        }
        Ok(detection)
    }

    /// Runs validation, rewriting and cleanup on a parsed program.
    ///
    /// Returns `None` if nothing was changed or the run had to be abandoned.
    fn transform(
        &self,
        program: &mut Program,
        detection: &Detection,
        events: &mut EventLog,
    ) -> Option<usize> {
        for pool in &detection.pools {
            events.record(
                TECHNIQUE_ID,
                EventKind::PoolFound,
                format!("{} ({} strings)", pool.name, pool.values.len()),
            );
        }
        for candidate in &detection.decoders {
            events.record(
                TECHNIQUE_ID,
                EventKind::DecoderCandidate,
                format!("{}({})", candidate.name, candidate.params.join(", ")),
            );
        }

        let prelude = Prelude::build(program, &detection.tracked_names());
        debug!(
            "prelude holds {} of {} statements",
            prelude.statements().len(),
            program.statements().len()
        );

        let sites = validator::site_indices(
            program,
            &prelude,
            &detection.decoders,
            self.config.trial_call_sites,
        );
        let decoders = match validator::validate(
            prelude.source(),
            &detection.decoders,
            &sites,
            &self.config,
            events,
        ) {
            Ok(decoders) => decoders,
            Err(error) => {
                warn!("string pool prelude could not be evaluated: {error}");
                events.record(TECHNIQUE_ID, EventKind::SandboxFailure, error.to_string());
                return None;
            }
        };
        if decoders.is_empty() {
            debug!("no decoder candidate survived validation");
            return None;
        }

        // Rewrite events are kept only if the whole pass completes.
        let mut local = EventLog::new();
        let rewritten = Sandbox::launch(prelude.source(), &self.config.sandbox).and_then(
            |mut sandbox| rewriter::rewrite(program, &prelude, &decoders, &mut sandbox, &mut local),
        );
        let rewritten = match rewritten {
            Ok(count) => count,
            Err(error) => {
                warn!("string pool rewrite abandoned: {error}");
                events.record(TECHNIQUE_ID, EventKind::SandboxFailure, error.to_string());
                return None;
            }
        };
        events.merge(local);

        let cleanup = &self.config.cleanup;
        if cleanup.normalize_boolean_idioms {
            cleanup::normalize_boolean_idioms(program, &prelude, events);
        }
        if cleanup.strip_version_marker {
            cleanup::strip_version_marker(program, events);
        }

        program.has_edits().then_some(rewritten)
    }
}

impl Technique for StringPoolTechnique {
    fn id(&self) -> &'static str {
        TECHNIQUE_ID
    }

    fn name(&self) -> &'static str {
        "String pool"
    }

    fn detect(&self, code: &str) -> bool {
        parse(code).is_ok_and(|program| self.detection(&program).is_ok())
    }

    fn process(&self, code: &str, events: &mut EventLog) -> Result<String> {
        let mut program = match parse(code) {
            Ok(program) => program,
            Err(error) => {
                debug!("input is not parseable, leaving it unchanged: {error}");
                return Ok(code.to_string());
            }
        };

        let detection = match self.detection(&program) {
            Ok(detection) => detection,
            Err(error) => {
                debug!("{error}");
                return Ok(code.to_string());
            }
        };

        match self.transform(&mut program, &detection, events) {
            Some(rewritten) => {
                info!(
                    "decoded {rewritten} call sites through {} decoder candidates",
                    detection.decoders.len()
                );
                Ok(program.render())
            }
            None => Ok(code.to_string()),
        }
    }

    fn description(&self) -> &'static str {
        "Replaces string pool decoder calls with the strings they return"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscation::{config::CleanupConfig, events::SkipReason};

    const SOURCE: &str = "var encode_version = 'jsjiami.com.v7';\n\
                          var p = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
                          function d(i) { return p[i - 2]; }\n\
                          var flag = !![];\n\
                          console.log(d(2), d(7), d(100), flag);";

    fn technique() -> StringPoolTechnique {
        StringPoolTechnique::new(EngineConfig::default())
    }

    #[test]
    fn test_detect() {
        assert!(technique().detect(SOURCE));
        assert!(!technique().detect("var x = ['a', 'b'];"));
        assert!(!technique().detect("var = ;"));
    }

    #[test]
    fn test_process_rewrites_and_cleans_up() -> Result<()> {
        let mut events = EventLog::new();
        let output = technique().process(SOURCE, &mut events)?;
        assert_eq!(
            output,
            "\n\
             var p = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
             function d(i) { return p[i - 2]; }\n\
             var flag = true;\n\
             console.log('a', 'f', d(100), flag);"
        );
        assert_eq!(events.count(EventKind::PoolFound), 1);
        assert_eq!(events.count(EventKind::DecoderValidated), 1);
        assert_eq!(events.count(EventKind::SiteRewritten), 2);
        assert_eq!(
            events.count(EventKind::SiteSkipped(SkipReason::NonString)),
            1
        );
        assert_eq!(events.count(EventKind::MarkerRemoved), 1);
        Ok(())
    }

    #[test]
    fn test_process_without_cleanup() -> Result<()> {
        let config = EngineConfig::default().with_cleanup(CleanupConfig::disabled());
        let mut events = EventLog::new();
        let output = StringPoolTechnique::new(config).process(SOURCE, &mut events)?;
        assert!(output.starts_with("var encode_version = 'jsjiami.com.v7';"));
        assert!(output.contains("var flag = !![];"));
        assert!(output.ends_with("console.log('a', 'f', d(100), flag);"));
        Ok(())
    }

    #[test]
    fn test_second_run_is_identity() -> Result<()> {
        let mut events = EventLog::new();
        let first = technique().process(SOURCE, &mut events)?;
        let second = technique().process(&first, &mut events)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_throwing_prelude_leaves_input() -> Result<()> {
        let source = "var p = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
                      p.forEach(function () { throw new Error('tamper'); });\n\
                      function d(i) { return p[i]; }\n\
                      var x = d(1);";
        let mut events = EventLog::new();
        let output = technique().process(source, &mut events)?;
        assert_eq!(output, source);
        assert_eq!(events.count(EventKind::SandboxFailure), 1);
        assert_eq!(events.count(EventKind::SiteRewritten), 0);
        Ok(())
    }

    #[test]
    fn test_unparseable_input_is_returned() -> Result<()> {
        let source = "var p = ['a', 'b', 'c', 'd', 'e', 'f'; function d(";
        let mut events = EventLog::new();
        assert_eq!(technique().process(source, &mut events)?, source);
        assert!(events.is_empty());
        Ok(())
    }
}
