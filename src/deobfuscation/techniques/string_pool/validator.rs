//! Empirical validation of decoder candidates.
//!
//! A candidate is kept if its live function returns a string for at least one trial call.
//! The trial set covers small indices and byte-sized boundaries, which is enough to
//! hit the valid range of most decoders without knowing their offset or key scheme.
//! Indices taken from the script's own call sites cover the rest.

use std::collections::HashMap;

use log::debug;

use crate::{
    analysis::{ConstEvaluator, DecoderCandidate, Prelude, StaticValue},
    deobfuscation::{
        config::EngineConfig,
        events::{EventKind, EventLog},
    },
    js::{Node, Program},
    sandbox::Sandbox,
    Result,
};

use super::TECHNIQUE_ID;

/// A decoder confirmed to produce strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDecoder {
    /// Name the decoder is bound to.
    pub name: String,
    /// Number of declared parameters.
    pub param_count: usize,
    /// The decoder can be called with the index alone: it declares exactly one
    /// parameter and never reads `arguments`.
    pub accepts_single: bool,
}

/// Collects the folded first argument of up to `limit` calls per candidate.
///
/// Only calls outside the prelude are considered, in source order.
pub(crate) fn site_indices(
    program: &Program,
    prelude: &Prelude,
    candidates: &[DecoderCandidate],
    limit: usize,
) -> HashMap<String, Vec<f64>> {
    let mut sites: HashMap<String, Vec<f64>> = HashMap::new();
    if limit == 0 {
        return sites;
    }
    let evaluator = ConstEvaluator::new(program);
    for statement in program.statements() {
        if prelude.contains(*statement) {
            continue;
        }
        for id in program.pre_order(*statement) {
            let Node::Call { callee, args, .. } = program.node(id) else {
                continue;
            };
            let Some(name) = program.node(*callee).as_ident() else {
                continue;
            };
            if !candidates.iter().any(|candidate| candidate.name == name) {
                continue;
            }
            let Some(index) = args.first().and_then(|arg| evaluator.evaluate_index(*arg)) else {
                continue;
            };
            let indices = sites.entry(name.to_string()).or_default();
            if indices.len() < limit && !indices.contains(&index) {
                indices.push(index);
            }
        }
    }
    sites
}

/// Tries every candidate in a throwaway sandbox running `prelude`.
///
/// # Arguments
///
/// * `prelude` - Executable prelude text.
/// * `candidates` - Decoder candidates from the detector.
/// * `sites` - Extra trial indices per candidate name, see [`site_indices`].
/// * `config` - Trial indices, trial key and sandbox limits.
/// * `events` - Event log for recording results.
///
/// # Errors
///
/// Returns sandbox errors: the prelude threw, or evaluation or a trial call timed out.
pub(crate) fn validate(
    prelude: &str,
    candidates: &[DecoderCandidate],
    sites: &HashMap<String, Vec<f64>>,
    config: &EngineConfig,
    events: &mut EventLog,
) -> Result<Vec<ValidatedDecoder>> {
    let mut sandbox = Sandbox::launch(prelude, &config.sandbox)?;
    let mut validated: Vec<ValidatedDecoder> = Vec::new();

    for candidate in candidates {
        if validated.iter().any(|decoder| decoder.name == candidate.name) {
            continue;
        }
        let live = sandbox.inspect(&candidate.name)?;
        if !live.is_function() {
            debug!("{} is {} in the sandbox", candidate.name, live.type_name());
            events.record(
                TECHNIQUE_ID,
                EventKind::DecoderRejected,
                format!("{} is not callable ({})", candidate.name, live.type_name()),
            );
            continue;
        }

        let extra = sites.get(&candidate.name).map_or(&[][..], Vec::as_slice);
        if try_candidate(&mut sandbox, candidate, extra, config)? {
            debug!("validated decoder {}", candidate.name);
            events.record(TECHNIQUE_ID, EventKind::DecoderValidated, &candidate.name);
            validated.push(ValidatedDecoder {
                name: candidate.name.clone(),
                param_count: candidate.param_count(),
                accepts_single: candidate.param_count() == 1 && !candidate.uses_arguments,
            });
        } else {
            events.record(
                TECHNIQUE_ID,
                EventKind::DecoderRejected,
                format!("{} returned no string for any trial index", candidate.name),
            );
        }
    }
    Ok(validated)
}

fn try_candidate(
    sandbox: &mut Sandbox,
    candidate: &DecoderCandidate,
    extra: &[f64],
    config: &EngineConfig,
) -> Result<bool> {
    let keyed = candidate.param_count() >= 2;
    for index in config.trial_indices.iter().chain(extra) {
        let index = StaticValue::Number(*index);
        if sandbox
            .call(&candidate.name, std::slice::from_ref(&index))?
            .as_str()
            .is_some()
        {
            return Ok(true);
        }
        if keyed {
            let args = [index, StaticValue::Str(config.trial_key.clone())];
            if sandbox.call(&candidate.name, &args)?.as_str().is_some() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
