//! The technique contract.

use crate::{deobfuscation::events::EventLog, Result};

/// A single deobfuscation technique.
///
/// Each technique provides a cheap, side-effect-free detection heuristic and a
/// transformation over the whole source text. The engine applies every registered
/// technique once per round and never inspects the concrete type.
///
/// # Implementing a Technique
///
/// To add support for a new encoding:
///
/// 1. Create a new module under `techniques/`
/// 2. Implement the `Technique` trait
/// 3. Register with the engine via `DeobfuscationEngine::register()`
///
/// `process` must return its input unchanged when the encoding is absent or when an
/// expected failure (unparsable input, sandbox error) occurs. Returning `Err` is
/// reserved for unexpected failures; the engine logs those and treats the technique
/// as a no-op for the round.
///
/// # Example
///
/// ```rust
/// use jsdeob::{deobfuscation::{EventLog, Technique}, Result};
///
/// struct StripBom;
///
/// impl Technique for StripBom {
///     fn id(&self) -> &'static str { "strip_bom" }
///     fn name(&self) -> &'static str { "Byte order mark" }
///
///     fn detect(&self, code: &str) -> bool {
///         code.starts_with('\u{feff}')
///     }
///
///     fn process(&self, code: &str, _events: &mut EventLog) -> Result<String> {
///         Ok(code.trim_start_matches('\u{feff}').to_string())
///     }
/// }
/// ```
pub trait Technique: Send + Sync {
    /// Unique identifier (e.g., `"string_pool"`).
    ///
    /// Used in logs and event records. It should be lowercase, alphanumeric, and
    /// use underscores for separation.
    fn id(&self) -> &'static str;

    /// Human-readable name used in reports.
    fn name(&self) -> &'static str;

    /// Returns `true` if the code looks like it carries this encoding.
    ///
    /// # Arguments
    ///
    /// * `code` - The current source text.
    fn detect(&self, code: &str) -> bool;

    /// Transforms the code.
    ///
    /// # Arguments
    ///
    /// * `code` - The current source text.
    /// * `events` - Event log for recording activity.
    ///
    /// # Returns
    ///
    /// The transformed text, or `code` unchanged if nothing applies.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected internal failures.
    fn process(&self, code: &str, events: &mut EventLog) -> Result<String>;

    /// Description of what this technique handles.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
