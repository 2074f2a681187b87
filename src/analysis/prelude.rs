//! Extraction of the reconstructive prelude.
//!
//! The decoder only produces correct values after the statements that build and
//! rotate its pool have run. The [`Prelude`] is the ordered subset of top-level
//! statements that reference a tracked pool name, prefixed by a header that clears
//! host-sensitive globals before any obfuscator code executes.

use crate::js::{NodeId, Program};

/// Globals removed from every object a prelude could reach them through.
pub const DENIED_GLOBALS: &[&str] = &[
    "process",
    "require",
    "module",
    "exports",
    "global",
    "Buffer",
    "setTimeout",
    "setInterval",
    "setImmediate",
    "clearTimeout",
    "clearInterval",
    "queueMicrotask",
];

/// Builds the header executed ahead of the extracted statements.
///
/// It reaches the global object through indirect `eval` (the same trick obfuscators
/// use to escape strict wrappers) and through `globalThis`, and overwrites every
/// [`DENIED_GLOBALS`] entry with `undefined`. Failures are swallowed so a frozen
/// binding cannot abort the prelude.
#[must_use]
pub fn header() -> String {
    let names = DENIED_GLOBALS
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "(function () {{\n\
         \x20 var targets = [];\n\
         \x20 try {{ targets.push((0, eval)('this')); }} catch (e) {{}}\n\
         \x20 try {{ targets.push(globalThis); }} catch (e) {{}}\n\
         \x20 var names = [{names}];\n\
         \x20 for (var i = 0; i < targets.length; i++) {{\n\
         \x20   for (var j = 0; j < names.length; j++) {{\n\
         \x20     try {{ targets[i][names[j]] = undefined; }} catch (e) {{}}\n\
         \x20   }}\n\
         \x20 }}\n\
         }})();\n"
    )
}

/// The ordered top-level statements needed to materialise live decoders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prelude {
    statements: Vec<NodeId>,
    source: String,
}

impl Prelude {
    /// Collects every top-level statement that references one of `tracked`.
    ///
    /// # Arguments
    ///
    /// * `program` - The parsed program.
    /// * `tracked` - Pool and provider names.
    #[must_use]
    pub fn build<S: AsRef<str>>(program: &Program, tracked: &[S]) -> Self {
        let statements: Vec<NodeId> = program
            .statements()
            .iter()
            .copied()
            .filter(|statement| program.mentions(*statement, tracked))
            .collect();

        let mut source = header();
        for statement in &statements {
            source.push_str(program.text(*statement));
            source.push_str(";\n");
        }
        Self { statements, source }
    }

    /// Statement ids in source order.
    #[must_use]
    pub fn statements(&self) -> &[NodeId] {
        &self.statements
    }

    /// Returns `true` if the top-level statement is part of the prelude.
    #[must_use]
    pub fn contains(&self, statement: NodeId) -> bool {
        self.statements.contains(&statement)
    }

    /// The executable text: header followed by each statement.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if no statement was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
