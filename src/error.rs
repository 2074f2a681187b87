use std::time::Duration;

use thiserror::Error;

macro_rules! syntax_error {
    // Single string version
    ($offset:expr, $msg:expr) => {
        crate::Error::Syntax {
            message: $msg.to_string(),
            offset: $offset,
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($offset:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::Syntax {
            message: format!($fmt, $($arg)*),
            offset: $offset,
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every error this library can return.
///
/// All failures are local to one file: the deobfuscation engine absorbs errors raised by
/// a technique and treats that technique as a no-op, so the worst outcome of any
/// variant below is "the input was returned unchanged".
///
/// # Error Categories
///
/// ## Parsing
/// - [`Error::Syntax`] - The input is not valid JavaScript
/// - [`Error::RecursionLimit`] - Nesting exceeded the parser depth limit
///
/// ## Detection
/// - [`Error::PatternNotFound`] - The structural pattern a technique needs is absent
///
/// ## Sandbox
/// - [`Error::Sandbox`] - Sandboxed code threw or the worker is unusable
/// - [`Error::SandboxTimeout`] - Sandboxed code exceeded its wall-clock budget
///
/// ## Techniques and I/O
/// - [`Error::Technique`] - A technique failed unexpectedly
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Error`] - Anything else
///
/// # Examples
///
/// ```rust
/// use jsdeob::{js, Error};
///
/// match js::parse("var a = ;") {
///     Ok(_) => println!("parsed"),
///     Err(Error::Syntax { message, offset, .. }) => {
///         eprintln!("syntax error at byte {}: {}", offset, message);
///     }
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The source text is not syntactically valid JavaScript.
    ///
    /// # Fields
    ///
    /// * `message` - What the parser expected or rejected
    /// * `offset` - Byte offset into the source where the problem was found
    /// * `file` - Source file of this crate that raised the error
    /// * `line` - Source line of this crate that raised the error
    #[error("Syntax error at offset {offset} ({file}:{line}): {message}")]
    Syntax {
        /// The message describing the syntax error
        message: String,
        /// Byte offset into the parsed source
        offset: usize,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Nesting depth exceeded the configured limit.
    ///
    /// Raised by the parser for deeply nested sources. The payload is the limit.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A technique could not find the structure it operates on.
    ///
    /// The payload names what was missing (for example `"string pool"`).
    #[error("Pattern not found - {0}")]
    PatternNotFound(&'static str),

    /// Sandboxed code threw, could not be set up, or the worker is gone.
    #[error("Sandbox failure - {0}")]
    Sandbox(String),

    /// Sandboxed code did not finish within its wall-clock budget.
    ///
    /// The sandbox is unusable afterwards.
    #[error("Sandbox timed out after {0:?}")]
    SandboxTimeout(Duration),

    /// A technique failed unexpectedly.
    #[error("Technique '{technique}' failed: {message}")]
    Technique {
        /// Identifier of the failing technique
        technique: String,
        /// Failure description
        message: String,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during file operations
    /// such as reading from disk, permission issues, or filesystem errors.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` for failures of sandboxed execution.
    #[must_use]
    pub fn is_sandbox(&self) -> bool {
        matches!(self, Error::Sandbox(_) | Error::SandboxTimeout(_))
    }

    /// Returns `true` for failures that mean the input could not be parsed.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Syntax { .. } | Error::RecursionLimit(_))
    }
}
