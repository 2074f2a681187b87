//! Static analysis of parsed JavaScript programs.
//!
//! Nothing in this module executes code. It answers structural questions about a
//! [`crate::js::Program`] that the deobfuscation techniques need before and after
//! they touch the sandbox.
//!
//! # Architecture
//!
//! - [`consts`] - Constant folding of index and key arguments
//! - [`detector`] - String pool, pool provider and reader detection
//! - [`prelude`] - Selection of the statements that rebuild a pool at runtime
//! - [`scope`] - Binding sites, used to avoid rewriting shadowed names
//!
//! # Usage
//!
//! ```rust
//! use jsdeob::{analysis::{Detector, Prelude}, js};
//!
//! let program = js::parse(
//!     "var p = ['a','b','c','d','e','f']; function d(i) { return p[i - 1]; } use(d(1));",
//! )?;
//! let detection = Detector::new(&program, 6).detect();
//! assert!(detection.is_match());
//!
//! let prelude = Prelude::build(&program, &detection.tracked_names());
//! assert_eq!(prelude.statements().len(), 2);
//! # Ok::<(), jsdeob::Error>(())
//! ```

pub mod consts;
pub mod detector;
pub mod prelude;
pub mod scope;

pub use consts::{ConstEvaluator, StaticValue};
pub use detector::{DecoderCandidate, Detection, Detector, StringPool};
pub use prelude::{Prelude, DENIED_GLOBALS};
pub use scope::ScopeIndex;
