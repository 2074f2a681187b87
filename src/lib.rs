// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # jsdeob
//!
//! A deobfuscator for JavaScript protected with a string pool and index decoders,
//! the scheme used by jsjiami v7 and a family of similar obfuscators. Every string
//! literal of the protected script lives in one array, and each use of a string is
//! a call like `_0x1f2e(0x1a3, 'kX$2')`. `jsdeob` finds the pool and its decoders,
//! runs the obfuscator's own setup code in a contained JavaScript engine, and
//! replaces every call it can prove constant with the string the decoder returns.
//!
//! ## Features
//!
//! - **🔍 Structural detection** - Pools and decoders are found by shape, never by name
//! - **🧪 Contained execution** - Setup code runs in a [boa](https://boajs.dev) context
//!   with no host access, runtime limits and a wall-clock budget
//! - **✂️ Minimal edits** - Only rewritten call sites change; everything else is copied
//!   byte-for-byte
//! - **🛡️ Fail-safe** - Any failure leaves the input untouched
//! - **🧩 Extensible** - Techniques are trait objects in an ordered registry
//!
//! ## Quick Start
//!
//! ### Using the Prelude
//!
//! ```rust
//! use jsdeob::prelude::*;
//!
//! let source = "var words = ['hello', 'world', 'x', 'y', 'z', 'w'];\n\
//!               function pick(i) { return words[i - 0x10]; }\n\
//!               alert(pick(0x10) + ' ' + pick(0x11));";
//!
//! let result = DeobfuscationEngine::default().deobfuscate(source);
//! assert!(result.code.ends_with("alert('hello' + ' ' + 'world');"));
//! ```
//!
//! ### Step by Step
//!
//! The building blocks are public, so the pipeline can be driven by hand:
//!
//! ```rust
//! use jsdeob::{
//!     analysis::{Detector, Prelude},
//!     js,
//!     sandbox::{Sandbox, SandboxConfig},
//! };
//!
//! let program = js::parse("var p = ['a', 'b', 'c', 'd', 'e', 'f']; function d(i) { return p[i]; }")?;
//! let detection = Detector::new(&program, 6).detect();
//! assert_eq!(detection.pools[0].name, "p");
//! assert_eq!(detection.decoders[0].name, "d");
//!
//! let prelude = Prelude::build(&program, &detection.tracked_names());
//! let mut sandbox = Sandbox::launch(prelude.source(), &SandboxConfig::default())?;
//! assert!(sandbox.inspect("d")?.is_function());
//! # Ok::<(), jsdeob::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `jsdeob` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`js`] - Lexer, parser, arena syntax tree and span-splicing renderer
//! - [`analysis`] - Constant folding, pool and decoder detection, prelude extraction, scopes
//! - [`sandbox`] - Contained execution of untrusted setup code
//! - [`deobfuscation`] - Techniques, the registry and the round-based engine
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! The engine never fails: a technique that returns an error is logged and skipped,
//! so [`deobfuscation::DeobfuscationEngine::deobfuscate`] always produces code. The
//! lower-level APIs return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use jsdeob::{js, Error};
//!
//! match js::parse("function (") {
//!     Ok(_) => println!("parsed"),
//!     Err(Error::Syntax { message, offset, .. }) => println!("{message} at {offset}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run parse_program --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! ```

#[macro_use]
pub(crate) mod error;

pub mod analysis;
pub mod deobfuscation;
pub mod js;
pub mod prelude;
pub mod sandbox;

/// `jsdeob` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use jsdeob::{js::Program, Result};
///
/// fn load(source: &str) -> Result<Program> {
///     jsdeob::js::parse(source)
/// }
/// # assert!(load("let x = 1;").is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `jsdeob` Error type
///
/// The main error type for all operations in this crate. Parse failures, sandbox
/// failures and technique failures each have their own variant.
pub use error::Error;
