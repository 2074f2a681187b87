//! Isolated execution of untrusted JavaScript.
//!
//! Obfuscated scripts frequently rotate or decrypt their string pool at runtime, which
//! cannot be reproduced statically with any confidence. Instead, the statements that
//! build the pool are evaluated in an embedded [boa](https://boajs.dev) interpreter and
//! the resulting decoder functions are called directly.
//!
//! # Containment
//!
//! - the interpreter has no module loader, no filesystem and no network
//! - timers, `process`, `require` and friends are bound to `undefined`
//!   (see [`crate::analysis::DENIED_GLOBALS`])
//! - only `console` (silent), `atob` and `btoa` are added to the built-ins
//! - loop iterations, recursion and stack size are capped by the interpreter
//! - every request is bounded by a wall-clock timeout on the caller side, after which
//!   the interpreter is cancelled between instruction slices and its thread exits
//!
//! A [`Sandbox`] is created per prelude and dropped as soon as the decoders have
//! been used.

mod config;
mod globals;
mod process;
mod value;

pub use config::SandboxConfig;
pub use process::Sandbox;
pub use value::{CallOutcome, SandboxValue};
