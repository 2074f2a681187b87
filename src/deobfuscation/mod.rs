//! Deobfuscation framework for JavaScript sources.
//!
//! This module turns obfuscated source text back into readable source text. The
//! key insight is that a string pool decoder does not have to be understood to be
//! undone: running the obfuscator's own setup code and asking its decoder for each
//! string is enough, as long as that code is contained.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Deobfuscation Pipeline                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Input: source text                                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Round (repeat until fixed point)              │   │
//! │  │  ┌───────────────────────────────────────────────────────────┐  │   │
//! │  │  │ For each registered technique, in order:                  │  │   │
//! │  │  │                                                           │  │   │
//! │  │  │  detect(code)?  ──no──► next technique                    │  │   │
//! │  │  │       │                                                   │  │   │
//! │  │  │      yes                                                  │  │   │
//! │  │  │       ▼                                                   │  │   │
//! │  │  │  process(code)  ──error/panic──► log, keep code           │  │   │
//! │  │  │       │                                                   │  │   │
//! │  │  │       ▼                                                   │  │   │
//! │  │  │  code = output                                            │  │   │
//! │  │  └───────────────────────────────────────────────────────────┘  │   │
//! │  │  Stop when a round changes nothing or max_rounds is reached     │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  Output: DeobfuscationResult (code, rounds, events)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! - [`DeobfuscationEngine`] - Runs the rounds and isolates technique failures
//! - [`Technique`] - The contract every technique implements
//! - [`TechniqueRegistry`] - Ordered set of techniques, keyed by id
//! - [`EventLog`] - What the techniques found, rewrote and skipped
//! - [`EngineConfig`] / [`CleanupConfig`] - Tuning knobs
//!
//! # Built-in Techniques
//!
//! | Technique | Description |
//! |-----------|-------------|
//! | [`StringPoolTechnique`] | Replaces decoder calls with the strings they return, using a sandbox |
//! | [`GlyphTechnique`] | Reports aaencode output |
//! | [`PunctuationTechnique`] | Reports JSFuck output |
//!
//! # Usage
//!
//! ```rust
//! use jsdeob::deobfuscation::{DeobfuscationEngine, EngineConfig};
//!
//! let source = "var p = ['log', 'hello', 'c', 'd', 'e', 'f'];\n\
//!               function d(i) { return p[i]; }\n\
//!               console[d(0)](d(1));";
//!
//! let engine = DeobfuscationEngine::new(EngineConfig::default());
//! let result = engine.deobfuscate(source);
//! assert!(result.code.ends_with("console['log']('hello');"));
//! println!("{}", result.summary());
//! ```

// Infrastructure
mod config;
mod events;
mod registry;
mod result;
mod technique;

// Engine
mod engine;

// Built-in techniques
pub mod techniques;

pub use config::{CleanupConfig, EngineConfig, DEFAULT_TRIAL_INDICES, DEFAULT_TRIAL_KEY};
pub use engine::DeobfuscationEngine;
pub use events::{Event, EventKind, EventLog, SkipReason};
pub use registry::TechniqueRegistry;
pub use result::{DeobfuscationResult, RoundReport};
pub use technique::Technique;
pub use techniques::{
    GlyphTechnique, PunctuationTechnique, StringPoolTechnique, ValidatedDecoder,
};
