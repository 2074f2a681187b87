//! # jsdeob Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the jsdeob library.
//!
//! ```rust
//! use jsdeob::prelude::*;
//!
//! let engine = DeobfuscationEngine::new(EngineConfig::default().with_max_rounds(3));
//! let result: DeobfuscationResult = engine.deobfuscate("let answer = 42;");
//! assert_eq!(result.code, "let answer = 42;");
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all jsdeob operations
pub use crate::Error;

/// The result type used throughout jsdeob
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Round-based engine and its configuration
pub use crate::deobfuscation::{CleanupConfig, DeobfuscationEngine, EngineConfig};

/// Outcome of a run
pub use crate::deobfuscation::{DeobfuscationResult, RoundReport};

/// Event reporting
pub use crate::deobfuscation::{Event, EventKind, EventLog, SkipReason};

// ================================================================================================
// Techniques
// ================================================================================================

/// Technique contract and registry
pub use crate::deobfuscation::{Technique, TechniqueRegistry};

/// Built-in techniques
pub use crate::deobfuscation::{GlyphTechnique, PunctuationTechnique, StringPoolTechnique};

// ================================================================================================
// Building Blocks
// ================================================================================================

/// Parsing and rendering
pub use crate::js::{parse, Node, NodeId, Program};

/// Static analysis
pub use crate::analysis::{ConstEvaluator, Detection, Detector, Prelude, ScopeIndex, StaticValue};

/// Contained execution
pub use crate::sandbox::{CallOutcome, Sandbox, SandboxConfig, SandboxValue};
