//! JavaScript front end: parsing, arena syntax tree and renderer.
//!
//! Source is parsed with `oxc` and lowered into a compact arena of [`Node`]s that
//! keeps each node's source span.
//!
//! The deobfuscation techniques never manipulate source text directly. They parse it
//! into a [`Program`], locate and rewrite nodes by [`NodeId`], and render the result
//! back, which only touches the spans of rewritten nodes.
//!
//! # Example
//!
//! ```rust
//! use jsdeob::js::{self, Node};
//!
//! let mut program = js::parse("console.log(decode(3));")?;
//! let call = program
//!     .pre_order(program.root())
//!     .into_iter()
//!     .find(|id| program.text(*id) == "decode(3)")
//!     .unwrap();
//! program.replace(call, Node::Str("hello".into()));
//! assert_eq!(program.render(), "console.log('hello');");
//! # Ok::<(), jsdeob::Error>(())
//! ```

pub mod ast;
mod lower;
mod parser;
pub mod render;

pub use ast::{
    BinaryOp, Function, FunctionKind, Node, NodeId, Program, Span, Syntax, UnaryOp, VarKind,
};
pub use parser::{parse, MAX_NESTING_DEPTH};
pub use render::quote_string;
