//! Structural constant evaluation of index and key expressions.
//!
//! Obfuscated call sites rarely pass plain literals to their decoder; they pass small
//! arithmetic expressions such as `d(0x1a2 - 0x19c, 'k3$a')` or hex strings that the
//! decoder coerces with `-`. The [`ConstEvaluator`] folds those expressions purely
//! from the syntax tree. It never executes code and never looks at identifiers, so an
//! argument that depends on runtime state evaluates to `None` and the call site is
//! left alone.
//!
//! # Supported forms
//!
//! - numeric literals in every radix
//! - unary `+` and `-`
//! - binary `+ - * / %` with IEEE-754 semantics
//! - binary `<< >> >>> & | ^` with JavaScript `ToInt32`/`ToUint32` coercion
//! - parentheses
//! - string literals whose whole value is a hex (`0x…`) or decimal digit sequence
//!
//! Division or remainder by zero is treated as unknown rather than producing
//! `Infinity` or `NaN`.
//!
//! # Example
//!
//! ```rust
//! use jsdeob::{analysis::{ConstEvaluator, StaticValue}, js::{self, Node}};
//!
//! let program = js::parse("f(0x10 - '0x4', 'key');")?;
//! let Node::ExprStmt { expr } = program.node(program.statements()[0]) else { unreachable!() };
//! let Node::Call { args, .. } = program.node(*expr) else { unreachable!() };
//!
//! let evaluator = ConstEvaluator::new(&program);
//! assert_eq!(evaluator.evaluate_index(args[0]), Some(12.0));
//! assert_eq!(evaluator.evaluate_key(args[1]), Some(StaticValue::Str("key".into())));
//! # Ok::<(), jsdeob::Error>(())
//! ```

use std::fmt;

use crate::js::{BinaryOp, Node, NodeId, Program, UnaryOp};

/// A statically known argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticValue {
    /// A number folded from literals and arithmetic.
    Number(f64),
    /// A string literal, taken verbatim.
    Str(String),
}

impl fmt::Display for StaticValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticValue::Number(n) => write!(f, "{n}"),
            StaticValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Folds constant index and key expressions of a [`Program`].
///
/// The evaluator borrows the program immutably, so one is created per call site
/// while the tree is being rewritten.
pub struct ConstEvaluator<'a> {
    /// The program whose nodes are evaluated.
    program: &'a Program,

    /// Maximum expression nesting followed before giving up.
    max_depth: usize,
}

impl<'a> ConstEvaluator<'a> {
    /// Default maximum recursion depth.
    const DEFAULT_MAX_DEPTH: usize = 64;

    /// Creates a new evaluator with the default depth limit.
    ///
    /// # Arguments
    ///
    /// * `program` - The program containing the expressions to fold.
    #[must_use]
    pub fn new(program: &'a Program) -> Self {
        Self::with_max_depth(program, Self::DEFAULT_MAX_DEPTH)
    }

    /// Creates an evaluator with a custom depth limit.
    ///
    /// # Arguments
    ///
    /// * `program` - The program containing the expressions to fold.
    /// * `max_depth` - Maximum nesting depth; deeper expressions evaluate to `None`.
    #[must_use]
    pub fn with_max_depth(program: &'a Program, max_depth: usize) -> Self {
        Self { program, max_depth }
    }

    /// Evaluates a numeric index expression.
    ///
    /// # Arguments
    ///
    /// * `node` - Root of the expression.
    ///
    /// # Returns
    ///
    /// The folded number, or `None` if the expression is not statically known.
    #[must_use]
    pub fn evaluate_index(&self, node: NodeId) -> Option<f64> {
        self.evaluate_depth(node, 0)
    }

    /// Evaluates a decoder key expression.
    ///
    /// String literals are returned verbatim; everything else is folded as an index.
    ///
    /// # Arguments
    ///
    /// * `node` - Root of the expression.
    #[must_use]
    pub fn evaluate_key(&self, node: NodeId) -> Option<StaticValue> {
        match self.program.node(node) {
            Node::Str(value) => Some(StaticValue::Str(value.clone())),
            _ => self.evaluate_index(node).map(StaticValue::Number),
        }
    }

    fn evaluate_depth(&self, node: NodeId, depth: usize) -> Option<f64> {
        if depth > self.max_depth {
            return None;
        }

        let value = match self.program.node(node) {
            Node::Num(value) => *value,
            Node::Str(value) => numeric_string(value)?,
            Node::Paren { expr } => self.evaluate_depth(*expr, depth + 1)?,
            Node::Unary { op, arg } => {
                let arg = self.evaluate_depth(*arg, depth + 1)?;
                match op {
                    UnaryOp::Minus => -arg,
                    UnaryOp::Plus => arg,
                    _ => return None,
                }
            }
            Node::Binary { op, left, right } => {
                let left = self.evaluate_depth(*left, depth + 1)?;
                let right = self.evaluate_depth(*right, depth + 1)?;
                fold_binary(*op, left, right)?
            }
            _ => return None,
        };

        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }
}

fn fold_binary(op: BinaryOp, left: f64, right: f64) -> Option<f64> {
    let shift = |count: f64| to_uint32(count) & 0x1F;
    Some(match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        BinaryOp::Div if right == 0.0 => return None,
        BinaryOp::Div => left / right,
        BinaryOp::Rem if right == 0.0 => return None,
        BinaryOp::Rem => left % right,
        BinaryOp::Shl => f64::from(to_int32(left).wrapping_shl(shift(right))),
        BinaryOp::Shr => f64::from(to_int32(left) >> shift(right)),
        BinaryOp::UShr => f64::from(to_uint32(left) >> shift(right)),
        BinaryOp::BitAnd => f64::from(to_int32(left) & to_int32(right)),
        BinaryOp::BitOr => f64::from(to_int32(left) | to_int32(right)),
        BinaryOp::BitXor => f64::from(to_int32(left) ^ to_int32(right)),
        _ => return None,
    })
}

/// Interprets a string that is entirely a hex or decimal digit sequence.
fn numeric_string(value: &str) -> Option<f64> {
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        return Some(
            hex.chars()
                .filter_map(|c| c.to_digit(16))
                .fold(0f64, |acc, d| acc * 16.0 + f64::from(d)),
        );
    }
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// JavaScript `ToUint32`.
pub(crate) fn to_uint32(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    const TWO_32: f64 = 4_294_967_296.0;
    let wrapped = value.trunc() % TWO_32;
    let wrapped = if wrapped < 0.0 { wrapped + TWO_32 } else { wrapped };
    wrapped as u32
}

/// JavaScript `ToInt32`.
pub(crate) fn to_int32(value: f64) -> i32 {
    to_uint32(value) as i32
}
