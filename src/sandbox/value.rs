//! Owned snapshots of interpreter values.
//!
//! boa values are tied to the context that produced them and cannot leave the worker
//! thread, so everything that crosses the channel is converted into a
//! [`SandboxValue`] first.

use std::fmt;

use boa_engine::JsValue;

use crate::{
    analysis::StaticValue,
    js::{quote_string, render::format_number},
};

/// A value returned from the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string that is valid UTF-16 (no lone surrogates).
    String(String),
    /// A callable object.
    Function,
    /// Any other object.
    Object,
    /// A value without an owned representation, named by its type.
    ///
    /// Strings containing lone surrogates end up here, since a Rust `String` cannot
    /// hold them.
    Other(&'static str),
}

impl SandboxValue {
    /// Converts an interpreter value.
    #[must_use]
    pub fn from_js(value: &JsValue) -> Self {
        if value.is_undefined() {
            SandboxValue::Undefined
        } else if value.is_null() {
            SandboxValue::Null
        } else if let Some(b) = value.as_boolean() {
            SandboxValue::Bool(b)
        } else if let Some(n) = value.as_number() {
            SandboxValue::Number(n)
        } else if let Some(s) = value.as_string() {
            match s.to_std_string() {
                Ok(s) => SandboxValue::String(s),
                Err(_) => SandboxValue::Other("string"),
            }
        } else if value.is_callable() {
            SandboxValue::Function
        } else if value.is_object() {
            SandboxValue::Object
        } else if value.is_symbol() {
            SandboxValue::Other("symbol")
        } else if value.is_bigint() {
            SandboxValue::Other("bigint")
        } else {
            SandboxValue::Other("unknown")
        }
    }

    /// Returns `true` for callable values.
    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self, SandboxValue::Function)
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SandboxValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// JavaScript `typeof`-style name of the value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            SandboxValue::Undefined => "undefined",
            SandboxValue::Null => "null",
            SandboxValue::Bool(_) => "boolean",
            SandboxValue::Number(_) => "number",
            SandboxValue::String(_) => "string",
            SandboxValue::Function => "function",
            SandboxValue::Object => "object",
            SandboxValue::Other(name) => name,
        }
    }
}

impl fmt::Display for SandboxValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxValue::Bool(b) => write!(f, "{b}"),
            SandboxValue::Number(n) => write!(f, "{n}"),
            SandboxValue::String(s) => write!(f, "{s:?}"),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Result of invoking a sandboxed function.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The function returned normally.
    Returned(SandboxValue),
    /// The function threw; the payload is the rendered exception.
    Threw(String),
}

impl CallOutcome {
    /// Returns the string result of a normal return.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CallOutcome::Returned(value) => value.as_str(),
            CallOutcome::Threw(_) => None,
        }
    }
}

/// Renders a folded argument as a JavaScript literal for a call script.
pub(crate) fn to_source(value: &StaticValue) -> String {
    match value {
        StaticValue::Number(n) => format_number(*n),
        StaticValue::Str(s) => quote_string(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{Context, Source};

    fn snapshot(source: &str) -> SandboxValue {
        let mut context = Context::default();
        SandboxValue::from_js(&context.eval(Source::from_bytes(source)).unwrap())
    }

    #[test]
    fn test_conversion() {
        assert_eq!(snapshot("undefined"), SandboxValue::Undefined);
        assert_eq!(snapshot("null"), SandboxValue::Null);
        assert_eq!(snapshot("1 < 2"), SandboxValue::Bool(true));
        assert_eq!(snapshot("0x10"), SandboxValue::Number(16.0));
        assert_eq!(snapshot("'a' + 'b'"), SandboxValue::String("ab".into()));
        assert_eq!(snapshot("(function () {})"), SandboxValue::Function);
        assert_eq!(snapshot("({})"), SandboxValue::Object);
        assert_eq!(snapshot("Symbol('s')"), SandboxValue::Other("symbol"));
        assert_eq!(snapshot("10n"), SandboxValue::Other("bigint"));
    }

    #[test]
    fn test_lone_surrogates_are_not_strings() {
        let value = snapshot("'\\ud800'");
        assert_eq!(value, SandboxValue::Other("string"));
        assert_eq!(value.as_str(), None);
    }

    #[test]
    fn test_outcome_accessors() {
        assert_eq!(
            CallOutcome::Returned(SandboxValue::String("x".into())).as_str(),
            Some("x")
        );
        assert_eq!(CallOutcome::Returned(SandboxValue::Number(1.0)).as_str(), None);
        assert_eq!(CallOutcome::Threw("boom".into()).as_str(), None);
        assert_eq!(SandboxValue::Null.to_string(), "null");
    }

    #[test]
    fn test_arguments_render_as_literals() {
        assert_eq!(to_source(&StaticValue::Number(-2.0)), "-2");
        assert_eq!(to_source(&StaticValue::Number(f64::NAN)), "NaN");
        assert_eq!(to_source(&StaticValue::Str("a'b".into())), r"'a\'b'");
        let separator = to_source(&StaticValue::Str("\u{2028}x".into()));
        assert_eq!(snapshot(&separator), SandboxValue::String("\u{2028}x".into()));
    }
}
