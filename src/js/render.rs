//! Source regeneration by span splicing.
//!
//! Rendering never pretty-prints. The original source is copied verbatim and only the
//! spans of replaced nodes are substituted with the text of their new leaf, so
//! formatting, comments and untouched code survive byte-for-byte. A program without
//! edits renders to exactly its input.
//!
//! A string that replaces a whole expression statement is parenthesised, so a
//! rewritten `decode(1);` at the top of a body can never turn into a directive.

use crate::js::ast::{Node, NodeId, Program};

impl Program {
    /// Serialises the program, splicing replaced nodes into the original source.
    ///
    /// # Returns
    ///
    /// The rewritten source text, or an exact copy of the input if nothing was replaced.
    #[must_use]
    pub fn render(&self) -> String {
        let source = self.source();
        if !self.has_edits() {
            return source.to_string();
        }

        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if !self.is_replaced(id) {
                let children = self.node(id).children();
                stack.extend(children.into_iter().rev());
                continue;
            }

            let span = self.span(id);
            out.push_str(&source[cursor..span.start]);
            let mut text = replacement_text(self.node(id));
            if self.is_statement_string(id) {
                text = format!("({text})");
            }

            // `return!![]` must not become `returntrue`.
            let joins_before = out.chars().next_back().is_some_and(is_id_continue)
                && text.chars().next().is_some_and(is_id_continue);
            if joins_before {
                out.push(' ');
            }
            out.push_str(&text);
            let joins_after = text.chars().next_back().is_some_and(is_id_continue)
                && source[span.end..].chars().next().is_some_and(is_id_continue);
            if joins_after {
                out.push(' ');
            }
            cursor = span.end;
        }
        out.push_str(&source[cursor..]);
        out
    }

    fn is_statement_string(&self, id: NodeId) -> bool {
        matches!(self.node(id), Node::Str(_))
            && self
                .parent(id)
                .is_some_and(|parent| matches!(self.node(parent), Node::ExprStmt { .. }))
    }
}

fn is_id_continue(c: char) -> bool {
    c == '$'
        || c == '_'
        || c == '\u{200C}'
        || c == '\u{200D}'
        || c.is_ascii_alphanumeric()
        || (!c.is_ascii() && c.is_alphanumeric())
}

fn replacement_text(node: &Node) -> String {
    match node {
        Node::Str(value) => quote_string(value),
        Node::Bool(value) => value.to_string(),
        Node::Num(value) => format_number(*value),
        Node::Ident(name) | Node::Name(name) => name.clone(),
        _ => String::new(),
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Quotes a string value as a single-quoted JavaScript string literal.
///
/// Quotes, backslashes, control characters and the two line separators that
/// JavaScript treats as line terminators are escaped; every other character is
/// emitted as-is.
///
/// # Arguments
///
/// * `value` - The cooked string value.
///
/// # Examples
///
/// ```rust
/// use jsdeob::js::quote_string;
///
/// assert_eq!(quote_string("it's"), r"'it\'s'");
/// assert_eq!(quote_string("a\nb"), r"'a\nb'");
/// ```
#[must_use]
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{B}' => out.push_str("\\v"),
            '\u{C}' => out.push_str("\\f"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 || c == '\u{7F}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::parse;

    fn find_call(program: &Program, text: &str) -> NodeId {
        program
            .pre_order(program.root())
            .into_iter()
            .find(|id| matches!(program.node(*id), Node::Call { .. }) && program.text(*id) == text)
            .unwrap()
    }

    #[test]
    fn test_unedited_program_renders_verbatim() -> crate::Result<()> {
        let source = "  var a = 1 ; // keep me\n/* and me */ f( a )\n";
        let program = parse(source)?;
        assert_eq!(program.render(), source);
        Ok(())
    }

    #[test]
    fn test_replacement_preserves_surroundings() -> crate::Result<()> {
        let source = "var x = d(1) + /* c */ d(2);";
        let mut program = parse(source)?;
        let first = find_call(&program, "d(1)");
        let second = find_call(&program, "d(2)");
        program.replace(first, Node::Str("a'b".into()));
        program.replace(second, Node::Str("c".into()));
        assert_eq!(program.render(), r"var x = 'a\'b' + /* c */ 'c';");
        Ok(())
    }

    #[test]
    fn test_nested_replacement_uses_outermost() -> crate::Result<()> {
        let mut program = parse("f(g(1));")?;
        let inner = find_call(&program, "g(1)");
        let outer = find_call(&program, "f(g(1))");
        program.replace(inner, Node::Str("in".into()));
        program.replace(outer, Node::Str("out".into()));
        assert_eq!(program.render(), "('out');");
        Ok(())
    }

    #[test]
    fn test_keyword_adjacency_gets_space() -> crate::Result<()> {
        let mut program = parse("function f(){return!![]}")?;
        let target = program
            .pre_order(program.root())
            .into_iter()
            .find(|id| program.text(*id) == "!![]")
            .unwrap();
        program.replace(target, Node::Bool(true));
        assert_eq!(program.render(), "function f(){return true}");
        Ok(())
    }

    #[test]
    fn test_statement_strings_cannot_become_directives() -> crate::Result<()> {
        let mut program = parse("function f() { d(1); return d(2); }")?;
        let statement = find_call(&program, "d(1)");
        let operand = find_call(&program, "d(2)");
        program.replace(statement, Node::Str("use strict".into()));
        program.replace(operand, Node::Str("x".into()));
        let rendered = program.render();
        assert_eq!(rendered, "function f() { ('use strict'); return 'x'; }");

        let reparsed = parse(&rendered)?;
        let directives = reparsed
            .pre_order(reparsed.root())
            .into_iter()
            .filter(|id| match reparsed.node(*id) {
                Node::ExprStmt { expr } => matches!(reparsed.node(*expr), Node::Str(_)),
                _ => false,
            })
            .count();
        assert_eq!(directives, 0);
        Ok(())
    }

    #[test]
    fn test_quote_string_escapes() {
        assert_eq!(quote_string("plain"), "'plain'");
        assert_eq!(quote_string("\u{0}\u{1b}"), r"'\x00\x1b'");
        assert_eq!(quote_string("\u{2028}"), r"'\u2028'");
        assert_eq!(quote_string("back\\slash"), r"'back\\slash'");
        assert_eq!(quote_string("ünï"), "'ünï'");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
