//! Parsing entry point.
//!
//! Source text is parsed by [oxc](https://oxc.rs) and lowered into the arena of
//! [`crate::js::ast`] by [`crate::js::lower`]. Scripts are tried first, so sloppy-mode
//! code (`with`, legacy octals) keeps working, and a source that only parses as a
//! module (`import`, `export`, top-level `await`) is parsed again as one.
//!
//! # Limits
//!
//! oxc's parser is recursive descent without a depth guard. Before it runs, a cheap
//! scan over the raw text estimates how deep the parse will recurse and rejects
//! anything deeper than [`MAX_NESTING_DEPTH`] with [`Error::RecursionLimit`]. The
//! parse itself runs on a dedicated thread with a large stack, and lowering applies
//! the same limit to the tree it builds.

use std::thread;

use oxc_allocator::Allocator;
use oxc_parser::{ParseOptions, Parser, ParserReturn};
use oxc_span::SourceType;

use crate::{
    js::{ast::Program, lower},
    Error, Result,
};

/// Maximum syntactic nesting accepted by [`parse`].
///
/// Bracket levels, chained prefix operators and right-nested operators all count.
/// Realistic obfuscator output, including dozens of nested closures, stays far below.
pub const MAX_NESTING_DEPTH: usize = 512;

const PARSER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Words that parse their operand recursively, like a prefix operator.
const PREFIX_KEYWORDS: &[&[u8]] = &[b"typeof", b"void", b"delete", b"await", b"new", b"yield"];

/// Words after which an expression starts, so `/` begins a regular expression and
/// `+`/`-` are prefix operators.
const OPERATOR_KEYWORDS: &[&[u8]] = &[
    b"return", b"typeof", b"void", b"delete", b"await", b"new", b"yield", b"case", b"in",
    b"of", b"instanceof", b"throw", b"else", b"do",
];

/// Parses JavaScript source text into a [`Program`].
///
/// # Arguments
///
/// * `source` - The complete source text of one file.
///
/// # Errors
///
/// Returns [`Error::Syntax`] with the byte offset oxc reports, or
/// [`Error::RecursionLimit`] if the input nests deeper than [`MAX_NESTING_DEPTH`].
///
/// # Examples
///
/// ```rust
/// use jsdeob::js::{self, Node};
///
/// let program = js::parse("var pool = ['a', 'b'];")?;
/// assert_eq!(program.statements().len(), 1);
/// assert!(matches!(program.node(program.statements()[0]), Node::VarDecl { .. }));
/// # Ok::<(), jsdeob::Error>(())
/// ```
pub fn parse(source: &str) -> Result<Program> {
    if nesting_depth(source) > MAX_NESTING_DEPTH {
        return Err(Error::RecursionLimit(MAX_NESTING_DEPTH));
    }

    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("jsdeob-parser".to_string())
            .stack_size(PARSER_STACK_SIZE)
            .spawn_scoped(scope, || parse_tree(source))
            .map_err(|e| Error::Error(format!("cannot spawn parser thread: {e}")))?;
        handle
            .join()
            .map_err(|_| Error::Error("parser thread panicked".to_string()))?
    })
}

fn parse_tree(source: &str) -> Result<Program> {
    let allocator = Allocator::default();

    let script = parse_as(&allocator, source, SourceType::cjs());
    if script.errors.is_empty() && !script.panicked {
        return lower::lower(source, &script.program);
    }
    let module = parse_as(&allocator, source, SourceType::mjs());
    if module.errors.is_empty() && !module.panicked {
        return lower::lower(source, &module.program);
    }

    // Report whichever reading got further into the file.
    let (script_offset, script_message) = first_error(&script);
    let (module_offset, module_message) = first_error(&module);
    if module_offset > script_offset {
        Err(syntax_error!(module_offset, module_message))
    } else {
        Err(syntax_error!(script_offset, script_message))
    }
}

fn parse_as<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    source_type: SourceType,
) -> ParserReturn<'a> {
    let options = ParseOptions {
        allow_return_outside_function: true,
        ..ParseOptions::default()
    };
    Parser::new(allocator, source, source_type)
        .with_options(options)
        .parse()
}

fn first_error(parsed: &ParserReturn<'_>) -> (usize, String) {
    match parsed.errors.first() {
        Some(diagnostic) => {
            let offset = diagnostic
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map_or(0, |label| label.offset());
            (offset, diagnostic.message.to_string())
        }
        None => (0, "parser gave up".to_string()),
    }
}

struct Level {
    /// Operators opened at this bracket level and not yet closed by `,` or `;`.
    pending: usize,
    /// The level is a `${` substitution; its `}` resumes the template.
    template: bool,
}

/// Estimates the recursion depth a parse of `source` needs.
///
/// Every bracket opens a level. Prefix operators, assignments, `?`, `=>` and `**`
/// each add one more that stays open until the next `,` or `;` at the same bracket
/// level, or a line break after an operand. Strings, comments, templates and regular
/// expressions are skipped. The scan stops as soon as the limit is exceeded.
fn nesting_depth(source: &str) -> usize {
    let bytes = source.as_bytes();
    let mut levels = vec![Level {
        pending: 0,
        template: false,
    }];
    let mut depth = 0usize;
    let mut max = 0usize;
    // An operand just ended: `/` divides, `+`/`-` are binary.
    let mut after_operand = false;
    let mut i = 0;

    macro_rules! open {
        ($pending:expr) => {{
            if let Some(level) = levels.last_mut() {
                level.pending += $pending;
            }
            depth += $pending;
            max = max.max(depth);
        }};
    }

    while i < bytes.len() && max <= MAX_NESTING_DEPTH {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match b {
            b'\n' | b'\r' => {
                if after_operand {
                    if let Some(level) = levels.last_mut() {
                        depth -= level.pending;
                        level.pending = 0;
                    }
                }
                i += 1;
            }
            b' ' | b'\t' => i += 1,
            b'/' if next == Some(b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if next == Some(b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            b'/' if !after_operand => {
                i = skip_regex(bytes, i + 1);
                after_operand = true;
            }
            b'\'' | b'"' => {
                i = skip_string(bytes, i + 1, b);
                after_operand = true;
            }
            b'`' => {
                let (end, substitution) = scan_template(bytes, i + 1);
                i = end;
                if substitution {
                    levels.push(Level {
                        pending: 0,
                        template: true,
                    });
                    depth += 1;
                    max = max.max(depth);
                    after_operand = false;
                } else {
                    after_operand = true;
                }
            }
            b'(' | b'[' | b'{' => {
                levels.push(Level {
                    pending: 0,
                    template: false,
                });
                depth += 1;
                max = max.max(depth);
                after_operand = false;
                i += 1;
            }
            b')' | b']' | b'}' => {
                i += 1;
                after_operand = true;
                if levels.len() > 1 {
                    if let Some(level) = levels.pop() {
                        depth -= 1 + level.pending;
                        if level.template {
                            let (end, substitution) = scan_template(bytes, i);
                            i = end;
                            if substitution {
                                levels.push(Level {
                                    pending: 0,
                                    template: true,
                                });
                                depth += 1;
                                max = max.max(depth);
                                after_operand = false;
                            }
                        }
                    }
                }
            }
            b';' | b',' => {
                if let Some(level) = levels.last_mut() {
                    depth -= level.pending;
                    level.pending = 0;
                }
                after_operand = false;
                i += 1;
            }
            b'=' | b'!' if next == Some(b'=') => {
                // Equality operators.
                i += if bytes.get(i + 2) == Some(&b'=') { 3 } else { 2 };
                after_operand = false;
            }
            b'=' if next == Some(b'>') => {
                open!(1);
                after_operand = false;
                i += 2;
            }
            b'=' | b'!' | b'~' => {
                open!(1);
                after_operand = false;
                i += 1;
            }
            b'?' => {
                if next == Some(b'.') && !bytes.get(i + 2).is_some_and(u8::is_ascii_digit) {
                    // Optional chaining.
                    i += 2;
                } else if next == Some(b'?') {
                    if bytes.get(i + 2) == Some(&b'=') {
                        open!(1);
                        i += 3;
                    } else {
                        i += 2;
                    }
                } else {
                    open!(1);
                    i += 1;
                }
                after_operand = false;
            }
            b'+' | b'-' => {
                if next == Some(b) {
                    // `++`/`--` only recurse as prefixes.
                    if !after_operand {
                        open!(1);
                    }
                    i += 2;
                } else if next == Some(b'=') {
                    open!(1);
                    after_operand = false;
                    i += 2;
                } else {
                    if !after_operand {
                        open!(1);
                    }
                    after_operand = false;
                    i += 1;
                }
            }
            b'*' | b'%' | b'&' | b'|' | b'^' | b'<' | b'>' | b'/' => {
                let run = operator_run(bytes, i);
                let text = &bytes[i..i + run];
                // Compound assignment and exponentiation nest to the right.
                let compound = text.len() > 1
                    && text.ends_with(b"=")
                    && !matches!(text, b"<=" | b">=");
                if compound || text.starts_with(b"**") {
                    open!(1);
                }
                after_operand = false;
                i += run;
            }
            _ if is_word_byte(b) => {
                let start = i;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                let word = &bytes[start..i];
                if PREFIX_KEYWORDS.contains(&word) {
                    open!(1);
                }
                after_operand = !OPERATOR_KEYWORDS.contains(&word);
            }
            _ => {
                after_operand = false;
                i += 1;
            }
        }
    }
    max
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'\\' || b >= 0x80
}

/// Length of the run of operator punctuation starting at `start`.
fn operator_run(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .take_while(|b| b"*%&|^<>/=".contains(b))
        .count()
        .max(1)
}

/// Returns the index after the closing quote.
fn skip_string(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    i
}

/// Returns the index after the closing `/` and flags.
fn skip_regex(bytes: &[u8], mut i: usize) -> usize {
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                return i;
            }
            _ => i += 1,
        }
    }
    i
}

/// Scans template text from `i`. Returns the index after the closing backtick or the
/// `${` of the next substitution, and whether a substitution was opened.
fn scan_template(bytes: &[u8], mut i: usize) -> (usize, bool) {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return (i + 1, false),
            b'$' if bytes.get(i + 1) == Some(&b'{') => return (i + 2, true),
            _ => i += 1,
        }
    }
    (i, false)
}
