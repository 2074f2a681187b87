//! Tidying that follows a successful rewrite.
//!
//! Both steps only touch constructs whose meaning is fixed by the language, so the
//! output behaves exactly like the input.

use crate::{
    analysis::Prelude,
    deobfuscation::events::{EventKind, EventLog},
    js::{Node, NodeId, Program, UnaryOp},
};

use super::TECHNIQUE_ID;

/// Name of the marker variable the obfuscator emits.
const VERSION_MARKER: &str = "encode_version";

/// Text the marker value contains.
const VERSION_SIGNATURE: &str = "jsjiami.com";

/// Replaces `!![]` with `true` and `![]` with `false` outside the prelude.
///
/// # Returns
///
/// The number of replaced idioms.
pub(crate) fn normalize_boolean_idioms(
    program: &mut Program,
    prelude: &Prelude,
    events: &mut EventLog,
) -> usize {
    let statements: Vec<NodeId> = program
        .statements()
        .iter()
        .copied()
        .filter(|statement| !prelude.contains(*statement))
        .collect();

    let mut normalized = 0;
    for statement in statements {
        // Pre-order sees `!![]` before its inner `![]`, which is then detached.
        for id in program.pre_order(statement) {
            if program.is_replaced(id) || program.is_detached(id) {
                continue;
            }
            let Some(value) = boolean_idiom(program, id) else {
                continue;
            };
            events.record(
                TECHNIQUE_ID,
                EventKind::IdiomNormalized,
                format!("{} -> {value}", program.text(id)),
            );
            program.replace(id, Node::Bool(value));
            normalized += 1;
        }
    }
    normalized
}

/// `Some(true)` for `!![]`, `Some(false)` for `![]`.
fn boolean_idiom(program: &Program, id: NodeId) -> Option<bool> {
    let operand = negated(program, id)?;
    if is_empty_array(program, operand) {
        return Some(false);
    }
    let inner = negated(program, operand)?;
    is_empty_array(program, inner).then_some(true)
}

fn negated(program: &Program, id: NodeId) -> Option<NodeId> {
    match program.node(id) {
        Node::Unary {
            op: UnaryOp::Not,
            arg,
        } => Some(*arg),
        _ => None,
    }
}

fn is_empty_array(program: &Program, id: NodeId) -> bool {
    matches!(program.node(id), Node::Array { elements } if elements.is_empty())
}

/// Removes the top-level `encode_version` declaration if nothing else refers to it.
///
/// Only a declaration with a single declarator whose initialiser is a string naming
/// the obfuscator qualifies.
///
/// # Returns
///
/// `true` if the marker was removed.
pub(crate) fn strip_version_marker(program: &mut Program, events: &mut EventLog) -> bool {
    let references = program
        .idents(program.root())
        .filter(|(_, name)| *name == VERSION_MARKER)
        .count();
    if references != 1 {
        return false;
    }

    let marker = program
        .statements()
        .iter()
        .copied()
        .find(|statement| is_version_marker(program, *statement));
    let Some(marker) = marker else {
        return false;
    };
    events.record(TECHNIQUE_ID, EventKind::MarkerRemoved, program.text(marker));
    program.replace(marker, Node::Empty);
    true
}

fn is_version_marker(program: &Program, statement: NodeId) -> bool {
    if program.is_replaced(statement) {
        return false;
    }
    let Node::VarDecl { declarators, .. } = program.node(statement) else {
        return false;
    };
    let [declarator] = declarators.as_slice() else {
        return false;
    };
    let Node::Declarator {
        target,
        init: Some(init),
    } = program.node(*declarator)
    else {
        return false;
    };
    program.node(*target).as_ident() == Some(VERSION_MARKER)
        && matches!(program.node(*init), Node::Str(value) if value.contains(VERSION_SIGNATURE))
}
