//! Replacement of decoder call sites with the strings they produce.

use log::debug;

use crate::{
    analysis::{ConstEvaluator, Prelude, ScopeIndex, StaticValue},
    deobfuscation::events::{EventKind, EventLog, SkipReason},
    js::{Node, NodeId, Program, Syntax},
    sandbox::{CallOutcome, Sandbox},
    Result,
};

use super::{validator::ValidatedDecoder, TECHNIQUE_ID};

/// Rewrites every eligible decoder call outside the prelude.
///
/// Statements are walked in post-order so that nested calls such as
/// `d(d(0x1) ...)` are folded from the inside out in a single pass: once the inner
/// call is a string literal, the outer argument folds like any other literal.
///
/// # Arguments
///
/// * `program` - The program to rewrite in place.
/// * `prelude` - Statements that are left untouched.
/// * `decoders` - Validated decoders.
/// * `sandbox` - A fresh sandbox running the prelude.
/// * `events` - Event log for recording rewrites and skips.
///
/// # Returns
///
/// The number of rewritten call sites.
///
/// # Errors
///
/// Returns sandbox errors (timeouts, dead worker); the caller discards the partial
/// rewrite in that case.
pub(crate) fn rewrite(
    program: &mut Program,
    prelude: &Prelude,
    decoders: &[ValidatedDecoder],
    sandbox: &mut Sandbox,
    events: &mut EventLog,
) -> Result<usize> {
    let scope = ScopeIndex::build(program);
    let statements: Vec<NodeId> = program
        .statements()
        .iter()
        .copied()
        .filter(|statement| !prelude.contains(*statement))
        .collect();

    let mut rewritten = 0;
    for statement in statements {
        for id in program.post_order(statement) {
            let Some((decoder, args)) = call_site(program, &scope, decoders, id, events) else {
                continue;
            };
            let excerpt = excerpt(program.text(id));
            match sandbox.call(&decoder.name, &args)? {
                CallOutcome::Returned(value) => match value.as_str() {
                    Some(decoded) => {
                        debug!("{excerpt} -> {decoded:?}");
                        program.replace(id, Node::Str(decoded.to_string()));
                        events.record(TECHNIQUE_ID, EventKind::SiteRewritten, excerpt);
                        rewritten += 1;
                    }
                    None => events.record(
                        TECHNIQUE_ID,
                        EventKind::SiteSkipped(SkipReason::NonString),
                        format!("{excerpt} returned {}", value.type_name()),
                    ),
                },
                CallOutcome::Threw(message) => events.record(
                    TECHNIQUE_ID,
                    EventKind::SiteSkipped(SkipReason::Threw),
                    format!("{excerpt} threw {message}"),
                ),
            }
        }
    }
    Ok(rewritten)
}

/// Checks whether `id` is an eligible call and folds its arguments.
fn call_site<'d>(
    program: &Program,
    scope: &ScopeIndex,
    decoders: &'d [ValidatedDecoder],
    id: NodeId,
    events: &mut EventLog,
) -> Option<(&'d ValidatedDecoder, Vec<StaticValue>)> {
    let Node::Call {
        callee,
        args,
        optional,
    } = program.node(id)
    else {
        return None;
    };
    let name = program.node(*callee).as_ident()?;
    let decoder = decoders.iter().find(|decoder| decoder.name == name)?;

    let mut skip = |reason: SkipReason| -> Option<(&'d ValidatedDecoder, Vec<StaticValue>)> {
        events.record(
            TECHNIQUE_ID,
            EventKind::SiteSkipped(reason),
            excerpt(program.text(id)),
        );
        None
    };

    let has_spread = args.iter().any(|arg| {
        matches!(
            program.node(*arg),
            Node::Other {
                kind: Syntax::Spread,
                ..
            }
        )
    });
    if *optional || has_spread || args.is_empty() || args.len() > 2 {
        return skip(SkipReason::Unsupported);
    }
    if scope.is_shadowed(program, name, id) {
        return skip(SkipReason::Shadowed);
    }

    let evaluator = ConstEvaluator::new(program);
    let Some(index) = evaluator.evaluate_index(args[0]) else {
        return skip(SkipReason::UnresolvedArgument);
    };
    // A numeric string literal is passed through as the string the script passes.
    let index = match program.node(args[0]) {
        Node::Str(value) => StaticValue::Str(value.clone()),
        _ => StaticValue::Number(index),
    };
    let mut folded = vec![index];
    if let Some(key) = args.get(1) {
        match evaluator.evaluate_key(*key) {
            Some(key) => folded.push(key),
            None if decoder.accepts_single => {}
            None => return skip(SkipReason::UnresolvedArgument),
        }
    }
    Some((decoder, folded))
}

/// First characters of a call site, for event messages.
fn excerpt(text: &str) -> String {
    const LIMIT: usize = 60;
    let mut out: String = text.chars().take(LIMIT).collect();
    if text.chars().nth(LIMIT).is_some() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::prelude::header, js::parse, sandbox::SandboxConfig};

    const POOL: &str = "var pool = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
                        function d(i) { return pool[i - 2]; }\n";

    fn run(source: &str, decoders: &[ValidatedDecoder]) -> (String, EventLog) {
        let mut program = parse(source).unwrap();
        let prelude = Prelude::build(&program, &["pool"]);
        let mut sandbox = Sandbox::launch(prelude.source(), &SandboxConfig::default()).unwrap();
        let mut events = EventLog::new();
        rewrite(&mut program, &prelude, decoders, &mut sandbox, &mut events).unwrap();
        (program.render(), events)
    }

    fn single(name: &str) -> Vec<ValidatedDecoder> {
        vec![ValidatedDecoder {
            name: name.into(),
            param_count: 1,
            accepts_single: true,
        }]
    }

    #[test]
    fn test_rewrites_resolved_sites() {
        let source = format!("{POOL}var x = [d(2), d(0x7), d(100), d('0x3')];");
        let (code, events) = run(&source, &single("d"));
        assert_eq!(
            code,
            format!("{POOL}var x = ['a', 'f', d(100), 'b'];")
        );
        assert_eq!(events.count(EventKind::SiteRewritten), 3);
        assert_eq!(
            events.count(EventKind::SiteSkipped(SkipReason::NonString)),
            1
        );
    }

    #[test]
    fn test_unresolved_and_unsupported_sites_are_kept() {
        let source = format!("{POOL}var y = d(n) + d?.(2) + d(...[2]) + d();");
        let (code, events) = run(&source, &single("d"));
        assert_eq!(code, source);
        assert_eq!(
            events.count(EventKind::SiteSkipped(SkipReason::UnresolvedArgument)),
            1
        );
        assert_eq!(
            events.count(EventKind::SiteSkipped(SkipReason::Unsupported)),
            3
        );
    }

    #[test]
    fn test_statement_position_calls_are_rewritten() {
        let source = format!("{POOL}d(3);\nfunction f() {{ d(3); return 1; }}");
        let (code, events) = run(&source, &single("d"));
        assert_eq!(
            code,
            format!("{POOL}('b');\nfunction f() {{ ('b'); return 1; }}")
        );
        assert_eq!(events.count(EventKind::SiteRewritten), 2);
        let reparsed = parse(&code).unwrap();
        let directives = reparsed
            .pre_order(reparsed.root())
            .into_iter()
            .filter_map(|id| match reparsed.node(id) {
                Node::ExprStmt { expr } => Some(*expr),
                _ => None,
            })
            .filter(|expr| matches!(reparsed.node(*expr), Node::Str(_)))
            .count();
        assert_eq!(directives, 0);
    }

    #[test]
    fn test_shadowed_sites_are_kept() {
        let source = format!("{POOL}function g(d) {{ return d(2); }} var z = d(3);");
        let (code, events) = run(&source, &single("d"));
        assert_eq!(
            code,
            format!("{POOL}function g(d) {{ return d(2); }} var z = 'b';")
        );
        assert_eq!(events.count(EventKind::SiteSkipped(SkipReason::Shadowed)), 1);
    }

    #[test]
    fn test_nested_calls_fold_in_one_pass() {
        let source = "var pool = ['4', 'b', 'c', 'd', 'e', 'f', 'g'];\n\
                      function d(i) { return pool[i]; }\n\
                      var w = d(d(0) - 2);";
        let (code, events) = run(source, &single("d"));
        assert!(code.ends_with("var w = 'c';"));
        assert_eq!(events.count(EventKind::SiteRewritten), 2);
    }

    #[test]
    fn test_unresolved_key_with_single_argument_decoder() {
        let source = format!("{POOL}var k = d(2, someKey);");
        let (code, _) = run(&source, &single("d"));
        assert!(code.ends_with("var k = 'a';"));

        let keyed = vec![ValidatedDecoder {
            name: "d".into(),
            param_count: 2,
            accepts_single: false,
        }];
        let (code, events) = run(&source, &keyed);
        assert_eq!(code, source);
        assert_eq!(
            events.count(EventKind::SiteSkipped(SkipReason::UnresolvedArgument)),
            1
        );
    }

    #[test]
    fn test_prelude_statements_are_untouched() {
        let source = format!("{POOL}var first = d(2);");
        let mut program = parse(&source).unwrap();
        let prelude = Prelude::build(&program, &["pool", "d"]);
        assert!(prelude.source().starts_with(&header()));
        let mut sandbox = Sandbox::launch(prelude.source(), &SandboxConfig::default()).unwrap();
        let mut events = EventLog::new();
        let count = rewrite(&mut program, &prelude, &single("d"), &mut sandbox, &mut events).unwrap();
        assert_eq!(count, 0);
        assert_eq!(program.render(), source);
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("d(1)"), "d(1)");
        let long = "x".repeat(80);
        assert_eq!(excerpt(&long).len(), 63);
    }
}
