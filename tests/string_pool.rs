//! End-to-end tests of the string pool technique.
//!
//! Every test drives [`StringPoolTechnique`] (or the engine) through the public API
//! with a small hand-written protected script, and checks the exact output text.

use std::time::Duration;

use jsdeob::{
    analysis::Prelude,
    deobfuscation::{
        DeobfuscationEngine, EngineConfig, EventKind, EventLog, SkipReason, StringPoolTechnique,
        Technique,
    },
    js::parse,
    sandbox::{Sandbox, SandboxConfig, SandboxValue},
    Result,
};

const SETUP: &str = "var pool = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
                     function d(i) { return pool[i - 2]; }\n";

fn process(source: &str) -> Result<(String, EventLog)> {
    let technique = StringPoolTechnique::new(EngineConfig::default());
    let mut events = EventLog::new();
    let output = technique.process(source, &mut events)?;
    Ok((output, events))
}

#[test]
fn decodes_in_range_calls_and_keeps_the_rest() -> Result<()> {
    let source = format!("{SETUP}var out = [d(2), d(7), d(100)];");
    let (output, events) = process(&source)?;
    assert_eq!(output, format!("{SETUP}var out = ['a', 'f', d(100)];"));
    assert_eq!(events.count(EventKind::SiteRewritten), 2);
    assert_eq!(events.count(EventKind::SiteSkipped(SkipReason::NonString)), 1);
    Ok(())
}

#[test]
fn second_application_changes_nothing() -> Result<()> {
    let source = format!(
        "var encode_version = 'jsjiami.com.v7';\n{SETUP}if (!![]) {{ alert(d(3) + d(n)); }}"
    );
    let (first, _) = process(&source)?;
    assert_ne!(first, source);
    let (second, events) = process(&first)?;
    assert_eq!(second, first);
    assert_eq!(events.count(EventKind::SiteRewritten), 0);
    Ok(())
}

#[test]
fn malformed_input_is_returned_verbatim() -> Result<()> {
    for source in [
        "var pool = ['a', 'b', 'c', 'd', 'e', 'f'; function d(i) {",
        "function d(i) { return pool[i - 2]; } }",
        "\u{feff}var = 1;",
        "",
    ] {
        let (output, events) = process(source)?;
        assert_eq!(output, source);
        assert!(events.is_empty());
    }
    Ok(())
}

#[test]
fn renaming_pool_and_decoder_changes_nothing() -> Result<()> {
    let renamed = "var _0x4e2a = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
                   function _0x1f0c(_0x3b) { return _0x4e2a[_0x3b - 2]; }\n\
                   var out = [_0x1f0c(2), _0x1f0c(7)];";
    let (output, _) = process(renamed)?;
    assert!(output.ends_with("var out = ['a', 'f'];"));
    Ok(())
}

#[test]
fn rotation_is_recovered_by_running_the_setup() -> Result<()> {
    let source = "var _0xp = ['c', 'd', 'e', 'f', 'a', 'b'];\n\
                  (function (arr, n) { while (n--) { arr.push(arr.shift()); } })(_0xp, 4);\n\
                  function _0xd(i) { i = i - 0x0; return _0xp[i]; }\n\
                  var msg = _0xd(0x0) + _0xd(0x5);";
    let (output, _) = process(source)?;
    assert!(output.ends_with("var msg = 'a' + 'f';"));
    Ok(())
}

#[test]
fn self_replacing_keyed_decoder() -> Result<()> {
    let source = r#"function _0xp() {
    var list = ['aa', 'bb', 'cc', 'dd', 'ee', 'ff', 'gg'];
    _0xp = function () { return list; };
    return _0xp();
}
function _0xd(a, b) {
    var cached = _0xp();
    return _0xd = function (x, y) {
        x = x - 0x100;
        var item = cached[x];
        return item + (typeof y === 'string' ? '' : '?');
    }, _0xd(a, b);
}
var text = _0xd(0x101, 'k1') + _0xd('0x106', 'k2');"#;
    let (output, events) = process(source)?;
    assert!(output.ends_with("var text = 'bb' + 'gg';"), "{output}");
    assert_eq!(events.count(EventKind::DecoderValidated), 1);
    Ok(())
}

#[test]
fn hex_string_indices_resolve() -> Result<()> {
    let source = format!("{SETUP}var out = d('0x3') + d('0x7') + d(0x1 + 0x2);");
    let (output, _) = process(&source)?;
    assert!(output.ends_with("var out = 'b' + 'f' + 'b';"));
    Ok(())
}

#[test]
fn shadowed_decoder_names_are_left_alone() -> Result<()> {
    let source = format!(
        "{SETUP}function local(d) {{ return d(2); }}\n\
         function other() {{ var d = function (x) {{ return x; }}; return d(3); }}\n\
         var out = d(4);"
    );
    let (output, events) = process(&source)?;
    assert!(output.contains("function local(d) { return d(2); }"));
    assert!(output.contains("return d(3); }"));
    assert!(output.ends_with("var out = 'c';"));
    assert_eq!(events.count(EventKind::SiteSkipped(SkipReason::Shadowed)), 2);
    Ok(())
}

#[test]
fn nested_calls_fold_in_one_pass() -> Result<()> {
    let source = "var pool = ['3', 'x', 'y', 'z', 'w', 'v'];\n\
                  function d(i) { return pool[i]; }\n\
                  var out = d(d(0) * 1 + 1);";
    let (output, events) = process(source)?;
    assert!(output.ends_with("var out = 'w';"));
    assert_eq!(events.count(EventKind::SiteRewritten), 2);
    Ok(())
}

#[test]
fn calls_inside_deeply_nested_closures_are_decoded() -> Result<()> {
    let mut body = "[d(2)]".to_string();
    for _ in 0..45 {
        body = format!("(function () {{ return {body}; }})()");
    }
    let source = format!("{SETUP}var out = {body};");
    let (output, events) = process(&source)?;
    assert_eq!(output, source.replace("[d(2)]", "['a']"));
    assert_eq!(events.count(EventKind::SiteRewritten), 1);
    Ok(())
}

#[test]
fn statement_position_calls_are_decoded() -> Result<()> {
    let source = format!("{SETUP}function f() {{ d(3); return d(4); }}\nd(2);");
    let (output, events) = process(&source)?;
    assert_eq!(
        output,
        format!("{SETUP}function f() {{ ('b'); return 'c'; }}\n('a');")
    );
    assert_eq!(events.count(EventKind::SiteRewritten), 3);
    Ok(())
}

#[test]
fn runaway_setup_times_out_and_leaves_input() {
    let source = format!("{SETUP}while (pool) {{}}\nvar out = d(2);");
    let config = EngineConfig::default().with_sandbox_timeout(Duration::from_millis(200));
    let engine = DeobfuscationEngine::new(config);

    let result = engine.deobfuscate(&source);
    assert_eq!(result.code, source);
    assert!(result.converged);
    assert_eq!(result.events.count(EventKind::SandboxFailure), 1);
    assert!(result.total_time < Duration::from_secs(10));
}

#[test]
fn host_capabilities_are_not_reachable_from_the_setup() -> Result<()> {
    let source = "var pool = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
                  var captured = [(1, eval)('this').process, pool][0];\n\
                  var timers = [typeof setTimeout, typeof require, pool][0] + typeof globalThis.Buffer;\n\
                  function d(i) { return pool[i]; }";
    let program = parse(source)?;
    let prelude = Prelude::build(&program, &["pool"]);
    assert_eq!(prelude.statements().len(), 4);

    let mut sandbox = Sandbox::launch(prelude.source(), &SandboxConfig::default())?;
    assert_eq!(sandbox.inspect("captured")?, SandboxValue::Undefined);
    assert_eq!(
        sandbox.inspect("timers")?,
        SandboxValue::String("undefinedundefined".into())
    );
    Ok(())
}

#[test]
fn detect_requires_pool_and_reader() {
    let technique = StringPoolTechnique::new(EngineConfig::default());
    assert!(technique.detect(&format!("{SETUP}d(2);")));
    assert!(!technique.detect("var pool = ['a', 'b', 'c', 'd', 'e', 'f'];"));
    assert!(!technique.detect("function d(i) { return pool[i]; }"));
    assert!(!technique.detect("var ( = 1;"));
}
