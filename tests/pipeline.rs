//! Engine-level tests: rounds, fixed points, technique isolation and reporting.

use std::sync::Arc;

use jsdeob::{
    deobfuscation::{
        DeobfuscationEngine, EngineConfig, EventKind, EventLog, Technique,
    },
    Result,
};

const PROTECTED: &str = "var encode_version = 'jsjiami.com.v7';\n\
                         var _0x5a1c = ['log', 'Hello, ', 'world', 'x', 'y', 'z'];\n\
                         function _0x2b(i) { i = i - 0x1f; return _0x5a1c[i]; }\n\
                         console[_0x2b(0x1f)](_0x2b(0x20) + _0x2b(0x21));\n";

/// Unwraps a fake outer layer that hides the protected script.
struct Unwrap;

impl Technique for Unwrap {
    fn id(&self) -> &'static str {
        "unwrap"
    }

    fn name(&self) -> &'static str {
        "Unwrap"
    }

    fn detect(&self, code: &str) -> bool {
        code == "LAYER"
    }

    fn process(&self, _code: &str, events: &mut EventLog) -> Result<String> {
        events.record("unwrap", EventKind::EncodingDetected, "outer layer");
        Ok(PROTECTED.to_string())
    }
}

#[test]
fn protected_script_is_decoded_in_one_round() {
    let result = DeobfuscationEngine::default().deobfuscate(PROTECTED);
    assert_eq!(
        result.code,
        "\n\
         var _0x5a1c = ['log', 'Hello, ', 'world', 'x', 'y', 'z'];\n\
         function _0x2b(i) { i = i - 0x1f; return _0x5a1c[i]; }\n\
         console['log']('Hello, ' + 'world');\n"
    );
    assert!(result.converged);
    assert_eq!(result.rounds.len(), 2);
    assert_eq!(result.rounds[0].changed_by, vec!["string_pool"]);
    assert!(!result.rounds[1].changed());
    assert!(result.summary().contains("call sites decoded"));
}

#[test]
fn layered_input_converges_to_a_fixed_point() {
    let mut engine = DeobfuscationEngine::default();
    engine.register(Arc::new(Unwrap));

    let result = engine.deobfuscate("LAYER");
    assert!(result.code.ends_with("console['log']('Hello, ' + 'world');\n"));
    assert!(result.converged);
    assert_eq!(result.rounds.len(), 3);
    assert_eq!(result.rounds[0].changed_by, vec!["unwrap"]);
    assert_eq!(result.rounds[1].changed_by, vec!["string_pool"]);
    assert!(!result.rounds.last().unwrap().changed());
}

#[test]
fn output_of_a_run_is_a_fixed_point() {
    let engine = DeobfuscationEngine::default();
    let first = engine.deobfuscate(PROTECTED);
    let second = engine.deobfuscate(&first.code);
    assert_eq!(second.code, first.code);
    assert!(!second.changed());
    assert_eq!(second.rounds.len(), 1);
}

#[test]
fn round_cap_is_respected() {
    let mut engine = DeobfuscationEngine::new(EngineConfig::default().with_max_rounds(1));
    engine.register(Arc::new(Unwrap));

    let result = engine.deobfuscate("LAYER");
    assert_eq!(result.code, PROTECTED);
    assert!(!result.converged);
    assert_eq!(result.rounds.len(), 1);
}

#[test]
fn placeholder_techniques_report_but_keep_code() {
    let engine = DeobfuscationEngine::default();

    let glyph = "ﾟωﾟﾉ= /｀ｍ´）ﾉ ~┻━┻   //*´∇｀*/ ['_'];";
    let result = engine.deobfuscate(glyph);
    assert_eq!(result.code, glyph);
    assert_eq!(result.rounds[0].detected, vec!["aaencode"]);

    let punctuation = "[][(![]+[])[+[]]+(![]+[])[!+[]+!+[]]]";
    let result = engine.deobfuscate(punctuation);
    assert_eq!(result.code, punctuation);
    assert!(result.rounds[0].detected.contains(&"jsfuck"));
    assert!(result.events.count(EventKind::EncodingDetected) >= 1);
}

#[test]
fn unparseable_input_is_returned_unchanged() {
    let source = "var _0x5a1c = ['log', 'a', 'b', 'c', 'd', 'e';\nfunction (";
    let result = DeobfuscationEngine::default().deobfuscate(source);
    assert_eq!(result.code, source);
    assert!(result.converged);
    assert_eq!(result.summary(), "No changes");
}

#[test]
fn engines_run_concurrently() {
    let engine = Arc::new(DeobfuscationEngine::default());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.deobfuscate(PROTECTED).code)
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().ends_with("console['log']('Hello, ' + 'world');\n"));
    }
}
