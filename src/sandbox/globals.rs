//! The global surface visible to sandboxed code.
//!
//! boa ships only the ECMAScript built-ins, so there is no module loader, no timers and
//! no host object graph to begin with. On top of that the sandbox adds the few helpers
//! obfuscated code assumes (`console`, `atob`, `btoa`) and binds every
//! [`DENIED_GLOBALS`] name to `undefined` so that feature checks see nothing.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use boa_engine::{
    object::ObjectInitializer, property::Attribute, Context, JsArgs, JsError, JsNativeError,
    JsResult, JsString, JsValue, NativeFunction,
};

use crate::analysis::DENIED_GLOBALS;

/// `atob` accepts unpadded input and ignores non-zero trailing bits, as browsers do.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const CONSOLE_METHODS: &[&str] = &["log", "info", "warn", "error", "debug", "trace"];

/// Installs the allow-list and the deny-list into a fresh context.
///
/// # Arguments
///
/// * `context` - The context to populate.
///
/// # Errors
///
/// Returns the interpreter's message if a property cannot be defined.
pub fn install(context: &mut Context) -> Result<(), String> {
    let mut console = ObjectInitializer::new(context);
    for method in CONSOLE_METHODS {
        console.function(
            NativeFunction::from_fn_ptr(console_noop),
            JsString::from(*method),
            0,
        );
    }
    let console = console.build();
    context
        .register_global_property(JsString::from("console"), console, Attribute::all())
        .map_err(|e| e.to_string())?;

    context
        .register_global_builtin_callable(
            JsString::from("atob"),
            1,
            NativeFunction::from_fn_ptr(atob),
        )
        .map_err(|e| e.to_string())?;
    context
        .register_global_builtin_callable(
            JsString::from("btoa"),
            1,
            NativeFunction::from_fn_ptr(btoa),
        )
        .map_err(|e| e.to_string())?;

    for name in DENIED_GLOBALS {
        context
            .register_global_property(
                JsString::from(*name),
                JsValue::undefined(),
                Attribute::all(),
            )
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn console_noop(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::undefined())
}

fn invalid_character(what: &str) -> JsError {
    JsNativeError::error()
        .with_message(format!("InvalidCharacterError: {what}"))
        .into()
}

fn atob(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let input = args
        .get_or_undefined(0)
        .to_string(ctx)?
        .to_std_string_escaped();
    let compact: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\x0C' | '\r'))
        .collect();
    let bytes = FORGIVING
        .decode(compact.as_bytes())
        .map_err(|_| invalid_character("the string to be decoded is not correctly encoded"))?;
    let latin1: String = bytes.into_iter().map(char::from).collect();
    Ok(JsValue::from(JsString::from(latin1.as_str())))
}

fn btoa(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let input = args
        .get_or_undefined(0)
        .to_string(ctx)?
        .to_std_string_escaped();
    let bytes = input
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| invalid_character("the string contains characters outside of Latin1"))?;
    let encoded = FORGIVING.encode(bytes);
    Ok(JsValue::from(JsString::from(encoded.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn eval(source: &str) -> JsResult<JsValue> {
        let mut context = Context::default();
        install(&mut context).unwrap();
        context.eval(Source::from_bytes(source))
    }

    fn eval_string(source: &str) -> String {
        eval(source)
            .unwrap()
            .as_string()
            .unwrap()
            .to_std_string()
            .unwrap()
    }

    #[test]
    fn test_base64_helpers() {
        assert_eq!(eval_string("btoa('hello')"), "aGVsbG8=");
        assert_eq!(eval_string("atob('aGVsbG8=')"), "hello");
        assert_eq!(eval_string("atob('aGVsbG8')"), "hello");
        assert_eq!(eval_string("atob(' aGVs\\nbG8= ')"), "hello");
        assert_eq!(eval_string("atob(btoa('\\xff\\x00'))"), "\u{ff}\u{0}");
    }

    #[test]
    fn test_base64_errors_are_catchable() {
        assert!(eval("atob('!!!')").is_err());
        assert!(eval("btoa('\\u0100')").is_err());
        assert_eq!(
            eval_string("try { atob('@'); 'no' } catch (e) { 'caught' }"),
            "caught"
        );
    }

    #[test]
    fn test_console_is_silent() {
        assert!(eval("console.log('x'); console.warn(1, 2); console.trace()")
            .unwrap()
            .is_undefined());
    }

    #[test]
    fn test_denied_globals_are_undefined() {
        for name in DENIED_GLOBALS {
            assert_eq!(eval_string(&format!("typeof {name}")), "undefined");
        }
    }
}
