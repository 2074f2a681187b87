//! Recognition of glyph-based encodings (aaencode).
//!
//! aaencode turns a script into an expression built from Japanese emoticons. The
//! output always contains at least one of a few characteristic fragments. Decoding is
//! not implemented; the technique only reports the encoding.

use crate::{
    deobfuscation::{
        events::{EventKind, EventLog},
        technique::Technique,
    },
    Result,
};

const MARKERS: &[&str] = &["ﾟωﾟ", "（｀・ω・´）", "ω｀"];

/// Detector for aaencode output.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlyphTechnique;

impl GlyphTechnique {
    /// Creates the technique.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Technique for GlyphTechnique {
    fn id(&self) -> &'static str {
        "aaencode"
    }

    fn name(&self) -> &'static str {
        "Glyph encoding"
    }

    fn detect(&self, code: &str) -> bool {
        MARKERS.iter().any(|marker| code.contains(marker))
    }

    fn process(&self, code: &str, events: &mut EventLog) -> Result<String> {
        if self.detect(code) {
            events.record(
                self.id(),
                EventKind::EncodingDetected,
                "glyph encoding present, left as is",
            );
        }
        Ok(code.to_string())
    }

    fn description(&self) -> &'static str {
        "Recognises emoticon-based encodings; decoding is not supported"
    }
}
