//! Recognition of punctuation-only encodings (JSFuck).
//!
//! JSFuck writes any script using the six characters `[ ] ( ) + !`. A script where
//! those characters make up a large share of the text is reported. Decoding is not
//! implemented.

use crate::{
    deobfuscation::{
        events::{EventKind, EventLog},
        technique::Technique,
    },
    Result,
};

/// Detector for JSFuck output.
#[derive(Debug, Clone, Copy)]
pub struct PunctuationTechnique {
    /// Share of punctuation characters above which a script matches.
    threshold: f64,
}

impl PunctuationTechnique {
    /// Creates the technique.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Density in `0.0..=1.0`; a script matches if its density is
    ///   strictly greater.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Share of `[ ] ( ) + !` among all characters of `code`.
    #[must_use]
    pub fn density(code: &str) -> f64 {
        let (total, punctuation) = code.chars().fold((0usize, 0usize), |(total, hits), c| {
            let hit = matches!(c, '[' | ']' | '(' | ')' | '+' | '!');
            (total + 1, hits + usize::from(hit))
        });
        punctuation as f64 / total.max(1) as f64
    }
}

impl Technique for PunctuationTechnique {
    fn id(&self) -> &'static str {
        "jsfuck"
    }

    fn name(&self) -> &'static str {
        "Punctuation encoding"
    }

    fn detect(&self, code: &str) -> bool {
        Self::density(code) > self.threshold
    }

    fn process(&self, code: &str, events: &mut EventLog) -> Result<String> {
        if self.detect(code) {
            events.record(
                self.id(),
                EventKind::EncodingDetected,
                format!("punctuation density {:.2}, left as is", Self::density(code)),
            );
        }
        Ok(code.to_string())
    }

    fn description(&self) -> &'static str {
        "Recognises []()+! encodings; decoding is not supported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density() {
        assert_eq!(PunctuationTechnique::density(""), 0.0);
        assert_eq!(PunctuationTechnique::density("[]"), 1.0);
        assert_eq!(PunctuationTechnique::density("ab()"), 0.5);
    }

    #[test]
    fn test_detect() {
        let technique = PunctuationTechnique::new(0.12);
        assert!(technique.detect("[][(![]+[])[+[]]+(![]+[])[!+[]+!+[]]]"));
        assert!(!technique.detect("console.log('hello world, this is plain code');"));
        assert!(!technique.detect(""));
    }

    #[test]
    fn test_process_is_identity() -> Result<()> {
        let technique = PunctuationTechnique::new(0.12);
        let mut events = EventLog::new();
        let code = "(+[]+!![])";
        assert_eq!(technique.process(code, &mut events)?, code);
        assert_eq!(events.count(EventKind::EncodingDetected), 1);
        Ok(())
    }
}
