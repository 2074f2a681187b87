//! Built-in techniques.
//!
//! | Id            | Technique                  | Decodes |
//! |---------------|----------------------------|---------|
//! | `string_pool` | [`StringPoolTechnique`]    | yes     |
//! | `aaencode`    | [`GlyphTechnique`]         | no      |
//! | `jsfuck`      | [`PunctuationTechnique`]   | no      |

mod glyph;
mod punctuation;
mod string_pool;

pub use glyph::GlyphTechnique;
pub use punctuation::PunctuationTechnique;
pub use string_pool::{StringPoolTechnique, ValidatedDecoder};
