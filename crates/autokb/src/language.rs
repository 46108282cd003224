//! Query language detection.
//!
//! The corpus is English-only but users ask in Chinese or English. Detection
//! drives keyword translation and the language of selection prompts and
//! answer-format instructions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

/// Classify text as Chinese-bearing or not.
///
/// Any character in the CJK unified ideograph block, CJK punctuation, or the
/// fullwidth/halfwidth forms block marks the text as Chinese. Everything else
/// is treated as English.
pub fn detect_language(text: &str) -> Language {
    let has_cjk = text.chars().any(|c| {
        matches!(c,
            '\u{4e00}'..='\u{9fff}'   // CJK unified ideographs
            | '\u{3000}'..='\u{303f}' // CJK symbols and punctuation
            | '\u{ff00}'..='\u{ffef}' // fullwidth and halfwidth forms
        )
    });
    if has_cjk {
        Language::Zh
    } else {
        Language::En
    }
}
