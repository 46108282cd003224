//! Keyword extraction and translation.
//!
//! Turns a free-text question into the ordered, de-duplicated term list used
//! both for store retrieval and for relevance scoring. The corpus is
//! English-only, so Chinese input additionally contributes English
//! equivalents from a static domain table and, when a completion service is
//! configured, from one bounded AI-assisted call. Every step may fail
//! independently; extraction always returns at least one usable term (the
//! raw query itself).

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::time::timeout;

use crate::completion::{CompletionParams, CompletionService};
use crate::config::CompletionConfig;
use crate::language::Language;
use crate::types::{ConversationMessage, Query, TokenUsage};

static YEAR_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:19|20)\d{2})\s*(?:-|–|—|~|到|至)\s*((?:19|20)\d{2})")
        .expect("year range regex is valid")
});
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year regex is valid"));
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,2}(?:\.\d)?\s*(?:寸|[iI]nch(?:es)?)").expect("size regex is valid")
});
static CAP_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z][a-zA-Z0-9]*(?:[ -][A-Z][a-zA-Z0-9]*)*\b")
        .expect("capitalized phrase regex is valid")
});
static ABBREV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}[0-9]*\b").expect("abbreviation regex is valid"));

/// Capitalized words that are never vehicle model names: sentence-leading
/// question words plus capitalized technical vocabulary.
const CAP_STOPWORDS: &[&str] = &[
    "Can", "Could", "Will", "Would", "Should", "What", "Which", "How", "Why", "Where", "When",
    "Who", "Does", "Do", "Did", "Is", "Are", "Was", "Were", "The", "My", "Our", "Your", "Their",
    "This", "That", "These", "Those", "If", "Hi", "Hello", "Please", "It", "After", "Before",
    "And", "But", "Not", "For", "With", "Install", "Installation", "Video", "New", "Thanks",
    "Bluetooth", "Apple", "CarPlay", "Android", "Auto", "Audio", "Radio", "Screen", "Camera",
    "Navigation", "WiFi", "Wifi", "Backup", "Factory", "Head", "Unit", "Stereo", "Steering",
    "Wheel", "Control", "Blank", "Sound", "Wiring", "Harness", "Setup", "Guide", "Tutorial",
];

/// Vehicle brands. Brand names alone never force exclusion in scoring; only
/// specific model tokens do.
const BRANDS: &[&str] = &[
    "toyota", "honda", "nissan", "ford", "chevrolet", "chevy", "gmc", "mazda", "subaru",
    "hyundai", "kia", "volkswagen", "vw", "bmw", "mercedes", "audi", "lexus", "acura",
    "infiniti", "jeep", "dodge", "ram", "chrysler", "buick", "cadillac", "mitsubishi", "suzuki",
    "volvo",
];

const EN_STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "on", "for", "to", "and", "or", "is", "are", "was", "were",
    "can", "could", "will", "would", "should", "you", "your", "me", "my", "our", "i", "it",
    "its", "this", "that", "these", "those", "with", "from", "about", "does", "do", "did",
    "how", "what", "which", "where", "when", "why", "who", "not", "have", "has", "had", "be",
    "been", "there", "their", "please", "tell", "show", "need", "want", "get", "any", "some",
];

/// Domain translation table for Chinese queries. Any key found as a substring
/// of the query contributes all its English tokens.
const ZH_DOMAIN_TERMS: &[(&str, &[&str])] = &[
    // Brands
    ("丰田", &["Toyota"]),
    ("本田", &["Honda"]),
    ("日产", &["Nissan"]),
    ("福特", &["Ford"]),
    ("马自达", &["Mazda"]),
    ("斯巴鲁", &["Subaru"]),
    ("现代", &["Hyundai"]),
    ("起亚", &["Kia"]),
    ("大众", &["Volkswagen"]),
    ("雪佛兰", &["Chevrolet"]),
    ("吉普", &["Jeep"]),
    ("雷克萨斯", &["Lexus"]),
    // Models
    ("汉兰达", &["Highlander"]),
    ("凯美瑞", &["Camry"]),
    ("卡罗拉", &["Corolla"]),
    ("普拉多", &["Prado"]),
    ("思域", &["Civic"]),
    ("雅阁", &["Accord"]),
    ("途胜", &["Tucson"]),
    // Operations
    ("安装", &["installation", "install"]),
    ("接线", &["wiring", "harness"]),
    ("拆卸", &["removal"]),
    ("升级", &["upgrade"]),
    ("设置", &["settings", "setup"]),
    ("教程", &["tutorial", "guide"]),
    // Components
    ("方向盘控制", &["steering wheel control", "SWC"]),
    ("方向盘", &["steering wheel"]),
    ("倒车影像", &["backup camera"]),
    ("倒车", &["reverse", "backup"]),
    ("摄像头", &["camera"]),
    ("收音机", &["radio"]),
    ("原车", &["factory", "original"]),
    ("原厂", &["factory", "OEM"]),
    ("主机", &["head unit", "stereo"]),
    ("导航", &["navigation", "GPS"]),
    ("蓝牙", &["bluetooth"]),
    ("屏幕", &["screen", "display"]),
    ("触摸", &["touch"]),
    ("视频", &["video"]),
    // Symptoms
    ("没有声音", &["no sound", "audio"]),
    ("没声音", &["no sound", "audio"]),
    ("声音", &["sound", "audio"]),
    ("黑屏", &["blank screen"]),
    ("死机", &["frozen"]),
    ("兼容", &["compatible", "compatibility"]),
    ("适配", &["compatible", "fit"]),
];

/// English-to-English domain normalization (abbreviations and regional terms
/// mapped to corpus vocabulary).
const EN_DOMAIN_TERMS: &[(&str, &[&str])] = &[
    ("swc", &["steering wheel control"]),
    ("reversing camera", &["backup camera"]),
    ("rear camera", &["backup camera"]),
    ("sat nav", &["navigation", "GPS"]),
    ("head unit", &["stereo", "radio"]),
    ("oem", &["factory", "original"]),
];

// ============================================================================
// Shared keyword helpers (used by scoring and retrieval)
// ============================================================================

pub fn is_brand(token: &str) -> bool {
    BRANDS.contains(&token.to_lowercase().as_str())
}

/// Keywords that read as 4-digit years.
pub fn year_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| k.len() == 4 && k.parse::<i32>().map_or(false, |y| (1900..=2029).contains(&y)))
        .cloned()
        .collect()
}

/// Capitalized non-brand keywords — candidate vehicle model names. All-caps
/// abbreviations (SWC, GPS) are ordinary keywords, not model candidates.
pub fn model_candidates(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| {
            let Some(m) = CAP_PHRASE_RE.find(k) else {
                return false;
            };
            if m.as_str().len() != k.len() {
                return false;
            }
            let first = k.split([' ', '-']).next().unwrap_or(k);
            !is_brand(k) && !CAP_STOPWORDS.contains(&first)
        })
        .cloned()
        .collect()
}

/// Brand keywords present in the set.
pub fn brand_keywords(keywords: &[String]) -> Vec<String> {
    keywords.iter().filter(|k| is_brand(k)).cloned().collect()
}

// ============================================================================
// Extraction
// ============================================================================

#[derive(Debug, Clone)]
pub struct KeywordExtraction {
    pub keywords: Vec<String>,
    /// Tokens consumed by the AI-assisted extraction call, when it ran.
    pub usage: Option<TokenUsage>,
}

pub struct KeywordExtractor {
    completion: Option<Arc<dyn CompletionService>>,
    params: CompletionParams,
    timeout_secs: u64,
    max_keywords: usize,
}

impl KeywordExtractor {
    pub fn new(
        completion: Option<Arc<dyn CompletionService>>,
        config: &CompletionConfig,
        max_keywords: usize,
    ) -> Self {
        Self {
            completion,
            params: CompletionParams {
                model: config.model.clone(),
                temperature: 0.1,
                max_tokens: 200,
            },
            timeout_secs: config.extraction_timeout_secs,
            max_keywords,
        }
    }

    /// Full extraction: preserved literals, AI-assisted terms when available,
    /// domain-table translations, tokenization fallback — merged in that
    /// priority order.
    pub async fn extract(&self, query: &Query) -> KeywordExtraction {
        let preserved = preserved_info(&query.text);
        let (ai_terms, usage) = self.ai_keywords(query).await;
        let table = translation_terms(&query.text, query.language);
        let tokens = tokenize_fallback(&query.text, query.language, &preserved);

        let keywords = merge_capped(
            vec![preserved, ai_terms, table, tokens],
            self.max_keywords,
            &query.text,
        );
        tracing::debug!(query = %query.text, keywords = ?keywords, "extracted keyword set");
        KeywordExtraction { keywords, usage }
    }

    async fn ai_keywords(&self, query: &Query) -> (Vec<String>, Option<TokenUsage>) {
        let Some(service) = self.completion.as_ref() else {
            return (Vec::new(), None);
        };

        let instruction = match query.language {
            Language::Zh => {
                "Extract search keywords from the user's question about car stereo head units \
                 and translate them to English. Preserve years, year ranges (expanded to \
                 individual years), vehicle model names, and multi-word technical phrases \
                 exactly. Reply with a comma-separated list only."
            }
            Language::En => {
                "Extract search keywords from the user's question about car stereo head units. \
                 Preserve years, year ranges (expanded to individual years), vehicle model \
                 names, and multi-word technical phrases exactly. Reply with a comma-separated \
                 list only."
            }
        };
        let messages = [ConversationMessage {
            role: "user".to_string(),
            content: query.text.clone(),
        }];

        let call = service.complete(instruction, &messages, &self.params);
        match timeout(Duration::from_secs(self.timeout_secs), call).await {
            Ok(Ok(completion)) => {
                let terms = parse_keyword_list(&completion.text);
                (terms, Some(completion.usage))
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "AI keyword extraction failed, using rule-based keywords only");
                (Vec::new(), None)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout_secs,
                    "AI keyword extraction timed out, using rule-based keywords only"
                );
                (Vec::new(), None)
            }
        }
    }
}

/// Deterministic extraction path: preserved literals, table translations and
/// tokenization only. Used on the selection follow-up turn, which must score
/// sections against the original query without another AI round-trip.
pub fn rule_based_keywords(query: &Query, max_keywords: usize) -> Vec<String> {
    let preserved = preserved_info(&query.text);
    let table = translation_terms(&query.text, query.language);
    let tokens = tokenize_fallback(&query.text, query.language, &preserved);
    merge_capped(vec![preserved, table, tokens], max_keywords, &query.text)
}

/// Rule-based scan for literals that must survive extraction verbatim:
/// year ranges (expanded), bare years, size tokens, capitalized phrases
/// (candidate model names, plus their component words), all-caps
/// abbreviations.
fn preserved_info(text: &str) -> Vec<String> {
    let mut out = Vec::new();

    for cap in YEAR_RANGE_RE.captures_iter(text) {
        let start: i32 = cap[1].parse().unwrap_or(0);
        let end: i32 = cap[2].parse().unwrap_or(0);
        if start > 0 && start <= end && end - start <= 30 {
            for year in start..=end {
                out.push(year.to_string());
            }
        }
    }

    for cap in YEAR_RE.captures_iter(text) {
        if let Ok(year) = cap[1].parse::<i32>() {
            if (1900..=2029).contains(&year) {
                out.push(year.to_string());
            }
        }
    }

    for m in SIZE_RE.find_iter(text) {
        out.push(m.as_str().trim().to_string());
    }

    for m in CAP_PHRASE_RE.find_iter(text) {
        let phrase = m.as_str();
        let first = phrase.split([' ', '-']).next().unwrap_or(phrase);
        if CAP_STOPWORDS.contains(&first) {
            continue;
        }
        out.push(phrase.to_string());
        // Component words of multi-word phrases are keywords of their own, so
        // "Toyota Camry" also contributes "Toyota" and "Camry".
        if phrase.contains(' ') {
            for word in phrase.split(' ') {
                if !CAP_STOPWORDS.contains(&word) {
                    out.push(word.to_string());
                }
            }
        }
    }

    for m in ABBREV_RE.find_iter(text) {
        out.push(m.as_str().to_string());
    }

    out
}

fn translation_terms(text: &str, language: Language) -> Vec<String> {
    let mut out = Vec::new();
    match language {
        Language::Zh => {
            for (key, values) in ZH_DOMAIN_TERMS {
                if text.contains(key) {
                    out.extend(values.iter().map(|v| v.to_string()));
                }
            }
        }
        Language::En => {
            let text_lower = text.to_lowercase();
            for (key, values) in EN_DOMAIN_TERMS {
                if text_lower.contains(key) {
                    out.extend(values.iter().map(|v| v.to_string()));
                }
            }
        }
    }
    out
}

fn tokenize_fallback(text: &str, language: Language, preserved: &[String]) -> Vec<String> {
    let preserved_lower: HashSet<String> = preserved.iter().map(|p| p.to_lowercase()).collect();
    let source = text.to_lowercase();
    source
        .split(|c: char| !c.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .filter(|segment| match language {
            // English: drop stop-words and short tokens.
            Language::En => segment.chars().count() > 2 && !EN_STOPWORDS.contains(segment),
            // Chinese: whole segments between punctuation; single characters
            // are too ambiguous to search on.
            Language::Zh => segment.chars().count() > 1,
        })
        .filter(|segment| {
            // Bare digits only survive if the preserved scan kept them.
            let all_digits = segment.chars().all(|c| c.is_ascii_digit());
            !all_digits || preserved_lower.contains(*segment)
        })
        .map(|segment| segment.to_string())
        .collect()
}

/// Parse the AI reply into keyword candidates: comma/newline separated,
/// tolerant of numbering, bullets and quoting, long fragments dropped.
fn parse_keyword_list(text: &str) -> Vec<String> {
    text.split(|c: char| matches!(c, ',' | '\n' | ';' | '、' | '，'))
        .map(|part| {
            strip_list_marker(part.trim())
                .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
                .to_string()
        })
        .filter(|part| !part.is_empty())
        .filter(|part| part.split_whitespace().count() <= 6)
        .take(15)
        .collect()
}

/// Strip "1. " / "2) " numbering and "- " bullets without eating bare years
/// ("2012") or size tokens ("10.1 inch").
fn strip_list_marker(part: &str) -> &str {
    if let Some(rest) = part.strip_prefix("- ") {
        return rest;
    }
    let digits = part.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &part[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if after.is_empty() || after.starts_with(' ') {
                return after;
            }
        }
    }
    part
}

/// Merge keyword groups preserving priority order, de-duplicate
/// case-insensitively on first-seen, cap the list, then append the raw query
/// as the final fallback keyword. The fallback is appended after capping so
/// it can never be evicted by truncation.
fn merge_capped(groups: Vec<Vec<String>>, max_keywords: usize, raw_query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for keyword in groups.into_iter().flatten() {
        let trimmed = keyword.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out.truncate(max_keywords);

    let raw = raw_query.trim();
    if !raw.is_empty() && !out.iter().any(|k| k.eq_ignore_ascii_case(raw) || k == raw) {
        out.push(raw.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::detect_language;

    fn query(text: &str) -> Query {
        Query {
            text: text.to_string(),
            language: detect_language(text),
        }
    }

    #[test]
    fn year_range_expands() {
        let q = query("Highlander 2008-2013 installation video");
        let keywords = rule_based_keywords(&q, 20);
        for expected in ["Highlander", "2008", "2009", "2010", "2011", "2012", "2013", "installation", "video"] {
            assert!(
                keywords.iter().any(|k| k.eq_ignore_ascii_case(expected)),
                "missing {:?} in {:?}",
                expected,
                keywords
            );
        }
    }

    #[test]
    fn chinese_query_contains_raw_text() {
        let q = query("蓝牙没有声音");
        let keywords = rule_based_keywords(&q, 20);
        assert!(!keywords.is_empty());
        assert!(keywords.iter().any(|k| k == "蓝牙没有声音"));
        assert!(keywords.iter().any(|k| k.eq_ignore_ascii_case("bluetooth")));
        assert!(keywords.iter().any(|k| k.eq_ignore_ascii_case("no sound")));
    }

    #[test]
    fn chinese_model_translates() {
        let q = query("汉兰达安装教程");
        let keywords = rule_based_keywords(&q, 20);
        assert!(keywords.iter().any(|k| k == "Highlander"));
        assert!(keywords.iter().any(|k| k.eq_ignore_ascii_case("installation")));
    }

    #[test]
    fn localized_year_range_separator() {
        let q = query("2010到2012年的凯美瑞");
        let keywords = rule_based_keywords(&q, 20);
        for expected in ["2010", "2011", "2012", "Camry"] {
            assert!(keywords.iter().any(|k| k == expected), "missing {:?}", expected);
        }
    }

    #[test]
    fn abbreviations_and_sizes_preserved() {
        let q = query("Does SWC work on a 10.1 inch unit");
        let keywords = rule_based_keywords(&q, 20);
        assert!(keywords.iter().any(|k| k == "SWC"));
        assert!(keywords.iter().any(|k| k.contains("10.1")));
        // SWC abbreviation expands through the English domain table.
        assert!(keywords.iter().any(|k| k == "steering wheel control"));
    }

    #[test]
    fn sentence_leading_capital_is_not_a_model() {
        let q = query("Can I keep my factory radio");
        let models = model_candidates(&rule_based_keywords(&q, 20));
        assert!(models.is_empty(), "unexpected model candidates: {:?}", models);
    }

    #[test]
    fn brand_and_model_candidates_split() {
        let q = query("Toyota Camry 2010 wiring");
        let keywords = rule_based_keywords(&q, 20);
        let models = model_candidates(&keywords);
        assert!(models.iter().any(|m| m == "Camry"));
        assert!(!models.iter().any(|m| m == "Toyota"));
        assert!(brand_keywords(&keywords).iter().any(|b| b == "Toyota"));
    }

    #[test]
    fn cap_applies_before_raw_query_fallback() {
        let q = query("Toyota Honda Nissan Ford Mazda Subaru Hyundai Kia Jeep Lexus Camry Civic Accord Tucson Corolla Prado Highlander 2008 2009 2010 2011 2012");
        let keywords = rule_based_keywords(&q, 20);
        // 20 capped entries plus the raw query appended.
        assert_eq!(keywords.len(), 21);
        assert_eq!(keywords.last().map(String::as_str), Some(q.text.as_str()));
    }

    #[test]
    fn duplicate_case_insensitive_dedup() {
        let q = query("Bluetooth bluetooth BLUETOOTH pairing");
        let keywords = rule_based_keywords(&q, 20);
        let bt_count = keywords
            .iter()
            .filter(|k| k.eq_ignore_ascii_case("bluetooth"))
            .count();
        assert_eq!(bt_count, 1);
    }

    #[test]
    fn year_keyword_helper() {
        let keywords = vec!["Highlander".to_string(), "2012".to_string(), "radio".to_string()];
        assert_eq!(year_keywords(&keywords), vec!["2012".to_string()]);
    }

    #[tokio::test]
    async fn extract_without_completion_service_still_returns_keywords() {
        let extractor = KeywordExtractor::new(None, &crate::config::EngineConfig::default().completion, 20);
        let extraction = extractor.extract(&query("Highlander 2012 no sound")).await;
        assert!(!extraction.keywords.is_empty());
        assert!(extraction.usage.is_none());
    }

    #[test]
    fn ai_reply_parsing_tolerates_numbering() {
        let parsed = parse_keyword_list("1. Highlander\n2. backup camera\n3. 2012");
        assert_eq!(parsed, vec!["Highlander", "backup camera", "2012"]);
    }
}
