//! Query intent classification.
//!
//! Pure pattern matching over the lowercased query. The flags are mutually
//! informative, not mutually exclusive: compatibility takes precedence over
//! installation by construction order, and feature questions only register
//! when the query is neither installation nor troubleshooting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Bluetooth,
    Audio,
    Display,
    Compatibility,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryIntent {
    pub is_compatibility: bool,
    pub is_installation: bool,
    pub is_troubleshooting: bool,
    pub is_feature: bool,
    pub problem_type: Option<ProblemType>,
}

const COMPATIBILITY_TERMS: &[&str] = &[
    "compatible",
    "compatibility",
    "will it work",
    "will this work",
    "does it work",
    "does it fit",
    "will it fit",
    "fitment",
    "fit my",
    "can i",
    "can we",
    "is it compatible",
    "work with",
    "work on",
    "support my",
    "retain",
    "keep my",
    "keep the",
    "兼容",
    "适配",
    "能不能",
    "可以用",
    "能用",
    "支持",
    "保留",
];

const INSTALLATION_TERMS: &[&str] = &[
    "install",
    "installation",
    "installing",
    "wiring",
    "wire",
    "harness",
    "mount",
    "mounting",
    "hook up",
    "hooking up",
    "setup guide",
    "remove the",
    "removal",
    "安装",
    "接线",
    "怎么装",
    "拆卸",
    "拆掉",
];

const TROUBLESHOOTING_TERMS: &[&str] = &[
    "not working",
    "doesn't work",
    "does not work",
    "won't",
    "wont",
    "stopped working",
    "no sound",
    "no audio",
    "blank screen",
    "black screen",
    "frozen",
    "freezes",
    "error",
    "can't",
    "cannot",
    "failed",
    "failure",
    "problem",
    "issue",
    "broken",
    "没有声音",
    "没声音",
    "黑屏",
    "不能",
    "不了",
    "坏了",
    "故障",
    "没反应",
    "问题",
    "死机",
];

const FEATURE_TERMS: &[&str] = &[
    "how to",
    "how do i",
    "how can i",
    "configure",
    "configuration",
    "setting",
    "settings",
    "adjust",
    "enable",
    "disable",
    "turn on",
    "turn off",
    "use the",
    "怎么用",
    "如何",
    "设置",
    "开启",
    "关闭",
];

const BLUETOOTH_TERMS: &[&str] = &["bluetooth", "pairing", "pair my", "蓝牙", "配对"];
const AUDIO_TERMS: &[&str] = &["sound", "audio", "volume", "speaker", "声音", "音量", "音频", "喇叭"];
const DISPLAY_TERMS: &[&str] = &["screen", "display", "touch", "屏", "显示", "触摸"];

pub struct IntentClassifier {}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {}
    }

    pub fn classify(&self, query: &str) -> QueryIntent {
        let query_lower = query.to_lowercase();
        let contains_any = |terms: &[&str]| terms.iter().any(|t| query_lower.contains(t));

        let is_compatibility = contains_any(COMPATIBILITY_TERMS);
        let is_installation = contains_any(INSTALLATION_TERMS) && !is_compatibility;
        let is_troubleshooting = contains_any(TROUBLESHOOTING_TERMS);
        let is_feature =
            contains_any(FEATURE_TERMS) && !is_installation && !is_troubleshooting;

        // Problem type by priority: bluetooth → audio → display → compatibility.
        let problem_type = if contains_any(BLUETOOTH_TERMS) {
            Some(ProblemType::Bluetooth)
        } else if contains_any(AUDIO_TERMS) {
            Some(ProblemType::Audio)
        } else if contains_any(DISPLAY_TERMS) {
            Some(ProblemType::Display)
        } else if is_compatibility {
            Some(ProblemType::Compatibility)
        } else {
            None
        };

        QueryIntent {
            is_compatibility,
            is_installation,
            is_troubleshooting,
            is_feature,
            problem_type,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bluetooth_no_sound_chinese() {
        let intent = IntentClassifier::new().classify("蓝牙没有声音");
        assert!(intent.is_troubleshooting);
        assert_eq!(intent.problem_type, Some(ProblemType::Bluetooth));
    }

    #[test]
    fn compatibility_beats_installation() {
        let intent =
            IntentClassifier::new().classify("is it compatible with my factory install kit");
        assert!(intent.is_compatibility);
        assert!(!intent.is_installation);
    }

    #[test]
    fn installation_query() {
        let intent = IntentClassifier::new().classify("wiring harness installation for Camry");
        assert!(intent.is_installation);
        assert!(!intent.is_compatibility);
    }

    #[test]
    fn feature_requires_no_failure_vocab() {
        let intent = IntentClassifier::new().classify("how to adjust the equalizer settings");
        assert!(intent.is_feature);
        assert!(!intent.is_troubleshooting);

        let intent = IntentClassifier::new().classify("how to fix screen not working");
        assert!(!intent.is_feature);
        assert!(intent.is_troubleshooting);
    }

    #[test]
    fn audio_problem_type_priority() {
        // Bluetooth wins over audio when both appear.
        let intent = IntentClassifier::new().classify("bluetooth audio cuts out");
        assert_eq!(intent.problem_type, Some(ProblemType::Bluetooth));

        let intent = IntentClassifier::new().classify("no sound from rear speakers");
        assert_eq!(intent.problem_type, Some(ProblemType::Audio));
    }

    #[test]
    fn compatibility_problem_type_only_with_flag() {
        let intent = IntentClassifier::new().classify("will it work with my 2012 Highlander");
        assert!(intent.is_compatibility);
        assert_eq!(intent.problem_type, Some(ProblemType::Compatibility));
    }

    #[test]
    fn plain_lookup_has_no_flags() {
        let intent = IntentClassifier::new().classify("Highlander radio specifications");
        assert!(!intent.is_compatibility);
        assert!(!intent.is_installation);
        assert!(!intent.is_troubleshooting);
        assert_eq!(intent.problem_type, None);
    }
}
