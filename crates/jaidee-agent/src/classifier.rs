//! Keyword risk classification.

use jaidee_core::config::RiskConfig;
use jaidee_core::types::{RiskAssessment, RiskLevel};
use std::collections::BTreeSet;

/// Pure text classifier. No I/O, so it is called inline.
pub trait RiskClassifier: Send + Sync {
    fn assess(&self, text: &str) -> RiskAssessment;
}

/// Case-insensitive substring match. Any high keyword wins; medium
/// keywords are only consulted when no high keyword matched.
pub struct KeywordRiskClassifier {
    high: Vec<String>,
    medium: Vec<String>,
}

impl KeywordRiskClassifier {
    pub fn new(config: &RiskConfig) -> Self {
        let normalize = |words: &[String]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            high: normalize(&config.high_keywords),
            medium: normalize(&config.medium_keywords),
        }
    }

    fn matches(words: &[String], text: &str) -> BTreeSet<String> {
        words.iter().filter(|w| text.contains(w.as_str())).cloned().collect()
    }
}

impl Default for KeywordRiskClassifier {
    fn default() -> Self {
        Self::new(&RiskConfig::default())
    }
}

impl RiskClassifier for KeywordRiskClassifier {
    fn assess(&self, text: &str) -> RiskAssessment {
        let text = text.to_lowercase();

        let high = Self::matches(&self.high, &text);
        if !high.is_empty() {
            return RiskAssessment { level: RiskLevel::High, keywords: high };
        }
        let medium = Self::matches(&self.medium, &text);
        if !medium.is_empty() {
            return RiskAssessment { level: RiskLevel::Medium, keywords: medium };
        }
        RiskAssessment::low()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let c = KeywordRiskClassifier::default();
        assert_eq!(c.assess("had a nice walk today").level, RiskLevel::Low);
        assert_eq!(c.assess("ช่วงนี้เครียดมาก").level, RiskLevel::Medium);
        assert_eq!(c.assess("I think I took an OVERDOSE").level, RiskLevel::High);
    }

    #[test]
    fn test_high_collects_all_and_ignores_medium() {
        let c = KeywordRiskClassifier::default();
        let a = c.assess("stressed and lonely, thinking about suicide, maybe overdose");
        assert_eq!(a.level, RiskLevel::High);
        let expected: BTreeSet<String> =
            ["overdose", "suicide"].iter().map(|s| s.to_string()).collect();
        assert_eq!(a.keywords, expected);
    }

    #[test]
    fn test_no_short_token_false_positive() {
        let c = KeywordRiskClassifier::default();
        // "good" contains "od"; bare "od" is not a keyword
        assert_eq!(c.assess("good morning").level, RiskLevel::Low);
    }

    #[test]
    fn test_custom_keywords() {
        let config = RiskConfig {
            high_keywords: vec!["  Relapse ".into(), String::new()],
            medium_keywords: vec!["craving".into()],
            ..Default::default()
        };
        let c = KeywordRiskClassifier::new(&config);
        assert_eq!(c.assess("I had a relapse").level, RiskLevel::High);
        assert_eq!(c.assess("strong craving tonight").level, RiskLevel::Medium);
        assert!(c.assess("").keywords.is_empty());
    }
}
