//! Append-only record of executed steps.
//!
//! Every reportable action ends up here as a [`StepRecord`]. Order is the
//! order in which actions completed, which is what turns the log back into
//! a readable test narrative.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Gherkin-style keyword that prefixes a step in the narrative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyword {
    Given,
    Then,
    And,
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Keyword::Given => "Given",
            Keyword::Then => "Then",
            Keyword::And => "And",
        };
        f.write_str(s)
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Informational, never fails a scenario
    Suggestion,
    /// Soft warning, never aborts a scenario
    PerformanceFail,
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed)
    }
}

/// One logged outcome of an action or check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub keyword: Keyword,
    pub tag: String,
    pub message: String,
    pub status: StepStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "screenshot_base64"
    )]
    pub screenshot: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_key: Option<String>,
}

/// Ordered step records plus the tag applied to new records.
#[derive(Debug, Default, Clone)]
pub struct StepLog {
    records: Vec<StepRecord>,
    current_tag: String,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record under the current tag.
    pub fn push(
        &mut self,
        keyword: Keyword,
        message: impl Into<String>,
        status: StepStatus,
        screenshot: Option<Vec<u8>>,
        diff_key: Option<String>,
    ) -> &StepRecord {
        let record = StepRecord {
            keyword,
            tag: self.current_tag.clone(),
            message: message.into(),
            status,
            screenshot,
            diff_key,
        };
        log::debug!("[{}] {} {} -> {:?}", record.tag, keyword, record.message, status);
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Shorthand for a record without evidence attached.
    pub fn step(&mut self, keyword: Keyword, message: impl Into<String>, status: StepStatus) {
        self.push(keyword, message, status, None, None);
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.current_tag = tag.into();
    }

    pub fn clear_tag(&mut self) {
        self.current_tag.clear();
    }

    pub fn current_tag(&self) -> &str {
        &self.current_tag
    }

    pub fn add_suggestion(&mut self, name: impl Into<String>) {
        self.push(Keyword::And, name, StepStatus::Suggestion, None, None);
    }

    pub fn add_performance_fail(&mut self, name: impl Into<String>, screenshot: Option<Vec<u8>>) {
        self.push(Keyword::And, name, StepStatus::PerformanceFail, screenshot, None);
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Records appended at or after `start`
    pub fn records_since(&self, start: usize) -> &[StepRecord] {
        &self.records[start.min(self.records.len())..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}

mod screenshot_base64 {
    use super::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&base64::engine::general_purpose::STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| {
                base64::engine::general_purpose::STANDARD
                    .decode(e)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_keep_insertion_order_and_duplicates() {
        let mut log = StepLog::new();
        log.step(Keyword::Then, "I click on the '#ok'", StepStatus::Passed);
        log.step(Keyword::Then, "I click on the '#ok'", StepStatus::Passed);
        log.add_suggestion("Consider a label for the search field");

        let messages: Vec<_> = log.records().iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "I click on the '#ok'",
                "I click on the '#ok'",
                "Consider a label for the search field"
            ]
        );
        assert_eq!(log.records()[2].status, StepStatus::Suggestion);
    }

    #[test]
    fn test_tag_applies_only_to_later_records() {
        let mut log = StepLog::new();
        log.step(Keyword::Given, "before", StepStatus::Passed);
        log.set_tag("login > valid credentials");
        log.step(Keyword::Then, "during", StepStatus::Passed);
        log.clear_tag();
        log.step(Keyword::Then, "after", StepStatus::Passed);

        let tags: Vec<_> = log.records().iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["", "login > valid credentials", ""]);
    }

    #[test]
    fn test_performance_fail_carries_screenshot() {
        let mut log = StepLog::new();
        log.add_performance_fail("Home page loaded in 4200ms", Some(vec![1, 2, 3]));
        let record = &log.records()[0];
        assert_eq!(record.status, StepStatus::PerformanceFail);
        assert_eq!(record.screenshot.as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(!record.status.is_failure());
    }

    #[test]
    fn test_record_serializes_screenshot_as_base64() {
        let mut log = StepLog::new();
        log.push(
            Keyword::And,
            "The 'home' screenshot matches the baseline",
            StepStatus::Passed,
            Some(b"png".to_vec()),
            Some("home".to_string()),
        );
        let json = serde_json::to_value(&log.records()[0]).unwrap();
        assert_eq!(json["status"], "PASSED");
        assert_eq!(json["screenshot"], "cG5n");
        assert_eq!(json["diffKey"], "home");

        let back: StepRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, log.records()[0]);
    }

    #[test]
    fn test_records_since() {
        let mut log = StepLog::new();
        log.step(Keyword::Then, "a", StepStatus::Passed);
        let mark = log.len();
        log.step(Keyword::Then, "b", StepStatus::Failed);
        assert_eq!(log.records_since(mark).len(), 1);
        assert_eq!(log.records_since(mark)[0].message, "b");
        assert!(log.records_since(10).is_empty());
    }
}
