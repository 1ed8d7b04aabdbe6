//! Build reports
//!
//! Summarizes one cloaking run: what was applied, which fields fell back to
//! the vendor placeholder and which fields failed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::resolver::Fallback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    /// Completed, but some fields used the placeholder or failed.
    SuccessWithWarnings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Resolve,
    Driver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFallback {
    pub path: String,
    pub reason: Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    pub path: String,
    pub stage: FailureStage,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub machine: String,
    pub profile: String,
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub applied: usize,
    pub fallbacks: Vec<FieldFallback>,
    pub failures: Vec<FieldFailure>,
    /// Candidate index drawn per category.
    pub chosen: BTreeMap<String, usize>,
}

impl BuildReport {
    pub fn new(machine: &str, profile: &str, backend: &str) -> Self {
        Self {
            machine: machine.to_string(),
            profile: profile.to_string(),
            backend: backend.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            applied: 0,
            fallbacks: Vec::new(),
            failures: Vec::new(),
            chosen: BTreeMap::new(),
        }
    }

    pub fn record_fallback(&mut self, path: String, reason: Fallback) {
        self.fallbacks.push(FieldFallback { path, reason });
    }

    pub fn record_failure(&mut self, path: String, stage: FailureStage, error: impl ToString) {
        self.failures.push(FieldFailure {
            path,
            stage,
            error: error.to_string(),
        });
    }

    pub fn finish(&mut self, chosen: BTreeMap<String, usize>) {
        self.chosen = chosen;
        self.finished_at = Some(Utc::now());
    }

    pub fn status(&self) -> BuildStatus {
        if self.fallbacks.is_empty() && self.failures.is_empty() {
            BuildStatus::Success
        } else {
            BuildStatus::SuccessWithWarnings
        }
    }

    pub fn failed_paths(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.path.as_str()).collect()
    }

    /// Fallbacks caused by gaps in the profile, as opposed to template defaults.
    pub fn profile_gaps(&self) -> impl Iterator<Item = &FieldFallback> {
        self.fallbacks
            .iter()
            .filter(|f| f.reason != Fallback::TemplateDefault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reflects_warnings() {
        let mut report = BuildReport::new("win7", "default", "dry-run");
        assert_eq!(report.status(), BuildStatus::Success);

        report.record_fallback("bios/asset".to_string(), Fallback::NotApplicable);
        assert_eq!(report.status(), BuildStatus::SuccessWithWarnings);
    }

    #[test]
    fn test_failed_paths_and_gaps() {
        let mut report = BuildReport::new("win7", "default", "dry-run");
        report.record_failure("a/b".to_string(), FailureStage::Driver, "rejected");
        report.record_fallback("c".to_string(), Fallback::TemplateDefault);
        report.record_fallback("d".to_string(), Fallback::MissingCategory);

        assert_eq!(report.failed_paths(), vec!["a/b"]);
        assert_eq!(report.profile_gaps().count(), 1);

        report.finish(BTreeMap::from([("bios".to_string(), 0)]));
        assert!(report.finished_at.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failures"][0]["stage"], "driver");
        assert_eq!(json["fallbacks"][1]["reason"], "missing_category");
    }
}
