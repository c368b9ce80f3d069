// src/model/issue.rs
// =============================================================================
// Issues are the classified output of a page scan.
//
// An Issue is immutable once created. It carries a severity tier, a category,
// where it came from (page URL and optional file/line/column), and optionally
// a FixSuggestion produced by the rule table in checker/fixes.rs.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

// Confidence above which an issue is considered auto-fixable
pub const AUTO_FIX_CONFIDENCE: f64 = 0.8;

// Severity tiers.
//
// Variants are declared from lowest to highest so the derived Ord gives
// Critical > High > Medium > Low > Info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ConfigError::UnknownValue {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    ConsoleError,
    NetworkFailure,
    Performance,
    Accessibility,
    VisualRegression,
    BrokenLink,
    MissingElement,
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueCategory::ConsoleError => "console_error",
            IssueCategory::NetworkFailure => "network_failure",
            IssueCategory::Performance => "performance",
            IssueCategory::Accessibility => "accessibility",
            IssueCategory::VisualRegression => "visual_regression",
            IssueCategory::BrokenLink => "broken_link",
            IssueCategory::MissingElement => "missing_element",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixOperationKind {
    Edit,
    Bash,
    Create,
    Delete,
}

// One remediation step inside a FixSuggestion.
//
// Which optional fields are set depends on the kind: Bash uses `command`,
// Edit uses `file` + `before`/`after`, Create uses `file` + `after`,
// Delete uses `file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixOperation {
    #[serde(rename = "type")]
    pub kind: FixOperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FixOperation {
    fn empty(kind: FixOperationKind) -> Self {
        Self {
            kind,
            file: None,
            before: None,
            after: None,
            command: None,
            description: None,
        }
    }

    pub fn bash(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            description: Some(description.into()),
            ..Self::empty(FixOperationKind::Bash)
        }
    }

    pub fn edit(
        file: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            file: Some(file.into()),
            before: Some(before.into()),
            after: Some(after.into()),
            description: Some(description.into()),
            ..Self::empty(FixOperationKind::Edit)
        }
    }

    pub fn create(
        file: impl Into<String>,
        content: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            file: Some(file.into()),
            after: Some(content.into()),
            description: Some(description.into()),
            ..Self::empty(FixOperationKind::Create)
        }
    }

    pub fn delete(file: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            description: Some(description.into()),
            ..Self::empty(FixOperationKind::Delete)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub description: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub operations: Vec<FixOperation>,
}

impl FixSuggestion {
    pub fn new(description: impl Into<String>, confidence: f64, operations: Vec<FixOperation>) -> Self {
        Self {
            description: description.into(),
            confidence: confidence.clamp(0.0, 1.0),
            operations,
        }
    }

    pub fn is_auto_fixable(&self) -> bool {
        self.confidence > AUTO_FIX_CONFIDENCE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub severity: Severity,
    pub category: IssueCategory,
    /// Page the issue was observed on
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<FixSuggestion>,
    pub auto_fixable: bool,
    pub created_at: DateTime<Utc>,
}

impl Issue {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

// Source location pulled out of a console entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}
