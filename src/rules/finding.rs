use serde::Serialize;

use super::code::FindingCode;

/// Maximum number of evidence entries displayed per finding. Detectors
/// produce uncapped lists; the cap is applied when the finding is built.
pub const EVIDENCE_MAX: usize = 10;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Info,
    Warn,
    High,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::High => "high",
        }
    }
}

/// Who a finding is actionable for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    User,
    Developer,
    System,
}

/// One recommendation attached to a finding. `sample` names an external
/// code-sample identifier; resolving it to content is the renderer's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<&'static str>,
}

impl Recommendation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sample: None,
        }
    }

    pub fn with_sample(message: impl Into<String>, sample: &'static str) -> Self {
        Self {
            message: message.into(),
            sample: Some(sample),
        }
    }
}

/// One diagnostic output unit: issue, severity, evidence, recommendations.
///
/// Write-once; appended to the run's ordered finding list and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub code: FindingCode,
    pub severity: Severity,
    pub audience: Audience,
    pub message: String,
    pub evidence: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

impl Finding {
    pub fn new(
        code: FindingCode,
        severity: Severity,
        audience: Audience,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            audience,
            message: message.into(),
            evidence: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Attach evidence, truncated to `EVIDENCE_MAX` entries in source order.
    pub fn with_evidence(mut self, mut evidence: Vec<String>) -> Self {
        evidence.truncate(EVIDENCE_MAX);
        self.evidence = evidence;
        self
    }

    pub fn with_recommendations(mut self, recommendations: Vec<Recommendation>) -> Self {
        self.recommendations = recommendations;
        self
    }
}

/// Format a byte count with a binary-scaled unit tag.
pub fn format_bytes(bytes: u64) -> String {
    const TAGS: [&str; 7] = ["bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

    let mut value = bytes as f64;
    let mut tag = 0;
    while tag + 1 < TAGS.len() && value >= 1024.0 {
        value /= 1024.0;
        tag += 1;
    }

    if tag == 0 {
        format!("{bytes} bytes")
    } else {
        format!("{:.2} {}", value, TAGS[tag])
    }
}
