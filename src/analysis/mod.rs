pub mod aggregate;
pub mod classify;
pub mod imbalance;

use serde::Serialize;

use crate::normalize::NormalizedTrace;
use crate::rules::{self, Finding, RuleInputs, Severity, SkippedCheck};
use crate::thresholds::ThresholdPolicy;

/// Mutable state threaded through rule evaluation: the policy (for
/// triggered flags), the ordered finding list, and skipped-check records.
/// Owned per run, never process-global, so parallel runs cannot
/// cross-contaminate.
#[derive(Debug)]
pub struct AnalysisContext {
    pub policy: ThresholdPolicy,
    pub findings: Vec<Finding>,
    pub skipped: Vec<SkippedCheck>,
}

impl AnalysisContext {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self {
            policy,
            findings: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// One threshold rendered for the report: which thresholds mattered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdReport {
    pub name: &'static str,
    pub value: f64,
    pub triggered: bool,
}

/// Run-level counters for the report header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub high: usize,
    pub warn: usize,
    pub recommendations: usize,
}

/// Finished output of one analysis run, handed to the report renderer.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub findings: Vec<Finding>,
    pub skipped: Vec<SkippedCheck>,
    pub thresholds: Vec<ThresholdReport>,
    pub totals: RunTotals,
}

/// Presentation options that affect evidence text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    /// Show full paths in evidence instead of basenames.
    pub full_paths: bool,
}

/// Run the full pipeline over one normalized trace: aggregate, classify,
/// detect imbalance, then evaluate every rule. Deterministic for a given
/// trace and policy; re-running yields an identical report.
pub fn run(
    trace: &NormalizedTrace,
    policy: ThresholdPolicy,
    options: AnalysisOptions,
) -> AnalysisReport {
    let stats = aggregate::aggregate(trace, &policy);
    let patterns = classify::classify(trace);
    let imbalance = imbalance::detect(trace, &policy);

    tracing::debug!(
        records = trace.records.len(),
        files = trace.catalog.len(),
        "computed aggregates"
    );

    // Classified transitions can never exceed the operation count; the two
    // classification derivations must agree on this identity.
    if let Some(posix) = &stats.posix {
        if patterns.reads.transitions() > posix.reads
            || patterns.writes.transitions() > posix.writes
        {
            tracing::warn!(
                read_transitions = patterns.reads.transitions(),
                reads = posix.reads,
                write_transitions = patterns.writes.transitions(),
                writes = posix.writes,
                "access-pattern transition counts exceed operation counts"
            );
        }
    }

    let mut ctx = AnalysisContext::new(policy);
    let inputs = RuleInputs {
        catalog: &trace.catalog,
        modules: &trace.modules,
        job: &trace.job,
        stats: &stats,
        patterns: &patterns,
        imbalance: &imbalance,
        full_paths: options.full_paths,
    };

    rules::evaluate(&inputs, &mut ctx);

    let mut totals = RunTotals::default();
    for finding in &ctx.findings {
        match finding.severity {
            Severity::High => totals.high += 1,
            Severity::Warn => totals.warn += 1,
            Severity::Ok | Severity::Info => {}
        }
        totals.recommendations += finding.recommendations.len();
    }

    let thresholds = ctx
        .policy
        .iter()
        .map(|(id, threshold)| ThresholdReport {
            name: id.as_str(),
            value: threshold.value,
            triggered: threshold.triggered,
        })
        .collect();

    tracing::info!(
        findings = ctx.findings.len(),
        high = totals.high,
        warn = totals.warn,
        skipped = ctx.skipped.len(),
        "analysis complete"
    );

    AnalysisReport {
        findings: ctx.findings,
        skipped: ctx.skipped,
        thresholds,
        totals,
    }
}
