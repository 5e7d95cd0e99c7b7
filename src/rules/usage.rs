use crate::analysis::AnalysisContext;
use crate::record::Module;
use crate::thresholds::ThresholdId;

use super::finding::format_bytes;
use super::{percent, Audience, Finding, FindingCode, Recommendation, RuleInputs, Severity};

/// STDIO carrying a meaningful share of the data volume.
pub(super) fn check_stdio(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let stats = inputs.stats;
    if stats.total_bytes == 0 {
        return;
    }

    let share = stats.stdio_bytes as f64 / stats.total_bytes as f64;
    if share <= ctx.policy.value(ThresholdId::InterfaceStdio) {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::InterfaceStdio);
    ctx.findings.push(
        Finding::new(
            FindingCode::StdioHighUsage,
            Severity::High,
            Audience::Developer,
            format!(
                "Application is using STDIO, a low-performance interface, for {:.2}% of its data transfers ({})",
                share * 100.0,
                format_bytes(stats.stdio_bytes)
            ),
        )
        .with_recommendations(vec![Recommendation::new(
            "Consider switching to a high-performance I/O interface such as MPI-IO",
        )]),
    );
}

/// MPI-IO module absent from the trace entirely.
pub(super) fn check_mpiio_presence(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    if inputs.modules.contains(Module::MpiIo) {
        return;
    }

    ctx.findings.push(
        Finding::new(
            FindingCode::MpiioNoUsage,
            Severity::Warn,
            Audience::Developer,
            "Application is using low-performance interface",
        )
        .with_recommendations(vec![Recommendation::new(
            "Consider switching to a high-performance I/O interface such as MPI-IO",
        )]),
    );
}

/// Operation-count balance between reads and writes, directional.
pub(super) fn check_operation_intensive(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    let total = posix.total_ops();
    if total == 0 {
        return;
    }

    let spread = posix.writes.abs_diff(posix.reads) as f64 / total as f64;
    if spread <= ctx.policy.value(ThresholdId::ImbalanceOperations) {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::ImbalanceOperations);

    if posix.writes > posix.reads {
        ctx.findings.push(Finding::new(
            FindingCode::PosixWriteCountIntensive,
            Severity::Info,
            Audience::Developer,
            format!(
                "Application is write operation intensive ({:.2}% writes vs. {:.2}% reads)",
                percent(posix.writes, total),
                percent(posix.reads, total)
            ),
        ));
    } else if posix.reads > posix.writes {
        ctx.findings.push(Finding::new(
            FindingCode::PosixReadCountIntensive,
            Severity::Info,
            Audience::Developer,
            format!(
                "Application is read operation intensive ({:.2}% writes vs. {:.2}% reads)",
                percent(posix.writes, total),
                percent(posix.reads, total)
            ),
        ));
    }
}

/// Byte-volume balance between reads and writes, directional.
pub(super) fn check_size_intensive(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    let total = posix.total_bytes();
    if total == 0 {
        return;
    }

    let spread = posix.bytes_written.abs_diff(posix.bytes_read) as f64 / total as f64;
    if spread <= ctx.policy.value(ThresholdId::ImbalanceOperations) {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::ImbalanceOperations);

    if posix.bytes_written > posix.bytes_read {
        ctx.findings.push(Finding::new(
            FindingCode::PosixWriteSizeIntensive,
            Severity::Info,
            Audience::Developer,
            format!(
                "Application is write size intensive ({:.2}% write vs. {:.2}% read)",
                percent(posix.bytes_written, total),
                percent(posix.bytes_read, total)
            ),
        ));
    } else if posix.bytes_read > posix.bytes_written {
        ctx.findings.push(Finding::new(
            FindingCode::PosixReadSizeIntensive,
            Severity::Info,
            Audience::Developer,
            format!(
                "Application is read size intensive ({:.2}% write vs. {:.2}% read)",
                percent(posix.bytes_written, total),
                percent(posix.bytes_read, total)
            ),
        ));
    }
}
