pub mod code;
pub mod finding;

mod mpiio;
mod posix;
mod usage;

use serde::Serialize;

use crate::analysis::aggregate::AggregateStats;
use crate::analysis::classify::ClassificationCounts;
use crate::analysis::imbalance::ImbalanceReport;
use crate::analysis::AnalysisContext;
use crate::record::{FileCatalog, JobMeta, ModuleSet};

pub use code::FindingCode;
pub use finding::{Audience, Finding, Recommendation, Severity, EVIDENCE_MAX};

/// External code-sample identifiers referenced by recommendations. The
/// renderer resolves these to displayable snippets.
pub mod samples {
    pub const MPI_IO_COLLECTIVE_READ: &str = "mpi-io-collective-read.c";
    pub const MPI_IO_COLLECTIVE_WRITE: &str = "mpi-io-collective-write.c";
    pub const MPI_IO_IREAD: &str = "mpi-io-iread.c";
    pub const MPI_IO_IWRITE: &str = "mpi-io-iwrite.c";
    pub const MPI_IO_HINTS: &str = "mpi-io-hints.bash";
    pub const LUSTRE_STRIPING: &str = "lustre-striping.bash";
    pub const HDF5_ALIGNMENT: &str = "hdf5-alignment.c";
    pub const HDF5_COLLECTIVE_METADATA: &str = "hdf5-collective-metadata.c";
    pub const HDF5_CACHE: &str = "hdf5-cache.c";
    pub const HDF5_VOL_ASYNC_READ: &str = "hdf5-vol-async-read.c";
    pub const HDF5_VOL_ASYNC_WRITE: &str = "hdf5-vol-async-write.c";
    pub const PNETCDF_HDF5_NO_FILL: &str = "pnetcdf-hdf5-no-fill.c";
}

/// A check that could not be evaluated for this trace shape. Distinct from
/// a check that evaluated and did not fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCheck {
    pub rule: &'static str,
    pub reason: String,
}

/// Everything the rule set consumes for one run.
pub struct RuleInputs<'a> {
    pub catalog: &'a FileCatalog,
    pub modules: &'a ModuleSet,
    pub job: &'a JobMeta,
    pub stats: &'a AggregateStats,
    pub patterns: &'a ClassificationCounts,
    pub imbalance: &'a ImbalanceReport,
    /// Show full paths in evidence instead of basenames.
    pub full_paths: bool,
}

impl RuleInputs<'_> {
    /// Evidence display name for a file.
    pub(crate) fn file_name(&self, id: u64) -> String {
        self.catalog.display_name(id, self.full_paths)
    }
}

/// Evaluate every rule in fixed order, appending findings and skip records
/// to the context and marking consumed thresholds as triggered.
pub fn evaluate(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    usage::check_stdio(inputs, ctx);
    usage::check_mpiio_presence(inputs, ctx);

    if inputs.stats.posix.is_some() {
        usage::check_operation_intensive(inputs, ctx);
        usage::check_size_intensive(inputs, ctx);
        posix::check_small_operations(inputs, ctx);
        posix::check_misaligned(inputs, ctx);
        posix::check_redundant_traffic(inputs, ctx);
        posix::check_random_operations(inputs, ctx);
        posix::check_shared_small_operations(inputs, ctx);
        posix::check_long_metadata(inputs, ctx);
        posix::check_shared_data_imbalance(inputs, ctx);
        posix::check_shared_time_imbalance(inputs, ctx);
        posix::check_individual_write_imbalance(inputs, ctx);
        posix::check_individual_read_imbalance(inputs, ctx);
    }

    if inputs.stats.mpiio.is_some() {
        mpiio::check_collective_reads(inputs, ctx);
        mpiio::check_collective_writes(inputs, ctx);
        mpiio::check_nonblocking(inputs, ctx);
    }

    mpiio::check_aggregators(inputs, ctx);
}

/// Percentage of `part` in `total`; caller guards `total > 0`.
pub(crate) fn percent(part: u64, total: u64) -> f64 {
    part as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate::PosixStats;
    use crate::thresholds::ThresholdPolicy;

    pub(crate) fn empty_inputs_parts() -> (
        FileCatalog,
        ModuleSet,
        JobMeta,
        AggregateStats,
        ClassificationCounts,
        ImbalanceReport,
    ) {
        (
            FileCatalog::new(),
            ModuleSet::new(),
            JobMeta::default(),
            AggregateStats::default(),
            ClassificationCounts::default(),
            ImbalanceReport::default(),
        )
    }

    #[test]
    fn test_empty_trace_produces_only_presence_findings() {
        let (catalog, modules, job, stats, patterns, imbalance) = empty_inputs_parts();
        let inputs = RuleInputs {
            catalog: &catalog,
            modules: &modules,
            job: &job,
            stats: &stats,
            patterns: &patterns,
            imbalance: &imbalance,
            full_paths: false,
        };
        let mut ctx = AnalysisContext::new(ThresholdPolicy::default());

        evaluate(&inputs, &mut ctx);

        // No MPI-IO module: exactly the M01 warning, nothing else fires on
        // an all-zero trace.
        assert_eq!(ctx.findings.len(), 1);
        assert_eq!(ctx.findings[0].code, FindingCode::MpiioNoUsage);
    }

    #[test]
    fn test_zero_denominators_never_fire_ratio_rules() {
        let (catalog, modules, job, mut stats, patterns, imbalance) = empty_inputs_parts();
        // POSIX present but completely idle.
        stats.posix = Some(PosixStats::default());

        let inputs = RuleInputs {
            catalog: &catalog,
            modules: &modules,
            job: &job,
            stats: &stats,
            patterns: &patterns,
            imbalance: &imbalance,
            full_paths: false,
        };
        let mut ctx = AnalysisContext::new(ThresholdPolicy::default());

        evaluate(&inputs, &mut ctx);

        for finding in &ctx.findings {
            assert!(
                matches!(finding.code, FindingCode::MpiioNoUsage),
                "unexpected finding {} on an idle trace",
                finding.code
            );
        }
    }
}
