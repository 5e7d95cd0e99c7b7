use crate::analysis::AnalysisContext;
use crate::record::Module;
use crate::thresholds::ThresholdId;

use super::{
    percent, samples, Audience, Finding, FindingCode, Recommendation, RuleInputs, Severity,
    SkippedCheck,
};

/// Collective vs. independent read usage.
pub(super) fn check_collective_reads(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(mpiio) = &inputs.stats.mpiio else {
        return;
    };

    let total = mpiio.read_ops();

    if mpiio.coll_reads == 0 {
        if total > 0 && total > ctx.policy.count(ThresholdId::CollectiveOperationsAbsolute) {
            ctx.policy.mark_triggered(ThresholdId::CollectiveOperations);
            ctx.policy
                .mark_triggered(ThresholdId::CollectiveOperationsAbsolute);

            let evidence = independent_evidence(inputs, ctx, true);

            ctx.findings.push(
                Finding::new(
                    FindingCode::MpiioNoCollectiveReads,
                    Severity::High,
                    Audience::Developer,
                    format!(
                        "Application uses MPI-IO but it does not use collective read operations, instead it issues {} ({:.2}%) independent read calls",
                        mpiio.indep_reads,
                        percent(mpiio.indep_reads, total)
                    ),
                )
                .with_evidence(evidence)
                .with_recommendations(vec![Recommendation::with_sample(
                    "Use collective read operations (e.g. MPI_File_read_all() or MPI_File_read_at_all()) and set one aggregator per compute node",
                    samples::MPI_IO_COLLECTIVE_READ,
                )]),
            );
        }
    } else {
        ctx.findings.push(Finding::new(
            FindingCode::MpiioCollectiveReads,
            Severity::Ok,
            Audience::Developer,
            format!(
                "Application uses MPI-IO and read data using {} ({:.2}%) collective operations",
                mpiio.coll_reads,
                percent(mpiio.coll_reads, total)
            ),
        ));
    }
}

/// Collective vs. independent write usage.
pub(super) fn check_collective_writes(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(mpiio) = &inputs.stats.mpiio else {
        return;
    };

    let total = mpiio.write_ops();

    if mpiio.coll_writes == 0 {
        if total > 0 && total > ctx.policy.count(ThresholdId::CollectiveOperationsAbsolute) {
            ctx.policy.mark_triggered(ThresholdId::CollectiveOperations);
            ctx.policy
                .mark_triggered(ThresholdId::CollectiveOperationsAbsolute);

            let evidence = independent_evidence(inputs, ctx, false);

            ctx.findings.push(
                Finding::new(
                    FindingCode::MpiioNoCollectiveWrites,
                    Severity::High,
                    Audience::Developer,
                    format!(
                        "Application uses MPI-IO but it does not use collective write operations, instead it issues {} ({:.2}%) independent write calls",
                        mpiio.indep_writes,
                        percent(mpiio.indep_writes, total)
                    ),
                )
                .with_evidence(evidence)
                .with_recommendations(vec![Recommendation::with_sample(
                    "Use collective write operations (e.g. MPI_File_write_all() or MPI_File_write_at_all()) and set one aggregator per compute node",
                    samples::MPI_IO_COLLECTIVE_WRITE,
                )]),
            );
        }
    } else {
        ctx.findings.push(Finding::new(
            FindingCode::MpiioCollectiveWrites,
            Severity::Ok,
            Audience::Developer,
            format!(
                "Application uses MPI-IO and write data using {} ({:.2}%) collective operations",
                mpiio.coll_writes,
                percent(mpiio.coll_writes, total)
            ),
        ));
    }
}

/// Files dominated by independent operations of the given direction.
fn independent_evidence(
    inputs: &RuleInputs<'_>,
    ctx: &AnalysisContext,
    reads: bool,
) -> Vec<String> {
    let share_threshold = ctx.policy.value(ThresholdId::CollectiveOperations);
    let absolute_floor = ctx.policy.count(ThresholdId::CollectiveOperationsAbsolute);
    let kind = if reads { "reads" } else { "writes" };

    inputs
        .stats
        .per_file
        .iter()
        .filter_map(|(&id, file)| {
            let indep_total = file.indep_reads + file.indep_writes;
            let count = if reads { file.indep_reads } else { file.indep_writes };
            if indep_total > absolute_floor
                && indep_total > 0
                && count as f64 / indep_total as f64 > share_threshold
            {
                Some(format!(
                    "{} ({:.2}%) independent {} to \"{}\"",
                    count,
                    percent(count, indep_total),
                    kind,
                    inputs.file_name(id)
                ))
            } else {
                None
            }
        })
        .collect()
}

/// Non-blocking MPI-IO usage, reads and writes independently.
pub(super) fn check_nonblocking(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(mpiio) = &inputs.stats.mpiio else {
        return;
    };

    let uses_hdf5 = inputs.modules.contains(Module::Hdf5) || inputs.catalog.any_hdf5_extension();

    if mpiio.nb_reads == 0 {
        let mut recommendations = Vec::new();
        if uses_hdf5 {
            recommendations.push(Recommendation::with_sample(
                "Since you use HDF5, consider using the ASYNC I/O VOL connector (https://github.com/hpc-io/vol-async)",
                samples::HDF5_VOL_ASYNC_READ,
            ));
        }
        if inputs.modules.contains(Module::MpiIo) {
            recommendations.push(Recommendation::with_sample(
                "Since you use MPI-IO, consider non-blocking/asynchronous I/O operations",
                samples::MPI_IO_IREAD,
            ));
        }

        ctx.findings.push(
            Finding::new(
                FindingCode::MpiioBlockingReads,
                Severity::Warn,
                Audience::Developer,
                "Application could benefit from non-blocking (asynchronous) reads",
            )
            .with_recommendations(recommendations),
        );
    }

    if mpiio.nb_writes == 0 {
        let mut recommendations = Vec::new();
        if uses_hdf5 {
            recommendations.push(Recommendation::with_sample(
                "Since you use HDF5, consider using the ASYNC I/O VOL connector (https://github.com/hpc-io/vol-async)",
                samples::HDF5_VOL_ASYNC_WRITE,
            ));
        }
        if inputs.modules.contains(Module::MpiIo) {
            recommendations.push(Recommendation::with_sample(
                "Since you use MPI-IO, consider non-blocking/asynchronous I/O operations",
                samples::MPI_IO_IWRITE,
            ));
        }

        ctx.findings.push(
            Finding::new(
                FindingCode::MpiioBlockingWrites,
                Severity::Warn,
                Audience::Developer,
                "Application could benefit from non-blocking (asynchronous) writes",
            )
            .with_recommendations(recommendations),
        );
    }
}

/// Aggregator placement: `cb_nodes` hint against the compute-node count.
pub(super) fn check_aggregators(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    if !inputs.modules.contains(Module::MpiIo) {
        return;
    }

    let (cb_nodes, compute_nodes) = match (inputs.job.cb_nodes(), inputs.job.compute_nodes) {
        (Some(cb), Some(nodes)) => (cb, nodes),
        _ => {
            ctx.skipped.push(SkippedCheck {
                rule: "mpiio_aggregators",
                reason: "cb_nodes hint or compute-node count unavailable".into(),
            });
            return;
        }
    };

    match cb_nodes.cmp(&compute_nodes) {
        std::cmp::Ordering::Greater => {
            ctx.findings.push(
                Finding::new(
                    FindingCode::MpiioAggregatorsInter,
                    Severity::High,
                    Audience::User,
                    "Application is using inter-node aggregators (which require network communication)",
                )
                .with_recommendations(vec![Recommendation::with_sample(
                    format!(
                        "Set the MPI hints for the number of aggregators as one per compute node (e.g., cb_nodes={compute_nodes})"
                    ),
                    samples::MPI_IO_HINTS,
                )]),
            );
        }
        std::cmp::Ordering::Less => {
            ctx.findings.push(Finding::new(
                FindingCode::MpiioAggregatorsIntra,
                Severity::Ok,
                Audience::User,
                "Application is using intra-node aggregators",
            ));
        }
        std::cmp::Ordering::Equal => {
            ctx.findings.push(Finding::new(
                FindingCode::MpiioAggregatorsOk,
                Severity::Ok,
                Audience::User,
                "Application is using one aggregator per compute node",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::empty_inputs_parts;
    use super::*;
    use crate::analysis::aggregate::{AggregateStats, FileStats, MpiioStats};
    use crate::record::{FileCatalog, FileEntry, JobMeta, ModuleSet};
    use crate::thresholds::ThresholdPolicy;

    struct Fixture {
        catalog: FileCatalog,
        modules: ModuleSet,
        job: JobMeta,
        stats: AggregateStats,
    }

    impl Fixture {
        fn new() -> Self {
            let mut catalog = FileCatalog::new();
            catalog.insert(1, FileEntry::new("/scratch/out.dat"));
            let mut modules = ModuleSet::new();
            modules.insert(Module::MpiIo);
            Self {
                catalog,
                modules,
                job: JobMeta::default(),
                stats: AggregateStats::default(),
            }
        }

        fn run(&self, check: impl Fn(&RuleInputs<'_>, &mut AnalysisContext)) -> AnalysisContext {
            let (_, _, _, _, patterns, imbalance) = empty_inputs_parts();
            let inputs = RuleInputs {
                catalog: &self.catalog,
                modules: &self.modules,
                job: &self.job,
                stats: &self.stats,
                patterns: &patterns,
                imbalance: &imbalance,
                full_paths: false,
            };
            let mut ctx = AnalysisContext::new(ThresholdPolicy::default());
            check(&inputs, &mut ctx);
            ctx
        }
    }

    #[test]
    fn test_no_collective_reads_fires_above_floor() {
        let mut fixture = Fixture::new();
        fixture.stats.mpiio = Some(MpiioStats {
            indep_reads: 1500,
            coll_reads: 0,
            ..Default::default()
        });
        fixture.stats.per_file.insert(
            1,
            FileStats {
                indep_reads: 1500,
                ..Default::default()
            },
        );

        let ctx = fixture.run(check_collective_reads);
        let finding = &ctx.findings[0];
        assert_eq!(finding.code, FindingCode::MpiioNoCollectiveReads);
        assert!(finding.message.contains("100.00%"));
        assert_eq!(finding.evidence.len(), 1);
        assert!(ctx.policy.triggered(ThresholdId::CollectiveOperationsAbsolute));
    }

    #[test]
    fn test_single_collective_read_short_circuits() {
        let mut fixture = Fixture::new();
        fixture.stats.mpiio = Some(MpiioStats {
            indep_reads: 1499,
            coll_reads: 1,
            ..Default::default()
        });

        let ctx = fixture.run(check_collective_reads);
        assert_eq!(ctx.findings.len(), 1);
        assert_eq!(ctx.findings[0].code, FindingCode::MpiioCollectiveReads);
        assert_eq!(ctx.findings[0].severity, Severity::Ok);
    }

    #[test]
    fn test_no_collective_reads_below_floor_stays_quiet() {
        let mut fixture = Fixture::new();
        fixture.stats.mpiio = Some(MpiioStats {
            indep_reads: 500,
            ..Default::default()
        });

        let ctx = fixture.run(check_collective_reads);
        assert!(ctx.findings.is_empty());
    }

    #[test]
    fn test_no_collective_writes() {
        let mut fixture = Fixture::new();
        fixture.stats.mpiio = Some(MpiioStats {
            indep_writes: 2000,
            ..Default::default()
        });

        let ctx = fixture.run(check_collective_writes);
        assert_eq!(ctx.findings[0].code, FindingCode::MpiioNoCollectiveWrites);
    }

    #[test]
    fn test_nonblocking_warnings_with_hdf5_extension() {
        let mut fixture = Fixture::new();
        fixture.catalog.insert(2, FileEntry::new("/data/mesh.h5"));
        fixture.stats.mpiio = Some(MpiioStats {
            nb_reads: 0,
            nb_writes: 5,
            ..Default::default()
        });

        let ctx = fixture.run(check_nonblocking);
        assert_eq!(ctx.findings.len(), 1);
        let finding = &ctx.findings[0];
        assert_eq!(finding.code, FindingCode::MpiioBlockingReads);
        assert_eq!(finding.recommendations.len(), 2);
        assert_eq!(
            finding.recommendations[0].sample,
            Some(samples::HDF5_VOL_ASYNC_READ)
        );
    }

    #[test]
    fn test_aggregator_placement_variants() {
        let mut fixture = Fixture::new();
        fixture.job.compute_nodes = Some(4);

        fixture.job.hints = Some("cb_nodes=8".into());
        let ctx = fixture.run(check_aggregators);
        assert_eq!(ctx.findings[0].code, FindingCode::MpiioAggregatorsInter);
        assert_eq!(ctx.findings[0].severity, Severity::High);
        assert!(ctx.findings[0].recommendations[0]
            .message
            .contains("cb_nodes=4"));

        fixture.job.hints = Some("cb_nodes=2".into());
        let ctx = fixture.run(check_aggregators);
        assert_eq!(ctx.findings[0].code, FindingCode::MpiioAggregatorsIntra);

        fixture.job.hints = Some("cb_nodes=4".into());
        let ctx = fixture.run(check_aggregators);
        assert_eq!(ctx.findings[0].code, FindingCode::MpiioAggregatorsOk);
    }

    #[test]
    fn test_aggregator_check_skipped_without_inputs() {
        let fixture = Fixture::new();
        let ctx = fixture.run(check_aggregators);
        assert!(ctx.findings.is_empty());
        assert_eq!(ctx.skipped[0].rule, "mpiio_aggregators");
    }
}
