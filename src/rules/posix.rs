use crate::analysis::imbalance::FileRatio;
use crate::analysis::AnalysisContext;
use crate::record::Module;
use crate::thresholds::ThresholdId;

use super::{
    percent, samples, Audience, Finding, FindingCode, Recommendation, RuleInputs, Severity,
    SkippedCheck,
};

/// Small read/write request floods, with the files carrying them.
pub(super) fn check_small_operations(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    let ratio_threshold = ctx.policy.value(ThresholdId::SmallRequests);
    let absolute_floor = ctx.policy.count(ThresholdId::SmallRequestsAbsolute);

    if posix.small_reads > 0
        && posix.reads > 0
        && posix.small_reads as f64 / posix.reads as f64 > ratio_threshold
        && posix.small_reads > absolute_floor
    {
        ctx.policy.mark_triggered(ThresholdId::SmallRequests);
        ctx.policy.mark_triggered(ThresholdId::SmallRequestsAbsolute);

        let evidence = small_request_evidence(inputs, posix.reads, ratio_threshold, true);

        ctx.findings.push(
            Finding::new(
                FindingCode::PosixSmallReads,
                Severity::High,
                Audience::Developer,
                format!(
                    "Application issues a high number ({}) of small read requests (i.e., < 1MB) which represents {:.2}% of all read requests",
                    posix.small_reads,
                    percent(posix.small_reads, posix.reads)
                ),
            )
            .with_evidence(evidence)
            .with_recommendations(small_request_recommendations(inputs, true)),
        );
    }

    if posix.small_writes > 0
        && posix.writes > 0
        && posix.small_writes as f64 / posix.writes as f64 > ratio_threshold
        && posix.small_writes > absolute_floor
    {
        ctx.policy.mark_triggered(ThresholdId::SmallRequests);
        ctx.policy.mark_triggered(ThresholdId::SmallRequestsAbsolute);

        let evidence = small_request_evidence(inputs, posix.writes, ratio_threshold, false);

        ctx.findings.push(
            Finding::new(
                FindingCode::PosixSmallWrites,
                Severity::High,
                Audience::Developer,
                format!(
                    "Application issues a high number ({}) of small write requests (i.e., < 1MB) which represents {:.2}% of all write requests",
                    posix.small_writes,
                    percent(posix.small_writes, posix.writes)
                ),
            )
            .with_evidence(evidence)
            .with_recommendations(small_request_recommendations(inputs, false)),
        );
    }
}

/// Files responsible for more than half the trigger share of small requests.
fn small_request_evidence(
    inputs: &RuleInputs<'_>,
    total_ops: u64,
    ratio_threshold: f64,
    reads: bool,
) -> Vec<String> {
    let cutoff = total_ops as f64 * ratio_threshold / 2.0;
    let kind = if reads { "read" } else { "write" };

    inputs
        .stats
        .per_file
        .iter()
        .filter_map(|(&id, file)| {
            let count = if reads { file.small_reads } else { file.small_writes };
            if count as f64 > cutoff {
                Some(format!(
                    "{} ({:.2}%) small {} requests are to \"{}\"",
                    count,
                    percent(count, total_ops),
                    kind,
                    inputs.file_name(id)
                ))
            } else {
                None
            }
        })
        .collect()
}

fn small_request_recommendations(inputs: &RuleInputs<'_>, reads: bool) -> Vec<Recommendation> {
    let mut recommendations = vec![Recommendation::new(if reads {
        "Consider buffering read operations into larger more contiguous ones"
    } else {
        "Consider buffering write operations into larger more contiguous ones"
    })];

    if inputs.modules.contains(Module::MpiIo) {
        if reads {
            recommendations.push(Recommendation::with_sample(
                "Since the application already uses MPI-IO, consider using collective I/O calls (e.g. MPI_File_read_all() or MPI_File_read_at_all()) to aggregate requests into larger ones",
                samples::MPI_IO_COLLECTIVE_READ,
            ));
        } else {
            recommendations.push(Recommendation::with_sample(
                "Since the application already uses MPI-IO, consider using collective I/O calls (e.g. MPI_File_write_all() or MPI_File_write_at_all()) to aggregate requests into larger ones",
                samples::MPI_IO_COLLECTIVE_WRITE,
            ));
        }
    } else {
        recommendations.push(Recommendation::new(
            "Application does not use MPI-IO for operations, consider use this interface instead to harness collective operations",
        ));
    }

    recommendations
}

/// Misaligned memory and file accesses. Skipped when the trace shape does
/// not carry alignment counters.
pub(super) fn check_misaligned(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    let (mem, file) = match (posix.mem_not_aligned, posix.file_not_aligned) {
        (Some(mem), Some(file)) => (mem, file),
        _ => {
            ctx.skipped.push(SkippedCheck {
                rule: "posix_misaligned",
                reason: "alignment counters are not available for this trace shape".into(),
            });
            return;
        }
    };

    let total = posix.total_ops();
    if total == 0 {
        return;
    }

    let threshold = ctx.policy.value(ThresholdId::MisalignedRequests);

    if mem as f64 / total as f64 > threshold {
        ctx.policy.mark_triggered(ThresholdId::MisalignedRequests);
        ctx.findings.push(Finding::new(
            FindingCode::PosixMisalignedMemory,
            Severity::High,
            Audience::Developer,
            format!(
                "Application has a high number ({:.2}%) of misaligned memory requests",
                percent(mem, total)
            ),
        ));
    }

    if file as f64 / total as f64 > threshold {
        ctx.policy.mark_triggered(ThresholdId::MisalignedRequests);

        let mut recommendations = vec![Recommendation::new(
            "Consider aligning the requests to the file system block boundaries",
        )];
        if inputs.modules.contains(Module::Hdf5) {
            recommendations.push(Recommendation::with_sample(
                "Since the application uses HDF5, consider using H5Pset_alignment() in a file access property list",
                samples::HDF5_ALIGNMENT,
            ));
            recommendations.push(Recommendation::new(
                "Any file object greater than or equal in size to threshold bytes will be aligned on an address which is a multiple of alignment",
            ));
        }
        if inputs.modules.contains(Module::Lustre) {
            recommendations.push(Recommendation::with_sample(
                "Consider using a Lustre alignment that matches the file system stripe configuration",
                samples::LUSTRE_STRIPING,
            ));
        }

        ctx.findings.push(
            Finding::new(
                FindingCode::PosixMisalignedFile,
                Severity::High,
                Audience::Developer,
                format!(
                    "Application issues a high number ({:.2}%) of misaligned file requests",
                    percent(file, total)
                ),
            )
            .with_recommendations(recommendations),
        );
    }
}

/// Redundant traffic: more bytes moved than the highest offset touched.
/// A heuristic proxy for re-reads and re-writes, kept as the original
/// system defines it.
pub(super) fn check_redundant_traffic(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    match posix.max_read_offset {
        Some(max_offset) => {
            if max_offset > posix.bytes_read {
                ctx.findings.push(Finding::new(
                    FindingCode::PosixRedundantRead,
                    Severity::Warn,
                    Audience::Developer,
                    "Application might have redundant read traffic (more data read than the highest offset)",
                ));
            }
        }
        None if posix.reads > 0 => ctx.skipped.push(SkippedCheck {
            rule: "posix_redundant_read",
            reason: "read offsets are not recorded in this trace".into(),
        }),
        None => {}
    }

    match posix.max_write_offset {
        Some(max_offset) => {
            if max_offset > posix.bytes_written {
                ctx.findings.push(Finding::new(
                    FindingCode::PosixRedundantWrite,
                    Severity::Warn,
                    Audience::Developer,
                    "Application might have redundant write traffic (more data written than the highest offset)",
                ));
            }
        }
        None if posix.writes > 0 => ctx.skipped.push(SkippedCheck {
            rule: "posix_redundant_write",
            reason: "write offsets are not recorded in this trace".into(),
        }),
        None => {}
    }
}

/// Random-access dominance, or the all-clear when access is mostly
/// consecutive/sequential.
pub(super) fn check_random_operations(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    let ratio_threshold = ctx.policy.value(ThresholdId::RandomOperations);
    let absolute_floor = ctx.policy.count(ThresholdId::RandomOperationsAbsolute);

    if posix.reads > 0 {
        let reads = inputs.patterns.reads;
        if reads.random > 0
            && reads.random as f64 / posix.reads as f64 > ratio_threshold
            && reads.random > absolute_floor
        {
            ctx.policy.mark_triggered(ThresholdId::RandomOperations);
            ctx.policy.mark_triggered(ThresholdId::RandomOperationsAbsolute);
            ctx.findings.push(
                Finding::new(
                    FindingCode::PosixRandomReads,
                    Severity::High,
                    Audience::Developer,
                    format!(
                        "Application is issuing a high number ({}) of random read operations ({:.2}%)",
                        reads.random,
                        percent(reads.random, posix.reads)
                    ),
                )
                .with_recommendations(vec![Recommendation::new(
                    "Consider changing your data model to have consecutive or sequential reads",
                )]),
            );
        } else {
            ctx.findings.push(Finding::new(
                FindingCode::PosixSequentialReads,
                Severity::Ok,
                Audience::Developer,
                format!(
                    "Application mostly uses consecutive ({:.2}%) and sequential ({:.2}%) read requests",
                    percent(reads.consecutive, posix.reads),
                    percent(reads.sequential, posix.reads)
                ),
            ));
        }
    }

    if posix.writes > 0 {
        let writes = inputs.patterns.writes;
        if writes.random > 0
            && writes.random as f64 / posix.writes as f64 > ratio_threshold
            && writes.random > absolute_floor
        {
            ctx.policy.mark_triggered(ThresholdId::RandomOperations);
            ctx.policy.mark_triggered(ThresholdId::RandomOperationsAbsolute);
            ctx.findings.push(
                Finding::new(
                    FindingCode::PosixRandomWrites,
                    Severity::High,
                    Audience::Developer,
                    format!(
                        "Application is issuing a high number ({}) of random write operations ({:.2}%)",
                        writes.random,
                        percent(writes.random, posix.writes)
                    ),
                )
                .with_recommendations(vec![Recommendation::new(
                    "Consider changing your data model to have consecutive or sequential writes",
                )]),
            );
        } else {
            ctx.findings.push(Finding::new(
                FindingCode::PosixSequentialWrites,
                Severity::Ok,
                Audience::Developer,
                format!(
                    "Application mostly uses consecutive ({:.2}%) and sequential ({:.2}%) write requests",
                    percent(writes.consecutive, posix.writes),
                    percent(writes.sequential, posix.writes)
                ),
            ));
        }
    }
}

/// Small requests concentrated on shared files.
pub(super) fn check_shared_small_operations(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    let ratio_threshold = ctx.policy.value(ThresholdId::SmallRequests);
    let absolute_floor = ctx.policy.count(ThresholdId::SmallRequestsAbsolute);

    if posix.shared_reads > 0
        && posix.shared_small_reads as f64 / posix.shared_reads as f64 > ratio_threshold
        && posix.shared_small_reads > absolute_floor
    {
        ctx.policy.mark_triggered(ThresholdId::SmallRequests);
        ctx.policy.mark_triggered(ThresholdId::SmallRequestsAbsolute);

        let evidence =
            shared_small_evidence(inputs, posix.shared_reads, ratio_threshold, true);

        ctx.findings.push(
            Finding::new(
                FindingCode::PosixSmallSharedReads,
                Severity::High,
                Audience::Developer,
                format!(
                    "Application issues a high number ({}) of small read requests to a shared file (i.e., < 1MB) which represents {:.2}% of all shared file read requests",
                    posix.shared_small_reads,
                    percent(posix.shared_small_reads, posix.shared_reads)
                ),
            )
            .with_evidence(evidence)
            .with_recommendations(vec![Recommendation::with_sample(
                "Consider coalescing read requests into larger more contiguous ones using MPI-IO collective operations",
                samples::MPI_IO_COLLECTIVE_READ,
            )]),
        );
    }

    if posix.shared_writes > 0
        && posix.shared_small_writes as f64 / posix.shared_writes as f64 > ratio_threshold
        && posix.shared_small_writes > absolute_floor
    {
        ctx.policy.mark_triggered(ThresholdId::SmallRequests);
        ctx.policy.mark_triggered(ThresholdId::SmallRequestsAbsolute);

        let evidence =
            shared_small_evidence(inputs, posix.shared_writes, ratio_threshold, false);

        ctx.findings.push(
            Finding::new(
                FindingCode::PosixSmallSharedWrites,
                Severity::High,
                Audience::Developer,
                format!(
                    "Application issues a high number ({}) of small write requests to a shared file (i.e., < 1MB) which represents {:.2}% of all shared file write requests",
                    posix.shared_small_writes,
                    percent(posix.shared_small_writes, posix.shared_writes)
                ),
            )
            .with_evidence(evidence)
            .with_recommendations(vec![Recommendation::with_sample(
                "Consider coalescing write requests into larger more contiguous ones using MPI-IO collective operations",
                samples::MPI_IO_COLLECTIVE_WRITE,
            )]),
        );
    }
}

fn shared_small_evidence(
    inputs: &RuleInputs<'_>,
    total_shared_ops: u64,
    ratio_threshold: f64,
    reads: bool,
) -> Vec<String> {
    let cutoff = total_shared_ops as f64 * ratio_threshold / 2.0;
    let kind = if reads { "read" } else { "write" };

    inputs
        .stats
        .per_file
        .iter()
        .filter_map(|(&id, file)| {
            if !file.shared {
                return None;
            }
            let count = if reads { file.small_reads } else { file.small_writes };
            if count as f64 > cutoff {
                Some(format!(
                    "{} ({:.2}%) small {} requests are to \"{}\"",
                    count,
                    percent(count, total_shared_ops),
                    kind,
                    inputs.file_name(id)
                ))
            } else {
                None
            }
        })
        .collect()
}

/// Ranks spending longer than the policy floor in metadata operations.
pub(super) fn check_long_metadata(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let Some(posix) = &inputs.stats.posix else {
        return;
    };

    if posix.long_metadata_ranks == 0 {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::MetadataTimeRank);

    let mut recommendations = vec![Recommendation::new(
        "Attempt to combine files, reduce, or cache metadata operations",
    )];
    if inputs.modules.contains(Module::Hdf5) {
        recommendations.push(Recommendation::with_sample(
            "Since your application uses HDF5, try enabling collective metadata calls with H5Pset_coll_metadata_write() and H5Pset_all_coll_metadata_ops()",
            samples::HDF5_COLLECTIVE_METADATA,
        ));
        recommendations.push(Recommendation::with_sample(
            "Since your application uses HDF5, try using metadata cache to defer metadata operations",
            samples::HDF5_CACHE,
        ));
    }

    ctx.findings.push(
        Finding::new(
            FindingCode::PosixLongMetadata,
            Severity::High,
            Audience::Developer,
            format!(
                "There are {} ranks where metadata operations take over {} seconds",
                posix.long_metadata_ranks,
                ctx.policy.value(ThresholdId::MetadataTimeRank)
            ),
        )
        .with_recommendations(recommendations),
    );
}

fn imbalance_evidence(inputs: &RuleInputs<'_>, files: &[FileRatio]) -> Vec<String> {
    files
        .iter()
        .map(|file| {
            format!(
                "Load imbalance of {:.2}% detected while accessing \"{}\"",
                file.percent,
                inputs.file_name(file.file_id)
            )
        })
        .collect()
}

/// Byte-volume stragglers on shared files.
pub(super) fn check_shared_data_imbalance(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let stragglers = &inputs.imbalance.data_stragglers;
    if stragglers.is_empty() {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::ImbalanceStragglers);
    ctx.findings.push(
        Finding::new(
            FindingCode::PosixDataImbalance,
            Severity::High,
            Audience::User,
            format!(
                "Detected data transfer imbalance caused by stragglers when accessing {} shared files",
                stragglers.len()
            ),
        )
        .with_evidence(imbalance_evidence(inputs, stragglers))
        .with_recommendations(vec![
            Recommendation::new(
                "Consider better balancing the data transfer between the application ranks",
            ),
            Recommendation::with_sample(
                "Consider tuning how your data is distributed in the file system by changing the stripe size and count",
                samples::LUSTRE_STRIPING,
            ),
        ]),
    );
}

/// Time stragglers on shared files.
pub(super) fn check_shared_time_imbalance(inputs: &RuleInputs<'_>, ctx: &mut AnalysisContext) {
    let stragglers = &inputs.imbalance.time_stragglers;
    if stragglers.is_empty() {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::ImbalanceStragglers);
    ctx.findings.push(
        Finding::new(
            FindingCode::PosixTimeImbalance,
            Severity::High,
            Audience::User,
            format!(
                "Detected time imbalance caused by stragglers when accessing {} shared files",
                stragglers.len()
            ),
        )
        .with_evidence(imbalance_evidence(inputs, stragglers))
        .with_recommendations(vec![
            Recommendation::new("Consider better distributing the data in the parallel file system"),
            Recommendation::with_sample(
                "Consider tuning how your data is distributed in the file system by changing the stripe size and count",
                samples::LUSTRE_STRIPING,
            ),
        ]),
    );
}

fn individual_imbalance_recommendations() -> Vec<Recommendation> {
    vec![
        Recommendation::new(
            "Consider better balancing the data transfer between the application ranks",
        ),
        Recommendation::with_sample(
            "Consider tuning the stripe size and count to better distribute the data",
            samples::LUSTRE_STRIPING,
        ),
        Recommendation::with_sample(
            "If the application uses netCDF and HDF5 double-check the need to set NO_FILL values",
            samples::PNETCDF_HDF5_NO_FILL,
        ),
        Recommendation::new(
            "If rank 0 is the only one opening the file, consider using MPI-IO collectives",
        ),
    ]
}

/// Write-size imbalance on individually-accessed files.
pub(super) fn check_individual_write_imbalance(
    inputs: &RuleInputs<'_>,
    ctx: &mut AnalysisContext,
) {
    let files = &inputs.imbalance.write_imbalance;
    if files.is_empty() {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::ImbalanceSize);
    ctx.findings.push(
        Finding::new(
            FindingCode::PosixIndividualWriteImbalance,
            Severity::High,
            Audience::Developer,
            format!(
                "Detected write imbalance when accessing {} individual files",
                files.len()
            ),
        )
        .with_evidence(imbalance_evidence(inputs, files))
        .with_recommendations(individual_imbalance_recommendations()),
    );
}

/// Read-size imbalance on individually-accessed files.
pub(super) fn check_individual_read_imbalance(
    inputs: &RuleInputs<'_>,
    ctx: &mut AnalysisContext,
) {
    let files = &inputs.imbalance.read_imbalance;
    if files.is_empty() {
        return;
    }

    ctx.policy.mark_triggered(ThresholdId::ImbalanceSize);
    ctx.findings.push(
        Finding::new(
            FindingCode::PosixIndividualReadImbalance,
            Severity::High,
            Audience::Developer,
            format!(
                "Detected read imbalance when accessing {} individual files",
                files.len()
            ),
        )
        .with_evidence(imbalance_evidence(inputs, files))
        .with_recommendations(individual_imbalance_recommendations()),
    );
}
