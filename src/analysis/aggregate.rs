use std::collections::BTreeMap;

use crate::normalize::NormalizedTrace;
use crate::record::{Interface, Operation, RANK_ALL};
use crate::thresholds::{ThresholdId, ThresholdPolicy};

/// Per-file aggregates used for evidence assembly and sharedness tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    /// Accessed by more than one distinct non-sentinel rank.
    pub shared: bool,
    pub small_reads: u64,
    pub small_writes: u64,
    pub indep_reads: u64,
    pub indep_writes: u64,
}

/// POSIX-level aggregates. Alignment statistics are `None` when the trace
/// shape cannot supply them; a `None` must skip the consuming rule, never
/// read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosixStats {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub small_reads: u64,
    pub small_writes: u64,
    pub max_read_offset: Option<u64>,
    pub max_write_offset: Option<u64>,
    pub mem_not_aligned: Option<u64>,
    pub file_not_aligned: Option<u64>,
    pub shared_reads: u64,
    pub shared_writes: u64,
    pub shared_small_reads: u64,
    pub shared_small_writes: u64,
    /// Ranks whose cumulative metadata time exceeds the policy floor.
    pub long_metadata_ranks: u64,
}

impl PosixStats {
    pub fn total_ops(&self) -> u64 {
        self.reads + self.writes
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_read + self.bytes_written
    }
}

/// MPI-IO-level aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpiioStats {
    pub indep_reads: u64,
    pub indep_writes: u64,
    pub coll_reads: u64,
    pub coll_writes: u64,
    pub nb_reads: u64,
    pub nb_writes: u64,
}

impl MpiioStats {
    pub fn read_ops(&self) -> u64 {
        self.indep_reads + self.coll_reads
    }

    pub fn write_ops(&self) -> u64 {
        self.indep_writes + self.coll_writes
    }
}

/// Global and per-file aggregates over one normalized trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    pub stdio_bytes: u64,
    /// POSIX bytes net of MPI-IO traffic (MPI-IO implies an underlying
    /// POSIX operation), floored at zero.
    pub posix_only_bytes: u64,
    pub mpiio_bytes: u64,
    /// Sum of the three interface totals; never double-counts MPI-IO.
    pub total_bytes: u64,
    pub posix: Option<PosixStats>,
    pub mpiio: Option<MpiioStats>,
    pub per_file: BTreeMap<u64, FileStats>,
}

/// Compute global and per-file aggregates.
///
/// Pure transform over the normalized trace; the policy supplies the
/// small-request byte ceiling and the per-rank metadata time floor.
pub fn aggregate(trace: &NormalizedTrace, policy: &ThresholdPolicy) -> AggregateStats {
    if let Some(counters) = &trace.counters {
        aggregate_counters(counters, policy)
    } else {
        aggregate_records(trace, policy)
    }
}

fn aggregate_counters(
    counters: &crate::normalize::CounterTables,
    policy: &ThresholdPolicy,
) -> AggregateStats {
    let mut stats = AggregateStats::default();

    let mut posix_bytes: u64 = 0;
    for row in &counters.stdio {
        stats.stdio_bytes += row.bytes_read + row.bytes_written;
    }
    for row in &counters.posix {
        posix_bytes += row.bytes_read + row.bytes_written;
    }
    for row in &counters.mpiio {
        stats.mpiio_bytes += row.bytes_read + row.bytes_written;
    }

    stats.posix_only_bytes = posix_bytes.saturating_sub(stats.mpiio_bytes);
    stats.total_bytes = stats.stdio_bytes + stats.posix_only_bytes + stats.mpiio_bytes;

    // A sentinel row marks a shared file in pre-aggregated counter tables.
    for row in &counters.posix {
        if row.rank == RANK_ALL {
            stats.per_file.entry(row.id).or_default().shared = true;
        }
    }

    if !counters.posix.is_empty() {
        let mut posix = PosixStats::default();
        let mut meta_time_by_rank: BTreeMap<i32, f64> = BTreeMap::new();

        for row in &counters.posix {
            posix.reads += row.reads;
            posix.writes += row.writes;
            posix.bytes_read += row.bytes_read;
            posix.bytes_written += row.bytes_written;
            posix.small_reads += row.small_reads();
            posix.small_writes += row.small_writes();

            posix.max_read_offset =
                Some(posix.max_read_offset.unwrap_or(0).max(row.max_byte_read));
            posix.max_write_offset =
                Some(posix.max_write_offset.unwrap_or(0).max(row.max_byte_written));

            *posix.mem_not_aligned.get_or_insert(0) += row.mem_not_aligned;
            *posix.file_not_aligned.get_or_insert(0) += row.file_not_aligned;

            let file = stats.per_file.entry(row.id).or_default();
            file.small_reads += row.small_reads();
            file.small_writes += row.small_writes();

            if row.rank == RANK_ALL {
                posix.shared_reads += row.reads;
                posix.shared_writes += row.writes;
                posix.shared_small_reads += row.small_reads();
                posix.shared_small_writes += row.small_writes();
            } else {
                *meta_time_by_rank.entry(row.rank).or_insert(0.0) += row.f_meta_time;
            }
        }

        let floor = policy.value(ThresholdId::MetadataTimeRank);
        posix.long_metadata_ranks = meta_time_by_rank
            .values()
            .filter(|&&time| time > floor)
            .count() as u64;

        stats.posix = Some(posix);
    }

    if !counters.mpiio.is_empty() {
        let mut mpiio = MpiioStats::default();
        for row in &counters.mpiio {
            mpiio.indep_reads += row.indep_reads;
            mpiio.indep_writes += row.indep_writes;
            mpiio.coll_reads += row.coll_reads;
            mpiio.coll_writes += row.coll_writes;
            mpiio.nb_reads += row.nb_reads;
            mpiio.nb_writes += row.nb_writes;

            let file = stats.per_file.entry(row.id).or_default();
            file.indep_reads += row.indep_reads;
            file.indep_writes += row.indep_writes;
        }
        stats.mpiio = Some(mpiio);
    }

    stats
}

fn aggregate_records(trace: &NormalizedTrace, policy: &ThresholdPolicy) -> AggregateStats {
    let mut stats = AggregateStats::default();
    let small_bytes = policy.value(ThresholdId::SmallBytes) as u64;

    let mut posix_bytes: u64 = 0;
    for record in &trace.records {
        if record.operation == Operation::Metadata {
            continue;
        }
        match record.interface {
            Interface::Stdio => stats.stdio_bytes += record.size,
            Interface::Posix => posix_bytes += record.size,
            Interface::MpiIo => stats.mpiio_bytes += record.size,
        }
    }
    stats.posix_only_bytes = posix_bytes.saturating_sub(stats.mpiio_bytes);
    stats.total_bytes = stats.stdio_bytes + stats.posix_only_bytes + stats.mpiio_bytes;

    // Sharedness: more than one distinct non-sentinel rank touching a file.
    let mut ranks_by_file: BTreeMap<u64, Vec<i32>> = BTreeMap::new();
    for record in &trace.records {
        if record.rank != RANK_ALL {
            ranks_by_file.entry(record.file_id).or_default().push(record.rank);
        }
    }
    for (file_id, ranks) in &mut ranks_by_file {
        ranks.sort_unstable();
        ranks.dedup();
        stats.per_file.entry(*file_id).or_default().shared = ranks.len() > 1;
    }

    let has_posix = trace
        .records
        .iter()
        .any(|r| r.interface == Interface::Posix && r.operation != Operation::Metadata);

    if has_posix {
        let mut posix = PosixStats::default();
        let mut meta_time_by_rank: BTreeMap<i32, f64> = BTreeMap::new();

        for record in &trace.records {
            if record.interface != Interface::Posix {
                continue;
            }

            if record.operation == Operation::Metadata {
                if record.rank != RANK_ALL {
                    *meta_time_by_rank.entry(record.rank).or_insert(0.0) += record.duration();
                }
                continue;
            }

            let shared = stats
                .per_file
                .get(&record.file_id)
                .map(|f| f.shared)
                .unwrap_or(false);
            let small = record.size <= small_bytes;
            let file = stats.per_file.entry(record.file_id).or_default();

            match record.operation {
                Operation::Read => {
                    posix.reads += 1;
                    posix.bytes_read += record.size;
                    if let Some(offset) = record.offset {
                        posix.max_read_offset =
                            Some(posix.max_read_offset.unwrap_or(0).max(offset));
                    }
                    if small {
                        posix.small_reads += 1;
                        file.small_reads += 1;
                    }
                    if shared {
                        posix.shared_reads += 1;
                        if small {
                            posix.shared_small_reads += 1;
                        }
                    }
                }
                Operation::Write => {
                    posix.writes += 1;
                    posix.bytes_written += record.size;
                    if let Some(offset) = record.offset {
                        posix.max_write_offset =
                            Some(posix.max_write_offset.unwrap_or(0).max(offset));
                    }
                    if small {
                        posix.small_writes += 1;
                        file.small_writes += 1;
                    }
                    if shared {
                        posix.shared_writes += 1;
                        if small {
                            posix.shared_small_writes += 1;
                        }
                    }
                }
                Operation::Metadata => unreachable!(),
            }
        }

        // Alignment counters do not exist in the interval shape; leave them
        // unset so the misalignment rule is skipped rather than fed zeros.
        let floor = policy.value(ThresholdId::MetadataTimeRank);
        posix.long_metadata_ranks = meta_time_by_rank
            .values()
            .filter(|&&time| time > floor)
            .count() as u64;

        stats.posix = Some(posix);
    }

    let has_mpiio = trace.records.iter().any(|r| r.interface == Interface::MpiIo);
    if has_mpiio {
        let mut mpiio = MpiioStats::default();
        for record in &trace.records {
            if record.interface != Interface::MpiIo || record.operation == Operation::Metadata {
                continue;
            }

            let file = stats.per_file.entry(record.file_id).or_default();
            match record.operation {
                Operation::Read => {
                    if record.collective {
                        mpiio.coll_reads += 1;
                    } else {
                        mpiio.indep_reads += 1;
                        file.indep_reads += 1;
                    }
                    if record.nonblocking {
                        mpiio.nb_reads += 1;
                    }
                }
                Operation::Write => {
                    if record.collective {
                        mpiio.coll_writes += 1;
                    } else {
                        mpiio.indep_writes += 1;
                        file.indep_writes += 1;
                    }
                    if record.nonblocking {
                        mpiio.nb_writes += 1;
                    }
                }
                Operation::Metadata => unreachable!(),
            }
        }
        stats.mpiio = Some(mpiio);
    }

    stats
}
