use std::collections::BTreeMap;

use crate::normalize::NormalizedTrace;
use crate::record::{Interface, Operation, RANK_ALL};
use crate::thresholds::{ThresholdId, ThresholdPolicy};

/// One file whose imbalance ratio crossed the policy threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileRatio {
    pub file_id: u64,
    /// Imbalance as a percentage in [0, 100].
    pub percent: f64,
}

/// Files crossing their imbalance thresholds, in ascending file-id order.
///
/// Lists are uncapped; the rule engine applies the evidence display cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImbalanceReport {
    /// Shared files with byte-volume imbalance between the slowest and
    /// fastest rank (rank selection by cumulative duration).
    pub data_stragglers: Vec<FileRatio>,
    /// Shared files with time imbalance between the slowest and fastest rank.
    pub time_stragglers: Vec<FileRatio>,
    /// Non-shared files with write-size imbalance.
    pub write_imbalance: Vec<FileRatio>,
    /// Non-shared files with read-size imbalance.
    pub read_imbalance: Vec<FileRatio>,
}

/// Per-rank accumulation for one shared file.
#[derive(Debug, Clone, Copy, Default)]
struct RankLoad {
    bytes: u64,
    seconds: f64,
}

/// Detect shared-file straggler imbalance and individual-file size
/// imbalance. A ratio with a zero denominator is skipped, not false.
pub fn detect(trace: &NormalizedTrace, policy: &ThresholdPolicy) -> ImbalanceReport {
    let straggler_threshold = policy.value(ThresholdId::ImbalanceStragglers);
    let size_threshold = policy.value(ThresholdId::ImbalanceSize);

    if let Some(counters) = &trace.counters {
        detect_counters(counters, straggler_threshold, size_threshold)
    } else {
        detect_records(trace, straggler_threshold, size_threshold)
    }
}

fn detect_records(
    trace: &NormalizedTrace,
    straggler_threshold: f64,
    size_threshold: f64,
) -> ImbalanceReport {
    let mut report = ImbalanceReport::default();

    // Rank-partitioned POSIX data accesses per file.
    let mut loads: BTreeMap<u64, BTreeMap<i32, RankLoad>> = BTreeMap::new();
    let mut read_sizes: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
    let mut write_sizes: BTreeMap<u64, (u64, u64)> = BTreeMap::new();

    for record in &trace.records {
        if record.interface != Interface::Posix
            || record.operation == Operation::Metadata
            || record.rank == RANK_ALL
        {
            continue;
        }

        let load = loads
            .entry(record.file_id)
            .or_default()
            .entry(record.rank)
            .or_default();
        load.bytes += record.size;
        load.seconds += record.duration();

        let extrema = match record.operation {
            Operation::Read => read_sizes.entry(record.file_id).or_insert((u64::MAX, 0)),
            Operation::Write => write_sizes.entry(record.file_id).or_insert((u64::MAX, 0)),
            Operation::Metadata => continue,
        };
        extrema.0 = extrema.0.min(record.size);
        extrema.1 = extrema.1.max(record.size);
    }

    for (&file_id, ranks) in &loads {
        if ranks.len() < 2 {
            continue;
        }

        // Slowest and fastest rank by cumulative duration; lowest rank wins
        // ties so evidence is reproducible.
        let mut slowest: Option<(i32, RankLoad)> = None;
        let mut fastest: Option<(i32, RankLoad)> = None;
        for (&rank, &load) in ranks {
            if slowest.map(|(_, l)| load.seconds > l.seconds).unwrap_or(true) {
                slowest = Some((rank, load));
            }
            if fastest.map(|(_, l)| load.seconds < l.seconds).unwrap_or(true) {
                fastest = Some((rank, load));
            }
        }
        let (slowest, fastest) = match (slowest, fastest) {
            (Some((_, s)), Some((_, f))) => (s, f),
            _ => continue,
        };

        let total_bytes: u64 = ranks.values().map(|l| l.bytes).sum();
        let total_seconds: f64 = ranks.values().map(|l| l.seconds).sum();

        if total_bytes > 0 {
            let ratio = slowest.bytes.abs_diff(fastest.bytes) as f64 / total_bytes as f64;
            if ratio > straggler_threshold {
                report.data_stragglers.push(FileRatio {
                    file_id,
                    percent: ratio * 100.0,
                });
            }
        }

        if total_seconds > 0.0 {
            let ratio = (slowest.seconds - fastest.seconds).abs() / total_seconds;
            if ratio > straggler_threshold {
                report.time_stragglers.push(FileRatio {
                    file_id,
                    percent: ratio * 100.0,
                });
            }
        }
    }

    let shared: std::collections::BTreeSet<u64> = loads
        .iter()
        .filter(|(_, ranks)| ranks.len() > 1)
        .map(|(&id, _)| id)
        .collect();

    for (sizes, out) in [
        (&write_sizes, &mut report.write_imbalance),
        (&read_sizes, &mut report.read_imbalance),
    ] {
        for (&file_id, &(min_size, max_size)) in sizes {
            if shared.contains(&file_id) || max_size == 0 {
                continue;
            }
            let ratio = (max_size - min_size) as f64 / max_size as f64;
            if ratio > size_threshold {
                out.push(FileRatio {
                    file_id,
                    percent: ratio * 100.0,
                });
            }
        }
    }

    report
}

fn detect_counters(
    counters: &crate::normalize::CounterTables,
    straggler_threshold: f64,
    size_threshold: f64,
) -> ImbalanceReport {
    let mut report = ImbalanceReport::default();

    // Sentinel rows carry the shared-file extrema straight from the trace.
    for row in &counters.posix {
        if row.rank != RANK_ALL {
            continue;
        }

        let total_bytes = row.bytes_read + row.bytes_written;
        if total_bytes > 0 {
            let ratio =
                row.slowest_rank_bytes.abs_diff(row.fastest_rank_bytes) as f64 / total_bytes as f64;
            if ratio > straggler_threshold {
                report.data_stragglers.push(FileRatio {
                    file_id: row.id,
                    percent: ratio * 100.0,
                });
            }
        }

        let total_time = row.f_read_time + row.f_write_time + row.f_meta_time;
        if total_time > 0.0 {
            let ratio = (row.f_slowest_rank_time - row.f_fastest_rank_time).abs() / total_time;
            if ratio > straggler_threshold {
                report.time_stragglers.push(FileRatio {
                    file_id: row.id,
                    percent: ratio * 100.0,
                });
            }
        }
    }

    // Per-rank rows: byte extrema across ranks for files the trace did not
    // collapse into a sentinel row.
    let mut write_extrema: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
    let mut read_extrema: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
    for row in &counters.posix {
        if row.rank == RANK_ALL {
            continue;
        }
        let writes = write_extrema.entry(row.id).or_insert((u64::MAX, 0));
        writes.0 = writes.0.min(row.bytes_written);
        writes.1 = writes.1.max(row.bytes_written);
        let reads = read_extrema.entry(row.id).or_insert((u64::MAX, 0));
        reads.0 = reads.0.min(row.bytes_read);
        reads.1 = reads.1.max(row.bytes_read);
    }

    for (extrema, out) in [
        (&write_extrema, &mut report.write_imbalance),
        (&read_extrema, &mut report.read_imbalance),
    ] {
        for (&file_id, &(min_bytes, max_bytes)) in extrema {
            if max_bytes == 0 {
                continue;
            }
            let ratio = (max_bytes - min_bytes) as f64 / max_bytes as f64;
            if ratio > size_threshold {
                out.push(FileRatio {
                    file_id,
                    percent: ratio * 100.0,
                });
            }
        }
    }

    report
}
