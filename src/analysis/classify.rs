use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::normalize::NormalizedTrace;
use crate::record::{Interface, Operation};

/// Adjacent-pair transition counts for one operation type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionCounts {
    pub consecutive: u64,
    pub sequential: u64,
    pub random: u64,
}

impl TransitionCounts {
    /// Total classified transitions.
    pub fn transitions(&self) -> u64 {
        self.consecutive + self.sequential + self.random
    }
}

/// Global access-pattern classification, reads and writes independently.
///
/// Two derivations share this shape: the counter path takes the
/// trace-supplied consecutive/sequential counters (with random as the
/// remainder of the operation count), while the interval path recomputes
/// transitions from time-ordered offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationCounts {
    pub reads: TransitionCounts,
    pub writes: TransitionCounts,
}

/// Classify access patterns for the whole trace.
pub fn classify(trace: &NormalizedTrace) -> ClassificationCounts {
    if let Some(counters) = &trace.counters {
        classify_counters(counters)
    } else {
        classify_records(trace)
    }
}

fn classify_counters(counters: &crate::normalize::CounterTables) -> ClassificationCounts {
    let mut total_reads: u64 = 0;
    let mut total_writes: u64 = 0;
    let mut consec_reads: u64 = 0;
    let mut seq_reads: u64 = 0;
    let mut consec_writes: u64 = 0;
    let mut seq_writes: u64 = 0;

    for row in &counters.posix {
        total_reads += row.reads;
        total_writes += row.writes;
        consec_reads += row.consec_reads;
        seq_reads += row.seq_reads;
        consec_writes += row.consec_writes;
        seq_writes += row.seq_writes;
    }

    // The trace reports sequential inclusive of consecutive.
    let seq_reads = seq_reads.saturating_sub(consec_reads);
    let seq_writes = seq_writes.saturating_sub(consec_writes);

    ClassificationCounts {
        reads: TransitionCounts {
            consecutive: consec_reads,
            sequential: seq_reads,
            random: total_reads.saturating_sub(consec_reads + seq_reads),
        },
        writes: TransitionCounts {
            consecutive: consec_writes,
            sequential: seq_writes,
            random: total_writes.saturating_sub(consec_writes + seq_writes),
        },
    }
}

fn classify_records(trace: &NormalizedTrace) -> ClassificationCounts {
    let mut by_file: BTreeMap<u64, Vec<&crate::record::IoRecord>> = BTreeMap::new();
    for record in &trace.records {
        if record.interface != Interface::Posix || record.operation == Operation::Metadata {
            continue;
        }
        if record.offset.is_none() {
            // Unknown offsets cannot be ordered against their neighbors.
            continue;
        }
        by_file.entry(record.file_id).or_default().push(record);
    }

    let mut counts = ClassificationCounts::default();
    for records in by_file.values() {
        count_file_transitions(records, Operation::Read, &mut counts.reads);
        count_file_transitions(records, Operation::Write, &mut counts.writes);
    }

    counts
}

/// Walk one file's operations of one type in start-time order, comparing
/// each operation's end offset to the next operation's start offset.
fn count_file_transitions(
    records: &[&crate::record::IoRecord],
    operation: Operation,
    counts: &mut TransitionCounts,
) {
    let mut ordered: Vec<&crate::record::IoRecord> = records
        .iter()
        .copied()
        .filter(|r| r.operation == operation)
        .collect();

    // Fewer than two ordered operations contribute no transitions.
    if ordered.len() < 2 {
        return;
    }

    ordered.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));

    for pair in ordered.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let current_end = current.offset.unwrap_or(0) + current.size;
        let next_offset = next.offset.unwrap_or(0);

        match current_end.cmp(&next_offset) {
            Ordering::Equal => counts.consecutive += 1,
            Ordering::Less => counts.sequential += 1,
            Ordering::Greater => counts.random += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FileCatalog, FileEntry, IoRecord, JobMeta, ModuleSet};

    fn read_at(file_id: u64, start: f64, offset: u64, size: u64) -> IoRecord {
        IoRecord {
            file_id,
            rank: 0,
            operation: Operation::Read,
            interface: Interface::Posix,
            offset: Some(offset),
            size,
            start,
            end: start + 0.01,
            collective: false,
            nonblocking: false,
        }
    }

    fn trace_from(records: Vec<IoRecord>) -> NormalizedTrace {
        let mut catalog = FileCatalog::new();
        catalog.insert(1, FileEntry::new("/a"));
        NormalizedTrace {
            records,
            catalog,
            modules: ModuleSet::new(),
            job: JobMeta::default(),
            counters: None,
        }
    }

    #[test]
    fn test_consecutive_sequential_random() {
        let trace = trace_from(vec![
            read_at(1, 0.0, 0, 100),   // ends at 100
            read_at(1, 1.0, 100, 100), // consecutive
            read_at(1, 2.0, 500, 100), // sequential (gap)
            read_at(1, 3.0, 0, 100),   // random (backwards)
        ]);

        let counts = classify(&trace);
        assert_eq!(counts.reads.consecutive, 1);
        assert_eq!(counts.reads.sequential, 1);
        assert_eq!(counts.reads.random, 1);
        assert_eq!(counts.reads.transitions(), 3);
        assert_eq!(counts.writes.transitions(), 0);
    }

    #[test]
    fn test_sorting_is_by_start_time_not_input_order() {
        let trace = trace_from(vec![
            read_at(1, 2.0, 200, 100),
            read_at(1, 0.0, 0, 100),
            read_at(1, 1.0, 100, 100),
        ]);

        let counts = classify(&trace);
        assert_eq!(counts.reads.consecutive, 2);
        assert_eq!(counts.reads.random, 0);
    }

    #[test]
    fn test_single_operation_contributes_nothing() {
        let trace = trace_from(vec![read_at(1, 0.0, 0, 100)]);
        let counts = classify(&trace);
        assert_eq!(counts.reads.transitions(), 0);
    }

    #[test]
    fn test_unknown_offsets_are_excluded() {
        let mut blind = read_at(1, 1.0, 0, 100);
        blind.offset = None;

        let trace = trace_from(vec![
            read_at(1, 0.0, 0, 100),
            blind,
            read_at(1, 2.0, 100, 100),
        ]);

        let counts = classify(&trace);
        // Only the two offset-bearing reads pair up.
        assert_eq!(counts.reads.consecutive, 1);
        assert_eq!(counts.reads.transitions(), 1);
    }

    #[test]
    fn test_files_classified_independently() {
        let trace = trace_from(vec![
            read_at(1, 0.0, 0, 100),
            read_at(2, 0.5, 5000, 100), // different file, no transition across
            read_at(1, 1.0, 100, 100),
        ]);

        let counts = classify(&trace);
        assert_eq!(counts.reads.consecutive, 1);
        assert_eq!(counts.reads.transitions(), 1);
    }

    #[test]
    fn test_strictly_increasing_scan_is_never_random() {
        let mut records = Vec::new();
        for i in 0..2000u64 {
            // 500-byte reads at strictly increasing, non-overlapping offsets.
            records.push(read_at(1, i as f64, i * 1000, 500));
        }

        let counts = classify(&trace_from(records));
        assert_eq!(counts.reads.sequential, 1999);
        assert_eq!(counts.reads.random, 0);
    }

    #[test]
    fn test_counter_path_subtracts_consecutive_from_sequential() {
        use crate::input::{CounterTrace, PosixCounterRow, RawFileName, TraceInput};
        use crate::normalize::normalize;

        let trace = CounterTrace {
            modules: vec!["POSIX".into()],
            files: vec![RawFileName {
                id: 1,
                path: "/a".into(),
            }],
            posix: Some(vec![PosixCounterRow {
                id: 1,
                rank: 0,
                reads: 100,
                consec_reads: 20,
                seq_reads: 70, // inclusive of the 20 consecutive
                writes: 10,
                consec_writes: 10,
                seq_writes: 10,
                ..Default::default()
            }]),
            ..Default::default()
        };

        let normalized = normalize(TraceInput::Counters(trace)).expect("normalize");
        let counts = classify(&normalized);

        assert_eq!(counts.reads.consecutive, 20);
        assert_eq!(counts.reads.sequential, 50);
        assert_eq!(counts.reads.random, 30);
        assert_eq!(counts.reads.transitions(), 100);

        assert_eq!(counts.writes.consecutive, 10);
        assert_eq!(counts.writes.sequential, 0);
        assert_eq!(counts.writes.random, 0);
    }
}
