use std::collections::BTreeMap;

use iolens::analysis::{self, AnalysisOptions};
use iolens::input::{CounterTrace, MpiioCounterRow, PosixCounterRow, RawFileName, TraceInput};
use iolens::normalize::{normalize, NormalizedTrace};
use iolens::record::{
    FileCatalog, FileEntry, Interface, IoRecord, JobMeta, Module, ModuleSet, Operation, RANK_ALL,
};
use iolens::rules::{FindingCode, Severity};
use iolens::thresholds::ThresholdPolicy;

fn io_record(
    file_id: u64,
    rank: i32,
    operation: Operation,
    interface: Interface,
    offset: u64,
    size: u64,
    start: f64,
    end: f64,
) -> IoRecord {
    IoRecord {
        file_id,
        rank,
        operation,
        interface,
        offset: Some(offset),
        size,
        start,
        end,
        collective: false,
        nonblocking: false,
    }
}

fn trace_with(records: Vec<IoRecord>, files: &[(u64, &str)], modules: &[Module]) -> NormalizedTrace {
    let mut catalog = FileCatalog::new();
    for (id, path) in files {
        catalog.insert(*id, FileEntry::new(*path));
    }

    let mut module_set = ModuleSet::new();
    for module in modules {
        module_set.insert(*module);
    }

    NormalizedTrace {
        records,
        catalog,
        modules: module_set,
        job: JobMeta::default(),
        counters: None,
    }
}

fn codes(report: &analysis::AnalysisReport) -> Vec<FindingCode> {
    report.findings.iter().map(|f| f.code).collect()
}

#[test]
fn small_sequential_read_scenario() {
    // Single file, single rank, 2,000 reads of 500 bytes each at strictly
    // increasing non-overlapping offsets.
    let mut records = Vec::new();
    for i in 0..2000u64 {
        records.push(io_record(
            1,
            0,
            Operation::Read,
            Interface::Posix,
            i * 1000,
            500,
            i as f64,
            i as f64 + 0.001,
        ));
    }

    let trace = trace_with(records, &[(1, "/scratch/input.dat")], &[Module::Posix]);
    let report = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());
    let all = codes(&report);

    // 100% small requests over the 1,000-operation floor.
    assert!(all.contains(&FindingCode::PosixSmallReads));
    // 1,999 sequential transitions, zero random.
    assert!(all.contains(&FindingCode::PosixSequentialReads));
    assert!(!all.contains(&FindingCode::PosixRandomReads));

    let small = report
        .findings
        .iter()
        .find(|f| f.code == FindingCode::PosixSmallReads)
        .expect("small-read finding");
    assert_eq!(small.severity, Severity::High);
    assert!(small.message.contains("2000"));
    assert!(small.message.contains("100.00%"));
}

#[test]
fn straggler_scenario_fires_on_duration_selected_ranks() {
    // Rank 0: 100 s of I/O moving 100 bytes; rank 1: 10 s moving 900 bytes.
    // Data imbalance = |100 - 900| / 1000 = 0.8 > 0.15.
    let records = vec![
        io_record(1, 0, Operation::Write, Interface::Posix, 0, 100, 0.0, 100.0),
        io_record(1, 1, Operation::Write, Interface::Posix, 100, 900, 0.0, 10.0),
    ];

    let trace = trace_with(records, &[(1, "/scratch/shared.out")], &[Module::Posix]);
    let report = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());

    let finding = report
        .findings
        .iter()
        .find(|f| f.code == FindingCode::PosixDataImbalance)
        .expect("data imbalance finding");
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(finding.evidence.len(), 1);
    assert!(finding.evidence[0].contains("80.00%"));
    assert!(finding.evidence[0].contains("shared.out"));

    let threshold = report
        .thresholds
        .iter()
        .find(|t| t.name == "imbalance_stragglers")
        .expect("straggler threshold");
    assert!(threshold.triggered);
}

#[test]
fn collective_read_short_circuit() {
    // 1,500 independent reads and no collective ones: the High finding.
    let mut records = Vec::new();
    for i in 0..1500u64 {
        records.push(io_record(
            1,
            (i % 4) as i32,
            Operation::Read,
            Interface::MpiIo,
            i * 100,
            100,
            i as f64,
            i as f64 + 0.001,
        ));
    }

    let trace = trace_with(
        records.clone(),
        &[(1, "/scratch/mesh.dat")],
        &[Module::Posix, Module::MpiIo],
    );
    let report = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());
    let all = codes(&report);
    assert!(all.contains(&FindingCode::MpiioNoCollectiveReads));
    assert!(!all.contains(&FindingCode::MpiioCollectiveReads));

    let finding = report
        .findings
        .iter()
        .find(|f| f.code == FindingCode::MpiioNoCollectiveReads)
        .expect("no-collective finding");
    assert!(finding.message.contains("100.00%"));

    // One collective read among 1,499 independent: short-circuits to Ok.
    records[0].collective = true;
    let trace = trace_with(
        records,
        &[(1, "/scratch/mesh.dat")],
        &[Module::Posix, Module::MpiIo],
    );
    let report = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());
    let all = codes(&report);
    assert!(!all.contains(&FindingCode::MpiioNoCollectiveReads));
    assert!(all.contains(&FindingCode::MpiioCollectiveReads));
}

#[test]
fn evidence_caps_at_ten_in_source_order() {
    // Fifteen single-rank files, each with a 100x write-size imbalance.
    let paths: Vec<String> = (1..=15u64).map(|id| format!("/out/part-{id:02}")).collect();
    let mut records = Vec::new();
    let mut files = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        let id = (i + 1) as u64;
        files.push((id, path.as_str()));
        records.push(io_record(id, 0, Operation::Write, Interface::Posix, 0, 1000, 0.0, 0.1));
        records.push(io_record(id, 0, Operation::Write, Interface::Posix, 1000, 10, 0.2, 0.3));
    }

    let trace = trace_with(records, &files, &[Module::Posix]);
    let report = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());

    let finding = report
        .findings
        .iter()
        .find(|f| f.code == FindingCode::PosixIndividualWriteImbalance)
        .expect("write imbalance finding");
    assert!(finding.message.contains("15 individual files"));
    assert_eq!(finding.evidence.len(), 10);
    assert!(finding.evidence[0].contains("part-01"));
    assert!(finding.evidence[9].contains("part-10"));
}

#[test]
fn pipeline_is_deterministic() {
    let mut records = Vec::new();
    for i in 0..500u64 {
        records.push(io_record(
            1 + i % 3,
            (i % 4) as i32,
            if i % 2 == 0 { Operation::Read } else { Operation::Write },
            Interface::Posix,
            i * 137 % 10_000,
            100 + i % 900,
            i as f64 * 0.01,
            i as f64 * 0.01 + 0.005,
        ));
    }

    let trace = trace_with(
        records,
        &[(1, "/a"), (2, "/b"), (3, "/c")],
        &[Module::Posix],
    );

    let first = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());
    let second = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());

    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize"),
    );
}

#[test]
fn counter_bundle_end_to_end() {
    // Shared file with straggler extrema and misalignment problems, plus an
    // MPI-IO table, arriving as pre-aggregated counters.
    let trace = CounterTrace {
        modules: vec!["POSIX".into(), "MPI-IO".into(), "LUSTRE".into()],
        job: iolens::input::RawJob {
            nprocs: 64,
            compute_nodes: Some(4),
            hints: Some("cb_nodes=8;romio_cb_write=enable".into()),
        },
        files: vec![
            RawFileName {
                id: 10,
                path: "/scratch/checkpoint.dat".into(),
            },
            RawFileName {
                id: 11,
                path: "/scratch/metrics.csv".into(),
            },
        ],
        posix: Some(vec![
            PosixCounterRow {
                id: 10,
                rank: RANK_ALL,
                writes: 4000,
                bytes_written: 1000,
                size_write_0_100: 4000,
                mem_not_aligned: 3000,
                file_not_aligned: 2000,
                max_byte_written: 999,
                slowest_rank_bytes: 100,
                fastest_rank_bytes: 900,
                f_write_time: 110.0,
                f_slowest_rank_time: 100.0,
                f_fastest_rank_time: 10.0,
                ..Default::default()
            },
            PosixCounterRow {
                id: 11,
                rank: 0,
                reads: 10,
                bytes_read: 100_000_000,
                max_byte_read: 99_999_999,
                ..Default::default()
            },
        ]),
        stdio: None,
        mpiio: Some(vec![MpiioCounterRow {
            id: 10,
            rank: RANK_ALL,
            indep_writes: 4000,
            bytes_written: 500,
            ..Default::default()
        }]),
    };

    let normalized = normalize(TraceInput::Counters(trace)).expect("normalize");
    let report = analysis::run(
        &normalized,
        ThresholdPolicy::default(),
        AnalysisOptions::default(),
    );
    let all = codes(&report);

    // Counter-supplied misalignment and pattern counters feed the rules.
    assert!(all.contains(&FindingCode::PosixMisalignedMemory));
    assert!(all.contains(&FindingCode::PosixMisalignedFile));
    assert!(all.contains(&FindingCode::PosixSmallWrites));
    assert!(all.contains(&FindingCode::PosixSmallSharedWrites));
    assert!(all.contains(&FindingCode::PosixRandomWrites));
    assert!(all.contains(&FindingCode::PosixDataImbalance));
    assert!(all.contains(&FindingCode::PosixTimeImbalance));
    assert!(all.contains(&FindingCode::MpiioNoCollectiveWrites));
    // cb_nodes=8 against 4 compute nodes: inter-node aggregators.
    assert!(all.contains(&FindingCode::MpiioAggregatorsInter));
    // MPI-IO is present, so the no-usage warning must not fire.
    assert!(!all.contains(&FindingCode::MpiioNoUsage));

    // The Lustre module steers the misaligned-file recommendation.
    let misaligned_file = report
        .findings
        .iter()
        .find(|f| f.code == FindingCode::PosixMisalignedFile)
        .expect("misaligned file finding");
    assert!(misaligned_file
        .recommendations
        .iter()
        .any(|r| r.sample == Some("lustre-striping.bash")));
}

#[test]
fn threshold_overrides_change_rule_outcomes() {
    let mut records = Vec::new();
    for i in 0..2000u64 {
        records.push(io_record(
            1,
            0,
            Operation::Read,
            Interface::Posix,
            i * 1000,
            500,
            i as f64,
            i as f64 + 0.001,
        ));
    }
    let trace = trace_with(records, &[(1, "/in.dat")], &[Module::Posix]);

    // Defaults: the small-request flood fires.
    let report = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());
    assert!(codes(&report).contains(&FindingCode::PosixSmallReads));

    // Raising the absolute floor above the observed count silences it.
    let mut overrides = BTreeMap::new();
    overrides.insert("small_requests_absolute".to_string(), 5000.0);
    let mut policy = ThresholdPolicy::default();
    policy.apply_overrides(&overrides).expect("overrides");

    let report = analysis::run(&trace, policy, AnalysisOptions::default());
    assert!(!codes(&report).contains(&FindingCode::PosixSmallReads));
    assert!(!report
        .thresholds
        .iter()
        .find(|t| t.name == "small_requests")
        .expect("entry")
        .triggered);
}

#[test]
fn malformed_counter_trace_aborts_before_findings() {
    let trace = CounterTrace {
        modules: vec!["POSIX".into(), "STDIO".into()],
        posix: Some(vec![]),
        stdio: None,
        ..Default::default()
    };

    let err = normalize(TraceInput::Counters(trace)).unwrap_err();
    assert!(err.to_string().contains("STDIO"));
}

#[test]
fn posix_bytes_never_double_count_mpiio() {
    let records = vec![
        io_record(1, 0, Operation::Write, Interface::Posix, 0, 1_000, 0.0, 0.1),
        io_record(1, 0, Operation::Write, Interface::MpiIo, 0, 800, 0.0, 0.1),
        io_record(2, 0, Operation::Read, Interface::Stdio, 0, 200, 0.0, 0.1),
    ];
    let trace = trace_with(
        records,
        &[(1, "/a"), (2, "/b")],
        &[Module::Posix, Module::MpiIo, Module::Stdio],
    );

    let policy = ThresholdPolicy::default();
    let stats = iolens::analysis::aggregate::aggregate(&trace, &policy);
    assert_eq!(stats.posix_only_bytes, 200);
    assert_eq!(stats.total_bytes, 1_200);

    // STDIO moves 200 of 1,200 bytes: 16.7% > 10% threshold.
    let report = analysis::run(&trace, policy, AnalysisOptions::default());
    assert!(codes(&report).contains(&FindingCode::StdioHighUsage));
}

#[test]
fn full_path_option_controls_evidence_names() {
    let mut records = Vec::new();
    for i in 0..2000u64 {
        records.push(io_record(
            1,
            0,
            Operation::Read,
            Interface::Posix,
            i * 1000,
            500,
            i as f64,
            i as f64 + 0.001,
        ));
    }
    let trace = trace_with(records, &[(1, "/deep/nested/input.dat")], &[Module::Posix]);

    let report = analysis::run(
        &trace,
        ThresholdPolicy::default(),
        AnalysisOptions { full_paths: true },
    );
    let small = report
        .findings
        .iter()
        .find(|f| f.code == FindingCode::PosixSmallReads)
        .expect("small finding");
    assert!(small.evidence[0].contains("/deep/nested/input.dat"));

    let report = analysis::run(
        &trace,
        ThresholdPolicy::default(),
        AnalysisOptions { full_paths: false },
    );
    let small = report
        .findings
        .iter()
        .find(|f| f.code == FindingCode::PosixSmallReads)
        .expect("small finding");
    assert!(small.evidence[0].contains("\"input.dat\""));
}

#[test]
fn interval_path_reports_misaligned_check_as_skipped() {
    let records = vec![io_record(1, 0, Operation::Read, Interface::Posix, 0, 100, 0.0, 0.1)];
    let trace = trace_with(records, &[(1, "/a")], &[Module::Posix]);

    let report = analysis::run(&trace, ThresholdPolicy::default(), AnalysisOptions::default());
    assert!(report.skipped.iter().any(|s| s.rule == "posix_misaligned"));
    assert!(!codes(&report).contains(&FindingCode::PosixMisalignedMemory));
}
