use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw trace input in one of the two supported ingestion shapes.
///
/// These structs are the normalizer's input contract: already-materialized
/// tables produced by the trace-reading collaborator. The loaders here only
/// deserialize; no diagnostic logic lives in this module.
#[derive(Debug)]
pub enum TraceInput {
    /// Per-interface counter tables (one pre-aggregated row per file, or
    /// per file and rank), as produced from Darshan-style logs.
    Counters(CounterTrace),
    /// Reconstructed per-operation interval table plus the raw per-rank
    /// function-call table, as produced from Recorder-style logs.
    Intervals(IntervalTrace),
}

/// Job-level metadata bag attached to either input shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJob {
    #[serde(default)]
    pub nprocs: u32,
    #[serde(default)]
    pub compute_nodes: Option<u32>,
    /// MPI-IO hint string of `key=value;...` pairs.
    #[serde(default)]
    pub hints: Option<String>,
}

/// One file-name record: id to path.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFileName {
    #[serde(alias = "file_id")]
    pub id: u64,
    #[serde(alias = "file_name")]
    pub path: String,
}

/// Counter-table trace bundle.
#[derive(Debug, Default, Deserialize)]
pub struct CounterTrace {
    /// Module names present in the trace, even when zero rows survive.
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub job: RawJob,
    #[serde(default)]
    pub files: Vec<RawFileName>,
    pub posix: Option<Vec<PosixCounterRow>>,
    pub stdio: Option<Vec<StdioCounterRow>>,
    pub mpiio: Option<Vec<MpiioCounterRow>>,
}

/// One POSIX counter row. Rank -1 denotes a shared-file row aggregated
/// across all ranks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PosixCounterRow {
    pub id: u64,
    pub rank: i32,
    #[serde(default)]
    pub reads: u64,
    #[serde(default)]
    pub writes: u64,
    #[serde(default)]
    pub bytes_read: u64,
    #[serde(default)]
    pub bytes_written: u64,
    /// Request-size histogram bins below 1 MiB.
    #[serde(default)]
    pub size_read_0_100: u64,
    #[serde(default)]
    pub size_read_100_1k: u64,
    #[serde(default)]
    pub size_read_1k_10k: u64,
    #[serde(default)]
    pub size_read_10k_100k: u64,
    #[serde(default)]
    pub size_read_100k_1m: u64,
    #[serde(default)]
    pub size_write_0_100: u64,
    #[serde(default)]
    pub size_write_100_1k: u64,
    #[serde(default)]
    pub size_write_1k_10k: u64,
    #[serde(default)]
    pub size_write_10k_100k: u64,
    #[serde(default)]
    pub size_write_100k_1m: u64,
    /// Trace-supplied access-pattern counters. Sequential counts include
    /// consecutive ones, as the trace reports them.
    #[serde(default)]
    pub consec_reads: u64,
    #[serde(default)]
    pub seq_reads: u64,
    #[serde(default)]
    pub consec_writes: u64,
    #[serde(default)]
    pub seq_writes: u64,
    #[serde(default)]
    pub mem_not_aligned: u64,
    #[serde(default)]
    pub file_not_aligned: u64,
    /// Highest byte offset read / written.
    #[serde(default)]
    pub max_byte_read: u64,
    #[serde(default)]
    pub max_byte_written: u64,
    /// Shared-file extrema (sentinel rows only).
    #[serde(default)]
    pub fastest_rank_bytes: u64,
    #[serde(default)]
    pub slowest_rank_bytes: u64,
    #[serde(default)]
    pub f_read_time: f64,
    #[serde(default)]
    pub f_write_time: f64,
    #[serde(default)]
    pub f_meta_time: f64,
    #[serde(default)]
    pub f_fastest_rank_time: f64,
    #[serde(default)]
    pub f_slowest_rank_time: f64,
}

impl PosixCounterRow {
    /// Sum of the read bins below 1 MiB.
    pub fn small_reads(&self) -> u64 {
        self.size_read_0_100
            + self.size_read_100_1k
            + self.size_read_1k_10k
            + self.size_read_10k_100k
            + self.size_read_100k_1m
    }

    /// Sum of the write bins below 1 MiB.
    pub fn small_writes(&self) -> u64 {
        self.size_write_0_100
            + self.size_write_100_1k
            + self.size_write_1k_10k
            + self.size_write_10k_100k
            + self.size_write_100k_1m
    }
}

/// One STDIO counter row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StdioCounterRow {
    pub id: u64,
    pub rank: i32,
    #[serde(default)]
    pub reads: u64,
    #[serde(default)]
    pub writes: u64,
    #[serde(default)]
    pub bytes_read: u64,
    #[serde(default)]
    pub bytes_written: u64,
}

/// One MPI-IO counter row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MpiioCounterRow {
    pub id: u64,
    pub rank: i32,
    #[serde(default)]
    pub indep_reads: u64,
    #[serde(default)]
    pub indep_writes: u64,
    #[serde(default)]
    pub coll_reads: u64,
    #[serde(default)]
    pub coll_writes: u64,
    #[serde(default)]
    pub nb_reads: u64,
    #[serde(default)]
    pub nb_writes: u64,
    #[serde(default)]
    pub bytes_read: u64,
    #[serde(default)]
    pub bytes_written: u64,
}

/// Interval-table trace bundle.
#[derive(Debug, Default)]
pub struct IntervalTrace {
    pub files: Vec<RawFileName>,
    pub intervals: Vec<IntervalRow>,
    pub calls: Vec<CallRow>,
    pub job: RawJob,
}

/// One reconstructed data-access interval.
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalRow {
    pub file_id: u64,
    pub rank: i32,
    pub function: String,
    /// Absent when the reconstruction could not resolve the offset.
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub size: u64,
    pub start: f64,
    pub end: f64,
}

/// One raw function call (metadata operations: open, close, seek, sync).
#[derive(Debug, Clone, Deserialize)]
pub struct CallRow {
    #[serde(default)]
    pub fname: Option<String>,
    pub rank: i32,
    pub function: String,
    pub start: f64,
    pub end: f64,
}

/// Load a counter-table bundle from a JSON file.
pub fn load_counter_bundle(path: &Path) -> Result<CounterTrace> {
    let file = File::open(path)
        .with_context(|| format!("opening counter bundle {}", path.display()))?;

    let trace: CounterTrace = serde_json::from_reader(file)
        .with_context(|| format!("parsing counter bundle {}", path.display()))?;

    Ok(trace)
}

/// Load an interval-table bundle from the CSV triple
/// `<prefix>.intervals.csv`, `<prefix>.records.csv`, `<prefix>.filemap.csv`.
pub fn load_interval_bundle(prefix: &Path) -> Result<IntervalTrace> {
    let intervals_path = suffixed(prefix, ".intervals.csv");
    let calls_path = suffixed(prefix, ".records.csv");
    let filemap_path = suffixed(prefix, ".filemap.csv");

    let intervals = read_csv(Path::new(&intervals_path))?;
    let calls = read_csv(Path::new(&calls_path))?;
    let files = read_csv(Path::new(&filemap_path))?;

    Ok(IntervalTrace {
        files,
        intervals,
        calls,
        job: RawJob::default(),
    })
}

fn suffixed(prefix: &Path, suffix: &str) -> String {
    format!("{}{}", prefix.display(), suffix)
}

fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: T = row.with_context(|| format!("parsing {}", path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}
