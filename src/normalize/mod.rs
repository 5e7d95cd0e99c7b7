use std::collections::HashMap;

use crate::error::AnalysisError;
use crate::input::{
    CounterTrace, IntervalTrace, MpiioCounterRow, PosixCounterRow, StdioCounterRow, TraceInput,
};
use crate::record::{
    FileCatalog, FileEntry, Interface, IoRecord, JobMeta, Module, ModuleSet, Operation, RANK_ALL,
};

/// Typed counter tables carried through from the counter ingestion path.
///
/// The aggregator, classifier, and imbalance detector consume these when
/// present instead of recomputing from per-operation records; the two
/// derivations share one output shape downstream.
#[derive(Debug, Default)]
pub struct CounterTables {
    pub posix: Vec<PosixCounterRow>,
    pub stdio: Vec<StdioCounterRow>,
    pub mpiio: Vec<MpiioCounterRow>,
}

/// Common normalized form of a trace: the record model, file catalog,
/// module-presence set, and job metadata, plus the original counter tables
/// when the trace arrived pre-aggregated.
#[derive(Debug, Default)]
pub struct NormalizedTrace {
    pub records: Vec<IoRecord>,
    pub catalog: FileCatalog,
    pub modules: ModuleSet,
    pub job: JobMeta,
    pub counters: Option<CounterTables>,
}

impl NormalizedTrace {
    /// Number of distinct non-sentinel ranks observed.
    pub fn rank_count(&self) -> usize {
        let mut ranks: Vec<i32> = self
            .records
            .iter()
            .filter(|r| r.rank != RANK_ALL)
            .map(|r| r.rank)
            .collect();
        ranks.sort_unstable();
        ranks.dedup();
        ranks.len()
    }
}

/// Adapt either ingestion shape into the common record model.
pub fn normalize(input: TraceInput) -> Result<NormalizedTrace, AnalysisError> {
    match input {
        TraceInput::Counters(trace) => normalize_counters(trace),
        TraceInput::Intervals(trace) => normalize_intervals(trace),
    }
}

/// Interface classification of a raw function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionTag {
    MpiIo,
    Hdf5,
    Stdio,
    Posix,
}

/// STDIO family functions; anything else not matching the MPI or HDF5
/// fragments defaults to POSIX.
const STDIO_FRAGMENTS: [&str; 10] = [
    "fopen", "fclose", "fread", "fwrite", "fprintf", "fscanf", "fgets", "fputs", "fseek",
    "fflush",
];

/// Classify a function name by case-insensitive fragment lookup.
fn tag_function(function: &str) -> FunctionTag {
    let lower = function.to_ascii_lowercase();
    if lower.contains("mpi") {
        FunctionTag::MpiIo
    } else if lower.contains("h5") {
        FunctionTag::Hdf5
    } else if STDIO_FRAGMENTS.iter().any(|f| lower.starts_with(f)) {
        FunctionTag::Stdio
    } else {
        FunctionTag::Posix
    }
}

/// Whether a call is a metadata operation rather than a data transfer.
fn is_metadata_function(function: &str) -> bool {
    let lower = function.to_ascii_lowercase();
    ["open", "close", "creat", "seek", "sync"]
        .iter()
        .any(|f| lower.contains(f))
}

fn is_read_function(function: &str) -> bool {
    function.to_ascii_lowercase().contains("read")
}

fn is_collective_function(function: &str) -> bool {
    function.to_ascii_lowercase().contains("_all")
}

fn is_nonblocking_function(function: &str) -> bool {
    let lower = function.to_ascii_lowercase();
    ["iread", "iwrite", "begin", "end"]
        .iter()
        .any(|f| lower.contains(f))
}

fn normalize_counters(trace: CounterTrace) -> Result<NormalizedTrace, AnalysisError> {
    let mut modules = ModuleSet::new();
    for name in &trace.modules {
        if let Some(module) = Module::from_name(name) {
            modules.insert(module);
        }
    }

    // Declared modules must come with their counter tables; a module listed
    // as present with no counters is inconsistent trace metadata.
    if modules.contains(Module::Posix) && trace.posix.is_none() {
        return Err(AnalysisError::MalformedTrace(
            "POSIX module present but POSIX counter table is missing".into(),
        ));
    }
    if modules.contains(Module::Stdio) && trace.stdio.is_none() {
        return Err(AnalysisError::MalformedTrace(
            "STDIO module present but STDIO counter table is missing".into(),
        ));
    }
    if modules.contains(Module::MpiIo) && trace.mpiio.is_none() {
        return Err(AnalysisError::MalformedTrace(
            "MPI-IO module present but MPI-IO counter table is missing".into(),
        ));
    }

    let mut catalog = FileCatalog::new();
    for file in &trace.files {
        catalog.insert(file.id, FileEntry::new(file.path.clone()));
    }

    let counters = CounterTables {
        posix: trace.posix.unwrap_or_default(),
        stdio: trace.stdio.unwrap_or_default(),
        mpiio: trace.mpiio.unwrap_or_default(),
    };

    for row in &counters.posix {
        if let Some(entry) = catalog.get_mut(row.id) {
            entry.uses_posix = true;
        }
    }
    for row in &counters.stdio {
        if let Some(entry) = catalog.get_mut(row.id) {
            entry.uses_stdio = true;
        }
    }
    for row in &counters.mpiio {
        if let Some(entry) = catalog.get_mut(row.id) {
            entry.uses_mpiio = true;
        }
    }

    Ok(NormalizedTrace {
        records: Vec::new(),
        catalog,
        modules,
        job: JobMeta {
            nprocs: trace.job.nprocs,
            compute_nodes: trace.job.compute_nodes,
            hints: trace.job.hints,
        },
        counters: Some(counters),
    })
}

fn normalize_intervals(trace: IntervalTrace) -> Result<NormalizedTrace, AnalysisError> {
    let mut catalog = FileCatalog::new();
    let mut path_to_id: HashMap<String, u64> = HashMap::new();
    for file in &trace.files {
        catalog.insert(file.id, FileEntry::new(file.path.clone()));
        path_to_id.insert(file.path.clone(), file.id);
    }

    let mut modules = ModuleSet::new();
    let mut records = Vec::with_capacity(trace.intervals.len() + trace.calls.len());

    for row in &trace.intervals {
        let interface = match tag_function(&row.function) {
            FunctionTag::MpiIo => {
                modules.insert(Module::MpiIo);
                Interface::MpiIo
            }
            FunctionTag::Hdf5 => {
                // Library-level call; the underlying POSIX traffic is traced
                // separately, so emitting a record would double-count it.
                modules.insert(Module::Hdf5);
                continue;
            }
            FunctionTag::Stdio => {
                modules.insert(Module::Stdio);
                Interface::Stdio
            }
            FunctionTag::Posix => {
                modules.insert(Module::Posix);
                Interface::Posix
            }
        };

        let operation = if is_read_function(&row.function) {
            Operation::Read
        } else {
            Operation::Write
        };

        if let Some(entry) = catalog.get_mut(row.file_id) {
            match interface {
                Interface::Posix => entry.uses_posix = true,
                Interface::Stdio => entry.uses_stdio = true,
                Interface::MpiIo => entry.uses_mpiio = true,
            }
        }

        records.push(IoRecord {
            file_id: row.file_id,
            rank: row.rank,
            operation,
            interface,
            offset: row.offset,
            size: row.size,
            start: row.start,
            end: row.end,
            collective: interface == Interface::MpiIo && is_collective_function(&row.function),
            nonblocking: interface == Interface::MpiIo && is_nonblocking_function(&row.function),
        });
    }

    for call in &trace.calls {
        match tag_function(&call.function) {
            FunctionTag::MpiIo | FunctionTag::Hdf5 => continue,
            FunctionTag::Stdio | FunctionTag::Posix => {}
        }
        if !is_metadata_function(&call.function) {
            // Data transfers arrive through the interval table; anything
            // else that is not clearly metadata is dropped.
            continue;
        }

        // File id 0 when the call did not name a cataloged file; metadata
        // aggregates group by rank only.
        let file_id = call
            .fname
            .as_deref()
            .and_then(|name| path_to_id.get(name).copied())
            .unwrap_or(0);

        records.push(IoRecord {
            file_id,
            rank: call.rank,
            operation: Operation::Metadata,
            interface: Interface::Posix,
            offset: None,
            size: 0,
            start: call.start,
            end: call.end,
            collective: false,
            nonblocking: false,
        });
    }

    let mut normalized = NormalizedTrace {
        records,
        catalog,
        modules,
        job: JobMeta {
            nprocs: trace.job.nprocs,
            compute_nodes: trace.job.compute_nodes,
            hints: trace.job.hints,
        },
        counters: None,
    };

    if normalized.job.nprocs == 0 {
        normalized.job.nprocs = normalized.rank_count() as u32;
    }

    Ok(normalized)
}
