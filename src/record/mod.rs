use std::collections::BTreeMap;
use std::fmt;

/// Rank value denoting a counter aggregated across all ranks of a shared
/// file. Never participates in per-rank groupings.
pub const RANK_ALL: i32 = -1;

/// Kind of I/O operation carried by a record.
///
/// Calls that are not clearly a read or a write (open, close, seek, sync)
/// are routed to `Metadata` by the normalizer and excluded from read/write
/// aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    Metadata,
}

impl Operation {
    /// Returns the canonical label name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// I/O interface a record was issued through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Posix,
    Stdio,
    MpiIo,
}

impl Interface {
    /// Returns the canonical label name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Posix => "POSIX",
            Self::Stdio => "STDIO",
            Self::MpiIo => "MPI-IO",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrumentation module observed in a trace.
///
/// A module can be present even when no records survive normalization;
/// several rules key off presence alone (e.g. "no MPI-IO usage").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Module {
    Posix,
    Stdio,
    MpiIo,
    Hdf5,
    Lustre,
}

impl Module {
    /// Returns the canonical module name as it appears in trace metadata.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Posix => "POSIX",
            Self::Stdio => "STDIO",
            Self::MpiIo => "MPI-IO",
            Self::Hdf5 => "H5F",
            Self::Lustre => "LUSTRE",
        }
    }

    /// Convert from a trace-metadata module name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "POSIX" => Some(Self::Posix),
            "STDIO" => Some(Self::Stdio),
            "MPI-IO" | "MPIIO" => Some(Self::MpiIo),
            "H5F" | "H5D" => Some(Self::Hdf5),
            "LUSTRE" => Some(Self::Lustre),
            _ => None,
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of modules present in a trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet(std::collections::BTreeSet<Module>);

impl ModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: Module) {
        self.0.insert(module);
    }

    pub fn contains(&self, module: Module) -> bool {
        self.0.contains(&module)
    }

    pub fn iter(&self) -> impl Iterator<Item = Module> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Module> for ModuleSet {
    fn from_iter<T: IntoIterator<Item = Module>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One observed or pre-aggregated I/O access.
///
/// Immutable once produced by the normalizer. `offset` is `None` when the
/// trace did not record it; such records are excluded from classification
/// and redundancy checks rather than treated as offset zero.
#[derive(Debug, Clone, PartialEq)]
pub struct IoRecord {
    /// Key into the file catalog.
    pub file_id: u64,
    /// Issuing rank, or `RANK_ALL` for shared-file aggregate rows.
    pub rank: i32,
    pub operation: Operation,
    pub interface: Interface,
    pub offset: Option<u64>,
    /// Transfer size in bytes (zero for metadata records).
    pub size: u64,
    /// Start timestamp, seconds relative to job start.
    pub start: f64,
    /// End timestamp, seconds relative to job start.
    pub end: f64,
    /// MPI-IO only: issued as a collective call.
    pub collective: bool,
    /// MPI-IO only: issued as a non-blocking call.
    pub nonblocking: bool,
}

impl IoRecord {
    /// Wall-clock duration of the operation in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Catalog entry for one file observed in the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub uses_stdio: bool,
    pub uses_posix: bool,
    pub uses_mpiio: bool,
}

impl FileEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            uses_stdio: false,
            uses_posix: false,
            uses_mpiio: false,
        }
    }

    /// Final path component, used for evidence display.
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Whether the path carries an HDF5 file extension.
    pub fn has_hdf5_extension(&self) -> bool {
        self.path.ends_with(".h5") || self.path.ends_with(".hdf5")
    }
}

/// Mapping of file id to path and per-interface usage flags.
///
/// Built once per analysis run and read-only thereafter. Iteration order is
/// ascending file id so evidence assembly is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCatalog {
    entries: BTreeMap<u64, FileEntry>,
}

impl FileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u64, entry: FileEntry) {
        self.entries.insert(id, entry);
    }

    pub fn get(&self, id: u64) -> Option<&FileEntry> {
        self.entries.get(&id)
    }

    /// Mutable entry access for usage-flag tagging during normalization.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut FileEntry> {
        self.entries.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in ascending file-id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &FileEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Display name for a file: full path or basename.
    pub fn display_name(&self, id: u64, full_path: bool) -> String {
        match self.entries.get(&id) {
            Some(entry) if full_path => entry.path.clone(),
            Some(entry) => entry.basename().to_string(),
            None => format!("<unknown file {id}>"),
        }
    }

    /// Whether any cataloged file carries an HDF5 extension.
    pub fn any_hdf5_extension(&self) -> bool {
        self.entries.values().any(FileEntry::has_hdf5_extension)
    }

    /// Count of files flagged for each interface. POSIX counts exclude
    /// MPI-IO files since those always show POSIX activity underneath.
    pub fn usage_counts(&self) -> FileUsageCounts {
        let mut counts = FileUsageCounts::default();
        for entry in self.entries.values() {
            if entry.uses_stdio {
                counts.stdio += 1;
            }
            if entry.uses_posix {
                counts.posix += 1;
            }
            if entry.uses_mpiio {
                counts.mpiio += 1;
            }
        }
        counts.posix = counts.posix.saturating_sub(counts.mpiio);
        counts
    }
}

/// Per-interface file counts for the run header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileUsageCounts {
    pub stdio: usize,
    pub posix: usize,
    pub mpiio: usize,
}

/// Job-level metadata supplied by the trace-reading collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobMeta {
    /// Number of processes in the job.
    pub nprocs: u32,
    /// Number of compute nodes, when the scheduler reported it.
    pub compute_nodes: Option<u32>,
    /// MPI-IO hint string of `key=value;...` pairs, when present.
    pub hints: Option<String>,
}

impl JobMeta {
    /// Look up one MPI-IO hint by key.
    pub fn hint(&self, key: &str) -> Option<&str> {
        let hints = self.hints.as_deref()?;
        for pair in hints.split(';') {
            let mut parts = pair.splitn(2, '=');
            if parts.next() == Some(key) {
                return parts.next();
            }
        }
        None
    }

    /// The `cb_nodes` aggregator-count hint, parsed.
    pub fn cb_nodes(&self) -> Option<u32> {
        self.hint("cb_nodes")?.trim().parse().ok()
    }
}
