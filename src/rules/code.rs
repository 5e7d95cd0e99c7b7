use std::fmt;

use serde::{Serialize, Serializer};

/// Stable short identifiers for every finding the rule engine can emit.
///
/// The string forms are part of the output contract (CSV/JSON consumers key
/// on them) and must not change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingCode {
    StdioHighUsage,
    PosixWriteCountIntensive,
    PosixReadCountIntensive,
    PosixWriteSizeIntensive,
    PosixReadSizeIntensive,
    PosixSmallReads,
    PosixSmallWrites,
    PosixMisalignedMemory,
    PosixMisalignedFile,
    PosixRedundantRead,
    PosixRedundantWrite,
    PosixRandomReads,
    PosixSequentialReads,
    PosixRandomWrites,
    PosixSequentialWrites,
    PosixSmallSharedReads,
    PosixSmallSharedWrites,
    PosixLongMetadata,
    PosixDataImbalance,
    PosixTimeImbalance,
    PosixIndividualWriteImbalance,
    PosixIndividualReadImbalance,
    MpiioNoUsage,
    MpiioNoCollectiveReads,
    MpiioNoCollectiveWrites,
    MpiioCollectiveReads,
    MpiioCollectiveWrites,
    MpiioBlockingReads,
    MpiioBlockingWrites,
    MpiioAggregatorsIntra,
    MpiioAggregatorsInter,
    MpiioAggregatorsOk,
}

impl FindingCode {
    /// Returns the stable short identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StdioHighUsage => "S01",
            Self::PosixWriteCountIntensive => "P01",
            Self::PosixReadCountIntensive => "P02",
            Self::PosixWriteSizeIntensive => "P03",
            Self::PosixReadSizeIntensive => "P04",
            Self::PosixSmallReads => "P05",
            Self::PosixSmallWrites => "P06",
            Self::PosixMisalignedMemory => "P07",
            Self::PosixMisalignedFile => "P08",
            Self::PosixRedundantRead => "P09",
            Self::PosixRedundantWrite => "P10",
            Self::PosixRandomReads => "P11",
            Self::PosixSequentialReads => "P12",
            Self::PosixRandomWrites => "P13",
            Self::PosixSequentialWrites => "P14",
            Self::PosixSmallSharedReads => "P15",
            Self::PosixSmallSharedWrites => "P16",
            Self::PosixLongMetadata => "P17",
            Self::PosixDataImbalance => "P18",
            Self::PosixTimeImbalance => "P19",
            Self::PosixIndividualWriteImbalance => "P21",
            Self::PosixIndividualReadImbalance => "P22",
            Self::MpiioNoUsage => "M01",
            Self::MpiioNoCollectiveReads => "M02",
            Self::MpiioNoCollectiveWrites => "M03",
            Self::MpiioCollectiveReads => "M04",
            Self::MpiioCollectiveWrites => "M05",
            Self::MpiioBlockingReads => "M06",
            Self::MpiioBlockingWrites => "M07",
            Self::MpiioAggregatorsIntra => "M08",
            Self::MpiioAggregatorsInter => "M09",
            Self::MpiioAggregatorsOk => "M10",
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FindingCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
