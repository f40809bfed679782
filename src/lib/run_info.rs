//! Reads the instrument's `RunInfo.xml` into an ordered list of [`ReadSegment`]s.
//!
//! Only the `<Read>` elements matter for building a demultiplexing configuration.  A typical
//! dual-indexed paired-end run looks like:
//!
//! ```text
//! <RunInfo Version="5">
//!   <Run Id="230101_A01234_0042_AHXXXXXXX" Number="42">
//!     <Flowcell>HXXXXXXX</Flowcell>
//!     <Instrument>A01234</Instrument>
//!     <Reads>
//!       <Read Number="1" NumCycles="151" IsIndexedRead="N"/>
//!       <Read Number="2" NumCycles="8" IsIndexedRead="Y"/>
//!       <Read Number="3" NumCycles="8" IsIndexedRead="Y"/>
//!       <Read Number="4" NumCycles="151" IsIndexedRead="N"/>
//!     </Reads>
//!   </Run>
//! </RunInfo>
//! ```
#![forbid(unsafe_code)]

use std::{fs::File, io::BufReader, path::Path};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

/// The name of the run descriptor written by the instrument into the run directory.
pub const RUN_INFO_FILENAME: &str = "RunInfo.xml";

/// The error that may occur when reading the run descriptor.
#[derive(Error, Debug)]
pub enum RunInfoError {
    #[error("Unable to open the run descriptor: {path}")]
    Io { source: std::io::Error, path: String },

    #[error("Unable to parse the run descriptor")]
    Xml(#[from] serde_xml_rs::Error),

    #[error("The run descriptor contains no <Read> elements")]
    NoReads,

    #[error("Read has an invalid Number attribute `{value}`, expected a positive integer")]
    InvalidReadNumber { value: String },

    #[error("Read {number} has an invalid IsIndexedRead attribute `{value}`, expected Y or N")]
    InvalidIndexFlag { number: usize, value: String },

    #[error("Read {number} has an invalid NumCycles attribute `{value}`")]
    InvalidNumCycles { number: usize, value: String },

    #[error("Read numbers must be contiguous starting at 1: expected read {expected}, found read {found}")]
    NonContiguousReads { expected: usize, found: usize },
}

/// One sequencing read (a contiguous block of cycles) as declared by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadSegment {
    /// The 1-based read number assigned by the instrument.
    pub ordinal: usize,
    /// True if the read captures an index (barcode) rather than template bases.
    pub is_indexed: bool,
    /// The number of cycles in the read, if declared.
    pub num_cycles: Option<usize>,
}

impl ReadSegment {
    pub fn new(ordinal: usize, is_indexed: bool) -> Self {
        Self { ordinal, is_indexed, num_cycles: None }
    }

    pub fn with_cycles(ordinal: usize, is_indexed: bool, num_cycles: usize) -> Self {
        Self { ordinal, is_indexed, num_cycles: Some(num_cycles) }
    }

    /// The 0-based index of this read as used in Pheniqs tokens.
    pub fn index(&self) -> usize {
        self.ordinal - 1
    }
}

/// The run-level fields of the descriptor along with the parsed reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub run_id: Option<String>,
    pub flowcell: Option<String>,
    pub instrument: Option<String>,
    /// Read segments sorted by ordinal.
    pub segments: Vec<ReadSegment>,
}

impl RunInfo {
    /// Reads and validates the run descriptor at the given path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RunInfoError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RunInfoError::Io {
            source,
            path: path.to_string_lossy().to_string(),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads and validates a run descriptor from any reader.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, RunInfoError> {
        let raw: RawRunInfo = serde_xml_rs::from_reader(reader)?;
        let run = raw.run;
        let segments = parse_segments(run.reads.map(|r| r.read).unwrap_or_default())?;
        Ok(Self { run_id: run.id, flowcell: run.flowcell, instrument: run.instrument, segments })
    }

    /// The number of reads that carry template bases.
    pub fn num_template_reads(&self) -> usize {
        self.segments.iter().filter(|s| !s.is_indexed).count()
    }

    /// The number of index reads.
    pub fn num_index_reads(&self) -> usize {
        self.segments.iter().filter(|s| s.is_indexed).count()
    }
}

/// Converts the raw `<Read>` attributes into [`ReadSegment`]s sorted by ordinal, checking that
/// the ordinals form the range `1..=N`.
fn parse_segments(reads: Vec<RawRead>) -> Result<Vec<ReadSegment>, RunInfoError> {
    if reads.is_empty() {
        return Err(RunInfoError::NoReads);
    }

    let mut segments = Vec::with_capacity(reads.len());
    for read in reads {
        let ordinal = match read.number.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => return Err(RunInfoError::InvalidReadNumber { value: read.number }),
        };
        let is_indexed = match read.is_indexed_read.trim() {
            "Y" | "y" => true,
            "N" | "n" => false,
            _ => {
                return Err(RunInfoError::InvalidIndexFlag {
                    number: ordinal,
                    value: read.is_indexed_read,
                })
            }
        };
        let num_cycles = match read.num_cycles {
            None => None,
            Some(value) => match value.trim().parse::<usize>() {
                Ok(cycles) => Some(cycles),
                Err(_) => return Err(RunInfoError::InvalidNumCycles { number: ordinal, value }),
            },
        };
        debug!("Read {}: indexed={} cycles={:?}", ordinal, is_indexed, num_cycles);
        segments.push(ReadSegment { ordinal, is_indexed, num_cycles });
    }

    segments.sort_by_key(|s| s.ordinal);
    for (i, segment) in segments.iter().enumerate() {
        if segment.ordinal != i + 1 {
            return Err(RunInfoError::NonContiguousReads {
                expected: i + 1,
                found: segment.ordinal,
            });
        }
    }
    Ok(segments)
}

#[derive(Debug, Deserialize)]
struct RawRunInfo {
    #[serde(rename = "Run")]
    run: RawRun,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRun {
    id: Option<String>,
    flowcell: Option<String>,
    instrument: Option<String>,
    reads: Option<RawReads>,
}

#[derive(Debug, Deserialize)]
struct RawReads {
    #[serde(rename = "Read", default)]
    read: Vec<RawRead>,
}

// Attributes are kept as strings so bad values produce a descriptive error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRead {
    number: String,
    is_indexed_read: String,
    num_cycles: Option<String>,
}
