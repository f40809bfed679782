//! Records describing runs, lanes, pools, libraries and barcodes as held by the laboratory
//! information system (LIMS), and the [`LabInfoSource`] trait through which they are looked up.
//!
//! The field names follow the LIMS API so an export can be deserialized directly.
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use fgoxide::io::Io;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error that may occur when looking up LIMS records.
#[derive(Error, Debug)]
pub enum LabInfoError {
    #[error("Io error occurred")]
    FgError(#[from] fgoxide::FgError),

    #[error("Unable to parse the LIMS export")]
    Json(#[from] serde_json::Error),

    #[error("No run found for flowcell {flowcell}")]
    RunNotFound { flowcell: String },

    #[error("No lane {lane} found for flowcell {flowcell}")]
    LaneNotFound { flowcell: String, lane: usize },
}

/// A single barcode attached to a library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BarcodeRecord {
    /// The sequence as entered in the LIMS; case is not normalized.
    pub barcode_sequence: String,
    /// The read number (1-based) the barcode is sequenced in.
    pub barcode_location: usize,
    /// The 1-based offset of the first barcode base within the read.
    pub barcode_position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub barcodes: Vec<BarcodeRecord>,
}

/// A reverse-complement flag on a pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrientationFlag {
    pub revcom: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolRecord {
    pub id: u64,
    /// The lab group that owns the pool, used for delivery.
    pub group: String,
    #[serde(default)]
    pub reverse_complement: Vec<OrientationFlag>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub pi_netid: Option<String>,
    /// Libraries in LIMS order.
    #[serde(default)]
    pub libraries: Vec<LibraryRecord>,
}

impl PoolRecord {
    /// True if any orientation flag on the pool requests reverse complementing.
    pub fn is_revcom(&self) -> bool {
        self.reverse_complement.iter().any(|f| f.revcom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaneRecord {
    pub id: u64,
    pub lane_number: usize,
    pub pool: PoolRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    pub id: u64,
    pub fcid: String,
    /// The instrument's run directory, containing `RunInfo.xml`.
    pub run_dir: PathBuf,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub deliver_run_dir: bool,
    #[serde(default)]
    pub lanes: Vec<LaneRecord>,
}

/// Anything that can answer LIMS queries for a flowcell.
pub trait LabInfoSource {
    /// Returns the run record for the flowcell.
    fn run(&self, flowcell: &str) -> Result<RunRecord, LabInfoError>;

    /// Returns the pool loaded into the given lane of the flowcell.
    fn lane_pool(&self, flowcell: &str, lane: usize) -> Result<PoolRecord, LabInfoError> {
        self.run(flowcell)?
            .lanes
            .into_iter()
            .find(|l| l.lane_number == lane)
            .map(|l| l.pool)
            .ok_or_else(|| LabInfoError::LaneNotFound { flowcell: flowcell.to_string(), lane })
    }
}

/// A JSON export of one or more runs from the LIMS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LabExport {
    pub runs: Vec<RunRecord>,
}

impl LabExport {
    /// Loads an export from the given JSON file, which may be gzipped.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LabInfoError> {
        let io = Io::default();
        let reader = io.new_reader(&path)?;
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(json: &str) -> Result<Self, LabInfoError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl LabInfoSource for LabExport {
    fn run(&self, flowcell: &str) -> Result<RunRecord, LabInfoError> {
        self.runs
            .iter()
            .find(|r| r.fcid == flowcell)
            .cloned()
            .ok_or_else(|| LabInfoError::RunNotFound { flowcell: flowcell.to_string() })
    }
}
