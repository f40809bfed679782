//! Post-demultiplexing lane QC: reads the lane summary report, decides whether the lane passes,
//! and renders the delivery notification.
//!
//! The summary report has three preamble lines, a tab-separated header on the fourth line and a
//! single tab-separated data row on the fifth.  Numbers may contain thousands separators.
#![forbid(unsafe_code)]

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord, Trim};
use fgoxide::io::{DelimFile, Io};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNDETERMINED_PCT: &str = "% Undetermined";
pub const PHIX_ALIGNED_PCT: &str = "% PhiX Aligned";
pub const TOTAL_PF_READS: &str = "Total # PF Reads";
pub const TOTAL_READS: &str = "Total # of Single-End Reads";

/// The lane name used in summary reports for lanes merged into one delivery.
pub const MERGED_LANE: &str = "merged";

/// Lanes with more undetermined reads than this percentage fail QC.
pub const MAX_UNDETERMINED_PCT: f64 = 50.0;
/// Above this PhiX percentage the lane is flagged as under-loaded.
pub const MAX_PHIX_PCT: f64 = 15.0;
/// Below this passing-filter fraction the lane is flagged as under-loaded.
pub const MIN_PF_FRACTION: f64 = 0.60;
/// Above this undetermined-minus-PhiX percentage the lane is flagged for index problems.
pub const MAX_UNEXPLAINED_UNDETERMINED_PCT: f64 = 15.0;

const LOW_YIELD_MESSAGE: &str = "\nUnfortunately, your lane(s) received less reads than expected. This is likely related to an issue with metadata, quantification and/or pooling. We would be happy to discuss this further if desired.\n";
const UNDETERMINED_MESSAGE: &str = "\nThere is a large number of 'undetermined reads' in your lane(s), those whose index cannot be appropriately identified as any of the ones expected for the libraries. This is likely related to an issue with metadata, pooling, and/or library prep. We would be happy to discuss this further if desired. \n";

/// The error that may occur when reading or evaluating a lane summary.
#[derive(Error, Debug)]
pub enum QcError {
    #[error("Io error occurred")]
    FgError(#[from] fgoxide::FgError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("The summary report has {lines} lines, expected a header on line 4 and values on line 5")]
    TooShort { lines: usize },

    #[error("The summary report has {headers} columns in the header but {values} values")]
    ColumnMismatch { headers: usize, values: usize },

    #[error("Unable to parse the value `{value}` for `{name}` as a number")]
    InvalidValue { name: String, value: String },

    #[error("The summary report is missing the `{name}` column")]
    MissingStat { name: String },

    #[error("Unable to determine the flowcell and lane from the summary file name: {name}")]
    InvalidFilename { name: String },
}

/// The statistics of one lane summary report, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats(BTreeMap<String, f64>);

impl SummaryStats {
    /// Reads the summary report at the given path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, QcError> {
        let io = Io::default();
        let lines = io.read_lines(&path)?;
        Self::from_lines(&lines)
    }

    /// Parses the header (fourth line) and values (fifth line) of a summary report.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self, QcError> {
        if lines.len() < 5 {
            return Err(QcError::TooShort { lines: lines.len() });
        }
        let header = parse_tab_line(lines[3].as_ref())?;
        let values = parse_tab_line(lines[4].as_ref())?;
        if header.len() != values.len() {
            return Err(QcError::ColumnMismatch { headers: header.len(), values: values.len() });
        }

        let mut stats = BTreeMap::new();
        for (name, value) in header.iter().zip(values.iter()) {
            let number = value.replace(',', "").parse::<f64>().map_err(|_| {
                QcError::InvalidValue { name: name.to_string(), value: value.to_string() }
            })?;
            stats.insert(name.to_string(), number);
        }
        Ok(Self(stats))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Returns the named statistic, or an error if the report lacks it.
    pub fn require(&self, name: &str) -> Result<f64, QcError> {
        self.get(name).ok_or_else(|| QcError::MissingStat { name: name.to_string() })
    }
}

fn parse_tab_line(line: &str) -> Result<StringRecord, QcError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());
    Ok(reader.records().next().transpose()?.unwrap_or_default())
}

/// The outcome of the lane QC gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCheck {
    pub success: bool,
    /// Empty when the lane passes.
    pub message: String,
}

/// Fails the lane when too many reads were undetermined.
pub fn check_pool_errors(stats: &SummaryStats) -> PoolCheck {
    match stats.get(UNDETERMINED_PCT) {
        Some(pct) if pct > MAX_UNDETERMINED_PCT => PoolCheck {
            success: false,
            message: format!("undetermined % > 50 error: undetermined % = {}", pct),
        },
        _ => PoolCheck { success: true, message: String::new() },
    }
}

/// Builds the advisory paragraphs included in the delivery email for a passing lane.
///
/// A missing `% PhiX Aligned` is treated as zero and a lane with no reads is low yield.
pub fn qc_messages(stats: &SummaryStats) -> Result<String, QcError> {
    let mut message = String::new();
    let phix = stats.get(PHIX_ALIGNED_PCT);
    let pf_reads = stats.require(TOTAL_PF_READS)?;
    let total_reads = stats.require(TOTAL_READS)?;
    let low_pf = total_reads <= 0.0 || pf_reads / total_reads < MIN_PF_FRACTION;
    if phix.map_or(false, |p| p > MAX_PHIX_PCT) || low_pf {
        message.push_str(LOW_YIELD_MESSAGE);
    }
    if let Some(undetermined) = stats.get(UNDETERMINED_PCT) {
        if undetermined - phix.unwrap_or(0.0) > MAX_UNEXPLAINED_UNDETERMINED_PCT {
            message.push_str(UNDETERMINED_MESSAGE);
        }
    }
    Ok(message)
}

/// Splits a summary filename of the form `<flowcell>_<lane>_...` into flowcell and lane.
///
/// The lane is kept as text since merged lanes are reported as `merged`.  Any other lane must be
/// a positive lane number.
pub fn flowcell_and_lane<P: AsRef<Path>>(path: P) -> Result<(String, String), QcError> {
    let name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut parts = name.split('_');
    match (parts.next(), parts.next()) {
        (Some(flowcell), Some(lane)) if !flowcell.is_empty() && lane_number(lane).is_some() => {
            Ok((flowcell.to_string(), lane.to_string()))
        }
        _ => Err(QcError::InvalidFilename { name }),
    }
}

/// The lane whose LIMS record describes the given summary lane: merged lanes are recorded
/// against lane 1.
pub fn lims_lane(lane: &str) -> Result<usize, QcError> {
    lane_number(lane).ok_or_else(|| QcError::InvalidFilename { name: lane.to_string() })
}

fn lane_number(lane: &str) -> Option<usize> {
    if lane == MERGED_LANE {
        return Some(1);
    }
    lane.parse::<usize>().ok().filter(|&n| n > 0)
}

/// The flowcell identifier used in delivery paths: the part after the first `-`, if any.
pub fn delivery_fcid(flowcell: &str) -> &str {
    flowcell.split('-').nth(1).unwrap_or(flowcell)
}

/// The directory a lane is delivered into: `<root><group>/<date>_<fcid>/<lane>`.
///
/// Only the date part of a `YYYY-MM-DDTHH:MM:SS` scheduled date is used.
pub fn delivery_dir(
    delivery_root: &str,
    group: &str,
    scheduled_date: &str,
    flowcell: &str,
    lane: &str,
) -> PathBuf {
    let date = scheduled_date.split('T').next().unwrap_or(scheduled_date);
    PathBuf::from(format!(
        "{}{}/{}_{}/{}",
        delivery_root,
        group,
        date,
        delivery_fcid(flowcell),
        lane
    ))
}

/// The directory a raw run directory is delivered into: `<root><group>/<run directory name>`.
pub fn raw_run_delivery_dir<P: AsRef<Path>>(raw_root: &str, group: &str, run_dir: P) -> PathBuf {
    let name = run_dir
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    PathBuf::from(format!("{}{}/{}", raw_root, group, name))
}

/// The delivery notification sent to the pool owner for a passing lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEmail {
    pub flowcell: String,
    pub delivery_dir: PathBuf,
    /// The delivered raw run directory, when the run asked for it.
    pub raw_run_dir: Option<PathBuf>,
    pub report_url: String,
    pub message: String,
}

impl DeliveryEmail {
    pub fn subject(&self) -> String {
        format!("Data For {}", self.flowcell)
    }

    pub fn render(&self) -> String {
        let raw_run_dir = self
            .raw_run_dir
            .as_ref()
            .map(|p| format!("\nRaw Run Directory:\n{}\n", p.to_string_lossy()))
            .unwrap_or_default();
        format!(
            "
Dear GenCore Users,

Results for your recently completed sequencing run on flowcell {} are available here:
{}
{}
All sequencing run and library statistics can be viewed in the interactive MultiQC report here:
{}
{}
Please let us know if you have any questions.

Best,
GenCore Team

---
Note: You must have the required permissions to access data on the HPC.
If this is your first time sequencing, please visit: https://gencore.bio.nyu.edu/bioinformatics/getting-started/
    ",
            self.flowcell,
            self.delivery_dir.to_string_lossy(),
            raw_run_dir,
            self.report_url,
            self.message
        )
    }
}

/// One row of `lane_stats.tsv`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaneStats {
    pub flowcell: String,
    pub lane: String,
    pub total_num_reads: f64,
    pub total_num_pf_reads: f64,
    pub passed: bool,
    pub message: String,
}

impl LaneStats {
    pub fn new(flowcell: &str, lane: &str, stats: &SummaryStats, check: &PoolCheck) -> Self {
        Self {
            flowcell: flowcell.to_string(),
            lane: lane.to_string(),
            total_num_reads: stats.get(TOTAL_READS).unwrap_or(0.0),
            total_num_pf_reads: stats.get(TOTAL_PF_READS).unwrap_or(0.0),
            passed: check.success,
            message: check.message.clone(),
        }
    }

    /// Writes the row, with a header, to a TSV file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), QcError> {
        let delim = DelimFile::default();
        delim.write_tsv(&path, std::iter::once(self))?;
        Ok(())
    }
}
