//! Output channels: one per library plus the catch-all channel for undetermined reads.
#![forbid(unsafe_code)]

use serde::Serialize;

use crate::{barcode::ResolvedLibrary, utils::output_filename};

/// The name used in filenames and read-group identifiers of the undetermined channel.
pub const UNDETERMINED_NAME: &str = "undetermined";

/// A Pheniqs output channel.
///
/// The two-letter fields are SAM read-group tags: `DS` description, `LB` library, `PU` platform
/// unit, `RG` read-group identifier and `SM` sample.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Channel {
    #[serde(rename = "DS")]
    pub description: String,
    #[serde(rename = "LB")]
    pub library: String,
    #[serde(rename = "PU")]
    pub platform_unit: String,
    #[serde(rename = "RG")]
    pub read_group: String,
    #[serde(rename = "SM")]
    pub sample: String,
    /// Expected barcode sequences, one per barcode read in read order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration: Option<u32>,
    /// Output FASTQ names, one per template read.
    pub output: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undetermined: Option<bool>,
}

impl Channel {
    /// The channel that receives reads matching no library.
    pub fn undetermined(flowcell: &str, lane: usize, num_template_reads: usize) -> Self {
        let read_group = read_group_id(flowcell, lane, UNDETERMINED_NAME);
        Self {
            description: UNDETERMINED_NAME.to_string(),
            library: format!("{}_library", UNDETERMINED_NAME),
            platform_unit: read_group.clone(),
            read_group,
            sample: format!("{}_sample", UNDETERMINED_NAME),
            barcode: None,
            concentration: None,
            output: outputs(flowcell, lane, UNDETERMINED_NAME, num_template_reads),
            undetermined: Some(true),
        }
    }

    /// The channel for a single library.
    pub fn for_library(
        flowcell: &str,
        lane: usize,
        num_template_reads: usize,
        library: &ResolvedLibrary,
    ) -> Self {
        let sequences = library.sequences();
        let read_group = read_group_id(flowcell, lane, &sequences.join(":"));
        Self {
            description: library.name.clone(),
            library: library.name.clone(),
            platform_unit: read_group.clone(),
            read_group,
            sample: library.name.clone(),
            barcode: Some(sequences),
            concentration: Some(1),
            output: outputs(flowcell, lane, &library.name, num_template_reads),
            undetermined: None,
        }
    }

    pub fn is_undetermined(&self) -> bool {
        self.undetermined.unwrap_or(false)
    }
}

/// Builds every channel for the lane: undetermined first, then libraries in the given order.
///
/// Libraries sharing barcodes still get their own channel with their own names and outputs, but
/// the read-group identifier is derived from the barcodes so their `RG` and `PU` are identical.
pub fn build_channels(
    flowcell: &str,
    lane: usize,
    num_template_reads: usize,
    libraries: &[ResolvedLibrary],
) -> Vec<Channel> {
    std::iter::once(Channel::undetermined(flowcell, lane, num_template_reads))
        .chain(
            libraries
                .iter()
                .map(|library| Channel::for_library(flowcell, lane, num_template_reads, library)),
        )
        .collect()
}

fn read_group_id(flowcell: &str, lane: usize, suffix: &str) -> String {
    format!("{}:{}:{}", flowcell, lane, suffix)
}

fn outputs(flowcell: &str, lane: usize, name: &str, num_template_reads: usize) -> Vec<String> {
    (1..=num_template_reads).map(|n| output_filename(flowcell, lane, n, name)).collect()
}
