//! Assembles and writes the Pheniqs configuration for a lane.
#![forbid(unsafe_code)]

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ArgEnum;
use log::info;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use strum::{Display, EnumIter};

use crate::{
    barcode::ResolvedLibrary,
    channel::{build_channels, Channel},
    layout::ReadLayout,
    run_info::ReadSegment,
    utils::{base_input_dir, base_output_dir, input_fastq},
};

/// The sequencing platform recorded in every read group.
pub const PLATFORM: &str = "ILLUMINA";

/// The Pheniqs barcode decoder.
#[derive(ArgEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decoder {
    /// Minimum distance decoding.
    Mdd,
    /// Phred-adjusted maximum likelihood decoding.
    Pamld,
    /// No decoding; every read goes to the single channel.
    Transparent,
}

/// Run-level settings that do not come from the read layout or the LIMS.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub flowcell: String,
    pub lane: usize,
    /// Root directory under which `lane/` inputs and `sample/` outputs live.
    pub data_root: PathBuf,
    pub sequencing_center: String,
    pub predicted_insert_size: String,
    /// The instrument identifier, usually parsed from the run directory name.
    pub instrument: String,
    pub decoder: Decoder,
    pub include_filtered: bool,
    pub threads: usize,
    /// The value written to the `DT` field.
    pub timestamp: String,
}

/// The Pheniqs configuration document.
///
/// Field order matches the order Pheniqs configurations have always been written in.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DemuxConfig {
    #[serde(rename = "CN")]
    pub sequencing_center: String,
    #[serde(rename = "DT")]
    pub date: String,
    #[serde(rename = "PI")]
    pub predicted_insert_size: String,
    #[serde(rename = "PL")]
    pub platform: String,
    #[serde(rename = "PM")]
    pub platform_model: String,
    #[serde(rename = "base input path")]
    pub base_input_path: PathBuf,
    pub decoder: Decoder,
    #[serde(rename = "include filtered")]
    pub include_filtered: bool,
    pub threads: usize,
    pub channel: Vec<Channel>,
    pub input: Vec<PathBuf>,
    pub token: Vec<String>,
    #[serde(rename = "multiplex barcode")]
    pub multiplex_barcode: Vec<String>,
    pub template: Vec<String>,
    #[serde(rename = "base output path")]
    pub base_output_path: PathBuf,
}

impl DemuxConfig {
    /// Merges the run settings, read layout and resolved libraries into a configuration.
    ///
    /// Performs no I/O; see [`DemuxConfig::write`].
    pub fn assemble(
        settings: &RunSettings,
        segments: &[ReadSegment],
        layout: &ReadLayout,
        libraries: &[ResolvedLibrary],
    ) -> Self {
        let num_template_reads = segments.iter().filter(|s| !s.is_indexed).count();
        let input = segments
            .iter()
            .map(|s| input_fastq(&settings.data_root, &settings.flowcell, settings.lane, s.ordinal))
            .collect();

        Self {
            sequencing_center: settings.sequencing_center.clone(),
            date: settings.timestamp.clone(),
            predicted_insert_size: settings.predicted_insert_size.clone(),
            platform: PLATFORM.to_string(),
            platform_model: settings.instrument.clone(),
            base_input_path: base_input_dir(&settings.data_root, &settings.flowcell),
            decoder: settings.decoder,
            include_filtered: settings.include_filtered,
            threads: settings.threads,
            channel: build_channels(
                &settings.flowcell,
                settings.lane,
                num_template_reads,
                libraries,
            ),
            input,
            token: layout.token_strings(),
            multiplex_barcode: layout.multiplex_barcode.iter().map(ToString::to_string).collect(),
            template: layout.template.iter().map(ToString::to_string).collect(),
            base_output_path: base_output_dir(
                &settings.data_root,
                &settings.flowcell,
                settings.lane,
            ),
        }
    }

    /// Serializes the configuration as JSON indented by four spaces.
    pub fn to_json(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Creates the base output directory if needed and writes the configuration to `path`,
    /// overwriting any existing file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::create_dir_all(&self.base_output_path).with_context(|| {
            format!(
                "Unable to create output directory: {}",
                self.base_output_path.to_string_lossy()
            )
        })?;

        let json = self.to_json()?;
        let mut writer = BufWriter::new(
            File::create(path)
                .with_context(|| format!("Unable to create file: {}", path.to_string_lossy()))?,
        );
        writer
            .write_all(json.as_bytes())
            .and_then(|_| writer.flush())
            .with_context(|| format!("Unable to write file: {}", path.to_string_lossy()))?;
        info!("Wrote {} channels to {}", self.channel.len(), path.to_string_lossy());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        channel::UNDETERMINED_NAME,
        utils::test_commons::{assignment, dual_index_segments, resolved},
    };

    fn settings(data_root: &Path) -> RunSettings {
        RunSettings {
            flowcell: String::from("HABCDEFXX"),
            lane: 1,
            data_root: data_root.to_path_buf(),
            sequencing_center: String::from("CGSB"),
            predicted_insert_size: String::from("300"),
            instrument: String::from("A01234"),
            decoder: Decoder::Mdd,
            include_filtered: false,
            threads: 4,
            timestamp: String::from("2023-01-01 09:00:00.000000"),
        }
    }

    fn dual_index_config(data_root: &Path) -> DemuxConfig {
        let segments = dual_index_segments();
        let libraries = vec![
            resolved(1, "lib_a", vec![assignment("ACGTACGT", 2, 0), assignment("TTGGCCAA", 3, 0)]),
            resolved(2, "lib_b", vec![assignment("CCCCAAAA", 2, 0), assignment("GGGGTTTT", 3, 0)]),
        ];
        let layout = ReadLayout::build(&segments, &libraries[0].barcodes).unwrap();
        DemuxConfig::assemble(&settings(data_root), &segments, &layout, &libraries)
    }

    #[test]
    fn test_decoder_names() {
        let names: Vec<String> = Decoder::iter().map(|d| d.to_string()).collect();
        assert_eq!(names, vec!["mdd", "pamld", "transparent"]);
        for decoder in Decoder::iter() {
            assert_eq!(serde_json::to_string(&decoder).unwrap(), format!("\"{}\"", decoder));
        }
    }

    #[test]
    fn test_assemble() {
        let config = dual_index_config(Path::new("/data"));
        assert_eq!(config.platform, "ILLUMINA");
        assert_eq!(config.platform_model, "A01234");
        assert_eq!(config.base_input_path, PathBuf::from("/data/lane/HABCDEFXX"));
        assert_eq!(config.base_output_path, PathBuf::from("/data/sample/HABCDEFXX/1"));
        assert_eq!(config.input.len(), 4);
        assert_eq!(
            config.input[2],
            PathBuf::from("/data/lane/HABCDEFXX/1/HABCDEFXX_l01.3.fastq.gz")
        );
        assert_eq!(config.token, vec!["0::", "1:0:8", "2:0:8", "3::"]);
        assert_eq!(config.template, vec!["0", "3"]);
        assert_eq!(config.multiplex_barcode, vec!["1", "2"]);
        assert_eq!(config.channel.len(), 3);
        assert_eq!(config.channel[0].description, UNDETERMINED_NAME);
        assert!(config.channel.iter().all(|c| c.output.len() == 2));
    }

    #[test]
    fn test_json_field_order_and_indent() {
        let json = dual_index_config(Path::new("/data")).to_json().unwrap();
        let keys = [
            "\"CN\"",
            "\"DT\"",
            "\"PI\"",
            "\"PL\"",
            "\"PM\"",
            "\"base input path\"",
            "\"decoder\"",
            "\"include filtered\"",
            "\"threads\"",
            "\"channel\"",
            "\"input\"",
            "\"token\"",
            "\"multiplex barcode\"",
            "\"template\"",
            "\"base output path\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.starts_with("{\n    \"CN\": \"CGSB\""));
        assert!(json.contains("\"decoder\": \"mdd\""));
        assert!(json.contains("\"include filtered\": false"));
    }

    #[test]
    fn test_write_creates_output_dir_and_is_repeatable() {
        let dir = tempdir().unwrap();
        let config = dual_index_config(dir.path());
        let path = dir.path().join("demux.json");

        config.write(&path).unwrap();
        assert!(config.base_output_path.is_dir());
        let first = std::fs::read_to_string(&path).unwrap();

        config.write(&path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);

        let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed["threads"], 4);
        assert_eq!(parsed["channel"][1]["RG"], "HABCDEFXX:1:ACGTACGT:TTGGCCAA");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let config = dual_index_config(dir.path());
        let result = config.write(dir.path().join("missing").join("demux.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_single_end_non_indexed() {
        let segments = vec![ReadSegment::new(1, false)];
        let libraries = vec![resolved(1, "lib_a", vec![])];
        let layout = ReadLayout::build(&segments, &[]).unwrap();
        let config =
            DemuxConfig::assemble(&settings(Path::new("/data")), &segments, &layout, &libraries);
        assert_eq!(config.token, vec!["0::"]);
        assert_eq!(config.template, vec!["0"]);
        assert!(config.multiplex_barcode.is_empty());
        assert_eq!(config.channel[1].read_group, "HABCDEFXX:1:");
    }
}
