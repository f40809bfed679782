#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use env_logger::Env;

use crate::{config::Decoder, utils::built_info};

pub static TOOL_NAME: &str = "pheniqs-config";

pub static DOC_LINK_AND_SUPPORT_EMAIL: &str = "
For complete documentation see: https://gencore.bio.nyu.edu/bioinformatics/
For support please contact: gencore-group@nyu.edu
";

static SHORT_USAGE: &str = "Builds Pheniqs demultiplexing configurations and lane QC reports.";

static LONG_USAGE: &str = "
Builds Pheniqs demultiplexing configurations and lane QC reports.

The `config` command writes a Pheniqs configuration (demux.json) for a single lane of a flowcell.
The read layout is taken from the instrument's RunInfo.xml and the libraries, barcodes and pool
orientation flags from a JSON export of the LIMS.  Index reads become barcode tokens, all other
reads become template tokens, and one output channel is written per library plus one for
undetermined reads.

The `qc` command evaluates a lane summary report after demultiplexing, writing lane statistics
and either the delivery notification or the QC error message.

Example invocation:

pheniqs-config config \\
  --flowcell HABCDEFXX \\
  --lane 1 \\
  --lab-metadata lims.json \\
  --data-root /data/ \\
  --threads 8

For complete documentation see: https://gencore.bio.nyu.edu/bioinformatics/
For support please contact: gencore-group@nyu.edu
";

#[derive(Parser, Debug, Clone)]
#[clap(name = TOOL_NAME, version = built_info::VERSION.as_str(), about=SHORT_USAGE, long_about=LONG_USAGE, term_width=0)]
pub struct Opts {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write the Pheniqs configuration for one lane.
    Config(ConfigOpts),
    /// Evaluate a lane summary report and render the delivery notification.
    Qc(QcOpts),
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigOpts {
    /// The flowcell identifier.
    #[clap(long, short = 'f', display_order = 1)]
    pub flowcell: String,

    /// The lane number.
    #[clap(long, short = 'l', display_order = 2)]
    pub lane: usize,

    /// Path to the JSON export of the LIMS run, lane, pool, library and barcode records.
    #[clap(long, short = 'm', display_order = 3)]
    pub lab_metadata: PathBuf,

    /// Root directory holding `lane/<flowcell>` inputs and `sample/<flowcell>` outputs.
    #[clap(long, short = 'd', display_order = 4)]
    pub data_root: PathBuf,

    /// Path to the RunInfo.xml.
    ///
    /// [default: RunInfo.xml in the run directory recorded in the LIMS]
    #[clap(long, short = 'r', display_order = 5)]
    pub run_info: Option<PathBuf>,

    /// The path to write the configuration to.
    ///
    /// This tool will overwrite an existing file.
    #[clap(long, short, default_value = "demux.json", display_order = 6)]
    pub output: PathBuf,

    /// Number of threads Pheniqs should use.
    #[clap(long, short = 't', default_value = "1", display_order = 11)]
    pub threads: usize,

    /// The Pheniqs barcode decoder.
    #[clap(long, arg_enum, default_value = "mdd", display_order = 11)]
    pub decoder: Decoder,

    /// Include reads failing the instrument quality filter.
    #[clap(long, display_order = 11)]
    pub include_filtered: bool,

    /// The sequencing center recorded in read groups (CN).
    #[clap(long, default_value = "CGSB", display_order = 21)]
    pub sequencing_center: String,

    /// The predicted median insert size recorded in read groups (PI).
    #[clap(long, default_value = "300", display_order = 21)]
    pub predicted_insert_size: String,

    /// The timestamp recorded in read groups (DT).
    ///
    /// [default: the current local time]
    #[clap(long, display_order = 31, hide = true)]
    pub timestamp: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct QcOpts {
    /// Path to the lane summary report, named `<flowcell>_<lane>_...`.
    #[clap(long, short = 's', display_order = 1)]
    pub summary: PathBuf,

    /// Path to the JSON export of the LIMS records.
    #[clap(long, short = 'm', display_order = 2)]
    pub lab_metadata: PathBuf,

    /// The directory to write `lane_stats.tsv` and the notification into.
    #[clap(long, short, display_order = 3)]
    pub output_dir: PathBuf,

    /// The root of per-group delivery directories.
    #[clap(long, default_value = "/delivery/", display_order = 11)]
    pub delivery_root: String,

    /// The root of per-group raw run directory deliveries.
    #[clap(long, default_value = "/delivery/raw/", display_order = 11)]
    pub raw_run_delivery_root: String,

    /// The root URL of the MultiQC reports.
    #[clap(long, default_value = "http://core-fastqc.bio.nyu.edu", display_order = 11)]
    pub report_url_root: String,
}

/// Implement defaults that match the CLI options to allow for easier testing.
///
/// Note that these defaults exist only within test code.
#[cfg(test)]
impl Default for ConfigOpts {
    fn default() -> Self {
        Self {
            flowcell: String::from("HABCDEFXX"),
            lane: 1,
            lab_metadata: PathBuf::default(),
            data_root: PathBuf::default(),
            run_info: None,
            output: PathBuf::from("demux.json"),
            threads: 1,
            decoder: Decoder::Mdd,
            include_filtered: false,
            sequencing_center: String::from("CGSB"),
            predicted_insert_size: String::from("300"),
            timestamp: None,
        }
    }
}

/// Parse args and set up logging / tracing
pub fn setup() -> Opts {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    Opts::parse()
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use matches::assert_matches;

    use super::*;

    #[test]
    fn test_parse_config_defaults() {
        let opts = Opts::try_parse_from([
            TOOL_NAME,
            "config",
            "--flowcell",
            "HABCDEFXX",
            "--lane",
            "2",
            "--lab-metadata",
            "lims.json",
            "--data-root",
            "/data",
        ])
        .unwrap();
        assert_matches!(opts.command, Command::Config(_));
        if let Command::Config(config) = opts.command {
            assert_eq!(config.flowcell, "HABCDEFXX");
            assert_eq!(config.lane, 2);
            assert_eq!(config.threads, 1);
            assert_eq!(config.decoder, Decoder::Mdd);
            assert_eq!(config.output, PathBuf::from("demux.json"));
            assert_eq!(config.sequencing_center, "CGSB");
            assert_eq!(config.predicted_insert_size, "300");
            assert!(config.run_info.is_none());
            assert!(!config.include_filtered);
        }
    }

    #[test]
    fn test_parse_config_decoder() {
        let opts = Opts::try_parse_from([
            TOOL_NAME, "config", "-f", "HABCDEFXX", "-l", "1", "-m", "lims.json", "-d", "/data",
            "--decoder", "pamld", "-t", "8",
        ])
        .unwrap();
        if let Command::Config(config) = opts.command {
            assert_eq!(config.decoder, Decoder::Pamld);
            assert_eq!(config.threads, 8);
        } else {
            panic!("Expected the config command");
        }
    }

    #[test]
    fn test_parse_invalid_decoder() {
        let result = Opts::try_parse_from([
            TOOL_NAME, "config", "-f", "HABCDEFXX", "-l", "1", "-m", "lims.json", "-d", "/data",
            "--decoder", "fuzzy",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_config_requires_flowcell() {
        let result =
            Opts::try_parse_from([TOOL_NAME, "config", "-l", "1", "-m", "lims.json", "-d", "/d"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_qc() {
        let opts = Opts::try_parse_from([
            TOOL_NAME,
            "qc",
            "--summary",
            "HABCDEFXX_1_summary.txt",
            "--lab-metadata",
            "lims.json",
            "--output-dir",
            "out",
        ])
        .unwrap();
        if let Command::Qc(qc) = opts.command {
            assert_eq!(qc.summary, PathBuf::from("HABCDEFXX_1_summary.txt"));
            assert_eq!(qc.report_url_root, "http://core-fastqc.bio.nyu.edu");
        } else {
            panic!("Expected the qc command");
        }
    }
}
