//! Utility functions.
use std::path::{Path, PathBuf};

/// The extension of every FASTQ read or written by Pheniqs.
pub static FASTQ_SUFFIX: &str = ".fastq.gz";

pub mod built_info {
    use lazy_static::lazy_static;
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    /// Get a software version string including
    ///   - Git commit hash
    ///   - Git dirty info (whether the repo had uncommitted changes)
    ///   - Cargo package version if no git info found
    fn get_software_version() -> String {
        let prefix = if let Some(s) = GIT_COMMIT_HASH {
            format!("{}-{}", PKG_VERSION, s[0..8].to_owned())
        } else {
            // This shouldn't happen
            PKG_VERSION.to_string()
        };
        let suffix = match GIT_DIRTY {
            Some(true) => "-dirty",
            _ => "",
        };
        format!("{}{}", prefix, suffix)
    }

    lazy_static! {
        /// Version of the software with git hash
        pub static ref VERSION: String = get_software_version();
    }
}

/// The directory holding the per-read input FASTQs for all lanes of a flowcell.
pub fn base_input_dir<P: AsRef<Path>>(data_root: P, flowcell: &str) -> PathBuf {
    data_root.as_ref().join("lane").join(flowcell)
}

/// The directory Pheniqs writes the per-library FASTQs for a lane into.
pub fn base_output_dir<P: AsRef<Path>>(data_root: P, flowcell: &str, lane: usize) -> PathBuf {
    data_root.as_ref().join("sample").join(flowcell).join(lane.to_string())
}

/// The input FASTQ holding read `read_number` of a lane.
pub fn input_fastq<P: AsRef<Path>>(
    data_root: P,
    flowcell: &str,
    lane: usize,
    read_number: usize,
) -> PathBuf {
    base_input_dir(data_root, flowcell)
        .join(lane.to_string())
        .join(format!("{}_l0{}.{}{}", flowcell, lane, read_number, FASTQ_SUFFIX))
}

/// The output FASTQ name for the `n`th (1-based) template read of a channel.
pub fn output_filename(flowcell: &str, lane: usize, n: usize, name: &str) -> String {
    format!("{}_l0{}_n0{}_{}{}", flowcell, lane, n, name, FASTQ_SUFFIX)
}

/// Extracts the instrument identifier from a run directory named like
/// `<date>_<instrument>_<run-number>_<flowcell>`.
pub fn instrument_from_run_dir<P: AsRef<Path>>(run_dir: P) -> Option<String> {
    run_dir
        .as_ref()
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('_').nth(1))
        .map(ToString::to_string)
}


#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_input_fastq() {
        assert_eq!(
            input_fastq("/data", "HABCDEFXX", 1, 3),
            PathBuf::from("/data/lane/HABCDEFXX/1/HABCDEFXX_l01.3.fastq.gz")
        );
    }

    #[test]
    fn test_base_dirs() {
        assert_eq!(base_input_dir("/data", "HABCDEFXX"), PathBuf::from("/data/lane/HABCDEFXX"));
        assert_eq!(
            base_output_dir("/data", "HABCDEFXX", 4),
            PathBuf::from("/data/sample/HABCDEFXX/4")
        );
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            output_filename("HABCDEFXX", 2, 1, "lib_a"),
            "HABCDEFXX_l02_n01_lib_a.fastq.gz"
        );
    }

    #[rstest]
    #[case("/runs/230101_A01234_0042_AHXXXXXXX", Some("A01234"))]
    #[case("/runs/230101_A01234_0042_AHXXXXXXX/", Some("A01234"))]
    #[case("230101_NB501234_0001_AHXXXXXXX", Some("NB501234"))]
    #[case("/runs/norundir", None)]
    fn test_instrument_from_run_dir(#[case] run_dir: &str, #[case] expected: Option<&str>) {
        assert_eq!(instrument_from_run_dir(run_dir).as_deref(), expected);
    }
}
