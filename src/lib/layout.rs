//! Builds the Pheniqs read layout: the `token` list and the `template` and `multiplex barcode`
//! index lists.
//!
//! Tokens are emitted in a single pass over the reads in read-number order.  Each read that is
//! not an index read contributes a whole-read token (`<read>::`) and each barcode in a read
//! contributes a sub-range token (`<read>:<start>:<end>`).  Every token takes the next value of a
//! running index, and that index is recorded under `template` or `multiplex barcode` depending on
//! the kind of token.  Within a read the template token comes before any barcode tokens.
#![forbid(unsafe_code)]

use std::fmt::{self, Display};

use log::debug;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::{barcode::BarcodeAssignment, run_info::ReadSegment};

/// The error raised when a barcode does not fit in the read that holds it.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Barcode `{sequence}` spans bases {start}..{end} of read {read}, but the read has only {cycles} cycles")]
    BarcodeOutOfRange { sequence: String, read: usize, start: usize, end: usize, cycles: usize },
}

/// A position expression in the Pheniqs token grammar.
///
/// The segment index is 0-based (read number minus one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// All bases of the read: `<segment>::`.
    Whole { segment: usize },
    /// Bases `start..end` of the read: `<segment>:<start>:<end>`.
    Range { segment: usize, start: usize, end: usize },
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole { segment } => write!(f, "{}::", segment),
            Self::Range { segment, start, end } => write!(f, "{}:{}:{}", segment, start, end),
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The tokens and the indices into them that Pheniqs treats as template and barcode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadLayout {
    pub tokens: Vec<Token>,
    pub template: Vec<usize>,
    pub multiplex_barcode: Vec<usize>,
}

impl ReadLayout {
    /// Builds the layout from the reads and one library's barcodes.
    ///
    /// Barcode positions are assumed to be the same for every library in a lane so any one
    /// library's assignments describe the layout.  Reads must be sorted by read number.
    pub fn build(
        segments: &[ReadSegment],
        barcodes: &[BarcodeAssignment],
    ) -> Result<Self, ValidationError> {
        let mut layout = Self::default();
        let mut index = 0;
        for segment in segments {
            if !segment.is_indexed {
                layout.tokens.push(Token::Whole { segment: segment.index() });
                layout.template.push(index);
                index += 1;
            }

            for barcode in barcodes.iter().filter(|b| b.location_ordinal == segment.ordinal) {
                check_bounds(segment, barcode)?;
                layout.tokens.push(Token::Range {
                    segment: segment.index(),
                    start: barcode.position,
                    end: barcode.end(),
                });
                layout.multiplex_barcode.push(index);
                index += 1;
            }
        }
        debug!(
            "Built read layout with {} tokens: {}",
            layout.tokens.len(),
            layout.token_strings().join(" ")
        );
        Ok(layout)
    }

    /// The tokens rendered in the Pheniqs grammar.
    pub fn token_strings(&self) -> Vec<String> {
        self.tokens.iter().map(ToString::to_string).collect()
    }
}

/// Checks the barcode lies inside the read, when the read length is known.
fn check_bounds(segment: &ReadSegment, barcode: &BarcodeAssignment) -> Result<(), ValidationError> {
    match segment.num_cycles {
        Some(cycles) if barcode.end() > cycles => Err(ValidationError::BarcodeOutOfRange {
            sequence: barcode.sequence.clone(),
            read: segment.ordinal,
            start: barcode.position,
            end: barcode.end(),
            cycles,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use matches::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::utils::test_commons::{assignment, dual_index_segments};

    #[rstest]
    #[case(Token::Whole { segment: 0 }, "0::")]
    #[case(Token::Whole { segment: 3 }, "3::")]
    #[case(Token::Range { segment: 1, start: 0, end: 8 }, "1:0:8")]
    #[case(Token::Range { segment: 0, start: 12, end: 20 }, "0:12:20")]
    fn test_token_display(#[case] token: Token, #[case] expected: &str) {
        assert_eq!(token.to_string(), expected);
        assert_eq!(serde_json::to_string(&token).unwrap(), format!("\"{}\"", expected));
    }

    #[test]
    fn test_single_index_three_read_layout() {
        let segments = vec![
            ReadSegment::new(1, false),
            ReadSegment::new(2, true),
            ReadSegment::new(3, true),
        ];
        let barcodes = vec![assignment("ACGTACGT", 2, 0)];
        let layout = ReadLayout::build(&segments, &barcodes).unwrap();
        assert_eq!(layout.token_strings(), vec!["0::", "1:0:8"]);
        assert_eq!(layout.template, vec![0]);
        assert_eq!(layout.multiplex_barcode, vec![1]);
    }

    #[test]
    fn test_dual_index_paired_end_layout() {
        let barcodes = vec![assignment("ACGTACGT", 2, 0), assignment("TTTTCCCC", 3, 0)];
        let layout = ReadLayout::build(&dual_index_segments(), &barcodes).unwrap();
        assert_eq!(layout.token_strings(), vec!["0::", "1:0:8", "2:0:8", "3::"]);
        assert_eq!(layout.template, vec![0, 3]);
        assert_eq!(layout.multiplex_barcode, vec![1, 2]);
    }

    #[test]
    fn test_inline_barcode_follows_template_token() {
        let segments = vec![ReadSegment::with_cycles(1, false, 151), ReadSegment::new(2, false)];
        let barcodes = vec![assignment("ACGTAC", 1, 4)];
        let layout = ReadLayout::build(&segments, &barcodes).unwrap();
        assert_eq!(layout.token_strings(), vec!["0::", "0:4:10", "1::"]);
        assert_eq!(layout.template, vec![0, 2]);
        assert_eq!(layout.multiplex_barcode, vec![1]);
    }

    #[test]
    fn test_no_barcodes() {
        let layout = ReadLayout::build(&dual_index_segments(), &[]).unwrap();
        assert_eq!(layout.token_strings(), vec!["0::", "3::"]);
        assert_eq!(layout.template, vec![0, 1]);
        assert!(layout.multiplex_barcode.is_empty());
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![(2, 0, 8)])]
    #[case(vec![(2, 0, 8), (3, 0, 8)])]
    #[case(vec![(1, 0, 6), (2, 0, 8), (3, 2, 6), (4, 10, 8)])]
    fn test_indices_partition_the_tokens(#[case] positions: Vec<(usize, usize, usize)>) {
        let barcodes: Vec<BarcodeAssignment> = positions
            .iter()
            .map(|(read, pos, len)| assignment(&"A".repeat(*len), *read, *pos))
            .collect();
        let segments = dual_index_segments();
        let layout = ReadLayout::build(&segments, &barcodes).unwrap();

        let num_template_reads = segments.iter().filter(|s| !s.is_indexed).count();
        assert_eq!(layout.tokens.len(), num_template_reads + barcodes.len());
        assert_eq!(layout.multiplex_barcode.len(), barcodes.len());

        let all: Vec<usize> =
            layout.template.iter().chain(&layout.multiplex_barcode).copied().sorted().collect();
        assert_eq!(all, (0..layout.tokens.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_barcode_past_end_of_read() {
        let barcodes = vec![assignment("ACGTACGTAC", 2, 0)];
        let result = ReadLayout::build(&dual_index_segments(), &barcodes);
        assert_matches!(
            result,
            Err(ValidationError::BarcodeOutOfRange { read: 2, start: 0, end: 10, cycles: 8, .. })
        );
    }

    #[test]
    fn test_barcode_unchecked_without_cycles() {
        let segments = vec![ReadSegment::new(1, false), ReadSegment::new(2, true)];
        let barcodes = vec![assignment("ACGTACGTAC", 2, 5)];
        let layout = ReadLayout::build(&segments, &barcodes).unwrap();
        assert_eq!(layout.token_strings(), vec!["0::", "1:5:15"]);
    }
}
