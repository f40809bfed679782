//! Resolves the barcodes recorded for a library into [`BarcodeAssignment`]s: where each barcode
//! sits in the read layout and which sequence to expect once orientation is corrected.
#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use itertools::Itertools;
use thiserror::Error;

use crate::{
    lab_info::{LibraryRecord, PoolRecord},
    run_info::ReadSegment,
};

/// The read number whose barcodes are reverse complemented when a pool carries a `revcom` flag.
///
/// This is a layout assumption: on the instruments served the second index read is always read
/// number 3, so the flag is applied by read number rather than by counting index reads.
pub const CORRECTED_SEGMENT_ORDINAL: usize = 3;

/// The bases a barcode may contain, after upper-casing.
const VALID_BASES: &[u8] = b"ACGTN";

/// The error that may occur when resolving library barcodes against the read layout.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Pool {pool} has no libraries")]
    NoLibraries { pool: u64 },

    #[error("Library {library} has a barcode `{barcode}` in read {location}, but the run has no read {location}")]
    UnknownLocation { library: String, barcode: String, location: usize },

    #[error("Library {library} has a barcode `{barcode}` with position 0, positions are 1-based")]
    InvalidPosition { library: String, barcode: String },

    #[error("Library {library} has an empty barcode in read {location}")]
    EmptyBarcode { library: String, location: usize },

    #[error("Library {library} has a barcode `{barcode}` in read {location} with bases other than ACGTN")]
    InvalidBases { library: String, barcode: String, location: usize },

    #[error("Library {library} has no barcode in read {location}, expected one in reads: {expected}")]
    MissingBarcode { library: String, location: usize, expected: String },

    #[error("Library {library} has a barcode in read {location}, expected barcodes only in reads: {expected}")]
    UnexpectedBarcode { library: String, location: usize, expected: String },
}

/// A barcode resolved against the read layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BarcodeAssignment {
    pub library_id: u64,
    /// Upper-case sequence, reverse complemented when required.
    pub sequence: String,
    /// The read number the barcode is in.
    pub location_ordinal: usize,
    /// The 0-based offset of the barcode within the read.
    pub position: usize,
    pub length: usize,
}

impl BarcodeAssignment {
    /// The exclusive end offset of the barcode within the read.
    pub fn end(&self) -> usize {
        self.position + self.length
    }
}

/// A library with its barcodes resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    pub id: u64,
    pub name: String,
    /// Sorted by read number.
    pub barcodes: Vec<BarcodeAssignment>,
}

impl ResolvedLibrary {
    /// The barcode sequences in read order.
    pub fn sequences(&self) -> Vec<String> {
        self.barcodes.iter().map(|b| b.sequence.clone()).collect()
    }

    fn locations(&self) -> BTreeSet<usize> {
        self.barcodes.iter().map(|b| b.location_ordinal).collect()
    }
}

/// Complement a single base, preserving case.  Non-ACGT symbols are returned unchanged.
fn complement(base: char) -> char {
    match base {
        'A' => 'T',
        'C' => 'G',
        'G' => 'C',
        'T' => 'A',
        'a' => 't',
        'c' => 'g',
        'g' => 'c',
        't' => 'a',
        other => other,
    }
}

/// Returns the reverse complement of a nucleotide sequence.
pub fn reverse_complement(sequence: &str) -> String {
    sequence.chars().rev().map(complement).collect()
}

/// Resolves a single library's barcodes.
///
/// Positions are converted to 0-based, sequences upper-cased, and any barcode in
/// [`CORRECTED_SEGMENT_ORDINAL`] reverse complemented if the pool asks for it.  The returned
/// assignments are sorted by read number.
pub fn resolve_library(
    pool: &PoolRecord,
    library: &LibraryRecord,
    segments: &[ReadSegment],
) -> Result<ResolvedLibrary, ResolutionError> {
    let revcom = pool.is_revcom();
    let mut barcodes = Vec::with_capacity(library.barcodes.len());
    for record in library.barcodes.iter().sorted_by_key(|b| b.barcode_location) {
        let location = record.barcode_location;
        if !segments.iter().any(|s| s.ordinal == location) {
            return Err(ResolutionError::UnknownLocation {
                library: library.name.clone(),
                barcode: record.barcode_sequence.clone(),
                location,
            });
        }
        if record.barcode_sequence.is_empty() {
            return Err(ResolutionError::EmptyBarcode { library: library.name.clone(), location });
        }
        if record.barcode_position == 0 {
            return Err(ResolutionError::InvalidPosition {
                library: library.name.clone(),
                barcode: record.barcode_sequence.clone(),
            });
        }

        let upper = record.barcode_sequence.to_ascii_uppercase();
        if !upper.bytes().all(|b| VALID_BASES.contains(&b)) {
            return Err(ResolutionError::InvalidBases {
                library: library.name.clone(),
                barcode: record.barcode_sequence.clone(),
                location,
            });
        }
        let sequence = if revcom && location == CORRECTED_SEGMENT_ORDINAL {
            reverse_complement(&upper)
        } else {
            upper
        };
        barcodes.push(BarcodeAssignment {
            library_id: library.id,
            length: sequence.len(),
            sequence,
            location_ordinal: location,
            position: record.barcode_position - 1,
        });
    }
    Ok(ResolvedLibrary { id: library.id, name: library.name.clone(), barcodes })
}

/// Resolves every library in the pool, preserving LIMS order.
///
/// The first library is the representative whose barcode locations every other library must
/// match: a library missing a barcode in an expected read, or with a barcode in a read no other
/// library uses, is an error.
pub fn resolve_pool(
    pool: &PoolRecord,
    segments: &[ReadSegment],
) -> Result<Vec<ResolvedLibrary>, ResolutionError> {
    let libraries: Vec<ResolvedLibrary> = pool
        .libraries
        .iter()
        .map(|library| resolve_library(pool, library, segments))
        .collect::<Result<_, _>>()?;

    let representative = libraries.first().ok_or(ResolutionError::NoLibraries { pool: pool.id })?;
    let expected = representative.locations();
    let expected_str = expected.iter().join(",");

    for library in &libraries[1..] {
        let actual = library.locations();
        if let Some(location) = expected.difference(&actual).next() {
            return Err(ResolutionError::MissingBarcode {
                library: library.name.clone(),
                location: *location,
                expected: expected_str,
            });
        }
        if let Some(location) = actual.difference(&expected).next() {
            return Err(ResolutionError::UnexpectedBarcode {
                library: library.name.clone(),
                location: *location,
                expected: expected_str,
            });
        }
    }
    Ok(libraries)
}
