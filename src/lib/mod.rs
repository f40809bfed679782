//! A library for building Pheniqs demultiplexing configurations.
//!
//! # Overview
//!
//! The flow of data is as follows:
//!
//! - [`run_info::RunInfo`] parses the instrument's `RunInfo.xml` into the ordered
//!   [`run_info::ReadSegment`]s of the run.
//! - A [`lab_info::LabInfoSource`] supplies the pool loaded into the lane, with its libraries,
//!   barcodes and orientation flags.
//! - [`barcode::resolve_pool`] turns the LIMS barcodes into [`barcode::BarcodeAssignment`]s,
//!   reverse complementing read 3 barcodes when the pool asks for it.
//! - [`layout::ReadLayout`] derives the `token`, `template` and `multiplex barcode` lists from the
//!   reads and one library's barcodes.
//! - [`channel::build_channels`] creates the undetermined channel and one channel per library.
//! - [`config::DemuxConfig`] merges everything with the run settings and writes the JSON.
//!
//! After demultiplexing, [`qc`] evaluates the lane summary report and renders the delivery
//! notification.
#![deny(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
pub mod barcode;
pub mod channel;
pub mod config;
pub mod lab_info;
pub mod layout;
pub mod opts;
pub mod qc;
pub mod run;
pub mod run_info;
pub mod utils;
