use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::Local;
use itertools::Itertools;
use log::{debug, info, warn};
use path_absolutize::Absolutize;

use crate::{
    barcode::resolve_pool,
    config::{DemuxConfig, RunSettings},
    lab_info::{LabExport, LabInfoSource},
    layout::ReadLayout,
    opts::{Command, ConfigOpts, Opts, QcOpts},
    qc::{
        check_pool_errors, delivery_dir, flowcell_and_lane, lims_lane, qc_messages,
        raw_run_delivery_dir,
        DeliveryEmail, LaneStats, SummaryStats,
    },
    run_info::{RunInfo, RUN_INFO_FILENAME},
    utils::instrument_from_run_dir,
};

/// The `DT` timestamp format, microsecond precision in local time.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn run(opts: Opts) -> Result<(), anyhow::Error> {
    match opts.command {
        Command::Config(opts) => {
            let lims = LabExport::from_path(&opts.lab_metadata).with_context(|| {
                format!("Unable to read LIMS export: {}", opts.lab_metadata.to_string_lossy())
            })?;
            build_config(&opts, &lims).map(|_| ())
        }
        Command::Qc(opts) => {
            let lims = LabExport::from_path(&opts.lab_metadata).with_context(|| {
                format!("Unable to read LIMS export: {}", opts.lab_metadata.to_string_lossy())
            })?;
            run_qc(&opts, &lims)
        }
    }
}

/// Builds the Pheniqs configuration for one lane and writes it to `opts.output`.
pub fn build_config<L: LabInfoSource>(opts: &ConfigOpts, lims: &L) -> Result<DemuxConfig> {
    ensure!(opts.threads > 0, "At least one thread must be requested");
    ensure!(opts.lane > 0, "Lane numbers start at 1");

    let run = lims.run(&opts.flowcell)?;
    let pool = lims.lane_pool(&opts.flowcell, opts.lane)?;
    info!(
        "Flowcell {} lane {}: pool {} with {} libraries",
        opts.flowcell,
        opts.lane,
        pool.id,
        pool.libraries.len()
    );

    let run_info_path =
        opts.run_info.clone().unwrap_or_else(|| run.run_dir.join(RUN_INFO_FILENAME));
    let run_info = RunInfo::from_path(&run_info_path).with_context(|| {
        format!("Unable to read run descriptor: {}", run_info_path.to_string_lossy())
    })?;
    if let Some(flowcell) = &run_info.flowcell {
        if !flowcell.contains(&opts.flowcell) && !opts.flowcell.contains(flowcell.as_str()) {
            warn!("RunInfo.xml is for flowcell {}, not {}", flowcell, opts.flowcell);
        }
    }
    info!(
        "Read {} reads ({} index) from {}",
        run_info.segments.len(),
        run_info.num_index_reads(),
        run_info_path.to_string_lossy()
    );

    let libraries = resolve_pool(&pool, &run_info.segments)?;
    if pool.is_revcom() {
        info!("Pool {} requests reverse complemented barcodes in read 3", pool.id);
    }
    for library in &libraries {
        debug!("Library {}: {}", library.name, library.sequences().iter().join("+"));
    }

    // Barcode positions are the same for every library in the lane.
    let layout = ReadLayout::build(&run_info.segments, &libraries[0].barcodes)?;

    let settings = RunSettings {
        flowcell: opts.flowcell.clone(),
        lane: opts.lane,
        data_root: absolute(&opts.data_root)?,
        sequencing_center: opts.sequencing_center.clone(),
        predicted_insert_size: opts.predicted_insert_size.clone(),
        instrument: instrument_from_run_dir(&run.run_dir)
            .or_else(|| run_info.instrument.clone())
            .unwrap_or_default(),
        decoder: opts.decoder,
        include_filtered: opts.include_filtered,
        threads: opts.threads,
        timestamp: opts
            .timestamp
            .clone()
            .unwrap_or_else(|| Local::now().format(TIMESTAMP_FORMAT).to_string()),
    };

    let config = DemuxConfig::assemble(&settings, &run_info.segments, &layout, &libraries);
    config.write(&opts.output)?;
    info!("Pheniqs config file created for lane {}: {}", opts.lane, opts.output.to_string_lossy());
    Ok(config)
}

/// Evaluates the lane summary report and writes the lane statistics plus either the delivery
/// notification (`delivery_email.txt`) or the QC failure (`qc_error.txt`) to the output
/// directory.
pub fn run_qc<L: LabInfoSource>(opts: &QcOpts, lims: &L) -> Result<()> {
    let (flowcell, lane) = flowcell_and_lane(&opts.summary)?;
    let stats = SummaryStats::from_path(&opts.summary).with_context(|| {
        format!("Unable to read summary report: {}", opts.summary.to_string_lossy())
    })?;
    let check = check_pool_errors(&stats);

    std::fs::create_dir_all(&opts.output_dir).with_context(|| {
        format!("Unable to create output directory: {}", opts.output_dir.to_string_lossy())
    })?;
    LaneStats::new(&flowcell, &lane, &stats, &check)
        .write(opts.output_dir.join("lane_stats.tsv"))?;

    if !check.success {
        warn!("Flowcell {} lane {} failed QC: {}", flowcell, lane, check.message);
        let message = format!("{}\n{}/{}", check.message, opts.report_url_root, flowcell);
        write_text(&opts.output_dir.join("qc_error.txt"), &message)?;
        return Ok(());
    }
    info!("Flowcell {} lane {} passed QC", flowcell, lane);

    let run = lims.run(&flowcell)?;
    let pool = lims.lane_pool(&flowcell, lims_lane(&lane)?)?;

    let scheduled_date = run.scheduled_date.clone().unwrap_or_default();
    let email = DeliveryEmail {
        flowcell: flowcell.clone(),
        delivery_dir: delivery_dir(
            &opts.delivery_root,
            &pool.group,
            &scheduled_date,
            &flowcell,
            &lane,
        ),
        raw_run_dir: if run.deliver_run_dir {
            Some(raw_run_delivery_dir(&opts.raw_run_delivery_root, &pool.group, &run.run_dir))
        } else {
            None
        },
        report_url: format!("{}/{}/{}/multiqc_report.html", opts.report_url_root, flowcell, lane),
        message: qc_messages(&stats)?,
    };
    if !email.message.is_empty() {
        warn!("Flowcell {} lane {} has QC advisories", flowcell, lane);
    }
    write_text(&opts.output_dir.join("delivery_email.txt"), &email.render())?;
    info!("{} written to {}", email.subject(), opts.output_dir.to_string_lossy());
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Unable to resolve path: {}", path.to_string_lossy()))?
        .to_path_buf())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text)
        .with_context(|| format!("Unable to write file: {}", path.to_string_lossy()))
}
