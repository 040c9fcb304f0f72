/*!
 * Command-line interface for ctxpack
 */

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error};

use ctxpack::config::{Args, ReportKind};
use ctxpack::pipeline::Pipeline;
use ctxpack::report::{ReportFormat, Reporter, ScanReport};

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().filter_or("CTXPACK_LOG", level))
        .format_timestamp_secs()
        .init();
}

fn progress_bar(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new_spinner();
    let template = "{spinner:.green} {prefix:.bold.cyan} {pos} files {elapsed_precise}";
    if let Ok(style) = ProgressStyle::default_spinner().template(template) {
        progress.set_style(style);
    }
    progress.set_prefix("📊 Scanning");
    progress.enable_steady_tick(std::time::Duration::from_millis(100));
    progress
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let scan_config = args.scan_config();
    let context_config = args.context_config();
    debug!("Scan configuration: {:?}", scan_config);

    // Only draw progress when the document does not go to the terminal
    let progress = progress_bar(args.output.is_some() && args.report != ReportKind::None);
    let pipeline =
        Pipeline::new(scan_config, context_config).with_progress(Arc::new(progress.clone()));

    let output = match pipeline.run() {
        Ok(output) => output,
        Err(e) => {
            progress.finish_and_clear();
            error!("{}", e);
            return Err(e.into());
        }
    };
    progress.finish_and_clear();

    let destination = match &args.output {
        Some(path) => {
            fs::write(path, &output.artifact.content)?;
            path.clone()
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(output.artifact.content.as_bytes())?;
            stdout.flush()?;
            "stdout".to_string()
        }
    };

    let format = match args.report {
        ReportKind::Table => Some(ReportFormat::ConsoleTable),
        ReportKind::Json => Some(ReportFormat::Json),
        ReportKind::None => None,
    };
    if let Some(format) = format {
        let report = ScanReport::from_output(&output, destination);
        Reporter::new(format).print_report(&report)?;
    }

    Ok(())
}
