/*!
 * file2http — publish newline-delimited records to an HTTP endpoint.
 *
 * The binary is a thin shell around `file2http_core`: parse the command
 * line, install logging, validate the target, run the pipeline and
 * optionally write a run profile.
 */

pub mod cli;
pub mod logging;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use file2http_core::{Pipeline, Publisher, RunSummary, Transport, VERSION};
use tracing::info;

pub use cli::Cli;

/**
 * Runs one full delivery pass as described by `cli`.
 *
 * Configuration is validated and the input opened before any worker is
 * spawned, so a bad invocation fails without touching the network.
 */
pub fn run(cli: &Cli) -> Result<RunSummary> {
    let target = cli.target()?;
    let pipeline_config = cli.pipeline_config();
    pipeline_config.validate()?;

    let input = open_input(cli.input.as_deref())?;

    info!(
        version = VERSION,
        mode = %target.mode(),
        %target,
        workers = pipeline_config.workers,
        "publishing records"
    );

    let publisher = Publisher::new(target, Transport::new(cli.transport_config()));
    let pipeline = Pipeline::new(publisher, pipeline_config)?;
    let summary = pipeline.run(input)?;

    if let Some(path) = cli.cpuprofile.as_deref() {
        write_profile(path, &summary)
            .with_context(|| format!("failed to write run profile to {}", path.display()))?;
        info!(path = %path.display(), "run profile written");
    }

    Ok(summary)
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open input {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

/// Writes `summary` as pretty-printed JSON.
pub fn write_profile(path: &Path, summary: &RunSummary) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
