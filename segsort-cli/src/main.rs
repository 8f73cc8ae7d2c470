mod args;
mod config;
mod input;
mod preview;
mod triage;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use segsort_core::{
    FileRouter, OnnxEngine, OutputLayout, PostprocessConfig, PreprocessConfig, Segmenter,
    TriageSession, ensure_directories,
};
use segsort_utils::{configure_telemetry, init_logging};

use crate::{
    args::TriageArgs,
    config::{apply_cli_overrides, load_settings},
    triage::{LoopExit, run_loop},
};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = TriageArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );
    debug!("Effective settings: {settings:?}");

    let preprocess_config: PreprocessConfig = settings.input.into();
    let postprocess_config = PostprocessConfig::from(&settings.mask);
    let input_size = preprocess_config.input_size;
    let model_path = settings.model_path();

    info!("segsort {}", segsort_core::version());
    info!(
        "Loading segmentation model from {} at resolution {}x{}",
        model_path.display(),
        input_size.width,
        input_size.height
    );
    let engine = OnnxEngine::load(&model_path, input_size, &settings.model)
        .with_context(|| format!("cannot start without a model ({})", model_path.display()))?;

    ensure_directories([&settings.paths.input_dir])?;
    let router = FileRouter::new(OutputLayout::from(&settings.paths));
    let segmenter = Segmenter::new(&engine, preprocess_config, postprocess_config)?;
    let mut session = TriageSession::from_directory(
        segmenter,
        router,
        &settings.paths.input_dir,
        settings.mask.jpeg_quality,
    )?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let (exit, summary) = run_loop(
        &mut session,
        stdin.lock(),
        &mut stdout,
        args.preview_dir.as_deref(),
    )?;

    let remaining = session.total() - summary.accepted - summary.rejected;
    match exit {
        LoopExit::Finished => writeln!(stdout, "All files triaged.")?,
        LoopExit::Quit | LoopExit::EndOfInput => {
            writeln!(stdout, "Stopped with {remaining} file(s) left in the input directory.")?
        }
    }
    writeln!(
        stdout,
        "{} accepted, {} rejected, {} skipped",
        summary.accepted, summary.rejected, summary.skipped
    )?;
    Ok(())
}
