//! The interactive decision loop.

use std::{
    io::{BufRead, Write},
    path::Path,
};

use anyhow::Result;
use log::{debug, warn};
use segsort_core::{SegmentationEngine, SessionState, SessionSummary, TriageSession};

use crate::input::{Command, HELP, parse_command};
use crate::preview::{clear_preview, write_preview};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Every file was decided or skipped.
    Finished,
    /// The operator quit.
    Quit,
    /// Input ran out before the session finished.
    EndOfInput,
}

/// Read operator commands from `input` until the session is done, input ends, or the
/// operator quits. Status and errors go to `out`.
pub fn run_loop<E, R, W>(
    session: &mut TriageSession<'_, E>,
    input: R,
    out: &mut W,
    preview_dir: Option<&Path>,
) -> Result<(LoopExit, SessionSummary)>
where
    E: SegmentationEngine + ?Sized,
    R: BufRead,
    W: Write,
{
    show(session, out, preview_dir)?;
    if session.is_terminal() {
        return Ok((LoopExit::Finished, session.summary()));
    }

    for line in input.lines() {
        let line = line?;
        match parse_command(&line) {
            Command::Action(action) => match session.handle(action) {
                Ok(Some(report)) => {
                    writeln!(
                        out,
                        "{} -> {}",
                        report.decision,
                        report.destination.display()
                    )?;
                }
                Ok(None) => writeln!(out, "press v to accept or i to reject (h for help)")?,
                Err(err) => {
                    warn!("{err}");
                    writeln!(out, "error: {err}")?;
                }
            },
            Command::Retry => {
                if let Err(err) = session.retry() {
                    writeln!(out, "error: {err}")?;
                }
            }
            Command::Skip => {
                if let Err(err) = session.skip() {
                    writeln!(out, "error: {err}")?;
                }
            }
            Command::Help => {
                writeln!(out, "{HELP}")?;
                continue;
            }
            Command::Quit => return Ok((LoopExit::Quit, session.summary())),
            Command::Status => {}
            Command::Unknown => {
                writeln!(out, "unknown command `{}`", line.trim())?;
                writeln!(out, "{HELP}")?;
                continue;
            }
        }

        show(session, out, preview_dir)?;
        if session.is_terminal() {
            return Ok((LoopExit::Finished, session.summary()));
        }
    }

    Ok((LoopExit::EndOfInput, session.summary()))
}

fn show<E, W>(session: &TriageSession<'_, E>, out: &mut W, preview_dir: Option<&Path>) -> Result<()>
where
    E: SegmentationEngine + ?Sized,
    W: Write,
{
    writeln!(out, "{}", session.status_line())?;
    if let SessionState::Stalled { .. } = session.state()
        && let Some(err) = session.last_error()
    {
        writeln!(out, "  could not segment: {err}")?;
        writeln!(out, "  r to retry, s to skip")?;
    }

    if let Some(dir) = preview_dir {
        match session.view() {
            Some(view) => {
                match write_preview(view, dir) {
                    Ok(paths) => debug!(
                        "Preview written to {} and {}",
                        paths.mask.display(),
                        paths.thumbnail.display()
                    ),
                    Err(err) => warn!("Failed to write preview: {err:#}"),
                }
            }
            None => clear_preview(dir),
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use segsort_core::{
        FileRouter, InferenceOutput, InputSize, InputTensor, OutputLayout, PostprocessConfig,
        PreprocessConfig, Segmenter,
    };
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct FlatEngine;

    impl SegmentationEngine for FlatEngine {
        fn input_size(&self) -> InputSize {
            InputSize::new(4, 4)
        }

        fn run(&self, _tensor: &InputTensor) -> segsort_core::Result<InferenceOutput> {
            Ok(InferenceOutput::new(vec![0.75; 32]))
        }
    }

    fn session<'e>(engine: &'e FlatEngine, root: &Path) -> TriageSession<'e, FlatEngine> {
        let segmenter = Segmenter::new(
            engine,
            PreprocessConfig {
                input_size: engine.input_size(),
                ..Default::default()
            },
            PostprocessConfig {
                threshold: 0.5,
                display_size: (8, 8),
                thumbnail_size: (4, 4),
            },
        )
        .expect("segmenter");
        TriageSession::from_directory(
            segmenter,
            FileRouter::new(OutputLayout::under(&root.join("output"))),
            &root.join("input"),
            90,
        )
        .expect("session")
    }

    fn seed(root: &Path, names: &[&str]) {
        let input = root.join("input");
        fs::create_dir_all(&input).expect("input");
        for name in names {
            RgbImage::from_pixel(6, 6, Rgb([1, 2, 3]))
                .save(input.join(name))
                .expect("seed");
        }
    }

    #[test]
    fn decides_until_finished() {
        let dir = tempdir().expect("tempdir");
        seed(dir.path(), &["a.png", "b.png"]);
        let engine = FlatEngine;
        let mut session = session(&engine, dir.path());
        let preview = dir.path().join("preview");

        let mut out = Vec::new();
        let (exit, summary) =
            run_loop(&mut session, "v\n\nreject\n".as_bytes(), &mut out, Some(preview.as_path()))
                .expect("loop");

        assert_eq!(exit, LoopExit::Finished);
        assert_eq!((summary.accepted, summary.rejected), (1, 1));
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("1 / 2  a.png"));
        assert!(text.contains("2 / 2  b.png"));
        assert!(text.contains("2 / 2  done"));
        assert!(!preview.join("mask.png").exists());
    }

    #[test]
    fn preview_tracks_current_file() {
        let dir = tempdir().expect("tempdir");
        seed(dir.path(), &["a.png"]);
        let engine = FlatEngine;
        let mut session = session(&engine, dir.path());
        let preview = dir.path().join("preview");

        let mut out = Vec::new();
        let (exit, _) =
            run_loop(&mut session, "".as_bytes(), &mut out, Some(preview.as_path())).expect("loop");

        assert_eq!(exit, LoopExit::EndOfInput);
        let mask = image::open(preview.join("mask.png")).expect("mask").to_luma8();
        assert_eq!(mask.dimensions(), (8, 8));
        assert!(mask.pixels().all(|p| p.0 == [255]));
        assert!(preview.join("thumbnail.png").exists());
    }

    #[test]
    fn quit_leaves_remaining_files() {
        let dir = tempdir().expect("tempdir");
        seed(dir.path(), &["a.png", "b.png"]);
        let engine = FlatEngine;
        let mut session = session(&engine, dir.path());

        let mut out = Vec::new();
        let (exit, summary) =
            run_loop(&mut session, "zz\nq\nv\n".as_bytes(), &mut out, None).expect("loop");

        assert_eq!(exit, LoopExit::Quit);
        assert_eq!(summary, SessionSummary::default());
        assert!(dir.path().join("input/a.png").exists());
        assert!(String::from_utf8(out).expect("utf8").contains("unknown command `zz`"));
    }

    #[test]
    fn empty_session_finishes_immediately() {
        let dir = tempdir().expect("tempdir");
        seed(dir.path(), &[]);
        let engine = FlatEngine;
        let mut session = session(&engine, dir.path());

        let mut out = Vec::new();
        let (exit, _) = run_loop(&mut session, "v\n".as_bytes(), &mut out, None).expect("loop");

        assert_eq!(exit, LoopExit::Finished);
        assert_eq!(
            String::from_utf8(out).expect("utf8").trim(),
            "0 / 0  (no input files)"
        );
    }
}
