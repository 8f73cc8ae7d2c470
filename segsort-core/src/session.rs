//! Forward-only triage workflow.
//!
//! A [`TriageSession`] walks a fixed, ordered list of files. Each file is segmented when it
//! becomes current; the operator then decides once, the file is rewritten with the processed
//! buffer and routed, and the session moves on. The index never goes backwards.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use segsort_utils::timing_guard;

use crate::codec;
use crate::error::{Result, TriageError};
use crate::model::SegmentationEngine;
use crate::router::{FileRouter, list_input_files};
use crate::segmenter::{SegmentationView, Segmenter};

/// Outcome the operator picks for the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriageDecision {
    Accept,
    Reject,
}

impl TriageDecision {
    /// `v` accepts, `i` rejects; case-insensitive.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'v' => Some(TriageDecision::Accept),
            'i' => Some(TriageDecision::Reject),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TriageDecision::Accept => "accept",
            TriageDecision::Reject => "reject",
        }
    }
}

impl fmt::Display for TriageDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Input from any frontend channel. Every channel resolves to the same [`TriageDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    /// A key press.
    Key(char),
    /// The accept control.
    Accept,
    /// The reject control.
    Reject,
}

impl OperatorAction {
    pub fn decision(self) -> Option<TriageDecision> {
        match self {
            OperatorAction::Key(key) => TriageDecision::from_key(key),
            OperatorAction::Accept => Some(TriageDecision::Accept),
            OperatorAction::Reject => Some(TriageDecision::Reject),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The input set was empty at start. Nothing ever happens.
    Empty,
    /// File `index` is segmented and waiting for a decision.
    Displaying { index: usize },
    /// The pipeline failed for file `index`; retry or skip it.
    Stalled { index: usize },
    /// Every file has been decided or skipped.
    Terminal,
}

impl SessionState {
    /// Index of the current file, if there is one.
    pub fn index(self) -> Option<usize> {
        match self {
            SessionState::Displaying { index } | SessionState::Stalled { index } => Some(index),
            SessionState::Empty | SessionState::Terminal => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Empty | SessionState::Terminal)
    }
}

/// Where the session ended up after a decision, retry, or skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Displaying { index: usize },
    Stalled { index: usize },
    Terminal,
}

/// What a completed decision did on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionReport {
    pub decision: TriageDecision,
    /// Path the file had before routing.
    pub source: PathBuf,
    /// Path the processed file was moved to.
    pub destination: PathBuf,
    /// Unmodified copy in the originals directory, for accepted files.
    pub preserved_original: Option<PathBuf>,
    pub next: Transition,
}

/// Tally of what the session has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// Routing steps already completed for the current file.
#[derive(Debug, Default)]
struct RoutingProgress {
    /// Bytes of the file as it was before any decision touched it.
    original: Option<Vec<u8>>,
    preserved: Option<PathBuf>,
    processed_written: bool,
}

/// Drives segmentation and routing over an ordered list of files.
#[derive(Debug)]
pub struct TriageSession<'e, E: SegmentationEngine + ?Sized> {
    segmenter: Segmenter<'e, E>,
    router: FileRouter,
    files: Vec<PathBuf>,
    state: SessionState,
    view: Option<SegmentationView>,
    last_error: Option<TriageError>,
    progress: RoutingProgress,
    summary: SessionSummary,
    jpeg_quality: u8,
}

impl<'e, E: SegmentationEngine + ?Sized> TriageSession<'e, E> {
    /// Start a session over `files` in the given order.
    ///
    /// Creates the outcome directories and segments the first file. A pipeline failure on
    /// that file leaves the session [`SessionState::Stalled`] rather than failing here.
    pub fn start(
        segmenter: Segmenter<'e, E>,
        router: FileRouter,
        files: Vec<PathBuf>,
        jpeg_quality: u8,
    ) -> Result<Self> {
        router.ensure_directories()?;
        info!("Starting triage session with {} file(s)", files.len());

        let mut session = Self {
            segmenter,
            router,
            files,
            state: SessionState::Empty,
            view: None,
            last_error: None,
            progress: RoutingProgress::default(),
            summary: SessionSummary::default(),
            jpeg_quality,
        };
        if !session.files.is_empty() {
            session.load(0);
        } else {
            info!("No input files; nothing to triage");
        }
        Ok(session)
    }

    /// Start a session over the image files found directly inside `input_dir`, sorted by name.
    pub fn from_directory(
        segmenter: Segmenter<'e, E>,
        router: FileRouter,
        input_dir: &Path,
        jpeg_quality: u8,
    ) -> Result<Self> {
        let files = list_input_files(input_dir)?;
        Self::start(segmenter, router, files, jpeg_quality)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn index(&self) -> Option<usize> {
        self.state.index()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.index().map(|index| self.files[index].as_path())
    }

    /// Pipeline output for the current file. `None` unless displaying.
    pub fn view(&self) -> Option<&SegmentationView> {
        self.view.as_ref()
    }

    /// The pipeline error that stalled the current file.
    pub fn last_error(&self) -> Option<&TriageError> {
        self.last_error.as_ref()
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    pub fn router(&self) -> &FileRouter {
        &self.router
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `"{index+1} / {total}  {filename}"` for the current file.
    pub fn status_line(&self) -> String {
        let total = self.total();
        match self.state {
            SessionState::Empty => "0 / 0  (no input files)".to_string(),
            SessionState::Terminal => format!("{total} / {total}  done"),
            SessionState::Displaying { index } | SessionState::Stalled { index } => {
                let name = self.files[index]
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{} / {total}  {name}", index + 1)
            }
        }
    }

    /// Resolve an operator action; unknown keys are ignored.
    pub fn handle(&mut self, action: OperatorAction) -> Result<Option<DecisionReport>> {
        match action.decision() {
            Some(decision) => self.decide(decision).map(Some),
            None => {
                debug!("Ignoring operator action {action:?}");
                Ok(None)
            }
        }
    }

    /// Apply `decision` to the current file and advance.
    ///
    /// Accept copies the untouched file into the originals directory first. The untouched
    /// bytes are held until the file is routed, so they survive a failed earlier attempt. Both outcomes
    /// then overwrite the file with the processed buffer and move it into the outcome
    /// directory. On error the session stays on the same file; steps that already
    /// completed are not repeated by the next call.
    pub fn decide(&mut self, decision: TriageDecision) -> Result<DecisionReport> {
        let index = match self.state {
            SessionState::Displaying { index } => index,
            SessionState::Stalled { index } => {
                return Err(TriageError::NotReady {
                    path: self.files[index].clone(),
                });
            }
            SessionState::Empty | SessionState::Terminal => {
                return Err(TriageError::SessionFinished);
            }
        };
        let _guard = timing_guard("segsort_core::decide", log::Level::Debug);
        let source = self.files[index].clone();
        let view = self.view.as_ref().ok_or_else(|| TriageError::NotReady {
            path: source.clone(),
        })?;

        // Captured before the first rewrite; a later Accept preserves these bytes.
        if self.progress.original.is_none() {
            let bytes = fs::read(&source).map_err(|err| TriageError::Read {
                path: source.clone(),
                source: err,
            })?;
            self.progress.original = Some(bytes);
        }

        let mut preserved_now = false;
        match decision {
            TriageDecision::Accept => {
                if self.progress.preserved.is_none()
                    && let Some(bytes) = self.progress.original.as_deref()
                {
                    self.progress.preserved =
                        Some(self.router.preserve_original_bytes(&source, bytes)?);
                    preserved_now = true;
                }
            }
            TriageDecision::Reject => {
                if let Some(copy) = self.progress.preserved.take() {
                    discard_copy(&copy);
                }
            }
        }

        if !self.progress.processed_written {
            if let Err(err) =
                codec::encode_in_place(&view.processed_image(), &source, self.jpeg_quality)
            {
                if preserved_now && let Some(copy) = self.progress.preserved.take() {
                    discard_copy(&copy);
                }
                return Err(err);
            }
            self.progress.processed_written = true;
            debug!("Rewrote {} with the processed mask", source.display());
        }

        let destination = self.router.route(&source, decision)?;
        let preserved_original = self.progress.preserved.take();
        match decision {
            TriageDecision::Accept => self.summary.accepted += 1,
            TriageDecision::Reject => self.summary.rejected += 1,
        }
        info!(
            "{} {}: moved to {}",
            decision.label(),
            source.display(),
            destination.display()
        );

        let next = self.advance(index + 1);
        Ok(DecisionReport {
            decision,
            source,
            destination,
            preserved_original,
            next,
        })
    }

    /// Rerun the pipeline on a stalled file.
    pub fn retry(&mut self) -> Result<Transition> {
        match self.state {
            SessionState::Stalled { index } => Ok(self.load(index)),
            SessionState::Displaying { index } => Ok(Transition::Displaying { index }),
            SessionState::Empty | SessionState::Terminal => Err(TriageError::SessionFinished),
        }
    }

    /// Leave a stalled file in place and move on to the next one.
    ///
    /// Files that segmented successfully cannot be skipped; they need a decision.
    pub fn skip(&mut self) -> Result<Transition> {
        match self.state {
            SessionState::Stalled { index } => {
                warn!(
                    "Skipping {}; it stays in the input directory",
                    self.files[index].display()
                );
                self.summary.skipped += 1;
                Ok(self.advance(index + 1))
            }
            SessionState::Displaying { index } => Ok(Transition::Displaying { index }),
            SessionState::Empty | SessionState::Terminal => Err(TriageError::SessionFinished),
        }
    }

    fn advance(&mut self, next: usize) -> Transition {
        self.view = None;
        self.last_error = None;
        self.progress = RoutingProgress::default();
        if next >= self.files.len() {
            self.state = SessionState::Terminal;
            info!(
                "Triage finished: {} accepted, {} rejected, {} skipped",
                self.summary.accepted, self.summary.rejected, self.summary.skipped
            );
            return Transition::Terminal;
        }
        self.load(next)
    }

    fn load(&mut self, index: usize) -> Transition {
        match self.segmenter.segment_path(&self.files[index]) {
            Ok(view) => {
                self.view = Some(view);
                self.last_error = None;
                self.state = SessionState::Displaying { index };
                Transition::Displaying { index }
            }
            Err(err) => {
                warn!("Segmentation failed for {}: {err}", self.files[index].display());
                self.view = None;
                self.last_error = Some(err);
                self.state = SessionState::Stalled { index };
                Transition::Stalled { index }
            }
        }
    }
}

fn discard_copy(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed preserved copy {}", path.display()),
        Err(err) => warn!("Could not remove preserved copy {}: {err}", path.display()),
    }
}
