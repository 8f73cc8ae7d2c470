//! Core segmentation and triage primitives.
//!
//! This crate loads a foreground/background segmentation model with `tract-onnx`, turns its
//! output into a crisp display mask, and drives the accept/reject workflow that routes each
//! input file into its outcome directory.

/// Image decoding and in-place re-encoding.
pub mod codec;
/// Error taxonomy shared by the pipeline and the session.
pub mod error;
/// ONNX model loading and execution.
pub mod model;
/// Probability extraction and two-stage mask thresholding.
pub mod postprocess;
/// Image pre-processing (resizing, tensor conversion).
pub mod preprocess;
/// Moves and copies into the outcome directories.
pub mod router;
/// Per-file pipeline orchestration.
pub mod segmenter;
/// The triage state machine.
pub mod session;

pub use error::{Result, TriageError};
pub use model::{InferenceOutput, OnnxEngine, SegmentationEngine, VALUES_PER_PIXEL};
pub use postprocess::{
    DisplayMask, LowResMask, PostprocessConfig, ProbabilityMap, deinterleave, extract_foreground,
    low_res_mask, upscale_and_binarize,
};
pub use preprocess::{InputSize, InputTensor, PreprocessConfig, PreprocessOutput, preprocess_image};
pub use router::{FileRouter, OutputLayout, ensure_directories, list_input_files};
pub use segmenter::{SegmentationView, Segmenter};
pub use session::{
    DecisionReport, OperatorAction, SessionState, SessionSummary, Transition, TriageDecision,
    TriageSession,
};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_the_package_version() {
        assert!(!version().is_empty());
        assert_eq!(version().split('.').count(), 3);
    }
}
