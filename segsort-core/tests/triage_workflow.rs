use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::tempdir;

use segsort_core::{
    FileRouter, InferenceOutput, InputSize, InputTensor, OperatorAction, OutputLayout,
    PostprocessConfig, PreprocessConfig, Result, SegmentationEngine, Segmenter, SessionState,
    Transition, TriageDecision, TriageError, TriageSession,
};

/// Foreground wherever the red channel dominates.
#[derive(Debug)]
struct RedEngine {
    size: InputSize,
}

impl SegmentationEngine for RedEngine {
    fn input_size(&self) -> InputSize {
        self.size
    }

    fn run(&self, tensor: &InputTensor) -> Result<InferenceOutput> {
        let values = tensor
            .as_slice()
            .chunks_exact(3)
            .flat_map(|px| {
                let fg = if px[0] > px[1] && px[0] > px[2] { 0.95 } else { 0.05 };
                [fg, 1.0 - fg]
            })
            .collect();
        Ok(InferenceOutput::new(values))
    }
}

static ENGINE: RedEngine = RedEngine {
    size: InputSize::new(16, 16),
};

fn segmenter() -> Segmenter<'static, RedEngine> {
    Segmenter::new(
        &ENGINE,
        PreprocessConfig {
            input_size: ENGINE.size,
            ..Default::default()
        },
        PostprocessConfig {
            threshold: 0.5,
            display_size: (40, 40),
            thumbnail_size: (20, 20),
        },
    )
    .expect("segmenter")
}

fn seed(dir: &Path, name: &str) -> PathBuf {
    let img = RgbImage::from_fn(32, 24, |x, _| {
        if x < 16 {
            Rgb([220, 30, 30])
        } else {
            Rgb([30, 30, 220])
        }
    });
    let path = dir.join(name);
    img.save(&path).expect("seed image");
    path
}

fn start(input: &Path, output: &Path) -> TriageSession<'static, RedEngine> {
    TriageSession::from_directory(
        segmenter(),
        FileRouter::new(OutputLayout::under(output)),
        input,
        90,
    )
    .expect("session")
}

#[test]
fn accept_then_reject_routes_both_files() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    fs::create_dir_all(&input).expect("input dir");

    // Seed in reverse to make sure ordering comes from the name, not creation time.
    seed(&input, "b.jpg");
    let a = seed(&input, "a.jpg");
    let a_bytes = fs::read(&a).expect("read a");

    let mut session = start(&input, &output);
    assert_eq!(session.status_line(), "1 / 2  a.jpg");

    let first = session.decide(TriageDecision::Accept).expect("accept a");
    assert_eq!(first.next, Transition::Displaying { index: 1 });
    assert_eq!(session.status_line(), "2 / 2  b.jpg");

    let second = session.decide(TriageDecision::Reject).expect("reject b");
    assert_eq!(second.next, Transition::Terminal);
    assert_eq!(session.state(), SessionState::Terminal);

    assert!(output.join("valid/a.jpg").exists());
    assert_eq!(fs::read(output.join("original/a.jpg")).expect("original"), a_bytes);
    assert!(output.join("invalid/b.jpg").exists());
    assert!(!output.join("original/b.jpg").exists());
    assert_eq!(fs::read_dir(&input).expect("list input").count(), 0);

    assert!(matches!(
        session.decide(TriageDecision::Accept),
        Err(TriageError::SessionFinished)
    ));
}

#[test]
fn reject_never_touches_originals() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    fs::create_dir_all(&input).expect("input dir");
    for name in ["a.png", "b.png", "c.png"] {
        seed(&input, name);
    }

    let mut session = start(&input, &output);
    while !session.is_terminal() {
        session
            .handle(OperatorAction::Key('i'))
            .expect("reject")
            .expect("report");
    }

    assert_eq!(fs::read_dir(output.join("original")).expect("originals").count(), 0);
    assert_eq!(fs::read_dir(output.join("invalid")).expect("rejected").count(), 3);
    assert_eq!(session.summary().rejected, 3);
}

#[test]
fn index_only_moves_forward() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    fs::create_dir_all(&input).expect("input dir");
    for name in ["1.png", "2.png", "3.png", "4.png"] {
        seed(&input, name);
    }

    let mut session = start(&input, &output);
    fs::write(output.join("original/2.png"), b"conflict").expect("seed conflict");

    let mut seen = vec![session.index().expect("first index")];
    let actions = [
        OperatorAction::Accept,
        OperatorAction::Accept, // conflicts on 2.png
        OperatorAction::Reject,
        OperatorAction::Key('V'),
        OperatorAction::Key('i'),
    ];
    for action in actions {
        let _ = session.handle(action);
        if let Some(index) = session.index() {
            assert!(index >= *seen.last().expect("seen"));
            seen.push(index);
        }
    }

    assert!(session.is_terminal());
    assert_eq!(seen, vec![0, 1, 1, 2, 3]);
    assert!(output.join("valid/1.png").exists());
    assert!(output.join("invalid/2.png").exists());
    assert!(output.join("valid/3.png").exists());
    assert!(output.join("invalid/4.png").exists());
}

#[test]
fn processed_file_holds_the_display_mask() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    fs::create_dir_all(&input).expect("input dir");
    seed(&input, "shot.png");

    let mut session = start(&input, &output);
    let expected = session.view().expect("view").mask_image();
    let report = session.decide(TriageDecision::Accept).expect("accept");

    let written = image::open(&report.destination).expect("reopen").to_luma8();
    assert_eq!(written, expected);
    // Red left half is foreground, blue right half is not.
    assert_eq!(written.get_pixel(5, 20).0, [255]);
    assert_eq!(written.get_pixel(35, 20).0, [0]);
}

#[test]
fn transparent_png_is_segmented_on_color_only() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    fs::create_dir_all(&input).expect("input dir");
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba([200, 10, 10, 0])))
        .save(input.join("alpha.png"))
        .expect("seed");

    let session = start(&input, &output);
    let view = session.view().expect("view");
    assert_eq!(view.low_res.kept_count(), 256);
    assert_eq!(view.mask.kept_count(), 40 * 40);
}

#[test]
fn missing_input_directory_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let result = TriageSession::from_directory(
        segmenter(),
        FileRouter::new(OutputLayout::under(&dir.path().join("output"))),
        &dir.path().join("absent"),
        90,
    );
    assert!(matches!(result, Err(TriageError::Directory { .. })));
}
