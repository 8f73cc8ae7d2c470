use std::{fmt::Write, fs, io::Cursor, path::Path};

use log::{debug, warn};
use segsort_utils::config::ModelSettings;
use tract_onnx::prelude::{
    DatumExt, Framework, Graph, InferenceModel, InferenceModelExt, SimplePlan, Tensor, TypedFact,
    TypedOp, tvec,
};

use crate::error::{Result, TriageError};
use crate::preprocess::{InputSize, InputTensor};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Number of values the network emits per pixel (background, foreground).
pub const VALUES_PER_PIXEL: usize = 2;

/// Raw network output: interleaved background/foreground pairs over the input grid.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    values: Vec<f32>,
}

impl InferenceOutput {
    /// Wrap raw output values.
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Interleaved values in output order.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Number of output values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the network produced nothing.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Anything that can run the segmentation forward pass.
///
/// Engines are built once and shared by reference; `run` takes `&self` and must not keep
/// per-call state.
pub trait SegmentationEngine: std::fmt::Debug {
    /// Resolution the engine was built for.
    fn input_size(&self) -> InputSize;

    /// Run one forward pass. The output holds `2 * width * height` values.
    fn run(&self, tensor: &InputTensor) -> Result<InferenceOutput>;
}

/// Segmentation engine backed by a `tract-onnx` runnable plan.
#[derive(Debug)]
pub struct OnnxEngine {
    runnable: RunnableModel,
    input_size: InputSize,
}

impl OnnxEngine {
    /// Read a serialized graph from disk and build the engine.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        input_size: InputSize,
        settings: &ModelSettings,
    ) -> Result<Self> {
        let path = model_path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            TriageError::ModelLoad(format!("cannot read model file {}: {e}", path.display()))
        })?;
        debug!("Read {} bytes of model graph from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes, input_size, settings)
    }

    /// Parse a serialized graph and build an optimized execution plan for `input_size`.
    ///
    /// Falls back to the decluttered (unoptimized) graph when optimization fails.
    pub fn from_bytes(bytes: &[u8], input_size: InputSize, settings: &ModelSettings) -> Result<Self> {
        if bytes.is_empty() {
            return Err(TriageError::ModelLoad("model file is empty".into()));
        }

        let runnable = match build_plan(bytes, input_size, settings, true) {
            Ok(plan) => {
                debug!(
                    "Segmentation graph optimized for {}x{}",
                    input_size.width, input_size.height
                );
                plan
            }
            Err(opt_err) => {
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "Optimized load failed; falling back to decluttered graph.\nError chain:\n{}",
                    chain_msg.trim_end()
                );
                build_plan(bytes, input_size, settings, false).map_err(|e| {
                    TriageError::ModelLoad(format!(
                        "{e:#} (after optimize error: {opt_err})"
                    ))
                })?
            }
        };

        Ok(Self {
            runnable,
            input_size,
        })
    }
}

impl SegmentationEngine for OnnxEngine {
    fn input_size(&self) -> InputSize {
        self.input_size
    }

    fn run(&self, tensor: &InputTensor) -> Result<InferenceOutput> {
        let expected = self.input_size.tensor_shape();
        if tensor.shape() != expected {
            return Err(TriageError::Inference(format!(
                "tensor shape {:?} does not match model input {:?}",
                tensor.shape(),
                expected
            )));
        }

        let input = Tensor::from_shape(&expected, tensor.as_slice())
            .map_err(|e| TriageError::Inference(format!("failed to build input tensor: {e}")))?;
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| TriageError::Inference(format!("graph execution failed: {e:#}")))?;

        let first = outputs
            .first()
            .ok_or_else(|| TriageError::Inference("model produced no outputs".into()))?;
        let values = first
            .as_slice::<f32>()
            .map_err(|e| TriageError::Inference(format!("output is not f32: {e}")))?;

        let expected_len = self.input_size.pixel_count() * VALUES_PER_PIXEL;
        if values.len() != expected_len {
            return Err(TriageError::Inference(format!(
                "expected {expected_len} output values, got {}",
                values.len()
            )));
        }

        Ok(InferenceOutput::new(values.to_vec()))
    }
}

fn build_plan(
    bytes: &[u8],
    input_size: InputSize,
    settings: &ModelSettings,
    optimized: bool,
) -> tract_onnx::prelude::TractResult<RunnableModel> {
    let mut model: InferenceModel = tract_onnx::onnx().model_for_read(&mut Cursor::new(bytes))?;

    if let Some(name) = settings.input_node.as_deref() {
        model = model.with_input_names([name])?;
    }
    if let Some(name) = settings.output_node.as_deref() {
        model = model.with_output_names([name])?;
    }
    model = model.with_input_fact(0, f32::fact(input_size.tensor_shape()).into())?;

    if optimized {
        model.into_optimized()?.into_runnable()
    } else {
        model.into_typed()?.into_decluttered()?.into_runnable()
    }
}
