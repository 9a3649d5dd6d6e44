use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::shared::error::BoxError;

/// Where ONNX inference runs. Also decides the swap strategy: accelerators
/// process frames sequentially, CPU runs fan out over a worker pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionDevice {
    #[default]
    Cpu,
    /// CoreML on macOS, DirectML on Windows, CUDA elsewhere (with the `cuda`
    /// feature).
    Accelerator,
}

impl ExecutionDevice {
    pub fn is_accelerator(&self) -> bool {
        matches!(self, ExecutionDevice::Accelerator)
    }
}

impl FromStr for ExecutionDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ExecutionDevice::Cpu),
            "accelerator" | "gpu" | "cuda" | "coreml" | "directml" => {
                Ok(ExecutionDevice::Accelerator)
            }
            other => Err(format!("unknown execution device: {other}")),
        }
    }
}

impl fmt::Display for ExecutionDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionDevice::Cpu => write!(f, "cpu"),
            ExecutionDevice::Accelerator => write!(f, "accelerator"),
        }
    }
}

/// Return the preferred ONNX execution providers for `device` on the
/// current platform.
///
/// ONNX Runtime falls back to CPU if a listed provider is unavailable.
pub fn execution_providers(
    device: ExecutionDevice,
) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    if !device.is_accelerator() {
        return vec![];
    }
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(all(not(any(target_os = "macos", target_os = "windows")), feature = "cuda"))]
    {
        vec![ort::execution_providers::CUDAExecutionProvider::default().build()]
    }
    #[cfg(all(not(any(target_os = "macos", target_os = "windows")), not(feature = "cuda")))]
    {
        log::warn!("No accelerator provider compiled in; running on CPU");
        vec![]
    }
}

/// Loads an ONNX model for `device`.
pub fn build_session(model_path: &Path, device: ExecutionDevice) -> Result<Session, BoxError> {
    if !model_path.exists() {
        return Err(format!("model not found: {}", model_path.display()).into());
    }
    let session = Session::builder()
        .map_err(ort_error)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(ort_error)?
        .with_execution_providers(execution_providers(device))
        .map_err(ort_error)?
        .commit_from_file(model_path)
        .map_err(ort_error)?;
    log::debug!("Loaded {} on {device}", model_path.display());
    Ok(session)
}

/// Square spatial input size declared by the model (NCHW), or `default`
/// when the shape is dynamic or unreadable.
pub fn model_input_size(session: &Session, default: u32) -> u32 {
    session
        .inputs()
        .first()
        .and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() >= 4 && shape[2] > 0 {
                    Some(shape[2] as u32)
                } else {
                    None
                }
            } else {
                None
            }
        })
        .unwrap_or(default)
}

fn ort_error(e: impl fmt::Display) -> BoxError {
    e.to_string().into()
}
