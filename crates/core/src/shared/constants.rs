pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const GENDER_MODEL_NAME: &str = "genderage.onnx";
pub const SWAPPER_MODEL_NAME: &str = "inswapper_128.onnx";
pub const CONTENT_FILTER_MODEL_NAME: &str = "nudenet_320n.onnx";

/// Minimum cosine similarity (exclusive) for a face to continue a track.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Cold-start fallback radius as a fraction of the first frame's diagonal.
pub const FALLBACK_DISTANCE_RATIO: f64 = 0.35;

/// Worker count for the threaded swap strategy.
pub const DEFAULT_WORKERS: usize = 4;

pub const DEFAULT_FPS: f64 = 30.0;

/// Intermediate frames in the spill directory are named `frame_{index:06}.png`.
pub const SPILL_FRAME_PREFIX: &str = "frame_";
pub const SPILL_FRAME_DIGITS: usize = 6;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
