pub mod onnx_explicit_content_filter;
