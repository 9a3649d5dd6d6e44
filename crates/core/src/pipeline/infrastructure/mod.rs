pub mod sequential_frame_executor;
pub mod threaded_frame_executor;
