pub mod detection {
    pub mod domain {
        pub mod embedding_history;
        pub mod face_detector;
        pub mod frame_selection;
        pub mod identity_tracker;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod frame_executor;
    pub mod infrastructure;
    pub mod pipeline_logger;
    pub mod progress_counter;
    pub mod resolve_source_face_use_case;
    pub mod swap_image_use_case;
    pub mod swap_video_use_case;
}

pub mod safety {
    pub mod domain {
        pub mod content_filter;
        pub mod content_gate;
    }
    pub mod infrastructure;
}

pub mod shared {
    pub mod constants;
    pub mod embedding;
    pub mod error;
    pub mod face;
    pub mod face_alignment;
    pub mod face_landmarks;
    pub mod frame;
    pub mod target_selector;
    pub mod video_metadata;
}

pub mod swapping {
    pub mod domain {
        pub mod face_swapper;
        pub mod swap_executor;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod container_format;
        pub mod frame_source;
        pub mod image_writer;
        pub mod video_writer;
    }
    pub mod infrastructure;
}
