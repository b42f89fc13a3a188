pub mod annotation {
    pub mod domain {
        pub mod frame_annotator;
    }
    pub mod infrastructure;
}

pub mod codec {
    pub mod domain {
        pub mod frame_codec;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod load_strategy;
        pub mod model_handle;
        pub mod object_detector;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod app_context;
    pub mod frame_pipeline;
    pub mod infrastructure {
        pub mod frame_worker_pool;
    }
    pub mod pipeline_config;
    pub mod pipeline_logger;
}

pub mod session {
    pub mod domain {
        pub mod session;
    }
    pub mod session_registry;
}

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod frame_error;
}
