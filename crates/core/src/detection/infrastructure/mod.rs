pub mod label_table;
pub mod model_bootstrap;
pub mod model_resolver;
pub mod onnx_load_strategies;
pub mod onnx_yolo_detector;
