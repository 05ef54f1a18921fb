pub mod deadline_face_analyzer;
pub mod onnx_face_analyzer;
