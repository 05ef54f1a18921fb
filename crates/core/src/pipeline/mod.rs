pub mod analyze_image_use_case;
pub mod session_logger;
pub mod shared_session;
