pub mod correlation;
pub mod logging;

// Re-export commonly used items
pub use correlation::{request_id_middleware, RequestId, X_REQUEST_ID};
pub use logging::{init_structured_logging, LogConfig, LogFormat};
