pub mod change_detector;
pub mod config;
pub mod frame_source;
pub mod frame_writer;
pub mod output_namer;
pub mod sampling;
pub mod session;

pub use config::ExtractionConfig;
pub use session::ExtractionSession;
