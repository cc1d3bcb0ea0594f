pub mod care;
pub mod gemini;
pub mod reply;
pub mod vision;

pub use care::CareClient;
pub use gemini::{GeminiClient, GeminiError};
pub use vision::VisionClient;
