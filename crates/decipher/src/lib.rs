//! Image Text Decipher: upload an image, have Gemini read the text in it.
//!
//! [`session::Session`] drives the page: uploads go through [`intake`], analyses
//! through [`encoding`] and an [`api::AnalysisClient`], and every outcome lands in
//! the [`state::Controller`] which [`ui`] renders.

pub mod api;
pub mod config;
pub mod encoding;
pub mod error;
pub mod intake;
pub mod logging;
pub mod session;
pub mod state;
pub mod ui;

pub use api::{AnalysisClient, AnalysisRequest, GeminiClient, PROMPT};
pub use config::Config;
pub use error::AnalysisError;
pub use intake::{ImageFile, UploadSource};
pub use session::Session;
pub use state::{UiState, View};
