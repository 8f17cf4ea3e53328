//! Client side of the analysis contract: input validation, the form
//! controller with its view state, the HTTP transport and report rendering.

pub mod controller;
pub mod report;
pub mod submission;
pub mod transport;

pub use controller::{FormController, PendingSubmission, RenderedResult, ViewState};
pub use report::Report;
pub use submission::{ImageFile, Submission};
pub use transport::{AnalyzeTransport, HttpTransport, ServerReply};

pub const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed. Please try again.";
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// Errors surfaced to the user by the form controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Please provide an image file or an image URL")]
    MissingInput,
    #[error("Please provide either a file or URL, not both")]
    BothInputs,
    #[error("Please enter a valid image URL")]
    InvalidUrl,
    #[error("Please select an image file")]
    NotAnImage,
    #[error("An analysis is already in progress")]
    Busy,
    #[error("A newer analysis replaced this one")]
    Superseded,
    #[error("No analysis data available. Please analyze an image first.")]
    NoResult,
    #[error("{}", NETWORK_FAILURE_MESSAGE)]
    Network(String),
    #[error("{message}")]
    Server { status: u16, message: String },
}
