//! Typed clients for the pipeline's external capabilities.
//!
//! Each capability is a narrow trait with one REST implementation and a
//! canned-response stub. Stage bodies take the traits by `Arc<dyn …>` so
//! tests never touch the network.

pub mod error;
pub mod host;
pub mod imagegen;
pub mod llm;
pub mod stock;
pub mod stub;
pub mod transcribe;

pub use error::{ServiceError, ServiceResult};
pub use host::{HostedVideo, UploadVideoRequest, UploaderClient, VideoHost};
pub use imagegen::{ImageGenClient, ImageGenerator, ImageRequest};
pub use llm::{extract_json_array, strip_code_fences, ChatClient, CompletionRequest, LanguageModel};
pub use stock::{PexelsClient, StockVideoSearch};
pub use stub::{
    StubImageGenerator, StubLanguageModel, StubSpeechToText, StubStockVideo, StubVideoHost,
};
pub use transcribe::{SpeechToText, WhisperClient};
