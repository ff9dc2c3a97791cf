//! External service clients and background workers

pub mod hashtags;
pub mod images;
pub mod openai_client;
pub mod provider;
pub mod queue_worker;

pub use hashtags::HashtagClient;
pub use images::{ImageBatch, ImageService};
pub use openai_client::OpenAiClient;
pub use provider::{
    GeneratedImage, GenerationError, ImageError, ImageGenerator, ImageSize, TextGenerator,
};
