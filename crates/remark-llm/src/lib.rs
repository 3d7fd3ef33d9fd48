pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::{MockModel, MockResponse};
pub use openai::OpenAiModel;
