pub mod models;
pub mod request;
pub mod response;
pub mod thinking;

pub use models::{OpenAIContent, OpenAIMessage, OpenAIRequest};
pub use request::transform_chat_request;
pub use response::transform_chat_response;
