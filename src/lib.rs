pub mod api;
pub mod candidates;
pub mod cli;
pub mod downloader;
pub mod error;
pub mod http;
pub mod media;
pub mod page_state;
pub mod scanner;
pub mod session;
pub mod video;

pub use api::Api;
pub use error::{Error, InvalidResponse, Result};
pub use media::{FetchOptions, MediaBody, MediaStream, ValidatedMedia};
pub use session::Session;
pub use video::Video;
