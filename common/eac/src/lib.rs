pub use credential::Credential;
pub use error::{OandaError, Result, NO_STREAM_RESPONSE};

mod credential;
mod error;
mod parser;
pub mod rest;
pub mod stream;
