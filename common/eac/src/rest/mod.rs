mod client;
mod models;

pub use client::{OandaRest, OandaRestBuilder, DEFAULT_DATETIME_FORMAT};
pub use models::*;
