mod endpoint;
mod params;
mod request;
mod transactions;

pub use endpoint::*;
pub use params::*;
pub use request::*;
pub use transactions::*;
