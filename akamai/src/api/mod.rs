pub mod appsec;
pub mod client;
pub mod error;
pub mod papi;
pub mod pool;

pub use client::Client;
pub use error::{ApiError, Problem};
