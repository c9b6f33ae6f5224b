mod client;
mod errors;
mod query;
mod transport;
pub mod types;
pub use self::client::Client;
pub use self::errors::Error;
pub use self::query::{Filters, ResourcePath};
pub use self::transport::{
    Method, RequestOptions, Transport, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT,
};
