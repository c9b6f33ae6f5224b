//! Client-side data access for the knowledge-base API.
//!
//! Layers a caching, retrying, de-duplicating transport over the
//! `kbase_api` HTTP client. On top of it sit a cancellation-aware request
//! hook ([`ApiData`]), resource extractors for admin and user endpoints,
//! interval polling, and pure pagination and sorting over fetched lists.

pub mod admin;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod paging;
pub mod polling;
pub mod sorting;
pub mod user;

pub use kbase_api;
pub use kbase_api::types;
pub use kbase_api::{Filters, RequestOptions, ResourcePath, Transport};

pub use admin::{AdminCollection, AdminData, AdminDataOptions, AdminResource};
pub use client::CachedTransport;
pub use config::{ClientConfig, RetryConfig};
pub use error::{ErrorCode, StructuredError};
pub use fetch::{ApiData, Callbacks, FetchConfig, FetchState};
pub use paging::{Page, PaginatedSorting, PaginationConfig, Paginator};
pub use polling::Poller;
pub use sorting::{SortOrder, SortValue, Sortable, Sorter};
pub use user::{UserData, UserDataOptions, UserResource, UserResourceData};
