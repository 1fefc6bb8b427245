//! Client-side list controller for the LMS admin views.
//!
//! A [`ListQueryController`] owns the page, sort and search state of one
//! table, picks between the browse and search endpoints of a resource,
//! reads ahead the next pages and invalidates the shared cache after
//! mutations.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod key;
pub mod query;

pub use api::{ApiUrlError, FormPart, FormValue, MutationBody, ResourceApi, RestResourceApi};
pub use cache::{CacheEntry, MemoryQueryCache, PageResult, QueryCache};
pub use clock::{Clock, Debounced, ManualClock, SystemClock};
pub use config::ControllerConfig;
pub use controller::{ListEvent, ListQueryController, ListView, LOAD_FAILED_NOTICE};
pub use error::{FetchError, MutationError};
pub use key::{CachePrefix, FetchKey, FetchMode};
pub use query::QueryState;
