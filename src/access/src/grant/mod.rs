//! Fine-grained permission grants
//!
//! Rows come from a [`GrantSource`], are normalized once into
//! [`PermissionGrant`]s with a canonical [`GrantValue`], indexed per subject
//! in a [`GrantSet`], and cached by the [`GrantStore`].

pub mod value;
pub mod set;
pub mod source;
pub mod cache;
pub mod store;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use value::GrantValue;
pub use set::{GrantRow, GrantSet, PermissionGrant};
pub use source::{GrantSource, InMemoryGrantSource};
pub use cache::{CacheConfig, CacheGeneration, CacheStats, GrantCache};
pub use store::GrantStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresGrantSource;
