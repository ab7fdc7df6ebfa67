//! # Casebook Access Control
//!
//! Access-control resolution for the Casebook caseworker application.
//!
//! ## Features
//!
//! - **One decision function** reconciling the public bypass list, the
//!   super-admin override, role-class policies and fine-grained grants
//!   with an explicit precedence order
//! - **Data-driven role classes**: full bypass, closed allow-list,
//!   grant-based, or deny
//! - **Longest-prefix matching** over `/`-separated resource paths
//! - **Canonical grant values** normalized from loosely typed store rows
//! - **Per-subject grant cache** with TTL, explicit invalidation and a
//!   bounded fetch timeout that fails closed
//! - **Menu derivation** filtering a navigation catalog by the same
//!   decisions
//!
//! ## Example
//!
//! ```rust
//! use casebook_access::{
//!     EngineConfig, InMemoryGrantSource, ResolutionEngine, RoleClassPolicy,
//!     RoleClassPolicyTable, Subject, GrantRow, DecisionReason, ResourcePath,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = RoleClassPolicyTable::new(
//!     vec![ResourcePath::new("/logout")?],
//!     vec![RoleClassPolicy::standard("caseworker")],
//! )?;
//! let grants = InMemoryGrantSource::with_rows(vec![
//!     GrantRow::new("u-17", "/families", None, serde_json::json!("Yes")),
//! ]);
//! let engine = ResolutionEngine::with_config(table, Arc::new(grants), EngineConfig::default());
//!
//! let subject = Subject::new("u-17", "caseworker");
//! let decision = engine.decide(&subject, "/families/42", Some("view")).await;
//!
//! assert!(decision.allowed);
//! assert_eq!(decision.reason, DecisionReason::ExplicitGrant);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod grant;
pub mod identity;
pub mod menu;
pub mod path;
pub mod policy;
pub mod service;

// Re-export commonly used types
pub use config::{PolicyConfig, ServerConfig};
pub use engine::{Decision, DecisionReason, EngineConfig, ResolutionEngine};
pub use error::{AccessError, Result};
pub use grant::{GrantRow, GrantSource, GrantStore, GrantValue, InMemoryGrantSource, PermissionGrant};
pub use identity::{Credential, IdentityResolver, IdentityStore, InMemoryIdentityStore, RoleClass, Subject};
pub use menu::{MenuDeriver, ResourceNode};
pub use path::ResourcePath;
pub use policy::{PolicyMode, RoleClassPolicy, RoleClassPolicyTable};
pub use service::{AccessService, CheckOutcome, GuardOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
