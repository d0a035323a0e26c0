//! Access module: multi-tenant data sharing over a document store.
//!
//! # Components
//!
//! - **Account directory**: lookup by id or email, login provisioning,
//!   admin impersonation, role and lifecycle changes
//! - **Sharing resolver**: the set of accounts whose data an account sees
//!   (direct participants, group owners, group peers)
//! - **Permission evaluator**: `None < Partial < Read < Full` per document,
//!   with per-type thresholds for read/update/delete
//! - **Filter builder**: store predicates for bulk reads
//! - **Invitations**: request → accept/reject, establishing symmetric edges
//! - **Membership synchronizer**: keeps account group caches in step with
//!   group documents
//!
//! # Usage
//!
//! ```ignore
//! use access::{AccessConfig, AccessService};
//!
//! let svc = AccessService::new(store, AccessConfig::load(&path)?);
//! let account = svc.provision(&principal).await?;
//! let filter = svc.build_filter(&account, "task").await?;
//! ```

pub mod model;
pub mod service;
mod store_impls;

pub use service::{AccessConfig, AccessError, AccessService, GroupVisibility, Scope, TypePolicy};
