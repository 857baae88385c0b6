//! imgpush
//! =======
//!
//! Publish a container image to an OCI registry under a set of tags.
//!
//! The tags are resolved from a static tag, a semantic version, floating
//! aliases of the version (`latest`, `<major>`, `<major>.<minor>`) and
//! user supplied tag names. See [resolve] and [alias] for the rules.

pub mod alias;
pub mod config;
pub mod distribution;
pub mod error;
pub mod image;
pub mod out;
pub mod push;
pub mod report;
pub mod request;
pub mod resolve;
pub mod retry;
pub mod trust;

mod digest;
mod repository;
mod tag;
mod version;

pub use digest::Digest;
pub use repository::Repository;
pub use tag::{PushPlan, Tag};
pub use version::Version;
