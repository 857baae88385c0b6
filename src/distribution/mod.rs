//! Push images to OCI registry based on [OCI distribution specification](https://github.com/opencontainers/distribution-spec)

mod auth;
mod client;
mod name;
mod reference;

pub use auth::*;
pub use client::RegistryClient;
pub use name::Name;
pub use reference::Reference;

use crate::{error::*, image::Image, Repository, Tag};

/// Read and write access to OCI registries
pub trait Registry {
    /// Tags already pushed to the repository
    fn list_tags(&mut self, repository: &Repository, auth: &Credentials) -> Result<Vec<String>>;

    /// Upload the image and point the tag to it
    fn write(&mut self, tag: &Tag, image: &Image, auth: &Credentials) -> Result<()>;
}
