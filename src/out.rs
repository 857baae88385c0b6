//! The out step: resolve tags, push and sign the image, and report

use crate::{
    config::Settings,
    distribution::Registry,
    error::*,
    image::{resolve_glob, Image},
    push::Orchestrator,
    report::report,
    request::{OutRequest, OutResponse},
    resolve::{resolve, TagSources},
    trust::Signer,
    Repository,
};
use std::path::Path;

/// Publish the image described by `request`
///
/// Relative paths in the params are resolved against `source_dir`.
pub fn run<R: Registry>(
    request: &OutRequest,
    source_dir: &Path,
    registry: &mut R,
    signer: &mut dyn Signer,
    settings: &Settings,
) -> Result<OutResponse> {
    let OutRequest { source, params } = request;
    if source.has_aws_credentials() {
        return Err(Error::CloudAuthUnsupported);
    }

    let repository = Repository::parse(&source.repository)?;
    let auth = source.credentials();

    let additional_tags = params
        .additional_tags
        .as_ref()
        .map(|path| source_dir.join(path));
    let sources = TagSources {
        source_tag: source.tag.as_deref(),
        version: params.version.as_deref(),
        bump_aliases: params.bump_aliases,
        variant: source.variant(),
        additional_tags: additional_tags.as_deref(),
    };
    let plan = resolve(&repository, &sources, || {
        registry.list_tags(&repository, &auth)
    })?;
    log::debug!("tags to push: {}", plan.labels().join(" "));

    let path = resolve_glob(source_dir, &params.image)?;
    let image = Image::from_path(&path)?;

    let digest = Orchestrator::new(registry, settings.retry.clone())
        .with_signer(signer)
        .push(&image, &plan, &auth, source.content_trust.as_ref())?;

    Ok(report(&plan, &digest, source.metadata()))
}
