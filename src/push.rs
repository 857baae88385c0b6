//! Push one image to every tag of a [PushPlan]

use crate::{
    distribution::{Credentials, Registry},
    error::*,
    image::Image,
    retry::{with_retry, RetryPolicy},
    trust::{ContentTrust, Signer},
    Digest, PushPlan,
};
use std::fs;

/// Writes tags sequentially in plan order, and signs each of them after the write
///
/// Signing failures are reported as errors in log, but do not fail the push
/// since the tag is already written. A failed write aborts the push, and
/// tags written before it remain on the registry.
pub struct Orchestrator<'a, R: Registry> {
    registry: &'a mut R,
    signer: Option<&'a mut dyn Signer>,
    retry: RetryPolicy,
}

impl<'a, R: Registry> Orchestrator<'a, R> {
    pub fn new(registry: &'a mut R, retry: RetryPolicy) -> Self {
        Orchestrator {
            registry,
            signer: None,
            retry,
        }
    }

    pub fn with_signer(mut self, signer: &'a mut dyn Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn push(
        &mut self,
        image: &Image,
        plan: &PushPlan,
        auth: &Credentials,
        signing: Option<&ContentTrust>,
    ) -> Result<Digest> {
        let digest = image.digest().clone();

        let trust_dir = match (signing, self.signer.as_mut()) {
            (Some(config), Some(signer)) => Some(signer.prepare_trust_dir(config)?),
            (Some(_), None) => {
                return Err(Error::SigningSetup("no signer is configured".to_string()))
            }
            (None, _) => None,
        };

        let res = self.push_tags(image, plan, auth, trust_dir.as_deref());

        if let Some(dir) = &trust_dir {
            if let Err(e) = fs::remove_dir_all(dir) {
                log::warn!("failed to clean up {}: {}", dir.display(), e);
            }
        }
        res?;
        Ok(digest)
    }

    fn push_tags(
        &mut self,
        image: &Image,
        plan: &PushPlan,
        auth: &Credentials,
        trust_dir: Option<&std::path::Path>,
    ) -> Result<()> {
        for tag in plan.tags() {
            log::info!("pushing to tag {}", tag.label());
            let registry = &mut *self.registry;
            with_retry(&self.retry, || registry.write(tag, image, auth)).map_err(|e| {
                Error::PushFailed {
                    tag: tag.to_string(),
                    source: Box::new(e),
                }
            })?;
            log::info!("pushed");

            if let (Some(dir), Some(signer)) = (trust_dir, self.signer.as_mut()) {
                log::info!("signing image");
                if let Err(e) = signer.sign(dir, tag, auth, image) {
                    log::error!("failed to sign image: {}", e);
                }
            }
        }
        Ok(())
    }
}
