use crate::{distribution::*, error::*, image::Image, Digest, Repository, Tag};
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use url::Url;

/// Response of `/v2/<name>/tags/list`
///
/// `tags` may be `null` for a repository without any tag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct TagList {
    tags: Option<Vec<String>>,
}

lazy_static::lazy_static! {
    static ref LINK_NEXT_RE: Regex = Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).unwrap();
}

/// A client for `/v2/<name>/` API endpoints of OCI registries
pub struct RegistryClient {
    agent: ureq::Agent,
    /// `Authorization` header value obtained for each repository
    authorizations: HashMap<Repository, String>,
    /// Blobs already on each repository
    known_blobs: HashSet<(Repository, Digest)>,
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("imgpush/", env!("CARGO_PKG_VERSION")))
            .build();
        RegistryClient {
            agent,
            authorizations: HashMap::new(),
            known_blobs: HashSet::new(),
        }
    }

    fn url(repository: &Repository, path: &str) -> Result<Url> {
        Ok(repository
            .registry_url()?
            .join(&format!("/v2/{}/{}", repository.name, path))?)
    }

    /// Send a request, and answer the authentication challenge if the
    /// registry returns `401 Unauthorized`
    ///
    /// `404 Not Found` is returned as `None`.
    fn send(
        &mut self,
        repository: &Repository,
        auth: &Credentials,
        req: ureq::Request,
        body: Option<&[u8]>,
    ) -> Result<Option<ureq::Response>> {
        log::debug!("{} {}", req.method(), req.url());
        let dispatch = |req: ureq::Request| match body {
            Some(body) => req.send_bytes(body),
            None => req.call(),
        };
        let authorized = |this: &Self, req: ureq::Request| match this.authorizations.get(repository) {
            Some(value) => req.set("Authorization", value),
            None => req,
        };

        let res = match dispatch(authorized(self, req.clone())) {
            Err(ureq::Error::Status(401, res)) => {
                let header = res
                    .header("www-authenticate")
                    .ok_or_else(|| Error::UnSupportedAuthHeader(String::new()))?
                    .to_string();
                let challenge = AuthChallenge::from_header(&header)?;
                let scope = format!("repository:{}:pull,push", repository.name);
                let value = challenge.authorize(&self.agent, auth, &scope)?;
                self.authorizations.insert(repository.clone(), value);
                dispatch(authorized(self, req))
            }
            res => res,
        };
        match res {
            Ok(res) => Ok(Some(res)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn location(repository: &Repository, res: &ureq::Response) -> Result<Url> {
        let loc = res.header("Location").ok_or_else(|| Error::UnexpectedStatus {
            status: res.status(),
            url: res.get_url().to_string(),
        })?;
        match Url::parse(loc) {
            Ok(url) => Ok(url),
            Err(_) => Ok(repository.registry_url()?.join(loc)?),
        }
    }

    /// Get tags of `<name>` repository.
    ///
    /// ```text
    /// GET /v2/<name>/tags/list
    /// ```
    ///
    /// Paginated responses are followed by `Link` header. A repository which
    /// does not exist yet has no tags.
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#content-discovery) for detail.
    pub fn get_tags(&mut self, repository: &Repository, auth: &Credentials) -> Result<Vec<String>> {
        let mut tags = Vec::new();
        let mut url = Self::url(repository, "tags/list")?;
        loop {
            let req = self.agent.get(url.as_str());
            let res = match self.send(repository, auth, req, None)? {
                Some(res) => res,
                None => {
                    log::info!("repository {} does not exist yet", repository);
                    break;
                }
            };
            let next = res
                .header("Link")
                .and_then(|link| LINK_NEXT_RE.captures(link))
                .map(|cap| cap[1].to_string());
            tags.extend(res.into_json::<TagList>()?.tags.unwrap_or_default());
            match next {
                Some(next) => url = repository.registry_url()?.join(&next)?,
                None => break,
            }
        }
        Ok(tags)
    }

    /// Check if the blob exists in the repository
    ///
    /// ```text
    /// HEAD /v2/<name>/blobs/<digest>
    /// ```
    pub fn has_blob(
        &mut self,
        repository: &Repository,
        auth: &Credentials,
        digest: &Digest,
    ) -> Result<bool> {
        if self
            .known_blobs
            .contains(&(repository.clone(), digest.clone()))
        {
            return Ok(true);
        }
        let url = Self::url(repository, &format!("blobs/{}", digest))?;
        let req = self.agent.head(url.as_str());
        let exists = self.send(repository, auth, req, None)?.is_some();
        if exists {
            self.known_blobs.insert((repository.clone(), digest.clone()));
        }
        Ok(exists)
    }

    /// Push blob to registry
    ///
    /// ```text
    /// POST /v2/<name>/blobs/uploads/
    /// ```
    ///
    /// and following `PUT` to URL obtained by `POST`.
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pushing-blobs) for detail.
    pub fn push_blob(
        &mut self,
        repository: &Repository,
        auth: &Credentials,
        blob: &[u8],
    ) -> Result<Digest> {
        let url = Self::url(repository, "blobs/uploads/")?;
        let req = self.agent.post(url.as_str());
        let res = self
            .send(repository, auth, req, Some(&[][..]))?
            .ok_or_else(|| Error::UnexpectedStatus {
                status: 404,
                url: url.to_string(),
            })?;
        let url = Self::location(repository, &res)?;

        let digest = Digest::from_buf_sha256(blob);
        let req = self
            .agent
            .put(url.as_str())
            .query("digest", &digest.to_string())
            .set("Content-Type", "application/octet-stream");
        self.send(repository, auth, req, Some(blob))?
            .ok_or_else(|| Error::UnexpectedStatus {
                status: 404,
                url: url.to_string(),
            })?;
        self.known_blobs.insert((repository.clone(), digest.clone()));
        Ok(digest)
    }

    /// Push manifest to registry
    ///
    /// ```text
    /// PUT /v2/<name>/manifests/<reference>
    /// ```
    ///
    /// Manifest must be pushed after blobs are updated.
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pushing-manifests) for detail.
    pub fn push_manifest(
        &mut self,
        tag: &Tag,
        auth: &Credentials,
        media_type: &str,
        manifest: &[u8],
    ) -> Result<()> {
        let url = Self::url(&tag.repository, &format!("manifests/{}", tag.label))?;
        let req = self.agent.put(url.as_str()).set("Content-Type", media_type);
        self.send(&tag.repository, auth, req, Some(manifest))?
            .ok_or_else(|| Error::UnexpectedStatus {
                status: 404,
                url: url.to_string(),
            })?;
        Ok(())
    }
}

impl Registry for RegistryClient {
    fn list_tags(&mut self, repository: &Repository, auth: &Credentials) -> Result<Vec<String>> {
        self.get_tags(repository, auth)
    }

    fn write(&mut self, tag: &Tag, image: &Image, auth: &Credentials) -> Result<()> {
        for (digest, blob) in image.blobs() {
            if self.has_blob(&tag.repository, auth, digest)? {
                log::debug!("blob {} already exists", digest);
                continue;
            }
            let pushed = self.push_blob(&tag.repository, auth, blob)?;
            if &pushed != digest {
                return Err(Error::DigestMismatch {
                    expected: digest.clone(),
                    actual: pushed,
                });
            }
        }
        self.push_manifest(tag, auth, image.media_type(), image.manifest_bytes())
    }
}
