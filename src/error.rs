use crate::Digest;
use oci_spec::{distribution::ErrorResponse, OciSpecError};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Invalid user input
    //
    #[error("Invalid payload: {0}")]
    InvalidRequest(String),
    #[error("Invalid semantic version: {0:?}")]
    InvalidVersion(String),
    #[error("No tag specified - need either 'version:' in params or 'tag:' in source")]
    NoTagsResolved,
    #[error("Invalid name for repository: {0}")]
    InvalidName(String),
    #[error("Invalid reference to image: {0}")]
    InvalidReference(String),
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
    #[error("Failed to glob path '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },
    #[error("Could not read additional tags from {path}: {source}")]
    AdditionalTags {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot authenticate with ECR: cloud credential exchange is not supported")]
    CloudAuthUnsupported,

    //
    // Invalid container image
    //
    #[error("No files match glob '{0}'")]
    ArtifactNotFound(String),
    #[error("Too many files match glob '{pattern}': {matches:?}")]
    ArtifactAmbiguous {
        pattern: String,
        matches: Vec<PathBuf>,
    },
    #[error("Neither index.json nor manifest.json is included in image tarball")]
    MissingIndex,
    #[error("Image tarball must contain exactly one manifest, found {0}")]
    MultipleManifests(usize),
    #[error("File is missing in image tarball: {0}")]
    MissingFile(String),
    #[error("Blob is missing in oci-archive: {0}")]
    MissingBlob(Digest),
    #[error("Manifest digest {actual} does not match index descriptor {expected}")]
    DigestMismatch { expected: Digest, actual: Digest },
    #[error(transparent)]
    InvalidJson(#[from] serde_json::error::Error),

    //
    // Error from OCI registry
    //
    #[error("List repository tags: {0}")]
    RemoteListFailed(Box<Error>),
    #[error("Registry responded with 429 Too Many Requests")]
    RateLimited,
    #[error("Pushing image to tag {tag} failed: {source}")]
    PushFailed { tag: String, source: Box<Error> },
    #[error(transparent)]
    NetworkError(Box<ureq::Transport>),
    #[error(transparent)]
    RegistryError(#[from] ErrorResponse),
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(url::Url),
    #[error("Unsupported WWW-Authentication header: {0}")]
    UnSupportedAuthHeader(String),

    //
    // Content trust
    //
    #[error("Prepare notary config directory: {0}")]
    SigningSetup(String),
    #[error("Failed to sign image: {0}")]
    SigningFailed(String),

    //
    // System error
    //
    #[error(transparent)]
    UnknownIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Transient "too many requests" responses which are worth retrying
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited)
    }
}

impl From<OciSpecError> for Error {
    fn from(e: OciSpecError) -> Self {
        match e {
            OciSpecError::SerDe(e) => Error::InvalidJson(e),
            OciSpecError::Io(e) => Error::UnknownIo(e),
            OciSpecError::Builder(e) => Error::InvalidRequest(e.to_string()),
            OciSpecError::Other(e) => Error::InvalidRequest(e),
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(429, _) => Error::RateLimited,
            ureq::Error::Status(status, res) => {
                let url = res.get_url().to_string();
                match res.into_json::<ErrorResponse>() {
                    Ok(err) => Error::RegistryError(err),
                    Err(_) => Error::UnexpectedStatus { status, url },
                }
            }
            ureq::Error::Transport(e) => Error::NetworkError(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{with_retry, RetryPolicy};
    use std::time::Duration;

    fn status(code: u16, text: &str, body: &str) -> ureq::Error {
        ureq::Error::Status(code, ureq::Response::new(code, text, body).unwrap())
    }

    #[test]
    fn too_many_requests() {
        let e: Error = status(429, "Too Many Requests", "").into();
        assert!(matches!(e, Error::RateLimited));
        assert!(e.is_rate_limited());
    }

    #[test]
    fn registry_error_is_not_retried() {
        let body = r#"{"errors":[{"code":"MANIFEST_INVALID","message":"manifest invalid"}]}"#;
        let e: Error = status(500, "Internal Server Error", body).into();
        assert!(matches!(e, Error::RegistryError(_)));
        assert!(!e.is_rate_limited());

        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        let mut calls = 0;
        let res: Result<()> = with_retry(&policy, || {
            calls += 1;
            Err(status(500, "Internal Server Error", body).into())
        });
        assert!(matches!(res, Err(Error::RegistryError(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn unexpected_status() {
        let e: Error = status(403, "Forbidden", "<html>denied</html>").into();
        assert!(matches!(e, Error::UnexpectedStatus { status: 403, .. }));
        assert!(!e.is_rate_limited());
    }
}
