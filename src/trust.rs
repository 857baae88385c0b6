//! Content trust: sign pushed tags with notary

use crate::{distribution::Credentials, error::*, image::Image, Tag};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// Content trust configuration in the resource source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContentTrust {
    /// URL of notary server
    pub server: String,
    pub repository_key_id: String,
    /// PEM encoded private key of the repository
    pub repository_key: String,
    pub repository_passphrase: String,
    /// PEM encoded client TLS key for notary server
    #[serde(default)]
    pub tls_key: Option<String>,
    /// PEM encoded client TLS certificate for notary server
    #[serde(default)]
    pub tls_cert: Option<String>,
}

/// Detached signing of pushed tags
pub trait Signer {
    /// Create a directory holding trust data and keys for the following `sign` calls
    fn prepare_trust_dir(&mut self, config: &ContentTrust) -> Result<PathBuf>;

    /// Sign the image pushed to the tag
    fn sign(&mut self, trust_dir: &Path, tag: &Tag, auth: &Credentials, image: &Image)
        -> Result<()>;
}

/// Notary client configuration, i.e. `config.json` read by `notary -c`
#[derive(Debug, Serialize)]
struct NotaryConfig {
    trust_dir: PathBuf,
    remote_server: RemoteServer,
}

#[derive(Debug, Serialize)]
struct RemoteServer {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls_client_cert: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls_client_key: Option<PathBuf>,
}

/// [Signer] using `notary` executable
#[derive(Debug, Clone)]
pub struct NotarySigner {
    executable: PathBuf,
    passphrase: Option<String>,
    /// Where trust directories are created
    temp_root: PathBuf,
}

impl Default for NotarySigner {
    fn default() -> Self {
        Self::new("notary")
    }
}

impl NotarySigner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        NotarySigner {
            executable: executable.into(),
            passphrase: None,
            temp_root: std::env::temp_dir(),
        }
    }

    /// Globally unique name of the repository in notary, e.g. `docker.io/library/alpine`
    fn gun(tag: &Tag) -> String {
        let host = match tag.repository.host().as_str() {
            crate::repository::DOCKER_HUB => "docker.io".to_string(),
            host => host.to_string(),
        };
        format!("{}/{}", host, tag.repository.name)
    }

    fn command(&self, trust_dir: &Path, tag: &Tag, auth: &Credentials, image: &Image) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-c")
            .arg(trust_dir.join("config.json"))
            .arg("addhash")
            .arg(Self::gun(tag))
            .arg(tag.label())
            .arg(image.manifest_bytes().len().to_string())
            .arg("--sha256")
            .arg(&image.digest().encoded)
            .arg("--publish");
        if let Some(passphrase) = &self.passphrase {
            cmd.env("NOTARY_TARGETS_PASSPHRASE", passphrase)
                .env("NOTARY_SNAPSHOT_PASSPHRASE", passphrase)
                .env("NOTARY_DELEGATION_PASSPHRASE", passphrase);
        }
        if let (Some(username), Some(password)) = (&auth.username, &auth.password) {
            cmd.env(
                "NOTARY_AUTH",
                base64::encode(format!("{}:{}", username, password)),
            );
        }
        cmd
    }
}

impl Signer for NotarySigner {
    fn prepare_trust_dir(&mut self, config: &ContentTrust) -> Result<PathBuf> {
        let id = &config.repository_key_id;
        if id.is_empty() || id.contains(|c: char| c == '/' || c == '\\') {
            return Err(Error::SigningSetup(format!(
                "Invalid repository key id: {:?}",
                id
            )));
        }

        let dir = self
            .temp_root
            .join(format!("imgpush-notary-{}", uuid::Uuid::new_v4()));
        if let Err(e) = write_trust_dir(&dir, config) {
            // The directory may already hold keys
            if dir.exists() {
                if let Err(e) = fs::remove_dir_all(&dir) {
                    log::warn!("failed to clean up {}: {}", dir.display(), e);
                }
            }
            return Err(Error::SigningSetup(e.to_string()));
        }

        self.passphrase = Some(config.repository_passphrase.clone());
        log::debug!("notary config prepared in {}", dir.display());
        Ok(dir)
    }

    fn sign(
        &mut self,
        trust_dir: &Path,
        tag: &Tag,
        auth: &Credentials,
        image: &Image,
    ) -> Result<()> {
        let output = self
            .command(trust_dir, tag, auth, image)
            .output()
            .map_err(|e| {
                Error::SigningFailed(format!("{}: {}", self.executable.display(), e))
            })?;
        if !output.status.success() {
            return Err(Error::SigningFailed(format!(
                "notary exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Write `config.json`, the repository key and TLS material into `dir`
fn write_trust_dir(dir: &Path, config: &ContentTrust) -> std::io::Result<()> {
    let private = dir.join("private");
    fs::create_dir_all(&private)?;
    write_secret(
        &private.join(format!("{}.key", config.repository_key_id)),
        &config.repository_key,
    )?;

    let mut remote_server = RemoteServer {
        url: config.server.clone(),
        tls_client_cert: None,
        tls_client_key: None,
    };
    if let (Some(cert), Some(key)) = (&config.tls_cert, &config.tls_key) {
        let tls = dir.join("tls");
        fs::create_dir_all(&tls)?;
        let cert_path = tls.join("client.cert");
        let key_path = tls.join("client.key");
        fs::write(&cert_path, cert)?;
        write_secret(&key_path, key)?;
        remote_server.tls_client_cert = Some(cert_path);
        remote_server.tls_client_key = Some(key_path);
    }

    let notary_config = NotaryConfig {
        trust_dir: dir.to_owned(),
        remote_server,
    };
    let f = fs::File::create(dir.join("config.json"))?;
    serde_json::to_writer_pretty(f, &notary_config)?;
    Ok(())
}

/// Write a file only readable by the owner
fn write_secret(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
