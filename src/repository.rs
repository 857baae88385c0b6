use crate::{distribution::Name, error::*};
use std::fmt;

/// Registry host of Docker Hub
pub const DOCKER_HUB: &str = "index.docker.io";

/// Repository on an OCI registry, e.g. `ghcr.io/termoshtt/ocipkg`
///
/// The registry host is optional. A repository without host, e.g. `alpine`,
/// is placed on Docker Hub, and a single-segment name there is expanded into
/// the `library/` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub domain: String,
    pub port: Option<u16>,
    pub name: Name,
}

impl Repository {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidName(input.to_string());
        let (host, name) = match input.split_once('/') {
            Some((host, name)) if is_registry_host(host) => (host, name.to_string()),
            _ => (DOCKER_HUB, input.to_string()),
        };
        let (domain, port) = match host.split_once(':') {
            Some((domain, port)) => (domain, Some(port.parse().map_err(|_| invalid())?)),
            None => (host, None),
        };
        let domain = if domain == "docker.io" {
            DOCKER_HUB
        } else {
            domain
        };
        let name = if domain == DOCKER_HUB && !name.contains('/') {
            format!("library/{}", name)
        } else {
            name
        };
        Ok(Repository {
            domain: domain.to_string(),
            port,
            name: Name::new(&name)?,
        })
    }

    /// `host[:port]` part
    pub fn host(&self) -> String {
        if let Some(port) = self.port {
            format!("{}:{}", self.domain, port)
        } else {
            self.domain.clone()
        }
    }

    /// Root URL of the registry API
    pub fn registry_url(&self) -> Result<url::Url> {
        let scheme = if self.domain == "localhost" || self.domain == "127.0.0.1" {
            "http"
        } else {
            "https"
        };
        Ok(url::Url::parse(&format!("{}://{}", scheme, self.host()))?)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host(), self.name)
    }
}

fn is_registry_host(host: &str) -> bool {
    host.contains('.') || host.contains(':') || host == "localhost"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository() -> Result<()> {
        let repo = Repository::parse("ghcr.io/termoshtt/ocipkg")?;
        assert_eq!(
            repo,
            Repository {
                domain: "ghcr.io".to_string(),
                port: None,
                name: Name::new("termoshtt/ocipkg")?,
            }
        );
        assert_eq!(repo.registry_url()?.as_str(), "https://ghcr.io/");

        let repo = Repository::parse("localhost:5000/test_repo")?;
        assert_eq!(repo.port, Some(5000));
        assert_eq!(repo.name.as_str(), "test_repo");
        assert_eq!(repo.registry_url()?.as_str(), "http://localhost:5000/");
        assert_eq!(repo.to_string(), "localhost:5000/test_repo");

        let repo = Repository::parse("alpine")?;
        assert_eq!(repo.domain, DOCKER_HUB);
        assert_eq!(repo.name.as_str(), "library/alpine");

        let repo = Repository::parse("concourse/imgpush")?;
        assert_eq!(repo.domain, DOCKER_HUB);
        assert_eq!(repo.name.as_str(), "concourse/imgpush");

        let repo = Repository::parse("docker.io/busybox")?;
        assert_eq!(repo.domain, DOCKER_HUB);
        assert_eq!(repo.name.as_str(), "library/busybox");

        assert!(Repository::parse("localhost:port/repo").is_err());
        assert!(Repository::parse("ghcr.io/Upper").is_err());
        Ok(())
    }
}
