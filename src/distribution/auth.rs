use crate::error::*;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use url::Url;

/// Basic credentials for the registry
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(username: Option<&str>, password: Option<&str>) -> Self {
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(ToString::to_string);
        Credentials {
            username: non_empty(username),
            password: non_empty(password),
        }
    }

    /// Value of `Authorization` header for basic authentication
    ///
    /// Returns `None` unless both username and password are set.
    pub fn basic(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(format!(
                "Basic {}",
                base64::encode(format!("{}:{}", username, password))
            )),
            _ => None,
        }
    }
}

/// WWW-Authentication challenge
///
/// ```
/// use imgpush::distribution::AuthChallenge;
///
/// let auth = AuthChallenge::from_header(
///   r#"Bearer realm="https://ghcr.io/token",service="ghcr.io",scope="repository:termoshtt/ocipkg:pull,push""#,
/// ).unwrap();
///
/// assert_eq!(auth, AuthChallenge::Bearer {
///   realm: "https://ghcr.io/token".to_string(),
///   service: Some("ghcr.io".to_string()),
///   scope: Some("repository:termoshtt/ocipkg:pull,push".to_string()),
/// });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    Basic,
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
}

lazy_static::lazy_static! {
    static ref PARAM_RE: Regex = Regex::new(r#"([A-Za-z_]+)="([^"]*)""#).unwrap();
}

impl AuthChallenge {
    pub fn from_header(header: &str) -> Result<Self> {
        let err = || Error::UnSupportedAuthHeader(header.to_string());
        let (ty, params) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));
        if ty.eq_ignore_ascii_case("basic") {
            return Ok(AuthChallenge::Basic);
        }
        if !ty.eq_ignore_ascii_case("bearer") {
            return Err(err());
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for cap in PARAM_RE.captures_iter(params) {
            let value = cap[2].to_string();
            match &cap[1] {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => continue,
            }
        }
        Ok(AuthChallenge::Bearer {
            realm: realm.ok_or_else(err)?,
            service,
            scope,
        })
    }

    /// Get the value of `Authorization` header answering this challenge
    ///
    /// `scope` is used if the challenge does not specify one, e.g. for `/v2/`.
    pub fn authorize(
        &self,
        agent: &ureq::Agent,
        auth: &Credentials,
        scope: &str,
    ) -> Result<String> {
        let (realm, service, challenged_scope) = match self {
            AuthChallenge::Basic => {
                return auth
                    .basic()
                    .ok_or_else(|| Error::UnSupportedAuthHeader("Basic".to_string()))
            }
            AuthChallenge::Bearer {
                realm,
                service,
                scope,
            } => (realm, service, scope),
        };
        let token_url = Url::parse(realm)?;
        let mut req = agent
            .get(token_url.as_str())
            .set("Accept", "application/json")
            .query("scope", challenged_scope.as_deref().unwrap_or(scope));
        if let Some(service) = service {
            req = req.query("service", service);
        }
        if let Some(basic) = auth.basic() {
            req = req.set("Authorization", &basic);
        }
        log::debug!("GET {}", token_url);
        match req.call() {
            Ok(res) => {
                let token = res.into_json::<Token>()?;
                token
                    .token
                    .or(token.access_token)
                    .map(|token| format!("Bearer {}", token))
                    .ok_or(Error::AuthorizationFailed(token_url))
            }
            Err(ureq::Error::Status(429, _)) => Err(Error::RateLimited),
            Err(ureq::Error::Status(..)) => Err(Error::AuthorizationFailed(token_url)),
            Err(ureq::Error::Transport(e)) => Err(Error::NetworkError(e.into())),
        }
    }
}

#[derive(Deserialize)]
struct Token {
    token: Option<String>,
    access_token: Option<String>,
}
