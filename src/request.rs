//! Request and response of the out step

use crate::{distribution::Credentials, error::*, trust::ContentTrust};
use serde::{Deserialize, Deserializer, Serialize};
use std::{io::Read, path::PathBuf};

/// Request read from stdin
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutRequest {
    pub source: Source,
    #[serde(default)]
    pub params: Params,
}

impl OutRequest {
    /// Decode a request. Unknown fields are rejected.
    pub fn from_reader(input: impl Read) -> Result<Self> {
        serde_json::from_reader(input).map_err(|e| Error::InvalidRequest(e.to_string()))
    }
}

/// Where the image is published
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    pub repository: String,
    /// Static tag, a JSON number is accepted as well, e.g. `tag: 18.04`
    #[serde(default, deserialize_with = "string_or_number")]
    pub tag: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,

    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,

    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub content_trust: Option<ContentTrust>,
}

impl Source {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.as_deref(), self.password.as_deref())
    }

    /// All of the AWS access key, secret and region are set
    pub fn has_aws_credentials(&self) -> bool {
        [
            &self.aws_access_key_id,
            &self.aws_secret_access_key,
            &self.aws_region,
        ]
        .iter()
        .all(|v| v.as_deref().map_or(false, |v| !v.is_empty()))
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref().filter(|v| !v.is_empty())
    }

    /// Metadata shared by every response
    pub fn metadata(&self) -> Vec<MetadataField> {
        let mut metadata = vec![MetadataField::new("repository", &self.repository)];
        if let Some(variant) = self.variant() {
            metadata.push(MetadataField::new("variant", variant));
        }
        metadata
    }
}

/// How the image is published
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    /// Semantic version pushed as a tag
    #[serde(default)]
    pub version: Option<String>,
    /// Also push `latest`, `<major>` and `<major>.<minor>` if the version is the newest
    #[serde(default)]
    pub bump_aliases: bool,
    /// Glob pattern of the image tarball, relative to the source directory
    #[serde(default)]
    pub image: String,
    /// File listing additional tags, relative to the source directory
    #[serde(default)]
    pub additional_tags: Option<PathBuf>,
}

/// Response written to stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutResponse {
    pub version: Version,
    pub metadata: Vec<MetadataField>,
}

/// Version of the resource, not to be confused with [crate::Version]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub tag: String,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

impl MetadataField {
    pub fn new(name: &str, value: &str) -> Self {
        MetadataField {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tag {
        String(String),
        Number(serde_json::Number),
    }
    Ok(match Option::<Tag>::deserialize(deserializer)? {
        Some(Tag::String(s)) => Some(s),
        Some(Tag::Number(n)) => Some(n.to_string()),
        None => None,
    })
}
