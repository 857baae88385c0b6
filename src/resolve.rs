//! Assemble the ordered list of tags to push

use crate::{alias, error::*, PushPlan, Repository, Tag, Version};
use std::{fs, path::Path};

/// Where the tags of one invocation come from
#[derive(Debug, Clone, Default)]
pub struct TagSources<'a> {
    /// Static tag configured on the resource
    pub source_tag: Option<&'a str>,
    /// Semantic version to publish
    pub version: Option<&'a str>,
    /// Move `latest`, `<major>` and `<major>.<minor>` to the version if it is the newest
    pub bump_aliases: bool,
    /// Build flavor suffixed to version and alias tags
    pub variant: Option<&'a str>,
    /// File listing extra tag names separated by whitespace
    pub additional_tags: Option<&'a Path>,
}

/// Resolve tags in the order: static tag, version, aliases, additional tags
///
/// `list_remote` is called at most once, and only when aliases are bumped for
/// a release version.
pub fn resolve<F>(repository: &Repository, sources: &TagSources, list_remote: F) -> Result<PushPlan>
where
    F: FnOnce() -> Result<Vec<String>>,
{
    let mut tags = Vec::new();

    if let Some(tag) = sources.source_tag.filter(|t| !t.is_empty()) {
        tags.push(Tag::new(repository, tag)?);
    }

    if let Some(version) = sources.version.filter(|v| !v.is_empty()) {
        let mut version = Version::parse(version)?;
        version.variant = sources
            .variant
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);
        tags.push(Tag::new(repository, &version.label())?);

        if sources.bump_aliases && !version.is_prerelease() {
            let remote = list_remote().map_err(|e| Error::RemoteListFailed(Box::new(e)))?;
            let decision = alias::plan(&version, remote.iter().map(String::as_str));
            log::debug!("alias bump for {}: {:?}", version.label(), decision);
            for label in decision.aliases(&version) {
                tags.push(Tag::new(repository, &label)?);
            }
        }
    }

    if let Some(path) = sources.additional_tags {
        for label in read_additional_tags(path)? {
            tags.push(Tag::new(repository, &label)?);
        }
    }

    PushPlan::new(tags)
}

/// Read whitespace separated tag names
pub fn read_additional_tags(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| Error::AdditionalTags {
        path: path.to_owned(),
        source,
    })?;
    Ok(content.split_whitespace().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, env};

    fn repo() -> Repository {
        Repository::parse("ghcr.io/concourse/imgpush").unwrap()
    }

    fn no_remote() -> Result<Vec<String>> {
        panic!("remote must not be listed")
    }

    fn remote(tags: &[&str]) -> impl FnOnce() -> Result<Vec<String>> {
        let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
        move || Ok(tags)
    }

    #[test]
    fn first_release() -> Result<()> {
        let sources = TagSources {
            source_tag: Some(""),
            version: Some("1.0.0"),
            bump_aliases: true,
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, remote(&[]))?;
        assert_eq!(plan.labels(), ["1.0.0", "latest", "1", "1.0"]);
        Ok(())
    }

    #[test]
    fn nothing_to_push() {
        let sources = TagSources::default();
        assert!(matches!(
            resolve(&repo(), &sources, no_remote),
            Err(Error::NoTagsResolved)
        ));
    }

    #[test]
    fn static_tag_only() -> Result<()> {
        let sources = TagSources {
            source_tag: Some("edge"),
            bump_aliases: true,
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, no_remote)?;
        assert_eq!(plan.labels(), ["edge"]);
        Ok(())
    }

    #[test]
    fn static_tag_first() -> Result<()> {
        let sources = TagSources {
            source_tag: Some("edge"),
            version: Some("v2.1.0"),
            bump_aliases: true,
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, remote(&["2.1.1", "1.0.0"]))?;
        assert_eq!(plan.primary().label(), "edge");
        // `v` prefix is not preserved
        assert_eq!(plan.labels(), ["edge", "2.1.0"]);
        Ok(())
    }

    #[test]
    fn without_bump_remote_is_not_listed() -> Result<()> {
        let sources = TagSources {
            version: Some("1.2.3"),
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, no_remote)?;
        assert_eq!(plan.labels(), ["1.2.3"]);
        Ok(())
    }

    #[test]
    fn prerelease_does_not_bump() -> Result<()> {
        let sources = TagSources {
            version: Some("1.2.3-rc.1"),
            bump_aliases: true,
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, no_remote)?;
        assert_eq!(plan.labels(), ["1.2.3-rc.1"]);
        Ok(())
    }

    #[test]
    fn remote_is_listed_once() -> Result<()> {
        let calls = Cell::new(0);
        let sources = TagSources {
            version: Some("1.2.3"),
            bump_aliases: true,
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, || {
            calls.set(calls.get() + 1);
            Ok(vec!["1.3.0".to_string()])
        })?;
        assert_eq!(calls.get(), 1);
        assert_eq!(plan.labels(), ["1.2.3", "1.2"]);
        Ok(())
    }

    #[test]
    fn variant() -> Result<()> {
        let sources = TagSources {
            version: Some("1.2.3"),
            bump_aliases: true,
            variant: Some("alpine"),
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, remote(&["1.2.2-alpine", "3.0.0"]))?;
        assert_eq!(
            plan.labels(),
            ["1.2.3-alpine", "alpine", "1-alpine", "1.2-alpine"]
        );
        Ok(())
    }

    #[test]
    fn invalid_version() {
        let sources = TagSources {
            version: Some("not-a-version"),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&repo(), &sources, no_remote),
            Err(Error::InvalidVersion(_))
        ));
    }

    #[test]
    fn remote_list_failure_is_fatal() {
        let sources = TagSources {
            version: Some("1.2.3"),
            bump_aliases: true,
            ..Default::default()
        };
        let res = resolve(&repo(), &sources, || Err(Error::RateLimited));
        assert!(matches!(res, Err(Error::RemoteListFailed(_))));
    }

    #[test]
    fn additional_tags() -> Result<()> {
        let path = env::temp_dir().join(format!("imgpush-tags-{}", uuid::Uuid::new_v4()));
        fs::write(&path, "  extra1\nextra2\t extra3 \n\n")?;
        let sources = TagSources {
            version: Some("1.0.0"),
            additional_tags: Some(&path),
            ..Default::default()
        };
        let plan = resolve(&repo(), &sources, no_remote);
        fs::remove_file(&path)?;
        assert_eq!(plan?.labels(), ["1.0.0", "extra1", "extra2", "extra3"]);
        Ok(())
    }

    #[test]
    fn additional_tags_only() -> Result<()> {
        let path = env::temp_dir().join(format!("imgpush-tags-{}", uuid::Uuid::new_v4()));
        fs::write(&path, "   \n")?;
        let sources = TagSources {
            additional_tags: Some(&path),
            ..Default::default()
        };
        let res = resolve(&repo(), &sources, no_remote);
        fs::remove_file(&path)?;
        assert!(matches!(res, Err(Error::NoTagsResolved)));
        Ok(())
    }

    #[test]
    fn missing_additional_tags_file() {
        let path = Path::new("/nonexistent/imgpush/tags");
        let sources = TagSources {
            source_tag: Some("latest"),
            additional_tags: Some(path),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&repo(), &sources, no_remote),
            Err(Error::AdditionalTags { .. })
        ));
    }
}
