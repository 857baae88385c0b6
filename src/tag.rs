use crate::{distribution::Reference, error::*, Repository};
use std::fmt;

/// A tag to be written on the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub repository: Repository,
    pub label: Reference,
}

impl Tag {
    pub fn new(repository: &Repository, label: &str) -> Result<Self> {
        Ok(Tag {
            repository: repository.clone(),
            label: Reference::new(label)?,
        })
    }

    pub fn label(&self) -> &str {
        self.label.as_str()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.label)
    }
}

/// Ordered tags to push in one invocation
///
/// The plan is never empty, and the first tag is the primary one reported
/// back as the resulting version. Duplicated labels are kept as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPlan {
    tags: Vec<Tag>,
}

impl PushPlan {
    pub fn new(tags: Vec<Tag>) -> Result<Self> {
        if tags.is_empty() {
            return Err(Error::NoTagsResolved);
        }
        Ok(PushPlan { tags })
    }

    pub fn primary(&self) -> &Tag {
        &self.tags[0]
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn labels(&self) -> Vec<&str> {
        self.tags.iter().map(Tag::label).collect()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan() -> Result<()> {
        let repo = Repository::parse("ghcr.io/termoshtt/ocipkg")?;
        assert!(matches!(PushPlan::new(Vec::new()), Err(Error::NoTagsResolved)));

        let plan = PushPlan::new(vec![Tag::new(&repo, "1.0.0")?, Tag::new(&repo, "latest")?])?;
        assert_eq!(plan.primary().label(), "1.0.0");
        assert_eq!(plan.labels(), ["1.0.0", "latest"]);
        assert_eq!(plan.primary().to_string(), "ghcr.io/termoshtt/ocipkg:1.0.0");

        assert!(Tag::new(&repo, "bad tag").is_err());
        Ok(())
    }
}
