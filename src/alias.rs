//! Decide which floating alias tags follow a newly published version
//!
//! Alias tags are `latest`, `<major>` and `<major>.<minor>`. They are moved to
//! the new version only when no release already on the registry is newer
//! within the alias's range, so that an alias never goes backwards.
//!
//! The remote listing and the following push are not atomic. Another
//! publisher may push in between, so alias convergence is best-effort.

use crate::Version;
use std::cmp::Ordering;

/// Kind of floating alias tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasKind {
    Latest,
    Major,
    Minor,
}

impl AliasKind {
    /// Tag label of this alias for the target version
    ///
    /// | kind   | no variant | variant `v` |
    /// |--------|------------|-------------|
    /// | Latest | `latest`   | `v`         |
    /// | Major  | `1`        | `1-v`       |
    /// | Minor  | `1.4`      | `1.4-v`     |
    pub fn label(&self, target: &Version) -> String {
        let variant = target.variant.as_deref().filter(|v| !v.is_empty());
        let base = match self {
            AliasKind::Latest => match variant {
                Some(variant) => return variant.to_string(),
                None => "latest".to_string(),
            },
            AliasKind::Major => target.major.to_string(),
            AliasKind::Minor => format!("{}.{}", target.major, target.minor),
        };
        crate::version::with_variant(base, variant)
    }
}

/// Which aliases should be (re)pointed to the target version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasBumpDecision {
    pub bump_latest: bool,
    pub bump_major: bool,
    pub bump_minor: bool,
}

impl Default for AliasBumpDecision {
    fn default() -> Self {
        AliasBumpDecision {
            bump_latest: true,
            bump_major: true,
            bump_minor: true,
        }
    }
}

impl AliasBumpDecision {
    /// Alias kinds to be bumped, in the order `latest`, major, minor
    pub fn kinds(&self) -> Vec<AliasKind> {
        [
            (self.bump_latest, AliasKind::Latest),
            (self.bump_major, AliasKind::Major),
            (self.bump_minor, AliasKind::Minor),
        ]
        .into_iter()
        .filter_map(|(bump, kind)| bump.then(|| kind))
        .collect()
    }

    /// Alias tag labels to be pushed for the target version
    pub fn aliases(&self, target: &Version) -> Vec<String> {
        self.kinds().iter().map(|k| k.label(target)).collect()
    }

    fn observe(&mut self, target: &Version, remote: &Version) {
        if remote.cmp_precedence(target) == Ordering::Greater {
            self.bump_latest = false;
        }
        if remote.major == target.major && remote.minor > target.minor {
            self.bump_major = false;
        }
        if remote.major == target.major
            && remote.minor == target.minor
            && remote.patch > target.patch
        {
            self.bump_minor = false;
            self.bump_major = false;
        }
    }
}

/// Decide alias bumps for `target` against the tags already on the registry
///
/// Each remote tag is parsed with the target's variant suffix stripped.
/// Tags which do not parse, belong to another variant, or are prereleases
/// are ignored. The result does not depend on the order of `remote`.
///
/// With a variant set, plain releases without the `-<variant>` suffix do not
/// hold back the variant's aliases.
pub fn plan<'a>(
    target: &Version,
    remote: impl IntoIterator<Item = &'a str>,
) -> AliasBumpDecision {
    let variant = target.variant.as_deref();
    let mut decision = AliasBumpDecision::default();
    for tag in remote {
        let remote = match Version::parse_with_variant(tag, variant) {
            Ok(v) => v,
            Err(_) => {
                log::debug!("skip non-version tag {}", tag);
                continue;
            }
        };
        if remote.is_prerelease() {
            continue;
        }
        decision.observe(target, &remote);
    }
    decision
}
