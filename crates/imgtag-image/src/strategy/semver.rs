//! Semantic version strategy

use super::{first_supported, no_platform_match, SelectError, TagInspector, TagSelector};
use crate::tags::TagSet;
use ::semver::{Version, VersionReq};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use imgtag_core::{Context, Platform, UpdateStrategy};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;
use tracing::debug;

static HYPHEN_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+-\s+(\S+)\s*$").expect("hyphen range pattern is valid")
});
static SPACE_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9A-Za-z*])\s+([<>=~^])").expect("comparator separator pattern is valid")
});
static VERSION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[\s,<>=~^])[vV]([0-9*xX])").expect("version prefix pattern is valid")
});

/// Parse a tag as a version, tolerating a leading `v` and short forms like `1.2`
pub fn parse_version(tag: &str) -> Option<Version> {
    let s = tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag);

    if let Ok(version) = Version::parse(s) {
        return Some(version);
    }

    let end = s.find(['-', '+']).unwrap_or(s.len());
    let (core, rest) = s.split_at(end);
    let parts: Vec<&str> = core.split('.').collect();
    let numeric = parts
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    if !numeric {
        return None;
    }

    let padded = match parts.len() {
        1 => format!("{}.0.0{}", core, rest),
        2 => format!("{}.0{}", core, rest),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Precedence order: build metadata is ignored
fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// One or more version ranges joined by `||`
///
/// Comparators inside a range may be separated by commas or spaces, and
/// `A - B` is read as `>=A, <=B`. An empty constraint accepts every version.
#[derive(Debug, Clone, Default)]
pub struct VersionConstraint {
    alternatives: Vec<VersionReq>,
}

impl VersionConstraint {
    pub fn parse(constraint: &str) -> Result<Self> {
        let constraint = constraint.trim();
        if constraint.is_empty() {
            return Ok(Self::default());
        }

        let alternatives = constraint
            .split("||")
            .map(|alt| {
                let normalized = normalize_range(alt);
                VersionReq::parse(&normalized)
                    .with_context(|| format!("invalid version constraint {:?}", alt.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { alternatives })
    }

    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.is_any() || self.alternatives.iter().any(|req| req.matches(version))
    }
}

/// Rewrite one `||` alternative into `semver` crate syntax
fn normalize_range(range: &str) -> String {
    let range = VERSION_PREFIX.replace_all(range.trim(), "${1}${2}");
    if let Some(caps) = HYPHEN_RANGE.captures(&range) {
        return format!(">={}, <={}", &caps[1], &caps[2]);
    }
    SPACE_SEPARATED.replace_all(&range, "$1, $2").into_owned()
}

/// Highest version satisfying the constraint
///
/// Ties between tags of equal precedence (`1.0.0` and `v1.0.0`) go to the
/// lexically smaller tag so the result does not depend on listing order.
#[derive(Debug, Clone)]
pub struct SemVerSelector {
    raw: String,
    constraint: VersionConstraint,
}

impl SemVerSelector {
    pub fn new(constraint: &str) -> Result<Self> {
        Ok(Self {
            raw: constraint.trim().to_string(),
            constraint: VersionConstraint::parse(constraint)?,
        })
    }

    /// Candidate tags in selection order
    pub fn rank<'a>(&self, tags: &'a TagSet) -> Vec<&'a str> {
        let mut candidates: Vec<(Version, &str)> = tags
            .iter()
            .filter_map(|tag| parse_version(tag).map(|v| (v, tag)))
            .filter(|(v, _)| self.constraint.matches(v))
            .collect();

        candidates.sort_by(|(va, ta), (vb, tb)| cmp_precedence(vb, va).then_with(|| ta.cmp(tb)));
        candidates.into_iter().map(|(_, tag)| tag).collect()
    }
}

#[async_trait]
impl TagSelector for SemVerSelector {
    fn strategy(&self) -> UpdateStrategy {
        UpdateStrategy::SemVer
    }

    async fn select(
        &self,
        ctx: &Context,
        tags: &TagSet,
        platform: Option<&Platform>,
        inspector: &dyn TagInspector,
    ) -> Result<String, SelectError> {
        let ranked = self.rank(tags);
        debug!(
            "{} of {} tags satisfy constraint {:?}",
            ranked.len(),
            tags.len(),
            self.raw
        );

        if ranked.is_empty() {
            let reason = if self.constraint.is_any() {
                "no tag is a semantic version".to_string()
            } else {
                format!("no tag satisfies constraint {:?}", self.raw)
            };
            return Err(SelectError::NoSuitableTag(reason));
        }

        let count = ranked.len();
        first_supported(ctx, &ranked, platform, inspector)
            .await?
            .ok_or_else(|| no_platform_match(count, platform))
    }
}
