//! Update strategies
//!
//! Each strategy orders the filtered candidate tags its own way and returns
//! the first one that publishes an image for the requested platform.
//! Registry access goes through [`TagInspector`] so strategies can be tested
//! without a registry.

mod digest;
mod name;
mod semver;
mod timestamp;

pub use self::digest::DigestSelector;
pub use self::name::NameSelector;
pub use self::semver::{parse_version, SemVerSelector, VersionConstraint};
pub use self::timestamp::LatestTimestampSelector;

use crate::tags::TagSet;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imgtag_core::{Context, Platform, UpdateStrategy};
use tracing::debug;

/// Per-tag registry lookups needed by the strategies
#[async_trait]
pub trait TagInspector: Send + Sync {
    /// Whether `tag` publishes an image for `platform`
    async fn supports_platform(
        &self,
        ctx: &Context,
        tag: &str,
        platform: &Platform,
    ) -> Result<bool>;

    /// Build time of `tag`, for `platform` when one is given
    async fn created_at(
        &self,
        ctx: &Context,
        tag: &str,
        platform: Option<&Platform>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Manifest digest `tag` currently points at
    async fn digest(&self, ctx: &Context, tag: &str) -> Result<String>;
}

/// Why a strategy produced no tag
#[derive(Debug)]
pub enum SelectError {
    /// Nothing eligible; the message says why
    NoSuitableTag(String),
    /// A registry lookup failed or was interrupted
    Inspect(anyhow::Error),
}

impl From<anyhow::Error> for SelectError {
    fn from(err: anyhow::Error) -> Self {
        SelectError::Inspect(err)
    }
}

/// A strategy for choosing one tag out of a candidate set
#[async_trait]
pub trait TagSelector: Send + Sync {
    fn strategy(&self) -> UpdateStrategy;

    /// Pick the best tag in `tags` for `platform`
    async fn select(
        &self,
        ctx: &Context,
        tags: &TagSet,
        platform: Option<&Platform>,
        inspector: &dyn TagInspector,
    ) -> Result<String, SelectError>;
}

/// Build the selector for `strategy`, validating `constraint` up front
pub fn selector_for(strategy: UpdateStrategy, constraint: &str) -> Result<Box<dyn TagSelector>> {
    Ok(match strategy {
        UpdateStrategy::SemVer => Box::new(SemVerSelector::new(constraint)?),
        UpdateStrategy::Name => Box::new(NameSelector::new(constraint)?),
        UpdateStrategy::LatestTimestamp => Box::new(LatestTimestampSelector::new(constraint)?),
        UpdateStrategy::Digest => Box::new(DigestSelector::new(constraint)),
    })
}

/// First tag of `ordered` available for `platform`
///
/// Without a platform the first tag wins outright. Probing stops at the
/// first supported tag.
pub(crate) async fn first_supported(
    ctx: &Context,
    ordered: &[&str],
    platform: Option<&Platform>,
    inspector: &dyn TagInspector,
) -> Result<Option<String>> {
    for &tag in ordered {
        let Some(platform) = platform else {
            return Ok(Some(tag.to_string()));
        };
        if inspector.supports_platform(ctx, tag, platform).await? {
            return Ok(Some(tag.to_string()));
        }
        debug!("tag {} has no image for {}", tag, platform);
    }
    Ok(None)
}

/// Reason text for candidates that exist but none of which fit the platform
pub(crate) fn no_platform_match(candidates: usize, platform: Option<&Platform>) -> SelectError {
    match platform {
        Some(platform) => SelectError::NoSuitableTag(format!(
            "none of {} candidate tags has an image for {}",
            candidates, platform
        )),
        None => SelectError::NoSuitableTag("no candidate tags".to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_selector_for_each_strategy() {
        for strategy in [
            UpdateStrategy::SemVer,
            UpdateStrategy::Name,
            UpdateStrategy::LatestTimestamp,
            UpdateStrategy::Digest,
        ] {
            let selector = selector_for(strategy, "").unwrap();
            assert_eq!(selector.strategy(), strategy);
        }
    }

    #[test]
    fn test_selector_for_rejects_bad_constraints() {
        assert!(selector_for(UpdateStrategy::SemVer, "not a range").is_err());
        assert!(selector_for(UpdateStrategy::Name, "([").is_err());
    }

    #[tokio::test]
    async fn test_first_supported_stops_at_first_match() {
        let inspector = FakeInspector::default()
            .with_platforms("3", &["linux/arm64"])
            .with_platforms("2", &["linux/amd64"])
            .with_platforms("1", &["linux/amd64"]);

        let found = first_supported(
            &Context::background(),
            &["3", "2", "1"],
            Some(&platform("linux/amd64")),
            &inspector,
        )
        .await
        .unwrap();

        assert_eq!(found.as_deref(), Some("2"));
        assert_eq!(inspector.probed(), vec!["3", "2"]);
    }

    #[tokio::test]
    async fn test_first_supported_without_platform_skips_probing() {
        let inspector = FakeInspector::default();
        let found = first_supported(&Context::background(), &["b", "a"], None, &inspector)
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("b"));
        assert!(inspector.probed().is_empty());
    }
}
