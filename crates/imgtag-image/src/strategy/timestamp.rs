//! Newest-build strategy

use super::name::compile_optional;
use super::{no_platform_match, SelectError, TagInspector, TagSelector};
use crate::tags::TagSet;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use imgtag_core::{Context, Platform, UpdateStrategy};
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

/// Concurrent config-blob lookups per resolution
const LOOKUP_CONCURRENCY: usize = 4;

/// Most recently built tag, by the `created` time in its image config
///
/// Tags without a recorded build time rank after all dated tags. Ties break
/// lexically. A non-empty constraint is a regex candidates must match.
#[derive(Debug, Clone)]
pub struct LatestTimestampSelector {
    pattern: Option<Regex>,
}

impl LatestTimestampSelector {
    pub fn new(constraint: &str) -> Result<Self> {
        Ok(Self {
            pattern: compile_optional(constraint)?,
        })
    }
}

/// A candidate tag with its build time, if one was recorded
type Dated = (Option<DateTime<Utc>>, String);

fn newest_first(a: &Dated, b: &Dated) -> Ordering {
    let by_time = match (a.0, b.0) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.1.cmp(&b.1))
}

#[async_trait]
impl TagSelector for LatestTimestampSelector {
    fn strategy(&self) -> UpdateStrategy {
        UpdateStrategy::LatestTimestamp
    }

    async fn select(
        &self,
        ctx: &Context,
        tags: &TagSet,
        platform: Option<&Platform>,
        inspector: &dyn TagInspector,
    ) -> Result<String, SelectError> {
        let candidates: Vec<String> = tags
            .iter()
            .filter(|tag| self.pattern.as_ref().is_none_or(|re| re.is_match(tag)))
            .map(str::to_string)
            .collect();

        if candidates.is_empty() {
            return Err(SelectError::NoSuitableTag(
                "no tag matches the name pattern".to_string(),
            ));
        }

        debug!("reading build times of {} tags", candidates.len());
        let mut dated: Vec<Dated> = stream::iter(candidates)
            .map(move |tag| async move {
                let created = inspector.created_at(ctx, &tag, platform).await?;
                Ok::<_, anyhow::Error>((created, tag))
            })
            .buffered(LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;

        dated.sort_by(newest_first);

        // A build time read for the platform implies an image for it
        let count = dated.len();
        for (created, tag) in dated {
            match platform {
                Some(platform) if created.is_none() => {
                    if inspector.supports_platform(ctx, &tag, platform).await? {
                        return Ok(tag);
                    }
                    debug!("tag {} has no image for {}", tag, platform);
                }
                _ => return Ok(tag),
            }
        }
        Err(no_platform_match(count, platform))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_newest_build_wins() {
        let selector = LatestTimestampSelector::new("").unwrap();
        let inspector = FakeInspector::default()
            .with_created("stable", "2024-01-01T00:00:00Z")
            .with_created("edge", "2024-06-01T00:00:00Z")
            .with_created("old", "2023-01-01T00:00:00Z");

        let tag = selector
            .select(
                &Context::background(),
                &tags(&["stable", "edge", "old"]),
                None,
                &inspector,
            )
            .await
            .unwrap();
        assert_eq!(tag, "edge");
    }

    #[tokio::test]
    async fn test_equal_times_break_lexically_and_undated_sort_last() {
        let selector = LatestTimestampSelector::new("").unwrap();
        let inspector = FakeInspector::default()
            .with_created("b", "2024-01-01T00:00:00Z")
            .with_created("a", "2024-01-01T00:00:00Z");

        let tag = selector
            .select(
                &Context::background(),
                &tags(&["a", "b", "0-undated"]),
                None,
                &inspector,
            )
            .await
            .unwrap();
        assert_eq!(tag, "a");
    }

    #[tokio::test]
    async fn test_pattern_and_platform() {
        let selector = LatestTimestampSelector::new("^nightly-").unwrap();
        let inspector = FakeInspector::default()
            .with_created("nightly-2", "2024-02-02T00:00:00Z")
            .with_created("nightly-1", "2024-02-01T00:00:00Z")
            .with_created("release", "2025-01-01T00:00:00Z")
            .with_platforms("nightly-2", &["linux/arm64"])
            .with_platforms("nightly-1", &["linux/amd64"]);

        let tag = selector
            .select(
                &Context::background(),
                &tags(&["nightly-1", "nightly-2", "release"]),
                Some(&platform("linux/amd64")),
                &inspector,
            )
            .await
            .unwrap();
        assert_eq!(tag, "nightly-1");
    }

    #[tokio::test]
    async fn test_dated_winner_is_not_probed_again() {
        let selector = LatestTimestampSelector::new("").unwrap();
        let inspector = FakeInspector::default()
            .with_created("a", "2024-01-01T00:00:00Z")
            .with_created("b", "2024-03-01T00:00:00Z")
            .with_platforms("a", &["linux/amd64"])
            .with_platforms("b", &["linux/amd64"]);

        let tag = selector
            .select(
                &Context::background(),
                &tags(&["a", "b"]),
                Some(&platform("linux/amd64")),
                &inspector,
            )
            .await
            .unwrap();

        assert_eq!(tag, "b");
        assert_eq!(inspector.probed(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_undated_tags_need_platform_check() {
        let selector = LatestTimestampSelector::new("").unwrap();
        let inspector = FakeInspector::default()
            .with_platforms("a", &["linux/arm64"])
            .with_platforms("b", &["linux/amd64"]);

        let tag = selector
            .select(
                &Context::background(),
                &tags(&["a", "b"]),
                Some(&platform("linux/amd64")),
                &inspector,
            )
            .await
            .unwrap();

        assert_eq!(tag, "b");
        assert_eq!(inspector.probed(), vec!["a", "b", "a", "b"]);
    }

    #[tokio::test]
    async fn test_no_tag_for_platform() {
        let selector = LatestTimestampSelector::new("").unwrap();
        let inspector = FakeInspector::default()
            .with_created("a", "2024-01-01T00:00:00Z")
            .with_platforms("a", &["linux/arm64"]);

        let err = selector
            .select(
                &Context::background(),
                &tags(&["a"]),
                Some(&platform("linux/amd64")),
                &inspector,
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, SelectError::NoSuitableTag(reason) if reason.contains("linux/amd64"))
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let selector = LatestTimestampSelector::new("").unwrap();
        let inspector = FakeInspector::default().failing_on("b");
        let err = selector
            .select(&Context::background(), &tags(&["a", "b"]), None, &inspector)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectError::Inspect(_)));
    }
}
