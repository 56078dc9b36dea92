//! Digest-tracking strategy

use super::{SelectError, TagInspector, TagSelector};
use crate::tags::TagSet;
use async_trait::async_trait;
use imgtag_core::{Context, Platform, UpdateStrategy};

const DEFAULT_TAG: &str = "latest";

/// Follow a mutable tag by its content digest
///
/// The constraint names the tracked tag (`latest` when empty). The result is
/// `<tag>@<digest>`, so callers notice when the tag is re-pushed.
#[derive(Debug, Clone)]
pub struct DigestSelector {
    tag: String,
}

impl DigestSelector {
    pub fn new(constraint: &str) -> Self {
        let tag = constraint.trim();
        Self {
            tag: if tag.is_empty() { DEFAULT_TAG } else { tag }.to_string(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

#[async_trait]
impl TagSelector for DigestSelector {
    fn strategy(&self) -> UpdateStrategy {
        UpdateStrategy::Digest
    }

    async fn select(
        &self,
        ctx: &Context,
        tags: &TagSet,
        platform: Option<&Platform>,
        inspector: &dyn TagInspector,
    ) -> Result<String, SelectError> {
        if !tags.contains(&self.tag) {
            return Err(SelectError::NoSuitableTag(format!(
                "tag {:?} is not among the candidate tags",
                self.tag
            )));
        }

        if let Some(platform) = platform {
            if !inspector.supports_platform(ctx, &self.tag, platform).await? {
                return Err(SelectError::NoSuitableTag(format!(
                    "tag {:?} has no image for {}",
                    self.tag, platform
                )));
            }
        }

        let digest = inspector.digest(ctx, &self.tag).await?;
        Ok(format!("{}@{}", self.tag, digest))
    }
}
