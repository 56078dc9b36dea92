//! Lexical strategy

use super::{first_supported, no_platform_match, SelectError, TagInspector, TagSelector};
use crate::tags::TagSet;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use imgtag_core::{Context, Platform, UpdateStrategy};
use regex::Regex;

/// Lexically greatest tag, for date-stamped or sequential tag schemes
///
/// A non-empty constraint is a regex candidates must match.
#[derive(Debug, Clone)]
pub struct NameSelector {
    pattern: Option<Regex>,
}

impl NameSelector {
    pub fn new(constraint: &str) -> Result<Self> {
        Ok(Self {
            pattern: compile_optional(constraint)?,
        })
    }
}

/// Compile `constraint` as a regex unless it is blank
pub(crate) fn compile_optional(constraint: &str) -> Result<Option<Regex>> {
    let constraint = constraint.trim();
    if constraint.is_empty() {
        return Ok(None);
    }
    Regex::new(constraint)
        .map(Some)
        .with_context(|| format!("invalid tag pattern {:?}", constraint))
}

#[async_trait]
impl TagSelector for NameSelector {
    fn strategy(&self) -> UpdateStrategy {
        UpdateStrategy::Name
    }

    async fn select(
        &self,
        ctx: &Context,
        tags: &TagSet,
        platform: Option<&Platform>,
        inspector: &dyn TagInspector,
    ) -> Result<String, SelectError> {
        let ranked: Vec<&str> = tags
            .iter()
            .rev()
            .filter(|tag| self.pattern.as_ref().is_none_or(|re| re.is_match(tag)))
            .collect();

        if ranked.is_empty() {
            return Err(SelectError::NoSuitableTag(
                "no tag matches the name pattern".to_string(),
            ));
        }

        let count = ranked.len();
        first_supported(ctx, &ranked, platform, inspector)
            .await?
            .ok_or_else(|| no_platform_match(count, platform))
    }
}
