//! Merge configuration read from the environment

use crate::artifacts::merge::options::FastForwardStrategy;
use crate::artifacts::objects::commit::Author;
use anyhow::Context;

/// Fast-forward preference: `true`, `false` or `only`
pub const FAST_FORWARD_KEY: &str = "BIT_MERGE_FF";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeConfig {
    /// `None` when nothing is configured (fast-forward is then preferred)
    pub fast_forward: Option<FastForwardStrategy>,
    pub author: Option<Author>,
}

impl MergeConfig {
    /// Load configuration from environment variables
    ///
    /// Reads BIT_MERGE_FF, and GIT_AUTHOR_NAME / GIT_AUTHOR_EMAIL /
    /// GIT_AUTHOR_DATE for the merge commit identity.
    pub fn load_from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MergeConfig::load_from_env`], reading keys through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let fast_forward = lookup(FAST_FORWARD_KEY)
            .map(|value| parse_fast_forward(&value))
            .transpose()
            .with_context(|| format!("invalid {}", FAST_FORWARD_KEY))?;

        // an incomplete identity is the same as none
        let author = Author::from_lookup(&lookup).ok();

        Ok(MergeConfig {
            fast_forward,
            author,
        })
    }

    /// Strategy the `Default` strategy stands for
    pub fn resolve(&self, requested: FastForwardStrategy) -> FastForwardStrategy {
        match requested {
            FastForwardStrategy::Default => self.fast_forward.unwrap_or(FastForwardStrategy::Default),
            explicit => explicit,
        }
    }
}

fn parse_fast_forward(value: &str) -> anyhow::Result<FastForwardStrategy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(FastForwardStrategy::Default),
        "false" | "no" | "0" => Ok(FastForwardStrategy::NoFastForward),
        "only" => Ok(FastForwardStrategy::FastForwardOnly),
        other => Err(anyhow::anyhow!("expected true, false or only, got '{}'", other)),
    }
}
