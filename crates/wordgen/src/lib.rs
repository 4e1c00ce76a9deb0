//! Word Supplier: produces the unique uppercase words a board is built from.
//!
//! An external [`WordGenerator`] is tried first when one is configured. Any
//! failure (transport, malformed output, too few words) is logged and
//! replaced by a uniform draw from the built-in pool, so
//! [`WordSupplier::supply`] itself never fails.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub mod fallback;
mod http;

pub use http::{HttpGeneratorConfig, HttpWordGenerator, DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("word generator request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed word generator response: {0}")]
    Malformed(String),
    #[error("word generator returned {actual} usable words, need {expected}")]
    NotEnoughWords { expected: usize, actual: usize },
}

#[async_trait]
pub trait WordGenerator: Send + Sync {
    /// Returns the raw candidate words. Validation happens in [`WordSupplier`].
    async fn generate(
        &self,
        theme_hint: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, GeneratorError>;
}

#[derive(Clone, Default)]
pub struct WordSupplier {
    generator: Option<Arc<dyn WordGenerator>>,
}

impl WordSupplier {
    pub fn fallback_only() -> Self {
        Self { generator: None }
    }

    pub fn with_generator(generator: Arc<dyn WordGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn supply(&self, theme_hint: Option<&str>, count: usize) -> Vec<String> {
        if let Some(generator) = &self.generator {
            let generated = generator
                .generate(theme_hint, count)
                .await
                .and_then(|raw| normalize_words(raw, count));
            match generated {
                Ok(words) => {
                    debug!(count, theme = theme_hint.unwrap_or(""), "generated words");
                    return words;
                }
                Err(error) => warn!(%error, "word generation failed; using fallback pool"),
            }
        }
        fallback::draw(count)
    }
}

/// Trims and uppercases, drops blanks and duplicates (keeping first occurrence), and
/// keeps the first `count`. Fails when fewer than `count` remain.
pub fn normalize_words(raw: Vec<String>, count: usize) -> Result<Vec<String>, GeneratorError> {
    let mut seen = HashSet::new();
    let words: Vec<String> = raw
        .into_iter()
        .map(|word| word.trim().to_uppercase())
        .filter(|word| !word.is_empty() && seen.insert(word.clone()))
        .take(count)
        .collect();
    if words.len() < count {
        return Err(GeneratorError::NotEnoughWords {
            expected: count,
            actual: words.len(),
        });
    }
    Ok(words)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
