//! Token estimation.

use anyhow::Result;
use tracing::debug;

/// Token counter trait for counting budget units in text.
///
/// Implementations must be pure: the same text always yields the same count.
pub trait TokenCounter: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;

    /// Short identifier used in logs.
    fn name(&self) -> &str {
        "tokens"
    }
}

/// Exact counter backed by a tiktoken BPE.
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
    model: String,
}

impl TiktokenCounter {
    /// Counter with the cl100k_base encoding (GPT-4/ChatGPT).
    pub fn new() -> Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::cl100k_base()?,
            model: "cl100k_base".to_string(),
        })
    }

    /// Counter for a specific model, falling back to cl100k_base when the
    /// model has no known encoding.
    pub fn for_model(model: &str) -> Result<Self> {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Ok(Self {
                bpe,
                model: model.to_string(),
            }),
            Err(e) => {
                debug!(model = %model, error = %e, "No encoding for model, using cl100k_base");
                Self::new()
            }
        }
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Offline estimate: roughly four bytes per token, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateCounter {
    bytes_per_token: usize,
}

impl ApproximateCounter {
    pub fn new() -> Self {
        Self { bytes_per_token: 4 }
    }

    pub fn with_ratio(bytes_per_token: usize) -> Self {
        Self {
            bytes_per_token: bytes_per_token.max(1),
        }
    }
}

impl Default for ApproximateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for ApproximateCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.len().div_ceil(self.bytes_per_token)
    }

    fn name(&self) -> &str {
        "approximate"
    }
}
