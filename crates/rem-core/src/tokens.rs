//! Deterministic token estimation per tokenizer profile.
//!
//! Each profile charges a fixed number of UTF-8 bytes per token, rounded up.
//! The estimate is a pure function of the text and the profile, and never
//! decreases as the text grows.

use std::fmt;
use std::str::FromStr;

use rem_models::Message;
use rem_traits::{RemError, Result};

/// Per-message framing cost charged by chat APIs.
pub const DEFAULT_MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Named tokenizer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenizerProfile {
    Cl100kBase,
    O200kBase,
    Claude,
    Gemini,
    Llama,
}

impl TokenizerProfile {
    pub const ALL: [TokenizerProfile; 5] = [
        TokenizerProfile::Cl100kBase,
        TokenizerProfile::O200kBase,
        TokenizerProfile::Claude,
        TokenizerProfile::Gemini,
        TokenizerProfile::Llama,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TokenizerProfile::Cl100kBase => "cl100k_base",
            TokenizerProfile::O200kBase => "o200k_base",
            TokenizerProfile::Claude => "claude",
            TokenizerProfile::Gemini => "gemini",
            TokenizerProfile::Llama => "llama",
        }
    }

    /// Average bytes per token as a `(numerator, denominator)` ratio.
    fn bytes_per_token(&self) -> (usize, usize) {
        match self {
            TokenizerProfile::Cl100kBase => (4, 1),
            TokenizerProfile::O200kBase => (9, 2),
            TokenizerProfile::Claude => (7, 2),
            TokenizerProfile::Gemini => (4, 1),
            TokenizerProfile::Llama => (19, 5),
        }
    }

    /// Resolve a profile name or a model name by family prefix.
    pub fn resolve(model: &str) -> Result<Self> {
        let normalized = model.trim().to_ascii_lowercase();
        if let Some(profile) = Self::ALL.into_iter().find(|p| p.name() == normalized) {
            return Ok(profile);
        }

        const PREFIXES: [(&str, TokenizerProfile); 12] = [
            ("gpt-4o", TokenizerProfile::O200kBase),
            ("gpt-4.1", TokenizerProfile::O200kBase),
            ("o1", TokenizerProfile::O200kBase),
            ("o3", TokenizerProfile::O200kBase),
            ("o4", TokenizerProfile::O200kBase),
            ("gpt-4", TokenizerProfile::Cl100kBase),
            ("gpt-3.5", TokenizerProfile::Cl100kBase),
            ("text-embedding-3", TokenizerProfile::Cl100kBase),
            ("claude", TokenizerProfile::Claude),
            ("gemini", TokenizerProfile::Gemini),
            ("llama", TokenizerProfile::Llama),
            ("mistral", TokenizerProfile::Llama),
        ];

        PREFIXES
            .into_iter()
            .find(|(prefix, _)| normalized.starts_with(prefix))
            .map(|(_, profile)| profile)
            .ok_or_else(|| {
                RemError::validation(format!("Unsupported model profile '{}'", model))
            })
    }

    /// Tokens for a byte count.
    pub fn estimate_bytes(&self, bytes: usize) -> usize {
        let (num, den) = self.bytes_per_token();
        (bytes * den).div_ceil(num)
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_bytes(text.len())
    }
}

impl fmt::Display for TokenizerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenizerProfile {
    type Err = RemError;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

/// Estimate tokens of `text` under a profile or model name.
pub fn estimate_tokens(text: &str, model_profile: &str) -> Result<usize> {
    Ok(TokenizerProfile::resolve(model_profile)?.estimate(text))
}

/// Message-level estimator: content estimate plus a fixed overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimator {
    profile: TokenizerProfile,
    message_overhead: usize,
}

impl TokenEstimator {
    pub fn new(profile: TokenizerProfile, message_overhead: usize) -> Self {
        Self {
            profile,
            message_overhead,
        }
    }

    pub fn for_model(model_profile: &str, message_overhead: usize) -> Result<Self> {
        Ok(Self::new(
            TokenizerProfile::resolve(model_profile)?,
            message_overhead,
        ))
    }

    pub fn profile(&self) -> TokenizerProfile {
        self.profile
    }

    pub fn message_overhead(&self) -> usize {
        self.message_overhead
    }

    pub fn estimate_text(&self, text: &str) -> usize {
        self.profile.estimate(text)
    }

    /// Content and tool name, plus the framing overhead.
    pub fn estimate_message(&self, message: &Message) -> usize {
        let bytes = message.text().len() + message.tool_name.as_deref().map_or(0, str::len);
        self.profile.estimate_bytes(bytes) + self.message_overhead
    }

    pub fn estimate_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(TokenizerProfile::Cl100kBase, DEFAULT_MESSAGE_OVERHEAD_TOKENS)
    }
}
