//! Commit message normalization
//!
//! Turns raw commit messages (and search queries) into the normalized terms
//! stored in the index. The same normalizer must be used at index time and at
//! query time, otherwise lookups silently miss.

use serde::{Deserialize, Serialize};
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter,
    TextAnalyzer, TokenStream,
};

/// Longest token kept; anything longer is almost always a hash or a blob
const MAX_TOKEN_LEN: usize = 40;

/// Output of normalizing one message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedMessage {
    /// Normalized tokens in message order (duplicates preserved)
    pub tokens: Vec<String>,
    /// Tokens joined with a single space
    pub joined: String,
}

impl NormalizedMessage {
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let joined = tokens.join(" ");
        Self { tokens, joined }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens with duplicates removed, first occurrence order kept
    pub fn distinct_tokens(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tokens
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect()
    }
}

/// Deterministic text normalizer
pub trait TokenNormalizer: Send + Sync {
    /// Normalize a raw message. Must be a pure function of its input.
    fn normalize(&self, raw: &str) -> NormalizedMessage;

    /// Identifier recorded in logs
    fn name(&self) -> &str;
}

/// English normalizer: word tokenization, lower-casing, English stop word
/// removal, alphabetic-only filtering and Snowball stemming
#[derive(Clone)]
pub struct EnglishNormalizer {
    analyzer: TextAnalyzer,
}

impl EnglishNormalizer {
    pub fn new() -> Self {
        let stop_words = StopWordFilter::new(Language::English).unwrap_or_else(|| {
            tracing::warn!("English stop word list unavailable, keeping all words");
            StopWordFilter::remove(Vec::<String>::new())
        });

        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(stop_words)
            .filter(Stemmer::new(Language::English))
            .build();

        Self { analyzer }
    }
}

impl Default for EnglishNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenNormalizer for EnglishNormalizer {
    fn normalize(&self, raw: &str) -> NormalizedMessage {
        // token_stream needs &mut, the analyzer is cheap to clone
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(raw);

        let mut tokens = Vec::new();
        while stream.advance() {
            let text = &stream.token().text;
            if !text.is_empty() && text.chars().all(char::is_alphabetic) {
                tokens.push(text.clone());
            }
        }

        NormalizedMessage::from_tokens(tokens)
    }

    fn name(&self) -> &str {
        "english"
    }
}
