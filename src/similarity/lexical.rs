use super::SimilarityOracle;
use crate::error::SimilarityError;
use async_trait::async_trait;

/// Offline oracle based on normalized edit distance
///
/// `1 - levenshtein(a, b) / max(len(a), len(b))`. Catches spelling variants
/// and shared stems; has no notion of synonyms.
#[derive(Debug, Default, Clone)]
pub struct LexicalOracle;

impl LexicalOracle {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SimilarityOracle for LexicalOracle {
    async fn similarity(&self, a: &str, b: &str) -> Result<f32, SimilarityError> {
        Ok(normalized_similarity(a, b))
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

pub(crate) fn normalized_similarity(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f32 / max_len as f32
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    if s1_chars.is_empty() {
        return s2_chars.len();
    }
    if s2_chars.is_empty() {
        return s1_chars.len();
    }

    // Two rolling rows instead of the full matrix
    let mut prev: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut curr = vec![0usize; s2_chars.len() + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[s2_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("crash", "crash"), 0);
    }

    #[test]
    fn test_normalized_similarity_bounds() {
        assert_eq!(normalized_similarity("bug", "bug"), 1.0);
        assert_eq!(normalized_similarity("", ""), 1.0);
        assert_eq!(normalized_similarity("abc", "xyz"), 0.0);
        let s = normalized_similarity("crash", "crush");
        assert!(s > 0.7 && s < 1.0);
    }

    #[tokio::test]
    async fn test_oracle_is_symmetric() {
        let oracle = LexicalOracle::new();
        let ab = oracle.similarity("parser", "parse").await.unwrap();
        let ba = oracle.similarity("parse", "parser").await.unwrap();
        assert_eq!(ab, ba);
    }
}
