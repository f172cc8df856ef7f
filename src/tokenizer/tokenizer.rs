use rust_stemmers::{Algorithm, Stemmer};
use unicode_segmentation::UnicodeSegmentation;

/// Tokens longer than this (in bytes) are dropped by the word tokenizers
pub const MAX_TOKEN_LEN: usize = 40;

/// Analyzer selected per text field by name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenizerKind {
    /// Unicode words, lowercased
    Default,
    /// The whole value as a single term
    Raw,
    /// Unicode words, lowercased, English Snowball stemming
    EnStem,
    /// Split on whitespace only, case preserved
    Whitespace,
}

impl TokenizerKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(TokenizerKind::Default),
            "raw" => Some(TokenizerKind::Raw),
            "en_stem" => Some(TokenizerKind::EnStem),
            "whitespace" => Some(TokenizerKind::Whitespace),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenizerKind::Default => "default",
            TokenizerKind::Raw => "raw",
            TokenizerKind::EnStem => "en_stem",
            TokenizerKind::Whitespace => "whitespace",
        }
    }
}

/// Text tokenizer
pub struct Tokenizer {
    kind: TokenizerKind,
    stemmer: Option<Stemmer>,
}

impl Tokenizer {
    pub fn new(kind: TokenizerKind) -> Self {
        let stemmer = match kind {
            TokenizerKind::EnStem => Some(Stemmer::create(Algorithm::English)),
            _ => None,
        };
        Self { kind, stemmer }
    }

    /// Look up a tokenizer by its schema name
    pub fn for_name(name: &str) -> Option<Self> {
        TokenizerKind::from_name(name).map(Self::new)
    }

    pub fn kind(&self) -> TokenizerKind {
        self.kind
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenize_with_positions(text)
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    /// Tokenize and return (term, position) pairs in order
    ///
    /// Positions count every word, so a dropped overlong word still leaves a
    /// gap and phrase adjacency stays truthful.
    pub fn tokenize_with_positions(&self, text: &str) -> Vec<(String, u32)> {
        match self.kind {
            TokenizerKind::Raw => vec![(text.to_string(), 0)],
            TokenizerKind::Whitespace => text
                .split_whitespace()
                .enumerate()
                .map(|(pos, word)| (word.to_string(), pos as u32))
                .collect(),
            TokenizerKind::Default | TokenizerKind::EnStem => {
                let mut results = Vec::new();
                for (pos, word) in text.unicode_words().enumerate() {
                    if word.len() > MAX_TOKEN_LEN {
                        continue;
                    }
                    let mut token = word.to_lowercase();
                    if let Some(stemmer) = &self.stemmer {
                        token = stemmer.stem(&token).to_string();
                    }
                    results.push((token, pos as u32));
                }
                results
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tokenization() {
        let tokenizer = Tokenizer::new(TokenizerKind::Default);
        let tokens = tokenizer.tokenize("Hello World! This is a test.");
        assert_eq!(tokens, vec!["hello", "world", "this", "is", "a", "test"]);
    }

    #[test]
    fn test_stemming() {
        let tokenizer = Tokenizer::for_name("en_stem").unwrap();
        let tokens = tokenizer.tokenize("running runs");
        assert_eq!(tokens, vec!["run", "run"]);
    }

    #[test]
    fn test_raw() {
        let tokenizer = Tokenizer::new(TokenizerKind::Raw);
        assert_eq!(tokenizer.tokenize("New York, NY"), vec!["New York, NY"]);
    }

    #[test]
    fn test_whitespace_keeps_case() {
        let tokenizer = Tokenizer::new(TokenizerKind::Whitespace);
        assert_eq!(tokenizer.tokenize("Foo-Bar  baz"), vec!["Foo-Bar", "baz"]);
    }

    #[test]
    fn test_positions_skip_long_words() {
        let tokenizer = Tokenizer::new(TokenizerKind::Default);
        let long = "x".repeat(MAX_TOKEN_LEN + 1);
        let text = format!("rust {} programming", long);
        let ordered = tokenizer.tokenize_with_positions(&text);
        assert_eq!(
            ordered,
            vec![("rust".to_string(), 0), ("programming".to_string(), 2)]
        );
    }

    #[test]
    fn test_unknown_name() {
        assert!(Tokenizer::for_name("klingon").is_none());
        assert_eq!(TokenizerKind::EnStem.name(), "en_stem");
    }
}
