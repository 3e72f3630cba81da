//! Text analysis for the suggestion index.
//!
//! Analysis turns surface text into a graph of tokens. The default
//! [`StandardAnalyzer`] runs a Tantivy pipeline:
//! 1. `SimpleTokenizer` - splits on whitespace and punctuation
//! 2. `LowerCaser` - converts tokens to lowercase
//! 3. `RemoveLongFilter` - removes overlong tokens
//! 4. `StopWordFilter` - removes configured stop words (optional)
//! 5. `Stemmer` - applies language-specific stemming (optional)
//!
//! Removed stop words keep their positions, so the surviving tokens carry
//! position increments larger than one. Those gaps become position holes in
//! the token automaton.

use sift_config::AnalysisSettings;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter,
    TextAnalyzer,
};

use crate::SuggestError;

/// One node of a token graph.
///
/// Tokens are ordered by start position. A `position_increment` of zero
/// stacks the token on the previous position (a synonym); a value above one
/// skips positions, leaving holes behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphToken {
    /// Token text.
    pub text: String,
    /// Distance in positions from the previous token's start.
    pub position_increment: usize,
    /// Number of positions this token spans.
    pub position_length: usize,
}

impl GraphToken {
    /// Creates a token that advances one position and spans one position.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position_increment: 1,
            position_length: 1,
        }
    }

    /// Sets the position increment.
    pub fn with_increment(mut self, position_increment: usize) -> Self {
        self.position_increment = position_increment;
        self
    }

    /// Sets the position length.
    pub fn with_length(mut self, position_length: usize) -> Self {
        self.position_length = position_length;
        self
    }
}

/// Turns text into a token graph.
///
/// Implementations must be deterministic: the same text always yields the
/// same tokens, otherwise exact-match detection at lookup time breaks.
pub trait Analyzer: Send + Sync {
    /// Analyzes `text` into tokens ordered by start position.
    fn analyze(&self, text: &str) -> Vec<GraphToken>;
}

impl<F> Analyzer for F
where
    F: Fn(&str) -> Vec<GraphToken> + Send + Sync,
{
    fn analyze(&self, text: &str) -> Vec<GraphToken> {
        self(text)
    }
}

/// Analyzer backed by a Tantivy `TextAnalyzer`.
#[derive(Clone)]
pub struct StandardAnalyzer {
    /// The underlying pipeline; cloned per call because streaming needs `&mut`.
    inner: TextAnalyzer,
}

impl StandardAnalyzer {
    /// Builds the analyzer described by `settings`.
    pub fn from_settings(settings: &AnalysisSettings) -> Result<Self, SuggestError> {
        let language = settings
            .stemmer
            .as_deref()
            .map(parse_language)
            .transpose()?;
        Ok(Self {
            inner: build_analyzer(language, &settings.stop_words, settings.max_token_length),
        })
    }

    /// Wraps an existing Tantivy analyzer.
    pub fn new(inner: TextAnalyzer) -> Self {
        Self { inner }
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<GraphToken> {
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        let mut previous: Option<usize> = None;

        while let Some(token) = stream.next() {
            let position_increment = match previous {
                Some(prev) => token.position.saturating_sub(prev),
                None => token.position.saturating_add(1),
            };
            previous = Some(token.position);
            tokens.push(GraphToken {
                text: token.text.clone(),
                position_increment,
                position_length: token.position_length.max(1),
            });
        }

        tokens
    }
}

/// Parses a stemmer language string into a Tantivy `Language`.
///
/// Supports lowercase language names matching Tantivy's `Language` enum.
/// Returns an error if the language is not recognized.
pub fn parse_language(name: &str) -> Result<Language, SuggestError> {
    match name.to_lowercase().as_str() {
        "arabic" => Ok(Language::Arabic),
        "danish" => Ok(Language::Danish),
        "dutch" => Ok(Language::Dutch),
        "english" => Ok(Language::English),
        "finnish" => Ok(Language::Finnish),
        "french" => Ok(Language::French),
        "german" => Ok(Language::German),
        "greek" => Ok(Language::Greek),
        "hungarian" => Ok(Language::Hungarian),
        "italian" => Ok(Language::Italian),
        "norwegian" => Ok(Language::Norwegian),
        "portuguese" => Ok(Language::Portuguese),
        "romanian" => Ok(Language::Romanian),
        "russian" => Ok(Language::Russian),
        "spanish" => Ok(Language::Spanish),
        "swedish" => Ok(Language::Swedish),
        "tamil" => Ok(Language::Tamil),
        "turkish" => Ok(Language::Turkish),
        other => Err(SuggestError::InvalidLanguage(other.to_string())),
    }
}

/// Builds the Tantivy pipeline.
///
/// Tokens of up to `max_token_length` bytes are kept. Each optional stage
/// changes the builder's type, so the four shapes are spelled out.
pub fn build_analyzer(
    language: Option<Language>,
    stop_words: &[String],
    max_token_length: usize,
) -> TextAnalyzer {
    let base = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(RemoveLongFilter::limit(max_token_length.saturating_add(1)));

    match (language, stop_words.is_empty()) {
        (Some(language), true) => base.filter(Stemmer::new(language)).build(),
        (Some(language), false) => base
            .filter(StopWordFilter::remove(stop_words.to_vec()))
            .filter(Stemmer::new(language))
            .build(),
        (None, true) => base.build(),
        (None, false) => base
            .filter(StopWordFilter::remove(stop_words.to_vec()))
            .build(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn texts(tokens: &[GraphToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!(parse_language("English").unwrap(), Language::English);
        assert_eq!(parse_language("FRENCH").unwrap(), Language::French);
        assert_eq!(parse_language("GeRmAn").unwrap(), Language::German);
    }

    #[test]
    fn parse_invalid_language() {
        let err = parse_language("klingon").unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn default_settings_lowercase_without_stemming() {
        let analyzer = StandardAnalyzer::from_settings(&AnalysisSettings::default()).unwrap();
        let tokens = analyzer.analyze("New York Yankees");

        assert_eq!(texts(&tokens), vec!["new", "york", "yankees"]);
        assert!(tokens.iter().all(|t| t.position_increment == 1));
        assert!(tokens.iter().all(|t| t.position_length == 1));
    }

    #[test]
    fn stemmer_applies() {
        let settings = AnalysisSettings {
            stemmer: Some("english".to_string()),
            ..AnalysisSettings::default()
        };
        let analyzer = StandardAnalyzer::from_settings(&settings).unwrap();
        assert_eq!(texts(&analyzer.analyze("handling running")), vec!["handl", "run"]);
    }

    #[test]
    fn invalid_stemmer_is_rejected() {
        let settings = AnalysisSettings {
            stemmer: Some("invalid".to_string()),
            ..AnalysisSettings::default()
        };
        assert!(matches!(
            StandardAnalyzer::from_settings(&settings),
            Err(SuggestError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn stop_words_leave_position_gaps() {
        let settings = AnalysisSettings {
            stop_words: vec!["the".to_string(), "of".to_string()],
            ..AnalysisSettings::default()
        };
        let analyzer = StandardAnalyzer::from_settings(&settings).unwrap();
        let tokens = analyzer.analyze("the ghost of christmas past");

        assert_eq!(texts(&tokens), vec!["ghost", "christmas", "past"]);
        let increments: Vec<_> = tokens.iter().map(|t| t.position_increment).collect();
        assert_eq!(increments, vec![2, 2, 1]);
    }

    #[test]
    fn removes_long_tokens() {
        let settings = AnalysisSettings {
            max_token_length: 5,
            ..AnalysisSettings::default()
        };
        let analyzer = StandardAnalyzer::from_settings(&settings).unwrap();
        assert_eq!(texts(&analyzer.analyze("short loooooong word")), vec!["short", "word"]);
        assert_eq!(texts(&analyzer.analyze("shorts")), Vec::<&str>::new());
    }

    #[test]
    fn closures_are_analyzers() {
        let analyzer = |text: &str| vec![GraphToken::new(text)];
        assert_eq!(analyzer.analyze("abc"), vec![GraphToken::new("abc")]);
    }
}
