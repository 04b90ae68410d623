use crate::schemes::{Label, SchemeType};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::slice::Iter;
use thiserror::Error;

/// Two sequences that should line up do not have the same length.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("sequence {index} has length {found}, expected {expected}")]
pub struct LengthMismatchError {
    /// Index of the offending sequence (tagger position, or sentence count mismatch).
    pub index: usize,
    pub expected: usize,
    pub found: usize,
}

/// A token and its canonical label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub label: Label,
}

impl Token {
    pub fn new<S: Into<String>>(text: S, label: Label) -> Self {
        Token {
            text: text.into(),
            label,
        }
    }

    /// True if the text of the token is made only of whitespace. An empty token is *not*
    /// whitespace.
    pub fn is_whitespace(&self) -> bool {
        is_whitespace(&self.text)
    }
}

pub(crate) fn is_whitespace(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_whitespace)
}

/// The labeled tokens of one sentence. Token order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaggedSequence(Vec<Token>);

impl TaggedSequence {
    pub fn new(tokens: Vec<Token>) -> Self {
        TaggedSequence(tokens)
    }

    /// Zips the token texts with their labels.
    pub fn try_from_parts<S: Into<String>>(
        texts: Vec<S>,
        labels: Vec<Label>,
    ) -> Result<Self, LengthMismatchError> {
        if texts.len() != labels.len() {
            return Err(LengthMismatchError {
                index: 0,
                expected: texts.len(),
                found: labels.len(),
            });
        }
        Ok(TaggedSequence(
            texts
                .into_iter()
                .zip(labels)
                .map(|(t, l)| Token::new(t, l))
                .collect(),
        ))
    }

    pub fn labels(&self) -> Vec<Label> {
        self.0.iter().map(|t| t.label.clone()).collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.0.iter().map(|t| t.text.as_str()).collect()
    }

    pub fn iter(&self) -> Iter<'_, Token> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Token> {
        self.0
    }
}

impl Deref for TaggedSequence {
    type Target = [Token];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for TaggedSequence {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Token>> for TaggedSequence {
    fn from(value: Vec<Token>) -> Self {
        TaggedSequence(value)
    }
}

impl<'a> IntoIterator for &'a TaggedSequence {
    type Item = &'a Token;
    type IntoIter = Iter<'a, Token>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The raw output of one tagger for one sentence: the tokens it tagged and the tags it emitted,
/// possibly in a source-specific notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub(crate) tokens: Vec<String>,
    pub(crate) tags: Vec<String>,
    /// Notation the tags are written in. `None` accepts any notation.
    pub(crate) scheme: Option<SchemeType>,
}

impl Prediction {
    /// Fails if the tagger did not emit exactly one tag per token.
    pub fn try_new<T, U>(tokens: Vec<T>, tags: Vec<U>) -> Result<Self, LengthMismatchError>
    where
        T: Into<String>,
        U: Into<String>,
    {
        if tokens.len() != tags.len() {
            return Err(LengthMismatchError {
                index: 0,
                expected: tokens.len(),
                found: tags.len(),
            });
        }
        Ok(Prediction {
            tokens: tokens.into_iter().map(Into::into).collect(),
            tags: tags.into_iter().map(Into::into).collect(),
            scheme: None,
        })
    }

    pub fn with_scheme(mut self, scheme: Option<SchemeType>) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
