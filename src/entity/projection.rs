/*
 * Projection of labeled tokens onto the raw text of their sentence. The offsets produced here
 * are only used for annotation and display, never for scoring.
 */
use crate::datastructure::{is_whitespace, Token};
use crate::schemes::Label;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

/// An entity located in the raw text of a sentence. `start` and `end` count characters (Unicode
/// scalar values) from the beginning of the sentence text, end exclusive, so the surface form of
/// the entity is `text.chars().skip(start).take(end - start)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
    pub tag: String,
}

impl Display for CharSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.start, self.end, self.tag)
    }
}

/// The text of a token could not be found in the sentence at or after the cursor. The
/// tokenization and the text do not match.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("token {token:?} not found in the sentence text at or after byte {cursor}")]
pub struct SpanNotFoundError {
    pub token: String,
    /// Byte offset where the search started.
    pub cursor: usize,
}

fn is_blank(token: &Token) -> bool {
    token.text.is_empty() || is_whitespace(&token.text)
}

/// An entity with both its byte range, for slicing, and its character span.
type Located = (Range<usize>, CharSpan);

/// Walks the tokens of a single sentence. The cursor never moves backward and never outlives
/// the sentence. `cursor` is a byte offset and `chars` the number of characters before it.
struct Projector<'a> {
    text: &'a str,
    cursor: usize,
    chars: usize,
    run: Vec<&'a Token>,
    tag: Option<&'a str>,
}

impl<'a> Projector<'a> {
    fn new(text: &'a str) -> Self {
        Projector {
            text,
            cursor: 0,
            chars: 0,
            run: Vec::new(),
            tag: None,
        }
    }

    /// Byte offset of the first occurrence of `needle` at or after `from`.
    fn locate(&self, needle: &str, from: usize) -> Result<usize, SpanNotFoundError> {
        self.text
            .get(from..)
            .and_then(|rest| rest.find(needle))
            .map(|i| i + from)
            .ok_or_else(|| SpanNotFoundError {
                token: String::from(needle),
                cursor: from,
            })
    }

    /// Closes the open entity, if any. Returns `None` when nothing was open or when the entity
    /// only contained whitespace.
    fn close(&mut self) -> Result<Option<Located>, SpanNotFoundError> {
        let Some(tag) = self.tag.take() else {
            return Ok(None);
        };
        if self.run.last().is_some_and(|t| is_blank(t)) {
            self.run.pop();
        }
        let (first, last) = match (self.run.first(), self.run.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                debug!(tag, "discarding whitespace-only entity");
                return Ok(None);
            }
        };
        let start = self.locate(&first.text, self.cursor)?;
        // The last token of a longer entity comes after the first one.
        let from = if self.run.len() > 1 {
            start + first.text.len()
        } else {
            start
        };
        let end = self.locate(&last.text, from)? + last.text.len();
        let char_start = self.chars + self.text[self.cursor..start].chars().count();
        let char_end = char_start + self.text[start..end].chars().count();
        self.run.clear();
        self.cursor = end;
        self.chars = char_end;
        Ok(Some((
            start..end,
            CharSpan {
                start: char_start,
                end: char_end,
                tag: String::from(tag),
            },
        )))
    }

    fn run(mut self, tokens: &'a [Token]) -> Result<Vec<Located>, SpanNotFoundError> {
        let mut spans = Vec::new();
        for token in tokens {
            match &token.label {
                Label::Begin(tag) => {
                    spans.extend(self.close()?);
                    self.tag = Some(tag.as_str());
                    if !is_blank(token) {
                        self.run.push(token);
                    }
                }
                Label::Inside(_) if self.tag.is_some() => self.run.push(token),
                Label::Inside(_) => {}
                Label::Outside => spans.extend(self.close()?),
            }
        }
        spans.extend(self.close()?);
        Ok(spans)
    }
}

/// Maps the entities of one sentence onto character offsets of its raw text.
///
/// An entity starts at a `Begin` label and extends through the following `Inside` labels; it
/// takes the type of its `Begin` label. A whitespace `Begin` token and one trailing whitespace
/// token are left out of the entity, and an entity made only of whitespace is dropped. The first
/// token of each entity is searched for in `text` with a forward-only cursor placed after the
/// previous entity, which keeps duplicated substrings from matching an earlier occurrence. The
/// last token is searched for after the first one. This is a heuristic, not an alignment: a
/// token text that also appears between the cursor and the real position of the entity will be
/// matched too early, and the tokens between the first and the last are never looked up.
///
/// * `text`: Raw text of the sentence.
/// * `tokens`: Tokens of the sentence, with canonical labels.
pub fn project(text: &str, tokens: &[Token]) -> Result<Vec<CharSpan>, SpanNotFoundError> {
    Ok(Projector::new(text)
        .run(tokens)?
        .into_iter()
        .map(|(_, span)| span)
        .collect())
}

/// Same as `project`, but returns the surface text of each entity along with its type.
pub fn project_plain<'a>(
    text: &'a str,
    tokens: &[Token],
) -> Result<Vec<(&'a str, String)>, SpanNotFoundError> {
    Ok(Projector::new(text)
        .run(tokens)?
        .into_iter()
        .map(|(bytes, span)| (&text[bytes], span.tag))
        .collect())
}
