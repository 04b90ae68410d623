use crate::schemes::Label;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt::Display,
    iter::Enumerate,
    ops::{Deref, DerefMut},
    slice::Iter,
};

mod autodetect;
mod projection;

// Re-exporting
pub use autodetect::AutoDetectError;
pub use projection::{project, project_plain, CharSpan, SpanNotFoundError};

/// An entity represent a named object found in a sentence. It contains a start and an end (i.e.
/// at what index of the token list does it start and end, both inclusive) and a tag, which is
/// the type of the entity (such as `NAME`, `DATE`, `ID`, etc.). The optional `sent_id` is the
/// index of the sentence the entity was found in.
#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntitySpan<'a> {
    pub sent_id: Option<usize>,
    pub start: usize,
    pub end: usize,
    pub tag: Cow<'a, str>,
}

impl<'a> EntitySpan<'a> {
    pub fn new<S: Into<Cow<'a, str>>>(start: usize, end: usize, tag: S) -> Self {
        EntitySpan {
            sent_id: None,
            start,
            end,
            tag: tag.into(),
        }
    }

    pub fn in_sentence(mut self, sent_id: usize) -> Self {
        self.sent_id = Some(sent_id);
        self
    }

    pub fn into_owned(self) -> EntitySpan<'static> {
        EntitySpan {
            sent_id: self.sent_id,
            start: self.start,
            end: self.end,
            tag: Cow::Owned(self.tag.into_owned()),
        }
    }

    /// Number of tokens covered by the entity.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

impl<'a> Display for EntitySpan<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sent_id {
            Some(id) => write!(f, "({}, {}, {}, {})", id, self.tag, self.start, self.end),
            None => write!(f, "({}, {}, {})", self.tag, self.start, self.end),
        }
    }
}

/// This struct walks over the labels of a *single* sentence and returns the entities found in
/// it. It is a two state machine: either outside of an entity, or inside an open entity
/// `(start, end, type)`.
///
/// The decoding is lenient: an `Inside` label without a preceding `Begin` opens a new entity,
/// and the type of an `Inside` label replaces the type of the open entity.
pub(crate) struct ChunkIter<'a> {
    labels: Enumerate<Iter<'a, Label>>,
    open: Option<(usize, usize, &'a str)>,
    sent_id: Option<usize>,
}

impl<'a> ChunkIter<'a> {
    pub(crate) fn new(labels: &'a [Label], sent_id: Option<usize>) -> Self {
        ChunkIter {
            labels: labels.iter().enumerate(),
            open: None,
            sent_id,
        }
    }

    fn flush(&mut self) -> Option<EntitySpan<'a>> {
        self.open.take().map(|(start, end, tag)| EntitySpan {
            sent_id: self.sent_id,
            start,
            end,
            tag: Cow::Borrowed(tag),
        })
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = EntitySpan<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some((index, label)) = self.labels.next() else {
                // End of the sentence, flush whatever is still open.
                return self.flush();
            };
            match label {
                Label::Outside => {
                    if let Some(entity) = self.flush() {
                        return Some(entity);
                    }
                }
                Label::Begin(tag) => {
                    let previous = self.flush();
                    self.open = Some((index, index, tag.as_str()));
                    if previous.is_some() {
                        return previous;
                    }
                }
                Label::Inside(tag) => match self.open.as_mut() {
                    Some(open) => {
                        open.1 = index;
                        open.2 = tag.as_str();
                    }
                    None => self.open = Some((index, index, tag.as_str())),
                },
            }
        }
    }
}

/// Converts the canonical labels of one sentence into its entities (token indices, inclusive
/// end). This function never fails.
///
/// * `labels`: Canonical labels of a single sentence.
pub fn decode(labels: &[Label]) -> Vec<EntitySpan<'_>> {
    ChunkIter::new(labels, None).collect()
}

/// Renders non-overlapping entities as canonical labels over `len` tokens. Entities must be
/// sorted, within bounds and must not overlap; tokens not covered are `Outside`.
pub fn encode_bio(len: usize, entities: &[EntitySpan<'_>]) -> Vec<Label> {
    let mut labels = vec![Label::Outside; len];
    for entity in entities {
        if entity.start >= len {
            continue;
        }
        let tag = entity.tag.to_string();
        labels[entity.start] = Label::Begin(tag.clone());
        for label in labels.iter_mut().take(entity.end + 1).skip(entity.start + 1) {
            *label = Label::Inside(tag.clone());
        }
    }
    labels
}

#[derive(Debug, PartialEq, Clone, Default)]
/// The entities of a corpus, one inner vector per sentence. Every entity carries the index of
/// its sentence.
pub struct Entities<'a>(Vec<Vec<EntitySpan<'a>>>);

impl<'a> Deref for Entities<'a> {
    type Target = Vec<Vec<EntitySpan<'a>>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl<'a> DerefMut for Entities<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'a> IntoIterator for Entities<'a> {
    type Item = EntitySpan<'a>;
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Vec<EntitySpan<'a>>>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter().flatten()
    }
}

impl<'a> FromIterator<Vec<EntitySpan<'a>>> for Entities<'a> {
    fn from_iter<T: IntoIterator<Item = Vec<EntitySpan<'a>>>>(iter: T) -> Self {
        Entities(iter.into_iter().collect())
    }
}

impl<'a> Entities<'a> {
    pub(crate) fn new(entities: Vec<Vec<EntitySpan<'a>>>) -> Self {
        Entities(entities)
    }

    /// Decodes every sentence of a corpus, tagging each entity with its sentence index.
    pub fn decode_all<L: AsRef<[Label]>>(sentences: &'a [L]) -> Self {
        sentences
            .iter()
            .enumerate()
            .map(|(i, labels)| ChunkIter::new(labels.as_ref(), Some(i)).collect())
            .collect()
    }

    /// Iterates over the entities of every sentence.
    pub fn flat_iter(&self) -> impl Iterator<Item = &EntitySpan<'a>> {
        self.0.iter().flat_map(|v| v.iter())
    }

    /// Total number of entities in the corpus.
    pub fn count(&self) -> usize {
        self.0.iter().map(|v| v.len()).sum()
    }

    /// Returns the entities of the given type in a HashSet.
    ///
    /// * `tag_name`: Only the entities whose tag is equal to `tag_name` are kept.
    pub fn filter<S: AsRef<str>>(&self, tag_name: S) -> AHashSet<&EntitySpan<'a>> {
        let tag_name_ref = tag_name.as_ref();
        self.flat_iter().filter(|e| e.tag == tag_name_ref).collect()
    }

    /// Number of entities of the given type.
    pub fn filter_count<S: AsRef<str>>(&self, tag_name: S) -> usize {
        let tag_name_ref = tag_name.as_ref();
        self.flat_iter().filter(|e| e.tag == tag_name_ref).count()
    }

    pub fn unique_tags(&self) -> AHashSet<&str> {
        self.flat_iter().map(|e| &*e.tag).collect()
    }
}
