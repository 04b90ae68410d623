/**
This modules parses the raw tags emitted by the taggers and rewrites the different single-entity
notations (IOBES, BILOU) into the canonical BIO notation.
*/
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Character separating the prefix from the type of a tag (e.g. `B-NAME`).
pub(crate) const DELIMITER: char = '-';

/// A tag violates the minimum-length or notation rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed tag {tag:?} at position {position}")]
pub struct MalformedTagError {
    pub tag: String,
    pub position: usize,
}

impl MalformedTagError {
    pub(crate) fn new<S: Into<String>>(tag: S) -> Self {
        MalformedTagError {
            tag: tag.into(),
            position: 0,
        }
    }

    /// Attaches the index of the offending tag inside its sequence.
    pub(crate) fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Sequence, PartialOrd, Ord)]
/// The prefixes a tagger can emit. All of them are a single ascii character.
pub(crate) enum UserPrefix {
    I,
    O,
    B,
    E,
    S,
    U,
    L,
}

impl TryFrom<char> for UserPrefix {
    type Error = MalformedTagError;
    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'I' => Ok(Self::I),
            'O' => Ok(Self::O),
            'B' => Ok(Self::B),
            'E' => Ok(Self::E),
            'S' => Ok(Self::S),
            'U' => Ok(Self::U),
            'L' => Ok(Self::L),
            _ => Err(MalformedTagError::new(value)),
        }
    }
}

impl UserPrefix {
    fn as_char(&self) -> char {
        match self {
            UserPrefix::I => 'I',
            UserPrefix::O => 'O',
            UserPrefix::B => 'B',
            UserPrefix::E => 'E',
            UserPrefix::S => 'S',
            UserPrefix::U => 'U',
            UserPrefix::L => 'L',
        }
    }

    /// Canonical counterpart of an end-of-entity or single-token prefix.
    fn canonical(&self) -> Option<UserPrefix> {
        match self {
            UserPrefix::E | UserPrefix::L => Some(UserPrefix::I),
            UserPrefix::S | UserPrefix::U => Some(UserPrefix::B),
            _ => None,
        }
    }

    /// Splits `tag` into its prefix and its type. Returns `None` when the tag is not of the form
    /// `<prefix>-<type>` with a known prefix.
    pub(crate) fn split(tag: &str) -> Option<(UserPrefix, &str)> {
        let mut chars = tag.chars();
        let first = chars.next()?;
        if chars.next()? != DELIMITER {
            return None;
        }
        let prefix = UserPrefix::try_from(first).ok()?;
        Some((prefix, &tag[first.len_utf8() + DELIMITER.len_utf8()..]))
    }
}

impl Display for UserPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The source notations understood by the normalizer.
///
/// * IOB2: `B` starts every entity, `I` continues it. This is the canonical notation.
/// * IOBES: IOB2 plus `E` for the last token and `S` for single-token entities.
/// * BILOU: IOB2 plus `L` for the last token and `U` for unit (single-token) entities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence, Serialize, Deserialize,
)]
pub enum SchemeType {
    IOB2,
    IOBES,
    BILOU,
}

impl SchemeType {
    pub(crate) fn allowed_prefixes(&self) -> &'static [UserPrefix] {
        match self {
            SchemeType::IOB2 => &[UserPrefix::I, UserPrefix::O, UserPrefix::B],
            SchemeType::IOBES => &[
                UserPrefix::I,
                UserPrefix::O,
                UserPrefix::B,
                UserPrefix::E,
                UserPrefix::S,
            ],
            SchemeType::BILOU => &[
                UserPrefix::I,
                UserPrefix::O,
                UserPrefix::B,
                UserPrefix::L,
                UserPrefix::U,
            ],
        }
    }

    /// Whether this scheme rewrites `prefix` when converting to BIO.
    fn rewrites(&self, prefix: &UserPrefix) -> bool {
        match self {
            SchemeType::IOB2 => false,
            SchemeType::IOBES => matches!(prefix, UserPrefix::E | UserPrefix::S),
            SchemeType::BILOU => matches!(prefix, UserPrefix::L | UserPrefix::U),
        }
    }
}

impl Display for SchemeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not parse {0:?} into a scheme (expected IOB2, IOBES or BILOU)")]
pub struct ParsingSchemeError(String);

impl FromStr for SchemeType {
    type Err = ParsingSchemeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IOB2" | "BIO" | "BIO2" => Ok(SchemeType::IOB2),
            "IOBES" | "BIOES" => Ok(SchemeType::IOBES),
            "BILOU" | "BIOLU" => Ok(SchemeType::BILOU),
            _ => Err(ParsingSchemeError(String::from(s))),
        }
    }
}

/// Rewrites a single tag. `scheme` restricts which prefixes are rewritten; `None` rewrites every
/// known end-of-entity and single-token prefix.
pub(crate) fn normalize_tag(
    tag: &str,
    scheme: Option<SchemeType>,
) -> Result<Cow<'_, str>, MalformedTagError> {
    if tag == "O" {
        return Ok(Cow::Borrowed(tag));
    }
    if tag.chars().count() < 2 {
        return Err(MalformedTagError::new(tag));
    }
    match UserPrefix::split(tag) {
        Some((prefix, rest)) => {
            let target = prefix
                .canonical()
                .filter(|_| scheme.map_or(true, |s| s.rewrites(&prefix)));
            match target {
                Some(canonical) => Ok(Cow::Owned(format!("{}{}{}", canonical, DELIMITER, rest))),
                None => Ok(Cow::Borrowed(tag)),
            }
        }
        // Unknown prefixes are passed through untouched.
        None => Ok(Cow::Borrowed(tag)),
    }
}

/// Converts a sequence of raw tags written in any of the IOB2, IOBES or BILOU notations into
/// canonical BIO tags. `E-`/`L-` become `I-` and `S-`/`U-` become `B-`. Tags with an unknown
/// prefix are returned unchanged. Fails only on a tag shorter than two characters that is not
/// `O`.
///
/// Normalizing an already canonical sequence returns it unchanged.
///
/// * `tags`: The raw tags of one sentence.
pub fn normalize<S: AsRef<str>>(tags: &[S]) -> Result<Vec<Cow<'_, str>>, MalformedTagError> {
    normalize_inner(tags, None)
}

/// Same as `normalize`, but only rewrites the prefixes belonging to `scheme`. With
/// `SchemeType::IOBES`, an `L-` tag is left as is.
pub fn normalize_with<S: AsRef<str>>(
    scheme: SchemeType,
    tags: &[S],
) -> Result<Vec<Cow<'_, str>>, MalformedTagError> {
    normalize_inner(tags, Some(scheme))
}

fn normalize_inner<S: AsRef<str>>(
    tags: &[S],
    scheme: Option<SchemeType>,
) -> Result<Vec<Cow<'_, str>>, MalformedTagError> {
    tags.iter()
        .enumerate()
        .map(|(i, t)| normalize_tag(t.as_ref(), scheme).map_err(|e| e.at(i)))
        .collect()
}

/// Checks that every tag is written in canonical BIO (`O`, `B-<type>` or `I-<type>`) and
/// reports the first one that is not.
pub fn check_bio<S: AsRef<str>>(tags: &[S]) -> Result<(), MalformedTagError> {
    for (i, tag) in tags.iter().enumerate() {
        let tag = tag.as_ref();
        let is_bio = tag == "O"
            || matches!(UserPrefix::split(tag), Some((UserPrefix::B | UserPrefix::I, t)) if !t.is_empty());
        if !is_bio {
            return Err(MalformedTagError::new(tag).at(i));
        }
    }
    Ok(())
}

/// A canonical tag. `Begin` and `Inside` always carry a non-empty entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Label {
    #[default]
    Outside,
    Begin(String),
    Inside(String),
}

impl Label {
    /// The entity type, or `None` for `Outside`.
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Label::Outside => None,
            Label::Begin(t) | Label::Inside(t) => Some(t),
        }
    }
    pub fn is_outside(&self) -> bool {
        matches!(self, Label::Outside)
    }
    pub fn is_begin(&self) -> bool {
        matches!(self, Label::Begin(_))
    }
    pub fn is_inside(&self) -> bool {
        matches!(self, Label::Inside(_))
    }

    /// Parses every tag of a sequence, attaching the index of the first malformed one.
    pub fn parse_all<S: AsRef<str>>(tags: &[S]) -> Result<Vec<Label>, MalformedTagError> {
        tags.iter()
            .enumerate()
            .map(|(i, t)| t.as_ref().parse::<Label>().map_err(|e| e.at(i)))
            .collect()
    }
}

/// Parses `O`, `B-`, `I-` and the `E-`, `L-`, `S-`, `U-` notations. Any other prefix, or a
/// missing entity type, is rejected.
impl FromStr for Label {
    type Err = MalformedTagError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_tag(s, None)?;
        if normalized == "O" {
            return Ok(Label::Outside);
        }
        match UserPrefix::split(&normalized) {
            Some((_, t)) if t.is_empty() => Err(MalformedTagError::new(s)),
            Some((UserPrefix::B, t)) => Ok(Label::Begin(String::from(t))),
            Some((UserPrefix::I, t)) => Ok(Label::Inside(String::from(t))),
            _ => Err(MalformedTagError::new(s)),
        }
    }
}

impl TryFrom<String> for Label {
    type Error = MalformedTagError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.to_string()
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Outside => write!(f, "O"),
            Label::Begin(t) => write!(f, "{}{}{}", UserPrefix::B, DELIMITER, t),
            Label::Inside(t) => write!(f, "{}{}{}", UserPrefix::I, DELIMITER, t),
        }
    }
}
