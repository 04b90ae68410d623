use crate::schemes::{SchemeType, UserPrefix};
use ahash::AHashSet;
use enum_iterator::all;
use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutoDetectError {
    #[error("no scheme allows every prefix found in the input: {0}")]
    NoSchemeMatched(String),
    #[error("no prefixed tag found in the input")]
    EmptyInput,
}

/// We can try to auto-detect the notation a tagger writes its tags in. This allows a caller to
/// feed the output of a tagger to `normalize_with` without knowing its notation in advance.
impl SchemeType {
    /// Collects the prefixes used in `sequences` and returns the first scheme (IOB2, then IOBES,
    /// then BILOU) whose allowed prefixes contain all of them. Tags without a recognised prefix
    /// are ignored.
    pub fn detect<S: AsRef<str>, V: AsRef<[S]>>(
        sequences: &[V],
    ) -> Result<SchemeType, AutoDetectError> {
        let prefixes: AHashSet<UserPrefix> = sequences
            .iter()
            .flat_map(|v| v.as_ref().iter())
            .filter_map(|tag| match tag.as_ref() {
                "O" => Some(UserPrefix::O),
                t => UserPrefix::split(t).map(|(p, _)| p),
            })
            .collect();
        if prefixes.is_empty() {
            return Err(AutoDetectError::EmptyInput);
        }
        all::<SchemeType>()
            .find(|scheme| {
                let allowed = scheme.allowed_prefixes();
                prefixes.iter().all(|p| allowed.contains(p))
            })
            .ok_or_else(|| {
                let found = prefixes.iter().sorted().join(", ");
                AutoDetectError::NoSchemeMatched(found)
            })
    }
}
