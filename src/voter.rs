/**
Majority vote over the outputs of several taggers for the same sentence.
*/
use crate::datastructure::{LengthMismatchError, Prediction, TaggedSequence, Token};
use crate::error::{EnsembleError, Result};
use crate::schemes::{normalize, normalize_with, Label, MalformedTagError};
use ahash::AHashMap;
use std::borrow::Cow;
use thiserror::Error;
use tracing::debug;

/// Two taggers disagree on the text of a token, so they did not tag the same token stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("tagger {tagger} has token {found:?} at position {position}, expected {expected:?}")]
pub struct TokenMismatchError {
    pub tagger: usize,
    pub position: usize,
    pub expected: String,
    pub found: String,
}

fn check_alignment(predictions: &[Prediction]) -> Result<&Prediction> {
    let first = predictions.first().ok_or(EnsembleError::EmptyInput)?;
    for (tagger, prediction) in predictions.iter().enumerate().skip(1) {
        if prediction.len() != first.len() {
            return Err(LengthMismatchError {
                index: tagger,
                expected: first.len(),
                found: prediction.len(),
            }
            .into());
        }
        let mismatch = first
            .tokens()
            .iter()
            .zip(prediction.tokens())
            .position(|(expected, found)| expected != found);
        if let Some(position) = mismatch {
            return Err(TokenMismatchError {
                tagger,
                position,
                expected: first.tokens()[position].clone(),
                found: prediction.tokens()[position].clone(),
            }
            .into());
        }
    }
    Ok(first)
}

fn normalized(
    prediction: &Prediction,
) -> std::result::Result<Vec<Cow<'_, str>>, MalformedTagError> {
    match prediction.scheme {
        Some(scheme) => normalize_with(scheme, prediction.tags()),
        None => normalize(prediction.tags()),
    }
}

/// Picks the consensus tag at `position`. Ties go to the tagger that comes first in
/// `sequences`.
fn elect<'a>(sequences: &'a [Vec<Cow<'_, str>>], position: usize) -> Option<&'a str> {
    let mut counts: AHashMap<&str, usize> = AHashMap::with_capacity(sequences.len());
    for seq in sequences {
        *counts.entry(seq[position].as_ref()).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for seq in sequences {
        let tag = seq[position].as_ref();
        let count = counts.get(&tag).copied().unwrap_or(0);
        // Strictly greater: the first tagger to reach the maximum keeps it.
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((tag, count));
        }
    }
    best.map(|(tag, _)| tag)
}

/// Merges the predictions of several taggers into one consensus sequence.
///
/// `predictions` must be sorted by priority, highest first. At each token, the tags of every
/// tagger are normalized to BIO (with the notation of each prediction) and the most frequent
/// tag wins. When several tags share the highest count, the tag of the highest-priority tagger
/// among them wins, so the result only depends on the input and its order.
///
/// The token texts of the result are those shared by every tagger. A winning tag with an
/// unknown prefix (such as `X-ID`) does not mark an entity and becomes `Label::Outside`. The
/// vote only fails on misaligned predictions and on tags too short to carry a prefix.
///
/// * `predictions`: The output of every tagger for the same sentence, by priority.
pub fn vote(predictions: &[Prediction]) -> Result<TaggedSequence> {
    let first = check_alignment(predictions)?;
    let sequences = predictions
        .iter()
        .map(normalized)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut tokens = Vec::with_capacity(first.len());
    for (position, text) in first.tokens().iter().enumerate() {
        let tag = elect(&sequences, position).ok_or(EnsembleError::EmptyInput)?;
        let label = tag.parse::<Label>().unwrap_or_else(|_| {
            debug!(tag, position, "unknown prefix won the vote, reading it as O");
            Label::Outside
        });
        tokens.push(Token::new(text.as_str(), label));
    }
    Ok(TaggedSequence::new(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemes::tests::RawTag;
    use crate::schemes::SchemeType;
    use quickcheck::{Arbitrary, QuickCheck, TestResult};
    use rstest::rstest;

    fn prediction(tokens: &[&str], tags: &[&str]) -> Prediction {
        Prediction::try_new(tokens.to_vec(), tags.to_vec()).unwrap()
    }

    fn single(tags: &[&str]) -> Vec<Prediction> {
        tags.iter().map(|t| prediction(&["12/03"], &[*t])).collect()
    }

    #[rstest]
    #[case(&["B-DATE", "B-DATE", "O"], "B-DATE")]
    #[case(&["O", "B-DATE", "B-DATE"], "B-DATE")]
    #[case(&["B-DATE", "B-AGE", "B-ID"], "B-DATE")]
    #[case(&["B-ID", "B-AGE", "B-DATE"], "B-ID")]
    #[case(&["O", "B-AGE", "B-AGE", "O"], "O")]
    #[case(&["S-DATE", "B-DATE", "O"], "B-DATE")]
    #[case(&["O"], "O")]
    fn test_vote_single_token(#[case] tags: &[&str], #[case] expected: &str) {
        let actual = vote(&single(tags)).unwrap();
        assert_eq!(actual[0].label.to_string(), expected);
        assert_eq!(actual[0].text, "12/03");
    }

    #[test]
    fn test_vote_sequence() {
        let tokens = ["Seen", "John", "Smith", "today"];
        let predictions = vec![
            prediction(&tokens, &["O", "B-NAME", "I-NAME", "O"]),
            prediction(&tokens, &["O", "B-NAME", "E-NAME", "S-DATE"]),
            prediction(&tokens, &["O", "O", "U-NAME", "O"]),
        ];
        let actual = vote(&predictions).unwrap();
        let labels: Vec<String> = actual.labels().iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["O", "B-NAME", "I-NAME", "O"]);
        assert_eq!(actual.texts(), tokens.to_vec());
    }

    #[test]
    fn test_vote_uses_prediction_scheme() {
        // An IOBES tagger does not write `U-`, so its tag stays distinct from `B-ID`.
        let predictions = vec![
            prediction(&["x"], &["B-AGE"]),
            prediction(&["x"], &["U-ID"]).with_scheme(Some(SchemeType::IOBES)),
            prediction(&["x"], &["U-ID"]).with_scheme(Some(SchemeType::BILOU)),
        ];
        let actual = vote(&predictions).unwrap();
        assert_eq!(actual[0].label, Label::Begin(String::from("AGE")));

        let any_notation: Vec<Prediction> = predictions
            .into_iter()
            .map(|p| p.with_scheme(None))
            .collect();
        let actual = vote(&any_notation).unwrap();
        assert_eq!(actual[0].label, Label::Begin(String::from("ID")));
    }

    #[test]
    fn test_vote_empty_input() {
        assert_eq!(vote(&[]), Err(EnsembleError::EmptyInput));
    }

    #[test]
    fn test_vote_length_mismatch_names_tagger() {
        let predictions = vec![
            prediction(&["a", "b"], &["O", "O"]),
            prediction(&["a", "b"], &["O", "O"]),
            prediction(&["a"], &["O"]),
        ];
        assert_eq!(
            vote(&predictions),
            Err(EnsembleError::LengthMismatch(LengthMismatchError {
                index: 2,
                expected: 2,
                found: 1
            }))
        );
    }

    #[test]
    fn test_vote_token_mismatch() {
        let predictions = vec![
            prediction(&["John", "Smith"], &["B-NAME", "I-NAME"]),
            prediction(&["John", "Smyth"], &["B-NAME", "I-NAME"]),
        ];
        assert_eq!(
            vote(&predictions),
            Err(EnsembleError::TokenMismatch(TokenMismatchError {
                tagger: 1,
                position: 1,
                expected: String::from("Smith"),
                found: String::from("Smyth"),
            }))
        );
    }

    #[test]
    fn test_vote_malformed_tag() {
        let predictions = vec![prediction(&["a", "b"], &["O", "B"])];
        assert_eq!(
            vote(&predictions),
            Err(EnsembleError::MalformedTag(MalformedTagError::new("B").at(1)))
        );
    }

    #[test]
    fn test_vote_unknown_prefix_is_outside() {
        let actual = vote(&single(&["X-ID", "X-ID", "O"])).unwrap();
        assert_eq!(actual[0].label, Label::Outside);

        let tokens = ["Seen", "John", "Smith"];
        let predictions = vec![
            prediction(&tokens, &["X-ID", "B-NAME", "I-NAME"]),
            prediction(&tokens, &["X-ID", "B-NAME", "I-NAME"]),
            prediction(&tokens, &["O", "B-NAME", "OTHER"]),
        ];
        let labels: Vec<String> = vote(&predictions)
            .unwrap()
            .labels()
            .iter()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(labels, vec!["O", "B-NAME", "I-NAME"]);
    }

    /// Between two and five taggers over the same tokens.
    #[derive(Debug, Clone)]
    struct Votes(Vec<Vec<RawTag>>);

    impl Arbitrary for Votes {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let taggers = usize::arbitrary(g) % 4 + 2;
            let len = usize::arbitrary(g) % 10;
            let tags = (0..taggers)
                .map(|_| {
                    (0..len)
                        .map(|_| loop {
                            let tag = RawTag::arbitrary(g);
                            if tag != RawTag::XId {
                                break tag;
                            }
                        })
                        .collect::<Vec<RawTag>>()
                })
                .collect();
            Votes(tags)
        }
    }

    impl Votes {
        fn predictions(&self) -> Vec<Prediction> {
            self.0
                .iter()
                .map(|tags| {
                    let raw: Vec<&str> = tags.iter().map(|t| (*t).into()).collect();
                    let tokens: Vec<String> = (0..raw.len()).map(|i| format!("t{}", i)).collect();
                    Prediction::try_new(tokens, raw).unwrap()
                })
                .collect()
        }

        /// Number of taggers agreeing with `label` at `position`.
        fn support(&self, position: usize, label: &Label) -> usize {
            self.0
                .iter()
                .filter(|tags| {
                    let raw: &str = tags[position].into();
                    raw.parse::<Label>().unwrap() == *label
                })
                .count()
        }
    }

    #[test]
    fn test_propertie_vote_is_deterministic_and_order_only_breaks_ties() {
        fn check(votes: Votes) -> TestResult {
            let predictions = votes.predictions();
            let first = vote(&predictions).unwrap();
            let again = vote(&predictions).unwrap();
            let mut reversed_predictions = predictions.clone();
            reversed_predictions.reverse();
            let reversed = vote(&reversed_predictions).unwrap();
            let same_support = first.iter().zip(reversed.iter()).enumerate().all(|(i, (a, b))| {
                votes.support(i, &a.label) == votes.support(i, &b.label)
            });
            TestResult::from_bool(first == again && same_support)
        }
        let mut qc = QuickCheck::new().tests(1000);
        qc.quickcheck(check as fn(Votes) -> TestResult)
    }
}
