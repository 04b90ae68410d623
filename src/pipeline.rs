/**
The ensemble itself: several taggers tag the same sentences, their outputs are merged by a
majority vote, repaired and decoded into entities.
*/
use crate::config::EnsembleConfig;
use crate::datastructure::{LengthMismatchError, Prediction, TaggedSequence, Token};
use crate::entity::{decode, project, project_plain, CharSpan, EntitySpan, SpanNotFoundError};
use crate::error::{EnsembleError, Result};
use crate::metrics::score;
use crate::repair::repair_in_place;
use crate::reporter::ScoreReport;
use crate::schemes::{Label, SchemeType};
use crate::voter::vote;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::{debug, info};

/// A component that assigns one raw tag to every token of a sentence. The tags can be written
/// in any notation understood by the normalizer.
pub trait TokenTagger: Send + Sync {
    /// Name used to refer to this tagger in the priority list.
    fn name(&self) -> &str;

    /// Notation of the tags. `None` falls back to the notation of the ensemble configuration.
    fn scheme(&self) -> Option<SchemeType> {
        None
    }

    /// Must return exactly one tag per token.
    fn tag(&self, tokens: &[String]) -> Vec<String>;
}

/// A sentence before tagging: its raw text and its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenizedSentence {
    pub text: String,
    pub tokens: Vec<String>,
}

impl TokenizedSentence {
    pub fn new<S: Into<String>>(text: S, tokens: Vec<String>) -> Self {
        TokenizedSentence {
            text: text.into(),
            tokens,
        }
    }

    /// Rebuilds the text of the sentence by joining the tokens with a single space.
    pub fn from_tokens<S: Into<String>>(tokens: Vec<S>) -> Self {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        TokenizedSentence {
            text: tokens.join(" "),
            tokens,
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A sentence labeled by the ensemble.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub tokens: TaggedSequence,
}

impl Sentence {
    pub fn labels(&self) -> Vec<Label> {
        self.tokens.labels()
    }

    /// Entities of the sentence, as token indices.
    pub fn spans(&self) -> Vec<EntitySpan<'static>> {
        decode(&self.labels())
            .into_iter()
            .map(EntitySpan::into_owned)
            .collect()
    }

    /// Entities of the sentence, as character offsets into its text.
    pub fn entities(&self) -> std::result::Result<Vec<CharSpan>, SpanNotFoundError> {
        project(&self.text, &self.tokens)
    }

    /// Surface text and type of every entity of the sentence.
    pub fn ents(&self) -> std::result::Result<Vec<(&str, String)>, SpanNotFoundError> {
        project_plain(&self.text, &self.tokens)
    }
}

/// The labeled sentences of a document, in their original order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document(Vec<Sentence>);

impl Document {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Document(sentences)
    }

    /// The canonical labels of every sentence.
    pub fn labels(&self) -> Vec<Vec<Label>> {
        self.0.iter().map(Sentence::labels).collect()
    }

    /// Text of the document, one sentence per line.
    pub fn text(&self) -> String {
        self.0
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_inner(self) -> Vec<Sentence> {
        self.0
    }
}

impl Deref for Document {
    type Target = [Sentence];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Several taggers and the configuration used to merge their outputs.
pub struct Ensemble {
    /// Sorted by priority, highest first.
    taggers: Vec<Box<dyn TokenTagger>>,
    config: EnsembleConfig,
}

impl Ensemble {
    /// Sorts `taggers` by the priority list of `config`. The taggers absent from the list keep
    /// their registration order and come after the listed ones.
    ///
    /// Fails if there is no tagger, if the priority list names an unknown tagger or if it names
    /// the same tagger twice.
    pub fn new(taggers: Vec<Box<dyn TokenTagger>>, config: EnsembleConfig) -> Result<Self> {
        if taggers.is_empty() {
            return Err(EnsembleError::EmptyInput);
        }
        let mut remaining: Vec<Option<Box<dyn TokenTagger>>> =
            taggers.into_iter().map(Some).collect();
        let mut ordered: Vec<Box<dyn TokenTagger>> = Vec::with_capacity(remaining.len());
        for name in config.priority.iter() {
            if ordered.iter().any(|t| t.name() == name.as_str()) {
                return Err(EnsembleError::DuplicateTagger(name.clone()));
            }
            let found = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|t| t.name() == name.as_str()))
                .and_then(Option::take)
                .ok_or_else(|| EnsembleError::UnknownTagger(name.clone()))?;
            ordered.push(found);
        }
        ordered.extend(remaining.into_iter().flatten());
        Ok(Ensemble {
            taggers: ordered,
            config,
        })
    }

    /// Names of the taggers, highest priority first.
    pub fn tagger_names(&self) -> Vec<&str> {
        self.taggers.iter().map(|t| t.name()).collect()
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Labels one sentence. A blank sentence is not sent to the taggers: its tokens, if any, are
    /// all `Outside`.
    pub fn predict_sentence(&self, sentence: &TokenizedSentence) -> Result<Sentence> {
        if sentence.is_blank() {
            let tokens = sentence
                .tokens
                .iter()
                .map(|t| Token::new(t.as_str(), Label::Outside))
                .collect::<Vec<_>>();
            return Ok(Sentence {
                text: sentence.text.clone(),
                tokens: TaggedSequence::new(tokens),
            });
        }
        let predictions = self
            .taggers
            .iter()
            .enumerate()
            .map(|(index, tagger)| {
                let tags = tagger.tag(&sentence.tokens);
                Prediction::try_new(sentence.tokens.clone(), tags)
                    .map(|p| p.with_scheme(tagger.scheme().or(self.config.scheme)))
                    .map_err(|e| LengthMismatchError { index, ..e })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut tokens = vote(&predictions)?;
        if self.config.strip_entity_whitespace {
            let rewrites = repair_in_place(&mut tokens);
            debug!(rewrites, "repaired entity boundaries");
        }
        debug!(tokens = tokens.len(), text = %sentence.text, "predicted sentence");
        Ok(Sentence {
            text: sentence.text.clone(),
            tokens,
        })
    }

    /// Labels every sentence of a document. The sentences are independent of each other and
    /// are processed on the rayon pool when `parallel` is set in the configuration.
    pub fn predict(&self, sentences: &[TokenizedSentence]) -> Result<Document> {
        let sentences = if self.config.parallel {
            sentences
                .par_iter()
                .map(|s| self.predict_sentence(s))
                .collect::<Result<Vec<_>>>()?
        } else {
            sentences
                .iter()
                .map(|s| self.predict_sentence(s))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Document(sentences))
    }

    /// Predicts the gold sentences and scores the prediction against the gold labels. The text
    /// of each sentence is rebuilt by joining its tokens with a single space. Every false
    /// positive and false negative is logged along with the text of its sentence.
    pub fn evaluate(&self, gold: &[TaggedSequence]) -> Result<ScoreReport> {
        let inputs: Vec<TokenizedSentence> = gold
            .iter()
            .map(|s| TokenizedSentence::from_tokens(s.texts()))
            .collect();
        let document = self.predict(&inputs)?;
        let gold_labels: Vec<Vec<Label>> = gold.iter().map(TaggedSequence::labels).collect();
        let report = score(
            &document.labels(),
            &gold_labels,
            self.config.zero_division,
            self.config.parallel,
        )?;
        let sentence_text = |entity: &EntitySpan| {
            entity
                .sent_id
                .and_then(|i| inputs.get(i))
                .map(|s| s.text.clone())
                .unwrap_or_default()
        };
        for entity in report.false_positives.iter() {
            info!(entity = %entity, sentence = %sentence_text(entity), "false positive");
        }
        for entity in report.false_negatives.iter() {
            info!(entity = %entity, sentence = %sentence_text(entity), "false negative");
        }
        Ok(report)
    }
}
