/*!
This library merges the outputs of several token taggers (named entity recognizers) into a single
labeling of a text, and evaluates that labeling at the entity level against a gold standard.

# Pipeline
For every tokenized sentence:
1. Each tagger emits one raw tag per token, in its own notation.
2. The tags are normalized to the canonical BIO notation.
3. The taggers vote: at each token, the most frequent tag wins. Ties go to the tagger with the
    highest priority.
4. The consensus labels are repaired: an entity boundary that leaked onto a whitespace token is
    moved back onto the neighbouring word.
5. The labels are decoded into entities, either as token spans (for scoring) or as character
    offsets into the text of the sentence (for annotation).

# SCHEMES
The following notations are understood and rewritten to BIO:
* IOB2: `B` starts every entity and `I` continues it. This is the canonical notation.
* IOBES: `E` marks the last token of an entity and `S` a single-token entity.
* BILOU: `L` marks the last token of an entity and `U` a unit (single-token) entity.

`E`/`L` become `I` and `S`/`U` become `B`. The `SchemeType` can be used to autodetect the notation
used by a tagger.

# Terminology
* A type is the kind of entity we are interested in, such as `NAME`, `DATE`, `ID` or `AGE`.
* A tag is a string made of a prefix and a type, such as `B-NAME`, or the string `O`.
* A label is a parsed, canonical tag: `Outside`, `Begin(type)` or `Inside(type)`.
* An entity is a run of tokens starting at a `Begin` label and continued by `Inside` labels.

# Decoding
The decoding is lenient: an `Inside` label that does not follow an entity opens a new one, and
the type of an `Inside` label replaces the type of the entity it continues.
*/

mod config;
mod datastructure;
mod entity;
mod error;
mod metrics;
mod pipeline;
mod repair;
mod reporter;
mod schemes;
mod voter;

// The public api starts here
pub use schemes::{check_bio, normalize, normalize_with, Label, MalformedTagError, SchemeType};

pub use entity::{
    decode, encode_bio, project, project_plain, AutoDetectError, CharSpan, Entities, EntitySpan,
    SpanNotFoundError,
};

pub use datastructure::{LengthMismatchError, Prediction, TaggedSequence, Token};

pub use repair::{repair, repair_in_place};

pub use voter::{vote, TokenMismatchError};

pub use metrics::{score, DivByZeroStrat, DivisionByZeroError};

pub use reporter::{ScoreReport, TypeMetrics, MICRO_ROW};

pub use config::{EnsembleConfig, EnsembleConfigBuilder};

pub use pipeline::{Document, Ensemble, Sentence, TokenTagger, TokenizedSentence};

pub use error::{EnsembleError, Result};

/// Scores `predicted` against `gold` with the division-by-zero strategy and the parallelism of
/// an `EnsembleConfig`.
///
/// * `predicted`: Canonical labels of every predicted sentence.
/// * `gold`: Canonical labels of every gold sentence.
/// * `config`: Configuration of the ensemble.
///
/// #Example
/// ```rust
/// use tagvote::{score_report_conf, EnsembleConfigBuilder, Label};
///
/// let gold = vec![Label::parse_all(&["B-TEST", "B-NOTEST", "O", "B-TEST"]).unwrap()];
/// let predicted = vec![Label::parse_all(&["O", "B-NOTEST", "B-OTHER", "B-TEST"]).unwrap()];
/// let config = EnsembleConfigBuilder::default().parallel(true).build();
///
/// let report = score_report_conf(&predicted, &gold, &config).unwrap();
/// let expected_report = "Class, Precision, Recall, Fscore, Support
/// Overall_Micro, 0.6666667, 0.6666667, 0.6666667, 3
/// NOTEST, 1, 1, 1, 1
/// OTHER, 0, 0, 0, 0
/// TEST, 1, 0.5, 0.6666667, 2\n";
///
/// assert_eq!(expected_report, report.to_string());
/// ```
pub fn score_report_conf<L: AsRef<[Label]> + Sync>(
    predicted: &[L],
    gold: &[L],
    config: &EnsembleConfig,
) -> Result<ScoreReport> {
    score(predicted, gold, config.zero_division, config.parallel)
}
