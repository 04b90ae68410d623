/**
This modules holds the result of the entity-level scoring and prettyprints it.
*/
use crate::entity::EntitySpan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Name of the line holding the micro-averaged metrics in the displayed table.
pub const MICRO_ROW: &str = "Overall_Micro";

/// Metrics of the entities of a single type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    /// Number of gold entities of this type.
    pub support: usize,
    /// Number of predicted entities of this type.
    pub predicted: usize,
    /// Number of predicted entities of this type that are also in the gold set.
    pub correct: usize,
}

/// The result of comparing predicted entities with gold entities. The report can be displayed
/// as if it was a dataframe, with the micro-averaged line first and one line per entity type,
/// in alphabetical order.
///
/// # Example
///
/// ```rust
/// use tagvote::{score, DivByZeroStrat, Label};
///
/// let gold = vec![Label::parse_all(&["B-NAME", "I-NAME", "O", "B-DATE"]).unwrap()];
/// let predicted = vec![Label::parse_all(&["B-NAME", "I-NAME", "O", "O"]).unwrap()];
///
/// let report = score(&predicted, &gold, DivByZeroStrat::ReplaceBy0, false).unwrap();
///
/// let expected_report =
/// "Class, Precision, Recall, Fscore, Support
/// Overall_Micro, 1, 0.5, 0.6666667, 2
/// DATE, 0, 0, 0, 1
/// NAME, 1, 1, 1, 1\n";
///
/// assert_eq!(expected_report, report.to_string());
/// assert_eq!(report.false_negatives.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Micro-averaged precision.
    pub precision: f32,
    /// Micro-averaged recall.
    pub recall: f32,
    /// Micro-averaged f1 score.
    pub f1: f32,
    /// Number of predicted entities found in the gold set.
    pub correct: usize,
    /// Number of predicted entities.
    pub guessed: usize,
    /// Number of gold entities.
    pub gold: usize,
    pub per_type: BTreeMap<String, TypeMetrics>,
    /// Predicted entities absent from the gold set, with their sentence index.
    pub false_positives: Vec<EntitySpan<'static>>,
    /// Gold entities that were not predicted, with their sentence index.
    pub false_negatives: Vec<EntitySpan<'static>>,
}

impl ScoreReport {
    /// Metrics of the given entity type, if it was seen in the predictions or in the gold set.
    pub fn type_metrics<S: AsRef<str>>(&self, tag: S) -> Option<&TypeMetrics> {
        self.per_type.get(tag.as_ref())
    }
}

/// The ScoreReport acts as a dataframe when displayed.
impl Display for ScoreReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Class, Precision, Recall, Fscore, Support")?;
        writeln!(
            f,
            "{}, {}, {}, {}, {}",
            MICRO_ROW, self.precision, self.recall, self.f1, self.gold
        )?;
        for (class, m) in self.per_type.iter() {
            writeln!(
                f,
                "{}, {}, {}, {}, {}",
                class, m.precision, m.recall, m.f1, m.support
            )?
        }
        Ok(())
    }
}
