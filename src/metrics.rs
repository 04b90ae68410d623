/**
This module computes the entity-level metrics (precision, recall, f1 and support) of a predicted
corpus against a gold corpus. Two entities match only if they have the same sentence, the same
boundaries and the same type.
*/
use crate::datastructure::LengthMismatchError;
use crate::entity::{ChunkIter, Entities, EntitySpan};
use crate::error::Result;
use crate::reporter::{ScoreReport, TypeMetrics};
use crate::schemes::Label;
use ahash::AHashSet;
use itertools::multizip;
use ndarray::{prelude::*, Zip};
use num::Num;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
/// How do we handle a division by zero when computing precision and recall? An empty
/// denominator means that no entity was predicted (precision) or that there is no gold entity
/// (recall). By default the result of such a division is 0.
pub enum DivByZeroStrat {
    /// Returns 0 when the denominator is 0
    #[default]
    ReplaceBy0,
    /// Returns an error
    ReturnError,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not parse {0:?} into a `DivByZeroStrat`")]
pub struct ParsingDivisionByZeroStrategyError(String);

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby0" | "replacebyzero" | "zero" => Ok(DivByZeroStrat::ReplaceBy0),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("encountered a division by zero")]
pub struct DivisionByZeroError;

fn prf_divide<I: Debug + Num + Clone + Send + Sync + Copy, D: Dimension>(
    numerator: ArcArray<I, D>,
    denominator: ArrayViewMut<I, D>,
    parallel: bool,
    zero_division: DivByZeroStrat,
) -> std::result::Result<ArcArray<I, D>, DivisionByZeroError> {
    let (result, zero_mask) = if parallel {
        par_prf_divide_results_and_mask(numerator, denominator)
    } else {
        prf_divide_results_and_mask(numerator, denominator)
    };
    match zero_division {
        DivByZeroStrat::ReturnError if zero_mask.iter().any(|m| *m == I::zero()) => {
            Err(DivisionByZeroError)
        }
        _ => Ok(result * zero_mask),
    }
}

/// This function computes the result in parallel. For a synchronous version of this function,
/// see `prf_divide_results_and_mask`. The mask is 0 wherever the denominator was 0, and 1
/// elsewhere.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn par_prf_divide_results_and_mask<I: Debug + Num + Clone + Send + Sync, D: Dimension>(
    numerator: ArcArray<I, D>,
    mut denominator: ArrayViewMut<I, D>,
) -> (ArcArray<I, D>, Array<I, D>) {
    let zero_at_mask = Zip::from(&mut denominator).par_map_collect(|d| {
        if *d == I::zero() {
            I::zero()
        } else {
            I::one()
        }
    });
    denominator.par_mapv_inplace(|v| if v == I::zero() { I::one() } else { v });
    (numerator / denominator, zero_at_mask)
}

/// This function computes the result synchronously. For a parallel version of this function,
/// see `par_prf_divide_results_and_mask`.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn prf_divide_results_and_mask<I: Debug + Num + Clone, D: Dimension>(
    numerator: ArcArray<I, D>,
    mut denominator: ArrayViewMut<I, D>,
) -> (ArcArray<I, D>, Array<I, D>) {
    let zero_at_mask =
        Zip::from(&mut denominator)
            .map_collect(|d| if *d == I::zero() { I::zero() } else { I::one() });
    denominator.mapv_inplace(|v| if v == I::zero() { I::one() } else { v });
    (numerator / denominator, zero_at_mask)
}

/// Helper function to replace values from an array.
fn replace<Data: PartialEq + Copy, D: Dimension>(
    mut array: ArcArray<Data, D>,
    replaced: Data,
    new_value: Data,
) -> ArcArray<Data, D> {
    array.mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

/// Helper function to replace values from an array in parallel.
fn par_replace<Data: PartialEq + Send + Sync + Copy, D: Dimension>(
    mut array: ArcArray<Data, D>,
    replaced: Data,
    new_value: Data,
) -> ArcArray<Data, D> {
    array.par_mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

/// Precision, recall and f1 of every element of the arrays.
type PrecisionRecallF1 = (ArcArray<f32, Ix1>, ArcArray<f32, Ix1>, ArcArray<f32, Ix1>);

fn precision_recall_f1(
    pred_sum: &Array1<usize>,
    tp_sum: &Array1<usize>,
    true_sum: &Array1<usize>,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> std::result::Result<PrecisionRecallF1, DivisionByZeroError> {
    let arc_tp_sum = tp_sum.mapv(|x| x as f32).to_shared();
    let precision = prf_divide(
        arc_tp_sum.clone(),
        pred_sum.mapv(|x| x as f32).view_mut(),
        parallel,
        zero_division,
    )?;
    let recall = prf_divide(
        arc_tp_sum,
        true_sum.mapv(|x| x as f32).view_mut(),
        parallel,
        zero_division,
    )?;
    let denom = precision.clone() + recall.view();
    let denom_non_zero = if parallel {
        par_replace(denom, 0.0, 1.0)
    } else {
        replace(denom, 0.0, 1.0)
    };
    let f1 = 2.0_f32 * precision.clone() * recall.view() / denom_non_zero;
    Ok((precision, recall, f1))
}

/// Decodes every sentence, tagging each entity with its sentence index. The sentences are
/// independent, so they can be decoded on the rayon pool.
fn decode_corpus<L: AsRef<[Label]> + Sync>(sentences: &[L], parallel: bool) -> Entities<'_> {
    if parallel {
        Entities::new(
            sentences
                .par_iter()
                .enumerate()
                .map(|(i, labels)| ChunkIter::new(labels.as_ref(), Some(i)).collect::<Vec<_>>())
                .collect(),
        )
    } else {
        Entities::decode_all(sentences)
    }
}

fn check_consistent_length<L: AsRef<[Label]>>(
    predicted: &[L],
    gold: &[L],
) -> std::result::Result<(), LengthMismatchError> {
    if predicted.len() != gold.len() {
        return Err(LengthMismatchError {
            index: predicted.len().min(gold.len()),
            expected: gold.len(),
            found: predicted.len(),
        });
    }
    let mismatch = predicted
        .iter()
        .zip(gold)
        .position(|(p, g)| p.as_ref().len() != g.as_ref().len());
    match mismatch {
        Some(index) => Err(LengthMismatchError {
            index,
            expected: gold[index].as_ref().len(),
            found: predicted[index].as_ref().len(),
        }),
        None => Ok(()),
    }
}

/// Main entrypoint of the scorer. Compares the entities decoded from `predicted` with those
/// decoded from `gold`, sentence by sentence, and returns the micro-averaged metrics, the
/// metrics of every entity type seen in either corpus and the lists of false positives and false
/// negatives.
///
/// With `DivByZeroStrat::ReplaceBy0`, a metric with an empty denominator is 0 and the scoring
/// never fails on degenerate input. With `DivByZeroStrat::ReturnError`, any empty denominator
/// (micro or per type) is an error.
///
/// Fails with a `LengthMismatchError` when the corpora do not hold the same number of
/// sentences, and also when a predicted sentence and its gold sentence do not hold the same
/// number of labels: both must come from the same tokenization.
///
/// * `predicted`: Canonical labels of every predicted sentence.
/// * `gold`: Canonical labels of every gold sentence, in the same order and tokenization.
/// * `zero_division`: What to do in case of division by zero.
/// * `parallel`: Decode the sentences and divide the arrays on multiple cores.
pub fn score<L: AsRef<[Label]> + Sync>(
    predicted: &[L],
    gold: &[L],
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<ScoreReport> {
    check_consistent_length(predicted, gold)?;
    let entities_pred = decode_corpus(predicted, parallel);
    let entities_true = decode_corpus(gold, parallel);

    let pred_set: AHashSet<&EntitySpan> = entities_pred.flat_iter().collect();
    let true_set: AHashSet<&EntitySpan> = entities_true.flat_iter().collect();
    let false_positives: Vec<EntitySpan<'static>> = entities_pred
        .flat_iter()
        .filter(|e| !true_set.contains(e))
        .map(|e| e.clone().into_owned())
        .collect();
    let false_negatives: Vec<EntitySpan<'static>> = entities_true
        .flat_iter()
        .filter(|e| !pred_set.contains(e))
        .map(|e| e.clone().into_owned())
        .collect();

    let target_names: BTreeSet<&str> = entities_pred
        .unique_tags()
        .into_iter()
        .chain(entities_true.unique_tags())
        .collect();
    // One element per type, followed by the totals used for the micro average.
    let mut pred_sum: Vec<usize> = target_names
        .iter()
        .map(|t| entities_pred.filter_count(t))
        .collect();
    let mut tp_sum: Vec<usize> = target_names
        .iter()
        .map(|t| {
            entities_true
                .filter(t)
                .intersection(&entities_pred.filter(t))
                .count()
        })
        .collect();
    let mut true_sum: Vec<usize> = target_names
        .iter()
        .map(|t| entities_true.filter_count(t))
        .collect();
    let guessed = entities_pred.count();
    let gold_count = entities_true.count();
    let correct = tp_sum.iter().sum();
    pred_sum.push(guessed);
    tp_sum.push(correct);
    true_sum.push(gold_count);
    let (pred_sum, tp_sum, true_sum) = (
        Array::from(pred_sum),
        Array::from(tp_sum),
        Array::from(true_sum),
    );
    let (p, r, f1) = precision_recall_f1(&pred_sum, &tp_sum, &true_sum, zero_division, parallel)?;

    let mut per_type = BTreeMap::new();
    for (name, precision, recall, f1, support, predicted, correct) in multizip((
        target_names.iter(),
        p.iter(),
        r.iter(),
        f1.iter(),
        true_sum.iter(),
        pred_sum.iter(),
        tp_sum.iter(),
    )) {
        let metrics = TypeMetrics {
            precision: *precision,
            recall: *recall,
            f1: *f1,
            support: *support,
            predicted: *predicted,
            correct: *correct,
        };
        per_type.insert(String::from(*name), metrics);
    }
    let micro = target_names.len();
    let report = ScoreReport {
        precision: p[micro],
        recall: r[micro],
        f1: f1[micro],
        correct,
        guessed,
        gold: gold_count,
        per_type,
        false_positives,
        false_negatives,
    };
    info!(
        predicted = report.guessed,
        gold = report.gold,
        false_positives = report.false_positives.len(),
        false_negatives = report.false_negatives.len(),
        "scored entities"
    );
    info!(
        "micro precision {:.4}, recall {:.4}, f1 {:.4}",
        report.precision, report.recall, report.f1
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entity::encode_bio;
    use crate::error::EnsembleError;
    use quickcheck::{Arbitrary, QuickCheck, TestResult};
    use rstest::rstest;

    pub(crate) trait CloseEnough {
        fn are_close(&self, other: &Self, eps: f32) -> bool;
    }

    impl CloseEnough for TypeMetrics {
        fn are_close(&self, other: &Self, eps: f32) -> bool {
            let precision_is_equal = f32::abs(self.precision - other.precision) < eps;
            let recall_is_equal = f32::abs(self.recall - other.recall) < eps;
            let f1_is_equal = f32::abs(self.f1 - other.f1) < eps;
            precision_is_equal
                && recall_is_equal
                && f1_is_equal
                && self.support == other.support
                && self.predicted == other.predicted
                && self.correct == other.correct
        }
    }

    impl CloseEnough for ScoreReport {
        fn are_close(&self, other: &Self, eps: f32) -> bool {
            let same_types = self.per_type.len() == other.per_type.len()
                && self
                    .per_type
                    .iter()
                    .zip(other.per_type.iter())
                    .all(|((n1, m1), (n2, m2))| n1 == n2 && m1.are_close(m2, eps));
            f32::abs(self.precision - other.precision) < eps
                && f32::abs(self.recall - other.recall) < eps
                && f32::abs(self.f1 - other.f1) < eps
                && self.correct == other.correct
                && self.guessed == other.guessed
                && self.gold == other.gold
                && self.false_positives == other.false_positives
                && self.false_negatives == other.false_negatives
                && same_types
        }
    }

    fn labels(tags: &[&str]) -> Vec<Label> {
        Label::parse_all(tags).unwrap()
    }

    #[test]
    fn test_score_one_missed_entity() {
        let predicted = vec![encode_bio(7, &[EntitySpan::new(0, 2, "NAME")])];
        let gold = vec![encode_bio(
            7,
            &[EntitySpan::new(0, 2, "NAME"), EntitySpan::new(5, 6, "DATE")],
        )];
        let actual = score(&predicted, &gold, DivByZeroStrat::ReplaceBy0, false).unwrap();
        let expected = ScoreReport {
            precision: 1.0,
            recall: 0.5,
            f1: 0.6666667,
            correct: 1,
            guessed: 1,
            gold: 2,
            per_type: BTreeMap::from([
                (
                    String::from("DATE"),
                    TypeMetrics {
                        precision: 0.0,
                        recall: 0.0,
                        f1: 0.0,
                        support: 1,
                        predicted: 0,
                        correct: 0,
                    },
                ),
                (
                    String::from("NAME"),
                    TypeMetrics {
                        precision: 1.0,
                        recall: 1.0,
                        f1: 1.0,
                        support: 1,
                        predicted: 1,
                        correct: 1,
                    },
                ),
            ]),
            false_positives: vec![],
            false_negatives: vec![EntitySpan::new(5, 6, "DATE").in_sentence(0)],
        };
        assert!(actual.are_close(&expected, 1e-6));
    }

    #[test]
    fn test_score_sentence_index_is_part_of_the_match() {
        let predicted = vec![labels(&["O", "O"]), labels(&["B-ID", "O"])];
        let gold = vec![labels(&["B-ID", "O"]), labels(&["O", "O"])];
        let actual = score(&predicted, &gold, DivByZeroStrat::ReplaceBy0, false).unwrap();
        assert_eq!(actual.correct, 0);
        assert_eq!(
            actual.false_positives,
            vec![EntitySpan::new(0, 0, "ID").in_sentence(1)]
        );
        assert_eq!(
            actual.false_negatives,
            vec![EntitySpan::new(0, 0, "ID").in_sentence(0)]
        );
    }

    #[test]
    fn test_score_partial_overlap_gets_no_credit() {
        let predicted = vec![labels(&["B-NAME", "I-NAME", "I-NAME"])];
        let gold = vec![labels(&["B-NAME", "I-NAME", "O"])];
        let actual = score(&predicted, &gold, DivByZeroStrat::ReplaceBy0, false).unwrap();
        assert_eq!((actual.precision, actual.recall, actual.f1), (0.0, 0.0, 0.0));
        assert_eq!(actual.false_positives.len(), 1);
        assert_eq!(actual.false_negatives.len(), 1);
    }

    #[test]
    fn test_score_report_display() {
        let predicted = vec![
            labels(&["O", "O", "B-MISC", "I-MISC", "I-MISC", "I-MISC", "O"]),
            labels(&["B-PER", "I-PER", "O"]),
        ];
        let gold = vec![
            labels(&["O", "O", "O", "B-MISC", "I-MISC", "I-MISC", "O"]),
            labels(&["B-PER", "I-PER", "O"]),
        ];
        let report = score(&predicted, &gold, DivByZeroStrat::ReplaceBy0, true).unwrap();
        // NOTE: Do not change the indentation
        let expected = "Class, Precision, Recall, Fscore, Support
Overall_Micro, 0.5, 0.5, 0.5, 2
MISC, 0, 0, 0, 1
PER, 1, 1, 1, 1\n";
        assert_eq!(report.to_string(), expected);
    }

    #[rstest]
    #[case(DivByZeroStrat::ReplaceBy0, false)]
    #[case(DivByZeroStrat::ReplaceBy0, true)]
    fn test_score_empty_counts_are_zero(
        #[case] zero_division: DivByZeroStrat,
        #[case] parallel: bool,
    ) {
        let predicted = vec![labels(&["O", "O"])];
        let gold = vec![labels(&["O", "O"])];
        let actual = score(&predicted, &gold, zero_division, parallel).unwrap();
        assert_eq!((actual.precision, actual.recall, actual.f1), (0.0, 0.0, 0.0));
        assert!(actual.per_type.is_empty());
        let nothing: Vec<Vec<Label>> = vec![];
        let actual = score(&nothing, &nothing, zero_division, parallel).unwrap();
        assert_eq!(actual, ScoreReport::default());
    }

    #[test]
    fn test_score_return_error_on_empty_denominator() {
        let predicted = vec![labels(&["O", "O"])];
        let gold = vec![labels(&["B-ID", "O"])];
        assert_eq!(
            score(&predicted, &gold, DivByZeroStrat::ReturnError, false),
            Err(EnsembleError::DivisionByZero(DivisionByZeroError))
        );
        let report = score(&gold, &gold, DivByZeroStrat::ReturnError, false).unwrap();
        assert_eq!(report.f1, 1.0);
    }

    #[rstest]
    #[case(vec![labels(&["O"])], vec![], 0, 0, 1)]
    #[case(vec![labels(&["O"]), labels(&["O"])], vec![labels(&["O"])], 1, 1, 2)]
    #[case(vec![labels(&["O"]), labels(&["O"])], vec![labels(&["O"]), labels(&["O", "O"])], 1, 2, 1)]
    fn test_score_length_mismatch(
        #[case] predicted: Vec<Vec<Label>>,
        #[case] gold: Vec<Vec<Label>>,
        #[case] index: usize,
        #[case] expected: usize,
        #[case] found: usize,
    ) {
        assert_eq!(
            score(&predicted, &gold, DivByZeroStrat::ReplaceBy0, false),
            Err(EnsembleError::LengthMismatch(LengthMismatchError {
                index,
                expected,
                found
            }))
        );
    }

    #[rstest]
    #[case("replaceby0", DivByZeroStrat::ReplaceBy0)]
    #[case("ReplaceByZero", DivByZeroStrat::ReplaceBy0)]
    #[case("error", DivByZeroStrat::ReturnError)]
    #[case("ReturnError", DivByZeroStrat::ReturnError)]
    fn test_div_by_zero_strat_from_str(#[case] raw: &str, #[case] expected: DivByZeroStrat) {
        assert_eq!(raw.parse::<DivByZeroStrat>().unwrap(), expected);
        assert!("replaceby1".parse::<DivByZeroStrat>().is_err());
    }

    #[test]
    fn test_par_divide_results_and_mask() {
        let numerator = array![[1., 2., 4., 5.]].into_shared();
        let mut cloned = numerator.clone();
        let mut same_cloned = numerator.clone();
        let denominator = cloned.view_mut();
        let same_denominator = same_cloned.view_mut();
        let (div_result, zero_mask) =
            prf_divide_results_and_mask(numerator.clone(), same_denominator);
        let (par_div_result, par_zero_mask) =
            par_prf_divide_results_and_mask(numerator, denominator);
        assert_eq!(zero_mask, Array::<f64, _>::ones(div_result.raw_dim()));
        assert_eq!(par_zero_mask, Array::<f64, _>::ones(par_div_result.raw_dim()));
        assert_eq!(div_result, array![[1., 1., 1., 1.]]);
        assert_eq!(par_div_result, array![[1., 1., 1., 1.]]);
    }

    #[test]
    fn test_prf_divide_masks_zero_denominators() {
        let numerator = array![0., 2., 3.].into_shared();
        let mut denominator = array![0., 4., 3.];
        let actual = prf_divide(
            numerator.clone(),
            denominator.view_mut(),
            false,
            DivByZeroStrat::ReplaceBy0,
        )
        .unwrap();
        assert_eq!(actual, array![0., 0.5, 1.]);
        let mut denominator = array![0., 4., 3.];
        let actual = prf_divide(
            numerator,
            denominator.view_mut(),
            true,
            DivByZeroStrat::ReturnError,
        );
        assert_eq!(actual, Err(DivisionByZeroError));
    }

    #[test]
    fn test_replace_0s_by_1s() {
        let to_be_replaced =
            array![[[1.0, 0.0, 0.0, -1.0, 100.0], [10., 0.0, 0.0, 5.0, 10.]]].to_shared();
        let synchronous_actual = replace(to_be_replaced.clone(), 0.0, 1.0);
        let parallel_actual = par_replace(to_be_replaced, 0.0, 1.0);
        let expected = array![[[1.0, 1.0, 1.0, -1.0, 100.0], [10., 1.0, 1.0, 5.0, 10.]]];
        assert_eq!(synchronous_actual, expected);
        assert_eq!(parallel_actual, expected);
    }

    /// A predicted corpus and a gold corpus with the same shape.
    #[derive(Debug, Clone)]
    struct Corpora(Vec<Vec<Label>>, Vec<Vec<Label>>);

    impl Arbitrary for Corpora {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let choices = [
                Label::Outside,
                Label::Outside,
                Label::Begin(String::from("NAME")),
                Label::Inside(String::from("NAME")),
                Label::Begin(String::from("DATE")),
                Label::Inside(String::from("DATE")),
            ];
            let sentences = usize::arbitrary(g) % 5;
            let mut predicted: Vec<Vec<Label>> = Vec::with_capacity(sentences);
            let mut gold: Vec<Vec<Label>> = Vec::with_capacity(sentences);
            for _ in 0..sentences {
                let len = usize::arbitrary(g) % 12;
                predicted.push((0..len).map(|_| g.choose(&choices).unwrap().clone()).collect());
                gold.push((0..len).map(|_| g.choose(&choices).unwrap().clone()).collect());
            }
            Corpora(predicted, gold)
        }
    }

    #[test]
    fn test_propertie_precision_is_swapped_recall() {
        fn swapped(corpora: Corpora) -> TestResult {
            let Corpora(predicted, gold) = corpora;
            let forward = score(&predicted, &gold, DivByZeroStrat::ReplaceBy0, false).unwrap();
            let backward = score(&gold, &predicted, DivByZeroStrat::ReplaceBy0, true).unwrap();
            TestResult::from_bool(
                forward.precision == backward.recall
                    && forward.recall == backward.precision
                    && f32::abs(forward.f1 - backward.f1) < 1e-6
                    && forward.false_positives == backward.false_negatives,
            )
        }
        let mut qc = QuickCheck::new().tests(1000);
        qc.quickcheck(swapped as fn(Corpora) -> TestResult)
    }
}
