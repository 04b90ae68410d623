/**
Local rewrite of the consensus labels. Some tokenizers emit the whitespace between two words as a
token of its own, and taggers then tend to glue that token to the entity next to it. This module
moves the boundary of the entity back onto the real word.
*/
use crate::datastructure::{TaggedSequence, Token};
use crate::schemes::Label;
use tracing::debug;

/// `O, B-t, I-t'` where the `B` token is whitespace: the entity really starts at the `I` token.
fn is_leading_leak(prev: &Token, mid: &Token, next: &Token) -> bool {
    matches!(
        (&prev.label, &mid.label, &next.label),
        (Label::Outside, Label::Begin(_), Label::Inside(_))
    ) && mid.is_whitespace()
}

/// `I-t, I-t, O` where the middle token is whitespace: the entity really ends one token earlier.
/// Both `Inside` labels must carry the same type. A type change on a whitespace token before an
/// `O` is left alone, since it is not the tail of the entity that precedes it.
fn is_trailing_leak(prev: &Token, mid: &Token, next: &Token) -> bool {
    match (&prev.label, &mid.label, &next.label) {
        (Label::Inside(a), Label::Inside(b), Label::Outside) => a == b && mid.is_whitespace(),
        _ => false,
    }
}

/// Runs the boundary repair over the tokens of one sentence and returns the number of rewrites.
///
/// This is a single left-to-right pass over every window of three tokens. The leading-whitespace
/// rule is checked first, then the trailing-whitespace rule on the labels as they are after the
/// first rule. Windows are never scanned twice.
pub fn repair_in_place(tokens: &mut [Token]) -> usize {
    let mut rewrites = 0;
    for i in 0..tokens.len().saturating_sub(2) {
        let [prev, mid, next] = &mut tokens[i..i + 3] else {
            continue;
        };
        if is_leading_leak(prev, mid, next) {
            if let Label::Begin(tag) = std::mem::take(&mut mid.label) {
                debug!(index = i + 1, tag = %tag, "moving entity start past whitespace token");
                next.label = Label::Begin(tag);
            }
            rewrites += 1;
        }
        if is_trailing_leak(prev, mid, next) {
            debug!(index = i + 1, "dropping trailing whitespace token from entity");
            mid.label = Label::Outside;
            rewrites += 1;
        }
    }
    rewrites
}

/// Same as `repair_in_place`, but consumes the sequence and returns the repaired one.
pub fn repair(mut sequence: TaggedSequence) -> TaggedSequence {
    repair_in_place(&mut sequence);
    sequence
}
