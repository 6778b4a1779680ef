//! Disambiguation and contraction of multi-word-expression (MWE) annotations
//! in Korp sentences.
//!
//! A Korp export annotates every word with a pipe-delimited candidate list;
//! candidates describing a multi-word unit appear at each of the unit's
//! positions and back-reference the position where its surface form begins.
//! [`resolve`] picks one globally consistent assignment and *contracts* each
//! chosen unit down to a single value at its first word.
//!
//! # How it works
//! 1. Classify every word's candidates and resolve the unambiguous ones
//!    (`extract`). Sentences without a separator anywhere skip the rest.
//! 2. Enumerate the cross product of the still-pending candidate lists,
//!    abandoning the sentence past a hard cutoff (`combine`).
//! 3. Discard referentially inconsistent combinations (`validate`) and
//!    collapse tag-only variants (`dedup`).
//! 4. Narrow the survivors with ordered heuristics (full-span preference,
//!    maximum unit coverage, leftmost-longest, iterative peel-and-commit)
//!    until one combination remains (`heuristics`).
//! 5. Fill the remaining positions and drop the positions absorbed into a
//!    preceding unit (`materialize`).
//!
//! The result is `None` when the sentence is inapplicable: it contains
//! non-word elements, or its combination space exceeds the cutoff (in which
//! case the pending lists are appended to the [`OverflowLog`]).
//!
//! # Example
//! ```rust
//! use std::collections::HashMap;
//! use korp_mwe::resolve;
//! use korp_types::{Mode, SentenceElement, WordRecord};
//!
//! let word = |lex: &str, text: &str| {
//!     SentenceElement::Word(WordRecord {
//!         text: Some(text.to_string()),
//!         annotations: HashMap::from([("lex".to_string(), lex.to_string())]),
//!     })
//! };
//! let sentence = vec![
//!     word("jag..pn.1", "Jag"),
//!     word("slå_fast..vbm.1", "slå"),
//!     word("slå_fast..vbm.1:2", "fast"),
//!     word("att..sn.1", "att"),
//! ];
//! let values = resolve(&sentence, Mode::Lex, None).unwrap();
//! assert_eq!(values, vec!["jag..pn.1", "slå_fast..vbm.1", "att..sn.1"]);
//! ```

pub mod combine;
pub mod dedup;
pub mod extract;
pub mod heuristics;
pub mod materialize;
pub mod overflow;
pub mod position_map;
pub mod validate;

use tracing::{debug_span, warn};

use korp_types::{Mode, SentenceElement};

pub use combine::MAX_COMBINATIONS;
pub use overflow::OverflowLog;
pub use position_map::PositionMap;

use extract::Extraction;
use materialize::materialize;

/// Resolve one sentence to a single value per surviving position.
///
/// Returns `None` when the sentence is inapplicable (non-word elements, or
/// the combination cutoff was hit); callers should skip such sentences. The
/// mode is an explicit per-call parameter: concurrent callers with different
/// modes never interfere.
pub fn resolve(
    sentence: &[SentenceElement],
    mode: Mode,
    overflow: Option<&OverflowLog>,
) -> Option<Vec<String>> {
    let _span = debug_span!("resolve_mwe", words = sentence.len(), %mode).entered();
    let sep = mode.separator();

    let (map, pending) = match extract::classify(sentence, mode)? {
        Extraction::Simple(values) => return Some(values),
        Extraction::Resolved(map) => return Some(map.into_output()),
        Extraction::Pending { map, pending } => (map, pending),
    };

    if !combine::within_cutoff(&pending) {
        warn!(
            product = combine::checked_product(&pending),
            "combination space exceeds cutoff, skipping sentence"
        );
        if let Some(log) = overflow {
            log.append(&pending);
        }
        return None;
    }
    let combinations = combine::cross_product(&pending);

    let valid = validate::filter(&combinations, &map, sep);
    if valid.is_empty() {
        // Internally inconsistent annotation data: stay deterministic rather
        // than failing the sentence.
        let pick = validate::fallback(&combinations, sep).unwrap_or_default();
        return Some(materialize(pick, map));
    }
    drop(combinations);

    let mut reduced = dedup::reduce_combinations(valid);
    reduced.retain(|combo| !combo.is_empty());
    if !map.has_unresolved() {
        return Some(map.into_output());
    }

    let (winner, map) = heuristics::select(reduced, map, sep);
    Some(materialize(winner, map))
}
