use std::collections::HashMap;

use tracing::debug;

use korp_types::{Candidate, Mode, SentenceElement};

use crate::dedup;
use crate::position_map::PositionMap;

/// What candidate extraction made of a sentence.
pub enum Extraction {
    /// No multi-word ambiguity anywhere: the per-word values, in order.
    Simple(Vec<String>),
    /// Every position classified without enumeration.
    Resolved(PositionMap),
    /// Some positions need combinatorial resolution.
    Pending {
        map: PositionMap,
        pending: Vec<Vec<Candidate>>,
    },
}

/// Classify every word's candidate list and build the initial position map.
/// Returns `None` when the sentence contains a non-word element.
pub fn classify(sentence: &[SentenceElement], mode: Mode) -> Option<Extraction> {
    let sep = mode.separator();

    let mut words = Vec::with_capacity(sentence.len());
    for element in sentence {
        match element {
            SentenceElement::Word(word) => words.push(word),
            SentenceElement::Other(name) => {
                debug!("non-word element <{name}> in sentence, skipping");
                return None;
            }
        }
    }

    // Per-word candidate lists, with word-level joins applied.
    let mut lists: Vec<Vec<Candidate>> = Vec::with_capacity(words.len());
    let mut separator_seen = false;
    for word in &words {
        let attr = word.annotation(mode).unwrap_or("");
        if attr.contains(sep) && !attr.starts_with(sep) {
            separator_seen = true;
        }
        let mut candidates: Vec<Candidate> = attr
            .split('|')
            .filter(|raw| !raw.is_empty())
            .map(Candidate::parse)
            .collect();
        if candidates.is_empty() {
            lists.push(vec![Candidate::parse(word.surface())]);
            continue;
        }
        if candidates.iter().any(|c| c.is_mwe(sep)) {
            // Lemma bases contain spaces, which a pipe-joined token could not
            // round-trip; joining stays restricted to the other modes.
            if mode != Mode::Lemma {
                candidates = dedup::join_candidates(candidates);
            }
            lists.push(candidates);
        } else {
            let kept = dedup::dedup_by_base(&candidates);
            let joined = kept
                .iter()
                .map(|c| c.raw())
                .collect::<Vec<_>>()
                .join("|");
            lists.push(vec![Candidate::parse(joined)]);
        }
    }

    // No separator in any annotation: nothing to contract, every list is a
    // single classified value already.
    if !separator_seen {
        let values = lists
            .iter()
            .flatten()
            .map(|c| c.without_ref().to_string())
            .collect();
        return Some(Extraction::Simple(values));
    }

    // Reference-stripped occurrence counts across the whole sentence, used to
    // tell genuine units (mentioned at several positions) from spurious
    // standalone multi-word tags.
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for list in &lists {
        for cand in list {
            *occurrences.entry(cand.deref_key()).or_default() += 1;
        }
    }

    let mut map = PositionMap::new(lists.len());
    let mut pending = Vec::new();
    for (pos, list) in lists.iter().enumerate() {
        // Lists are never empty: words without a usable annotation were
        // given their surface text as the sole candidate above.
        let mwes: Vec<&Candidate> = list.iter().filter(|c| c.is_mwe(sep)).collect();
        if mwes.is_empty() {
            // Single candidate here: non-MWE words were pipe-joined above.
            map.set(pos, list[0].clone());
        } else {
            let matched_elsewhere = mwes.iter().any(|cand| {
                let own = list
                    .iter()
                    .filter(|c| c.deref_key() == cand.deref_key())
                    .count();
                occurrences
                    .get(cand.deref_key())
                    .is_some_and(|&total| total > own)
            });
            if matched_elsewhere {
                pending.push(list.clone());
            } else {
                // A multi-word tag its unit left behind, probably an already
                // contracted surface form. Prefer a non-MWE reading.
                let pick = list
                    .iter()
                    .find(|c| !c.is_mwe(sep))
                    .unwrap_or(&list[0]);
                map.set(pos, pick.clone());
            }
        }
    }

    if pending.is_empty() {
        Some(Extraction::Resolved(map))
    } else {
        Some(Extraction::Pending { map, pending })
    }
}
