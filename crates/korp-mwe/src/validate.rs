use korp_types::Candidate;

use crate::combine::Combination;
use crate::position_map::PositionMap;

/// Keep the referentially consistent combinations.
///
/// A combination is rejected when a multi-word member matches no other member
/// (a unit mentioned once cannot be contracted), or when the map it would
/// materialize contains a reference that dangles, points forward, disagrees
/// on the base, or chains through another reference.
pub fn filter(
    combinations: &[Combination],
    map: &PositionMap,
    sep: char,
) -> Vec<Combination> {
    combinations
        .iter()
        .filter(|combo| is_valid(combo, map, sep))
        .cloned()
        .collect()
}

fn is_valid(combination: &Combination, map: &PositionMap, sep: char) -> bool {
    let mwes: Vec<&Candidate> = combination.iter().filter(|c| c.is_mwe(sep)).collect();
    if mwes.is_empty() {
        return true;
    }
    for cand in &mwes {
        let matches = mwes.iter().filter(|c| c.base() == cand.base()).count();
        if matches == 1 {
            return false;
        }
    }

    let filled = map.filled_with(combination);
    for (pos, value) in filled.iter().enumerate() {
        let Some(value) = value else { continue };
        let Some(reference) = value.reference() else {
            continue;
        };
        // 1-based; must name an existing prior position.
        let Some(anchor_pos) = reference.checked_sub(1) else {
            return false;
        };
        if anchor_pos >= pos {
            return false;
        }
        let Some(Some(referent)) = filled.get(anchor_pos) else {
            return false;
        };
        if referent.reference().is_some() {
            // A reference must point directly at the anchor, not through
            // another referencing entry.
            return false;
        }
        if referent.base() != value.base() {
            return false;
        }
    }
    true
}

/// Deterministic pick when no combination survives validation: the first
/// combination opening with a genuine multi-word candidate, else the first
/// combination outright.
pub fn fallback(combinations: &[Combination], sep: char) -> Option<Combination> {
    combinations
        .iter()
        .find(|combo| combo.first().is_some_and(|c| c.is_mwe(sep)))
        .or_else(|| combinations.first())
        .cloned()
}
