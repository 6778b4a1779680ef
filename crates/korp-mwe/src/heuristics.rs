//! Tie-breaking between surviving combinations.
//!
//! Each step is a pure pass over `(combinations, PositionMap)`: it either
//! produces a single winner or narrows the set, and the convergence loops are
//! bounded by strictly decreasing measures (set size, then first-combination
//! length). The known limitation is the first-unit commit: it assumes the
//! first multi-word unit is identical across all surviving combinations and
//! applies the first combination's unit to every other.

use korp_types::Candidate;

use crate::combine::Combination;
use crate::position_map::PositionMap;

/// Run the full heuristic chain and return the winning combination together
/// with the (possibly further resolved) map.
pub fn select(
    mut combinations: Vec<Combination>,
    mut map: PositionMap,
    sep: char,
) -> (Combination, PositionMap) {
    if combinations.len() <= 1 {
        return (combinations.pop().unwrap_or_default(), map);
    }

    if let Some(winner) = full_span(&combinations, sep) {
        return (winner, map);
    }

    combinations = max_mwe_coverage(combinations, sep);

    // Peel-and-commit loop: keep going while the set keeps shrinking.
    let mut last_size = combinations.len() + 1;
    while combinations.len() < last_size {
        if combinations.len() <= 1 {
            return (combinations.pop().unwrap_or_default(), map);
        }
        last_size = combinations.len();
        peel_leading(&mut combinations, &mut map, sep);
        combinations = leftmost_longest(combinations);
        commit_first_unit(&mut combinations, &mut map);
    }

    // Residual loop: the set no longer shrinks, but the shared prefix of the
    // first combination may still be determinable.
    let mut last_len = combinations.first().map_or(0, |c| c.len() + 1);
    while let Some(first) = combinations.first() {
        if first.is_empty() {
            return (Combination::new(), map);
        }
        if first.len() >= last_len {
            break;
        }
        last_len = first.len();
        peel_leading(&mut combinations, &mut map, sep);
        commit_first_unit(&mut combinations, &mut map);
    }

    // Give up deterministically: the first remaining combination wins.
    let winner = combinations.into_iter().next().unwrap_or_default();
    (winner, map)
}

/// A combination whose first element is a multi-word opener covering every
/// element (the whole pending region is one contiguous unit) wins outright.
fn full_span(combinations: &[Combination], sep: char) -> Option<Combination> {
    combinations
        .iter()
        .find(|combo| {
            let Some(first) = combo.first() else {
                return false;
            };
            first.is_mwe(sep)
                && first.base().matches(sep).count() + 1 == combo.len()
                && combo
                    .iter()
                    .all(|c| c.deref_key() == first.deref_key())
        })
        .cloned()
}

/// Keep only combinations using the maximum number of words inside
/// multi-word units, measured by separator occurrences in their bases.
fn max_mwe_coverage(combinations: Vec<Combination>, sep: char) -> Vec<Combination> {
    fn coverage(combo: &Combination, sep: char) -> usize {
        combo
            .iter()
            .filter(|c| c.is_mwe(sep))
            .map(|c| c.base().matches(sep).count())
            .sum()
    }
    let best = combinations
        .iter()
        .map(|c| coverage(c, sep))
        .max()
        .unwrap_or(0);
    combinations
        .into_iter()
        .filter(|c| coverage(c, sep) == best)
        .collect()
}

/// Move the longest common run of leading non-multi-word entries out of the
/// combinations and into the map. The run length is the minimum over all
/// combinations, so every combination stays aligned; the values are taken
/// from the first one. Emptied combinations are dropped.
fn peel_leading(combinations: &mut Vec<Combination>, map: &mut PositionMap, sep: char) {
    if combinations.is_empty() {
        return;
    }
    let prefix = combinations
        .iter()
        .map(|combo| combo.iter().take_while(|c| !c.is_mwe(sep)).count())
        .min()
        .unwrap_or(0);
    if prefix == 0 {
        return;
    }
    let peeled: Vec<Candidate> = combinations[0][..prefix].to_vec();
    for combo in combinations.iter_mut() {
        combo.drain(..prefix);
    }
    combinations.retain(|combo| !combo.is_empty());
    map.fill_prefix(peeled);
}

/// Keep only combinations whose first unit is used by the most elements:
/// the count of entries identical (reference-stripped) to the first entry.
fn leftmost_longest(combinations: Vec<Combination>) -> Vec<Combination> {
    fn unit_size(combo: &Combination) -> usize {
        let Some(first) = combo.first() else { return 0 };
        combo
            .iter()
            .filter(|c| c.deref_key() == first.deref_key())
            .count()
    }
    let best = combinations.iter().map(unit_size).max().unwrap_or(0);
    combinations
        .into_iter()
        .filter(|c| unit_size(c) == best)
        .collect()
}

/// Commit the first multi-word unit of the first combination to the map
/// (anchor at the first unresolved position, member positions contracted
/// away) and strip the unit's entries from every combination. Combinations
/// emptied
/// here are kept; the callers' loop heads handle them.
fn commit_first_unit(combinations: &mut [Combination], map: &mut PositionMap) {
    let Some(first_combo) = combinations.first() else {
        return;
    };
    let Some(anchor) = first_combo.first().cloned() else {
        return;
    };
    let Some(anchor_pos) = map.first_unresolved() else {
        return;
    };
    let anchor_ref = anchor_pos + 1;

    // Offsets (within the combination) of the entries belonging to the unit:
    // the anchor itself plus every later entry that names the same unit and
    // points back at the anchor's position.
    let mut member_offsets = vec![0usize];
    let mut unit_entries = vec![anchor.clone()];
    for (offset, cand) in first_combo.iter().enumerate().skip(1) {
        if cand.deref_key() == anchor.deref_key() && cand.reference() == Some(anchor_ref) {
            member_offsets.push(offset);
            unit_entries.push(cand.clone());
        }
    }

    for combo in combinations.iter_mut() {
        let mut pending = unit_entries.iter();
        let mut next = pending.next();
        combo.retain(|cand| match next {
            Some(expected) if cand == expected => {
                next = pending.next();
                false
            }
            _ => true,
        });
    }

    map.commit_unit(anchor, &member_offsets);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEP: char = '_';

    fn combo(raws: &[&str]) -> Combination {
        raws.iter().copied().map(Candidate::parse).collect()
    }

    #[test]
    fn unique_survivor_wins_immediately() {
        let map = PositionMap::new(2);
        let (winner, _) = select(vec![combo(&["a", "b"])], map, SEP);
        assert_eq!(winner.len(), 2);
    }

    #[test]
    fn full_span_beats_coverage_filtering() {
        let combos = vec![
            combo(&["gå..vb.1", "på..pp.1"]),
            combo(&["gå_på..vbm.1", "gå_på..vbm.1:1"]),
        ];
        let winner = full_span(&combos, SEP).unwrap();
        assert_eq!(winner[0].raw(), "gå_på..vbm.1");
    }

    #[test]
    fn full_span_requires_every_element_in_the_unit() {
        let combos = vec![combo(&["gå_på..vbm.1", "gå_på..vbm.1:1", "ut..ab.1"])];
        assert!(full_span(&combos, SEP).is_none());
    }

    #[test]
    fn coverage_keeps_widest_units() {
        let combos = vec![
            combo(&["gå..vb.1", "på..pp.1"]),
            combo(&["gå_på..vbm.1", "gå_på..vbm.1:1"]),
        ];
        let kept = max_mwe_coverage(combos, SEP);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0][0].raw(), "gå_på..vbm.1");
    }

    #[test]
    fn peel_takes_true_minimum_prefix() {
        // One combination opens with a unit, the other with two literals:
        // nothing can be peeled.
        let mut combos = vec![
            combo(&["gå_på..vbm.1", "b", "c"]),
            combo(&["x", "y", "gå_på..vbm.1"]),
        ];
        let mut map = PositionMap::new(3);
        peel_leading(&mut combos, &mut map, SEP);
        assert_eq!(combos[0].len(), 3);
        assert!(map.is_unresolved(0));
    }

    #[test]
    fn peel_moves_common_literals_into_map() {
        let mut combos = vec![
            combo(&["jag", "gå_på..vbm.1", "gå_på..vbm.1:2"]),
            combo(&["jag", "gå_på..vbm.2", "gå_på..vbm.2:2"]),
        ];
        let mut map = PositionMap::new(3);
        peel_leading(&mut combos, &mut map, SEP);
        assert_eq!(combos[0].len(), 2);
        assert_eq!(map.value(0).unwrap().raw(), "jag");
        assert!(map.is_unresolved(1));
    }

    #[test]
    fn leftmost_longest_prefers_bigger_first_unit() {
        let combos = vec![
            combo(&["ta_till_vara..vbm.1", "ta_till_vara..vbm.1:1", "ta_till_vara..vbm.1:1"]),
            combo(&["ta_till..vbm.1", "ta_till..vbm.1:1", "vara..vb.1"]),
        ];
        let kept = leftmost_longest(combos);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0][0].base(), "ta_till_vara");
    }

    #[test]
    fn commit_contracts_unit_and_strips_entries() {
        let mut combos = vec![combo(&[
            "gå_på..vbm.1",
            "mitt..ps.1",
            "gå_på..vbm.1:1",
        ])];
        let mut map = PositionMap::new(3);
        commit_first_unit(&mut combos, &mut map);
        // Unit entries stripped from the combination…
        assert_eq!(combos[0].len(), 1);
        assert_eq!(combos[0][0].raw(), "mitt..ps.1");
        // …anchor committed, member position contracted.
        assert_eq!(map.value(0).unwrap().raw(), "gå_på..vbm.1");
        assert!(map.is_unresolved(1));
        assert!(!map.is_present(2));
    }

    #[test]
    fn select_resolves_span_plus_literal() {
        // Pending region: unit anchor, literal, unit member. Two competing
        // tag variants force the peel loop to run.
        let combos = vec![
            combo(&["gå_på..vbm.1", "mitt..ps.1", "gå_på..vbm.1:1"]),
            combo(&["gå_på..vbm.1", "mitt..ps.2", "gå_på..vbm.1:1"]),
        ];
        let map = PositionMap::new(3);
        let (winner, map) = select(combos, map, SEP);
        assert_eq!(map.value(0).unwrap().raw(), "gå_på..vbm.1");
        assert!(!map.is_present(2));
        // The residual loop peels the literal into the map; nothing is left
        // for the materializer.
        assert_eq!(map.value(1).unwrap().raw(), "mitt..ps.1");
        assert!(winner.is_empty());
    }
}
