use korp_types::Candidate;

use crate::combine::Combination;
use crate::position_map::PositionMap;

/// Fill the remaining unresolved positions from the winning combination and
/// emit the final value list.
///
/// Consumes the combination left to right. A candidate whose back-reference
/// points at a surviving position holding the same unit is not written: its
/// position is contracted away instead. This is where units discovered only
/// at the very end collapse to their anchor.
pub fn materialize(combination: Combination, mut map: PositionMap) -> Vec<String> {
    let mut queue = combination.into_iter();
    let mut next = queue.next();
    for pos in 0..map.len() {
        if !map.is_unresolved(pos) {
            continue;
        }
        let Some(cand) = next.take() else { break };
        next = queue.next();
        if contracts_into_anchor(&cand, &map) {
            map.remove(pos);
        } else {
            map.set(pos, cand);
        }
    }
    map.into_output()
}

fn contracts_into_anchor(cand: &Candidate, map: &PositionMap) -> bool {
    let Some(reference) = cand.reference() else {
        return false;
    };
    let Some(anchor_pos) = reference.checked_sub(1) else {
        return false;
    };
    map.value(anchor_pos)
        .is_some_and(|anchor| anchor.deref_key() == cand.deref_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(raw: &str) -> Candidate {
        Candidate::parse(raw)
    }

    #[test]
    fn fills_unresolved_slots_in_order() {
        let mut map = PositionMap::new(3);
        map.set(1, cand("mid"));
        let out = materialize(vec![cand("first"), cand("last")], map);
        assert_eq!(out, vec!["first", "mid", "last"]);
    }

    #[test]
    fn contracts_referencing_member_into_anchor() {
        let mut map = PositionMap::new(4);
        map.set(0, cand("jag..pn.1"));
        map.set(3, cand("att..sn.1"));
        let out = materialize(
            vec![cand("slå_fast..vbm.1"), cand("slå_fast..vbm.1:2")],
            map,
        );
        assert_eq!(out, vec!["jag..pn.1", "slå_fast..vbm.1", "att..sn.1"]);
    }

    #[test]
    fn mismatched_reference_is_kept_as_value() {
        let mut map = PositionMap::new(2);
        map.set(0, cand("annan..pn.1"));
        let out = materialize(vec![cand("slå_fast..vbm.1:1")], map);
        // No matching anchor: the value survives, reference stripped.
        assert_eq!(out, vec!["annan..pn.1", "slå_fast..vbm.1"]);
    }

    #[test]
    fn empty_combination_emits_map_as_is() {
        let mut map = PositionMap::new(2);
        map.set(0, cand("a"));
        map.set(1, cand("b"));
        assert_eq!(materialize(Vec::new(), map), vec!["a", "b"]);
    }
}
