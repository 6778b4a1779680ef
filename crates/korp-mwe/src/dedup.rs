use std::collections::HashSet;

use korp_types::Candidate;

use crate::combine::Combination;

/// Merge a word's candidates that share a join key (same normalized base and
/// same anchor reference, differing only by tag) into one pipe-joined token,
/// preserving first-occurrence order. The joined token signals "either of
/// these" to downstream consumers.
pub fn join_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let same_key = |c: &Candidate, base: &str, reference: Option<usize>| {
        c.base() == base && c.reference() == reference
    };
    let mut rest = candidates;
    let mut out = Vec::with_capacity(rest.len());
    while !rest.is_empty() {
        let first = rest.remove(0);
        let base = first.base().to_string();
        let reference = first.reference();
        if !rest.iter().any(|c| same_key(c, &base, reference)) {
            out.push(first);
            continue;
        }
        let mut joined = vec![first];
        let (same, keep): (Vec<_>, Vec<_>) = rest
            .into_iter()
            .partition(|c| same_key(c, &base, reference));
        rest = keep;
        joined.extend(same);
        let raw = joined
            .iter()
            .map(Candidate::raw)
            .collect::<Vec<_>>()
            .join("|");
        out.push(Candidate::parse(raw));
    }
    out
}

/// Keep the first candidate per normalized base, dropping later ones that
/// differ only by tag. Used for non-multi-word words before pipe-joining.
pub fn dedup_by_base(candidates: &[Candidate]) -> Vec<&Candidate> {
    let mut seen: HashSet<&str> = HashSet::new();
    candidates
        .iter()
        .filter(|c| seen.insert(c.base()))
        .collect()
}

/// Keep the first combination per equivalence class, where two combinations
/// are equivalent when they agree element-wise on normalized bases.
pub fn reduce_combinations(combinations: Vec<Combination>) -> Vec<Combination> {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    combinations
        .into_iter()
        .filter(|combo| {
            let key: Vec<String> = combo.iter().map(|c| c.base().to_string()).collect();
            seen.insert(key)
        })
        .collect()
}
