use korp_types::Candidate;

/// One concrete choice of candidate per still-unresolved position.
pub type Combination = Vec<Candidate>;

/// Hard cutoff on the size of the combination space. Sentences above it are
/// abandoned as inapplicable rather than enumerated.
pub const MAX_COMBINATIONS: usize = 500_000;

/// Size of the cross product of the pending candidate lists, computed without
/// materializing anything. `None` means the product overflows `usize`, which
/// is far beyond the cutoff anyway.
pub fn checked_product(pending: &[Vec<Candidate>]) -> Option<usize> {
    pending
        .iter()
        .try_fold(1usize, |acc, list| acc.checked_mul(list.len()))
}

/// Whether the pending lists are small enough to enumerate.
pub fn within_cutoff(pending: &[Vec<Candidate>]) -> bool {
    checked_product(pending).is_some_and(|product| product <= MAX_COMBINATIONS)
}

/// Materialize the full cross product, rightmost list varying fastest. Only
/// called after [`within_cutoff`] confirmed the size, so peak memory is
/// bounded by the cutoff.
pub fn cross_product(pending: &[Vec<Candidate>]) -> Vec<Combination> {
    if pending.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let capacity = checked_product(pending).unwrap_or(0);
    let mut out = Vec::with_capacity(capacity);
    let mut indices = vec![0usize; pending.len()];
    'odometer: loop {
        out.push(
            indices
                .iter()
                .zip(pending)
                .map(|(&idx, list)| list[idx].clone())
                .collect(),
        );
        for slot in (0..pending.len()).rev() {
            indices[slot] += 1;
            if indices[slot] < pending[slot].len() {
                continue 'odometer;
            }
            indices[slot] = 0;
        }
        break;
    }
    out
}
