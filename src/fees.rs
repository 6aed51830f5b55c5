//! Fee arithmetic shared by the reconcilers.

use alloc::vec::Vec;

/// Splits `total` into `count` shares that differ by at most one unit.
///
/// The first `total % count` shares carry the extra unit. Empty for `count == 0`.
pub fn even_split(total: u64, count: usize) -> Vec<u64> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as u64;
    let base = total / n;
    let remainder = (total % n) as usize;
    (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Accepted range for one output of an evenly split `total`:
/// `[total / count, total / count + total % count]`.
pub fn even_split_bounds(total: u64, count: u64) -> Option<(u64, u64)> {
    if count == 0 {
        return None;
    }
    let base = total / count;
    Some((base, base + total % count))
}

/// `amount / divisor`, or 0 when the divisor is 0.
pub fn treasury_fee(amount: u64, divisor: u64) -> u64 {
    amount.checked_div(divisor).unwrap_or(0)
}
