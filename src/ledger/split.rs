//! Exact splitting of an amount into minor-unit shares.
//!
//! Every helper returns shares that add up to the rounded total, with any
//! leftover minor units handed out deterministically.

use crate::core::currency::CurrencyCode;
use crate::core::member::MemberId;
use rust_decimal::Decimal;

/// Split `total` evenly. Leftover minor units go one each to members in id
/// order.
///
/// ```
/// use trip_settle::core::currency::CurrencyCode;
/// use trip_settle::core::member::MemberId;
/// use trip_settle::ledger::split::equal_split;
/// use rust_decimal_macros::dec;
///
/// let members = [MemberId::new("carol"), MemberId::new("alice"), MemberId::new("bob")];
/// let shares = equal_split(dec!(10), &members, &CurrencyCode::new("EUR"));
/// assert_eq!(shares[0], (MemberId::new("alice"), dec!(3.34)));
/// assert_eq!(shares[1], (MemberId::new("bob"), dec!(3.33)));
/// assert_eq!(shares[2], (MemberId::new("carol"), dec!(3.33)));
/// ```
pub fn equal_split(
    total: Decimal,
    members: &[MemberId],
    currency: &CurrencyCode,
) -> Vec<(MemberId, Decimal)> {
    let mut unique = members.to_vec();
    unique.sort();
    unique.dedup();
    let weights: Vec<(MemberId, u32)> = unique.into_iter().map(|m| (m, 1)).collect();
    weighted_split(total, &weights, currency)
}

/// `percent` of `total`, rounded to minor units.
pub fn percentage_share(total: Decimal, percent: Decimal, currency: &CurrencyCode) -> Decimal {
    currency.round(total * percent / Decimal::ONE_HUNDRED)
}

/// Split `total` in proportion to each member's weight using the largest
/// remainder method. Ties on the remainder go to the lower member id.
/// Duplicate members are merged; zero total weight yields zero shares.
pub fn weighted_split(
    total: Decimal,
    weights: &[(MemberId, u32)],
    currency: &CurrencyCode,
) -> Vec<(MemberId, Decimal)> {
    let mut merged: Vec<(MemberId, u32)> = Vec::with_capacity(weights.len());
    let mut sorted = weights.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    for (member, weight) in sorted {
        match merged.last_mut() {
            Some((last, w)) if *last == member => *w += weight,
            _ => merged.push((member, weight)),
        }
    }

    let total_weight: u32 = merged.iter().map(|(_, w)| *w).sum();
    if total_weight == 0 {
        return merged.into_iter().map(|(m, _)| (m, Decimal::ZERO)).collect();
    }

    let unit = currency.minor_unit();
    let units = currency.round(total) / unit;
    let total_weight = Decimal::from(total_weight);

    // (member, whole units, fractional remainder)
    let mut parts: Vec<(MemberId, Decimal, Decimal)> = merged
        .into_iter()
        .map(|(member, weight)| {
            let exact = units * Decimal::from(weight) / total_weight;
            let whole = exact.floor();
            (member, whole, exact - whole)
        })
        .collect();

    let assigned: Decimal = parts.iter().map(|(_, whole, _)| *whole).sum();
    let mut leftover = units - assigned;

    let mut order: Vec<usize> = (0..parts.len()).collect();
    order.sort_by(|&a, &b| {
        parts[b]
            .2
            .cmp(&parts[a].2)
            .then_with(|| parts[a].0.cmp(&parts[b].0))
    });
    for idx in order {
        if leftover <= Decimal::ZERO {
            break;
        }
        parts[idx].1 += Decimal::ONE;
        leftover -= Decimal::ONE;
    }

    parts
        .into_iter()
        .map(|(member, whole, _)| (member, whole * unit))
        .collect()
}

/// Round exact per-member amounts to minor units so they still add up to
/// the rounded exact total. Each amount is floored and the missing units go
/// to the largest fractional remainders, ties to the lower member id.
///
/// Amounts may be negative; the input order is kept.
pub fn round_to_total(
    exact: Vec<(MemberId, Decimal)>,
    currency: &CurrencyCode,
) -> Vec<(MemberId, Decimal)> {
    let unit = currency.minor_unit();
    let target = currency.round(exact.iter().map(|(_, a)| *a).sum::<Decimal>()) / unit;

    let mut parts: Vec<(MemberId, Decimal, Decimal)> = exact
        .into_iter()
        .map(|(member, amount)| {
            let units = amount / unit;
            let whole = units.floor();
            (member, whole, units - whole)
        })
        .collect();

    let assigned: Decimal = parts.iter().map(|(_, whole, _)| *whole).sum();
    let mut leftover = target - assigned;

    let mut order: Vec<usize> = (0..parts.len()).collect();
    order.sort_by(|&a, &b| {
        parts[b]
            .2
            .cmp(&parts[a].2)
            .then_with(|| parts[a].0.cmp(&parts[b].0))
    });
    for idx in order {
        if leftover <= Decimal::ZERO {
            break;
        }
        parts[idx].1 += Decimal::ONE;
        leftover -= Decimal::ONE;
    }

    parts
        .into_iter()
        .map(|(member, whole, _)| (member, whole * unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ids(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|n| MemberId::new(*n)).collect()
    }

    #[test]
    fn test_equal_split_even() {
        let shares = equal_split(dec!(10), &ids(&["a", "b"]), &CurrencyCode::new("EUR"));
        assert_eq!(shares, vec![(MemberId::new("a"), dec!(5)), (MemberId::new("b"), dec!(5))]);
    }

    #[test]
    fn test_equal_split_sums_exactly() {
        let members = ids(&["a", "b", "c", "d", "e", "f", "g"]);
        let shares = equal_split(dec!(100), &members, &CurrencyCode::new("EUR"));
        let sum: Decimal = shares.iter().map(|(_, s)| *s).sum();
        assert_eq!(sum, dec!(100));
        assert_eq!(shares[0].1, dec!(14.29));
        assert_eq!(shares[6].1, dec!(14.28));
    }

    #[test]
    fn test_equal_split_zero_decimal_currency() {
        let shares = equal_split(dec!(1000), &ids(&["a", "b", "c"]), &CurrencyCode::new("JPY"));
        let amounts: Vec<Decimal> = shares.iter().map(|(_, s)| *s).collect();
        assert_eq!(amounts, vec![dec!(334), dec!(333), dec!(333)]);
    }

    #[test]
    fn test_equal_split_no_members() {
        assert!(equal_split(dec!(10), &[], &CurrencyCode::new("EUR")).is_empty());
    }

    #[test]
    fn test_percentage_share() {
        let eur = CurrencyCode::new("EUR");
        assert_eq!(percentage_share(dec!(45.50), dec!(50), &eur), dec!(22.75));
        assert_eq!(percentage_share(dec!(10), dec!(33.333), &eur), dec!(3.33));
    }

    #[test]
    fn test_weighted_split_largest_remainder() {
        let weights = vec![
            (MemberId::new("a"), 1),
            (MemberId::new("b"), 2),
            (MemberId::new("c"), 3),
        ];
        let shares = weighted_split(dec!(100), &weights, &CurrencyCode::new("EUR"));
        let amounts: Vec<Decimal> = shares.iter().map(|(_, s)| *s).collect();
        assert_eq!(amounts, vec![dec!(16.67), dec!(33.33), dec!(50.00)]);
    }

    #[test]
    fn test_weighted_split_merges_duplicates() {
        let weights = vec![(MemberId::new("a"), 1), (MemberId::new("a"), 1), (MemberId::new("b"), 2)];
        let shares = weighted_split(dec!(8), &weights, &CurrencyCode::new("EUR"));
        assert_eq!(shares, vec![(MemberId::new("a"), dec!(4)), (MemberId::new("b"), dec!(4))]);
    }

    #[test]
    fn test_weighted_split_zero_weight() {
        let weights = vec![(MemberId::new("a"), 0)];
        let shares = weighted_split(dec!(8), &weights, &CurrencyCode::new("EUR"));
        assert_eq!(shares, vec![(MemberId::new("a"), Decimal::ZERO)]);
    }
    #[test]
    fn test_round_to_total_keeps_zero_sum() {
        let exact = vec![
            (MemberId::new("alice"), dec!(5.025)),
            (MemberId::new("bob"), dec!(-2.5125)),
            (MemberId::new("carol"), dec!(-2.5125)),
        ];
        let rounded = round_to_total(exact, &CurrencyCode::new("EUR"));
        let amounts: Vec<Decimal> = rounded.iter().map(|(_, a)| *a).collect();
        assert_eq!(amounts, vec![dec!(5.02), dec!(-2.51), dec!(-2.51)]);
        assert_eq!(amounts.iter().copied().sum::<Decimal>(), Decimal::ZERO);
    }

    #[test]
    fn test_round_to_total_exact_values_untouched() {
        let exact = vec![(MemberId::new("a"), dec!(60)), (MemberId::new("b"), dec!(-12.5))];
        let rounded = round_to_total(exact, &CurrencyCode::new("EUR"));
        assert_eq!(rounded, vec![(MemberId::new("a"), dec!(60)), (MemberId::new("b"), dec!(-12.5))]);
    }
}
