use super::availability::TimeRange;

/// Price for `range` at `rate_per_hour`, rounded half up to whole units.
///
/// Computed in integers: `rate * minutes / 60` with the half added before
/// truncating.
pub fn total_price(rate_per_hour: i64, range: &TimeRange) -> i64 {
    let scaled = rate_per_hour * range.minutes();
    (scaled * 2 + 60) / 120
}
