//! Gap filling for series with missing observations

/// Fill interior gaps by linear interpolation between the neighbouring
/// observations.
///
/// Gaps longer than `limit` (when given) are left untouched, as are leading
/// and trailing gaps, which have no neighbour on one side.
pub fn interpolate_linear(values: &[Option<f64>], limit: Option<usize>) -> Vec<Option<f64>> {
    let mut filled = values.to_vec();
    let mut last_known: Option<(usize, f64)> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(right) = *value else {
            continue;
        };

        if let Some((start, left)) = last_known {
            let gap = i - start - 1;
            if gap > 0 && limit.map_or(true, |l| gap <= l) {
                let span = (i - start) as f64;
                for (k, slot) in filled[start + 1..i].iter_mut().enumerate() {
                    let w = (k + 1) as f64 / span;
                    *slot = Some(left + (right - left) * w);
                }
            }
        }
        last_known = Some((i, right));
    }

    filled
}

/// Number of missing entries in a series
pub fn count_missing(values: &[Option<f64>]) -> usize {
    values.iter().filter(|v| v.is_none()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_gap_is_filled() {
        let values = [Some(1.0), None, None, Some(4.0)];
        let filled = interpolate_linear(&values, None);

        assert_eq!(filled, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_edges_stay_missing() {
        let values = [None, Some(1.0), Some(2.0), None];
        let filled = interpolate_linear(&values, None);

        assert_eq!(filled, values.to_vec());
        assert_eq!(count_missing(&filled), 2);
    }

    #[test]
    fn test_limit_respected() {
        let values = [Some(0.0), None, None, None, Some(4.0), None, Some(6.0)];
        let filled = interpolate_linear(&values, Some(2));

        assert_eq!(filled[1], None);
        assert_eq!(filled[5], Some(5.0));
    }
}
