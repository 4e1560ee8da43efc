// Naive, generic over `PartialOrd`. They don't handle NaN.

pub fn max<T>(x: T, y: T) -> T
where
    T: PartialOrd,
{
    if x > y {
        x
    } else {
        y
    }
}

pub fn min<T>(x: T, y: T) -> T
where
    T: PartialOrd,
{
    if x < y {
        x
    } else {
        y
    }
}

/// Round half away from zero and saturate into the `i16` range.
pub fn saturating_round(y: f64) -> i16 {
    // `as` saturates out-of-range floats and maps NaN to zero.
    if y >= 0. {
        (y + 0.5) as i16
    } else {
        (y - 0.5) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_saturates() {
        assert_eq!(saturating_round(1.5), 2);
        assert_eq!(saturating_round(-1.5), -2);
        assert_eq!(saturating_round(0.49), 0);
        assert_eq!(saturating_round(1e9), i16::MAX);
        assert_eq!(saturating_round(-1e9), i16::MIN);
        assert_eq!(saturating_round(f64::NAN), 0);
    }

    #[test]
    fn ordering() {
        assert_eq!(max(1, 2), 2);
        assert_eq!(min(1, 2), 1);
        assert_eq!(max(-0.5, -1.5), -0.5);
    }
}
