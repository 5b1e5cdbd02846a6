use num_traits::Float;

/// Arithmetic mean, zero for an empty input.
pub fn mean<T: Float, I: IntoIterator<Item = T>>(values: I) -> T {
    let (sum, count) = values
        .into_iter()
        .fold((T::zero(), 0usize), |(s, n), v| (s + v, n + 1));

    if count == 0 {
        T::zero()
    } else {
        sum / T::from(count).unwrap_or_else(T::one)
    }
}

/// Largest value, zero for an empty input. NaNs are ignored.
pub fn max_or_zero<T: Float, I: IntoIterator<Item = T>>(values: I) -> T {
    values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<T>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or_else(T::zero)
}

#[inline]
pub fn round_to<T: Float>(value: T, decimals: i32) -> T {
    let factor = T::from(10.0).unwrap_or_else(T::one).powi(decimals);
    (value * factor).round() / factor
}

#[inline]
pub fn squared_distance<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b)
        .fold(T::zero(), |acc, (&x, &y)| acc + (x - y) * (x - y))
}

#[inline(always)]
pub fn lerp<T: Float>(from: T, to: T, factor: T) -> T {
    from * (T::one() - factor) + to * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(Vec::<f64>::new()), 0.0);
        assert_eq!(mean(vec![1.0f64, 2.0, 6.0]), 3.0);
    }

    #[test]
    fn max_skips_nan() {
        assert_eq!(max_or_zero(vec![1.0f64, f64::NAN, 4.0, 2.0]), 4.0);
        assert_eq!(max_or_zero(Vec::<f32>::new()), 0.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(12.3456f64, 2), 12.35);
        assert_eq!(round_to(-0.004f64, 2), -0.0);
    }

    #[test]
    fn squared_distance_of_3_4_5() {
        assert_eq!(squared_distance(&[0.0f64, 0.0], &[3.0, 4.0]), 25.0);
    }
}
