/// Pearson correlation of paired samples.
///
/// `None` with fewer than two pairs or when either side is constant. Never
/// returns NaN.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    if is_constant(xs) || is_constant(ys) {
        return None;
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return None;
    }
    let r = cov / denom;
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Correlation over the rows where both series are defined.
pub fn pairwise_correlation(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let (xs, ys) = complete_pairs(x.iter().copied().zip(y.iter().copied()));
    pearson(&xs, &ys)
}

/// Split an iterator of nullable pairs into two vectors, dropping any pair
/// with a missing operand.
pub fn complete_pairs(
    pairs: impl Iterator<Item = (Option<f64>, Option<f64>)>,
) -> (Vec<f64>, Vec<f64>) {
    pairs
        .filter_map(|(a, b)| Some((a?, b?)))
        .unzip()
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_correlation() {
        let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);

        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[0.1, 0.2, 0.3], &[5.0, 5.0, 5.0]), None);
    }

    #[test]
    fn test_pairwise_drops_nulls() {
        let x = [None, Some(1.0), Some(2.0), Some(3.0), Some(100.0)];
        let y = [Some(7.0), Some(1.0), Some(2.0), Some(3.0), None];
        let r = pairwise_correlation(&x, &y).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }
}
