//! Probability-vector helpers

/// Total mass of a vector.
pub fn mass(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Scales `values` to sum to 1. A vector without positive mass becomes zeros.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let total = mass(values);
    if total > 0.0 {
        values.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; values.len()]
    }
}

/// Normalises raw counts into a distribution.
pub fn normalize_counts(counts: &[u64]) -> Vec<f64> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    let total = total as f64;
    counts.iter().map(|&c| c as f64 / total).collect()
}

/// Overwrites the last entry with `1 - sum(rest)` so the vector sums to 1.
pub fn fix_last_entry(values: &mut [f64]) {
    if let Some((last, rest)) = values.split_last_mut() {
        *last = 1.0 - rest.iter().sum::<f64>();
    }
}

/// `x * log2(x)` with `0 * log2(0) = 0`.
pub fn x_log2_x(x: f64) -> f64 {
    if x > 0.0 {
        x * x.log2()
    } else {
        0.0
    }
}

/// Negated entropy of a distribution in bits: `Σ p log2 p`.
pub fn neg_entropy(distribution: &[f64]) -> f64 {
    distribution.iter().map(|&p| x_log2_x(p)).sum()
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Row vector times matrix: `out[j] = Σ_i v[i] * m[i][j]`.
pub fn vec_mat_mul(v: &[f64], m: &[Vec<f64>]) -> Vec<f64> {
    let width = m.first().map_or(0, Vec::len);
    let mut out = vec![0.0; width];
    for (&scale, row) in v.iter().zip(m) {
        if scale == 0.0 {
            continue;
        }
        for (o, &x) in out.iter_mut().zip(row) {
            *o += scale * x;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zero_mass() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(normalize(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(normalize_counts(&[0, 0, 0]), vec![0.0; 3]);
        assert_eq!(normalize_counts(&[1, 1, 2]), vec![0.25, 0.25, 0.5]);
    }

    #[test]
    fn test_fix_last_entry() {
        let mut v = vec![0.1, 0.2, 0.3];
        fix_last_entry(&mut v);
        assert!((v[2] - 0.7).abs() < 1e-12);
        let mut empty: Vec<f64> = vec![];
        fix_last_entry(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_entropy_convention() {
        assert_eq!(x_log2_x(0.0), 0.0);
        assert_eq!(neg_entropy(&[1.0, 0.0]), 0.0);
        assert!((neg_entropy(&[0.5, 0.5]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_vec_mat_mul() {
        let m = vec![vec![0.0, 1.0], vec![0.5, 0.5]];
        assert_eq!(vec_mat_mul(&[1.0, 0.0], &m), vec![0.0, 1.0]);
        assert_eq!(vec_mat_mul(&[0.5, 0.5], &m), vec![0.25, 0.75]);
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }
}
