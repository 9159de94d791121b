/// In-place L2 normalization. A vector whose norm is exactly zero is divided
/// by 1 instead, so it comes back unchanged rather than as NaN.
///
/// The sum of squares is accumulated in f64 so very large or very small
/// components neither overflow to infinity nor flush to zero.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm = v
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    let norm = if norm == 0.0 { 1.0 } else { norm };

    let narrow = norm as f32;
    if narrow.is_finite() {
        for x in v.iter_mut() {
            *x /= narrow;
        }
    } else {
        for x in v.iter_mut() {
            *x = (f64::from(*x) / norm) as f32;
        }
    }
}

/// Allocating variant of [`l2_normalize_in_place`].
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    l2_normalize_in_place(&mut out);
    out
}
