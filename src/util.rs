/// Time of every step index on a grid with step size `dt`.
pub fn grid_times(indices: impl IntoIterator<Item = usize>, dt: f64) -> Vec<f64> {
    indices.into_iter().map(|idx| idx as f64 * dt).collect()
}

/// Piecewise-linear interpolation of the samples `(xp, fp)` at the points `xs`. `xp` must be
/// sorted ascending. Points outside `[xp[0], xp[last]]` take the nearest boundary sample, and
/// points coinciding with a node get that node's sample exactly.
pub fn interpolate_clamped(xp: &[f64], fp: &[f64], xs: &[f64]) -> Vec<f64> {
    debug_assert_eq!(xp.len(), fp.len());

    if xp.is_empty() {
        return vec![f64::NAN; xs.len()];
    }

    let last = xp.len() - 1;
    let mut segment = 0;

    xs.iter()
        .map(|&x| {
            if x <= xp[0] {
                return fp[0];
            }
            if x >= xp[last] {
                return fp[last];
            }

            // xs is monotone in practice, restart the search otherwise
            if x < xp[segment] {
                segment = 0;
            }
            while xp[segment + 1] <= x {
                segment += 1;
            }

            let (x0, x1) = (xp[segment], xp[segment + 1]);
            let (f0, f1) = (fp[segment], fp[segment + 1]);
            if x == x0 {
                return f0;
            }
            f0 + (f1 - f0) * (x - x0) / (x1 - x0)
        })
        .collect()
}
