/// KL divergence `KL(p || q)` between Bernoulli(p) and Bernoulli(q).
///
/// `KL(p, p) = 0`; for `q` in {0, 1} and `p != q` the result is `+inf`.
///
/// ```
/// use ai_2048_tas::bandit::kl_bernoulli;
/// assert_eq!(kl_bernoulli(0.3, 0.3), 0.0);
/// assert!(kl_bernoulli(0.5, 1.0).is_infinite());
/// assert!(kl_bernoulli(0.2, 0.6) != kl_bernoulli(0.6, 0.2));
/// ```
pub fn kl_bernoulli(p: f64, q: f64) -> f64 {
    if p == q {
        return 0.0;
    }
    if q <= 0.0 || q >= 1.0 {
        return f64::INFINITY;
    }
    let mut kl = 0.0;
    if p > 0.0 {
        kl += p * (p / q).ln();
    }
    if p < 1.0 {
        kl += (1.0 - p) * ((1.0 - p) / (1.0 - q)).ln();
    }
    kl
}

/// `weight * kl` with a zero weight absorbing an infinite divergence.
#[inline]
pub(crate) fn weighted_kl(weight: f64, kl: f64) -> f64 {
    if weight == 0.0 { 0.0 } else { weight * kl }
}

/// `num / den` for KL values, resolving the 0 and `inf` cases without NaN.
pub(crate) fn kl_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        if num == 0.0 { 0.0 } else { f64::INFINITY }
    } else if den.is_infinite() {
        if num.is_infinite() { 1.0 } else { 0.0 }
    } else {
        num / den
    }
}
