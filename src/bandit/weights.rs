use std::cmp::Ordering;

use super::kl::{kl_bernoulli, kl_ratio, weighted_kl};

// Bracket growth stops here so endpoints stay finite.
const MAX_BRACKET_DOUBLINGS: u32 = 64;

/// Optimal sampling proportions `w*` for Bernoulli arms (Garivier & Kaufmann, 2016).
///
/// Both nested bisections stop when the bracket is narrower than `tolerance`
/// or after `max_iterations`, returning the bracket midpoint; running out of
/// iterations is not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSolver {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for WeightSolver {
    fn default() -> Self {
        Self { tolerance: 1e-6, max_iterations: 100 }
    }
}

impl WeightSolver {
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self { tolerance, max_iterations }
    }

    /// Allocation vector for the empirical `means`, in the same arm order.
    ///
    /// Entries are in `[0, 1]` and sum to 1. When several arms share the top
    /// mean the result is uniform over exactly those arms.
    ///
    /// ```
    /// use ai_2048_tas::bandit::WeightSolver;
    /// let w = WeightSolver::default().optimal_weights(&[0.6, 0.4]);
    /// assert!((w[0] - 0.5).abs() < 1e-3 && (w[1] - 0.5).abs() < 1e-3);
    /// assert_eq!(WeightSolver::default().optimal_weights(&[0.7, 0.7, 0.1]), vec![0.5, 0.5, 0.0]);
    /// ```
    pub fn optimal_weights(&self, means: &[f64]) -> Vec<f64> {
        let k = means.len();
        if k == 0 {
            return Vec::new();
        }
        let top = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let leaders: Vec<usize> = (0..k).filter(|&i| means[i] == top).collect();
        if leaders.len() > 1 || k == 1 {
            let share = 1.0 / leaders.len() as f64;
            let mut w = vec![0.0; k];
            for &i in &leaders {
                w[i] = share;
            }
            return w;
        }

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| means[b].partial_cmp(&means[a]).unwrap_or(Ordering::Equal));
        let sorted: Vec<f64> = order.iter().map(|&i| means[i]).collect();

        let y = self.solve_slack(&sorted);
        let mut x = Vec::with_capacity(k);
        x.push(1.0);
        for &mu in &sorted[1..] {
            x.push(self.solve_ratio(sorted[0], mu, y));
        }
        let total: f64 = x.iter().sum();

        let mut w = vec![0.0; k];
        for (pos, &arm) in order.iter().enumerate() {
            w[arm] = x[pos] / total;
        }
        w
    }

    /// Inner problem: `x >= 0` with `information_cost(x) = y`.
    fn solve_ratio(&self, mu_best: f64, mu_arm: f64, y: f64) -> f64 {
        let g = |x: f64| information_cost(mu_best, mu_arm, x) - y;
        let (mut lo, mut hi) = (0.0, 1.0);
        let mut grown = 0;
        while g(hi) < 0.0 && grown < self.max_iterations.min(MAX_BRACKET_DOUBLINGS) {
            lo = hi;
            hi *= 2.0;
            grown += 1;
        }
        self.bisect(lo, hi, |x| g(x) < 0.0)
    }

    /// Outer problem: slack `y` where the balance sum equals 1.
    fn solve_slack(&self, sorted: &[f64]) -> f64 {
        let mu_best = sorted[0];
        let balance = |y: f64| -> f64 {
            sorted[1..]
                .iter()
                .map(|&mu| {
                    let x = self.solve_ratio(mu_best, mu, y);
                    let m = mixture(mu_best, mu, x);
                    kl_ratio(kl_bernoulli(mu_best, m), kl_bernoulli(mu, m))
                })
                .sum()
        };
        let mut hi = kl_bernoulli(mu_best, sorted[1]);
        if !hi.is_finite() {
            hi = 1.0;
            let mut grown = 0;
            while balance(hi) < 1.0 && grown < self.max_iterations.min(MAX_BRACKET_DOUBLINGS) {
                hi *= 2.0;
                grown += 1;
            }
        }
        self.bisect(0.0, hi, |y| balance(y) < 1.0)
    }

    /// Shrink `[lo, hi]` toward the sign change; `below(mid)` is true when the
    /// root lies above `mid`.
    fn bisect<F: Fn(f64) -> bool>(&self, mut lo: f64, mut hi: f64, below: F) -> f64 {
        for _ in 0..self.max_iterations {
            if hi - lo < self.tolerance {
                break;
            }
            let mid = 0.5 * (lo + hi);
            if below(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

#[inline]
fn mixture(mu_best: f64, mu_arm: f64, x: f64) -> f64 {
    let n1 = 1.0 / (1.0 + x);
    let n2 = x / (1.0 + x);
    n1 * mu_best + n2 * mu_arm
}

/// `(1 + x) * (n1 KL(mu_best, m) + n2 KL(mu_arm, m))` with `n1 = 1/(1+x)`,
/// `n2 = x/(1+x)` and `m` the mixture mean. Increasing in `x`, zero at 0.
fn information_cost(mu_best: f64, mu_arm: f64, x: f64) -> f64 {
    let n1 = 1.0 / (1.0 + x);
    let n2 = x / (1.0 + x);
    let m = mixture(mu_best, mu_arm, x);
    (1.0 + x) * (weighted_kl(n1, kl_bernoulli(mu_best, m)) + weighted_kl(n2, kl_bernoulli(mu_arm, m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_simplex(w: &[f64]) {
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum {sum} for {w:?}");
        assert!(w.iter().all(|&x| (0.0..=1.0).contains(&x)), "{w:?}");
    }

    #[test]
    fn single_and_empty() {
        let s = WeightSolver::default();
        assert!(s.optimal_weights(&[]).is_empty());
        assert_eq!(s.optimal_weights(&[0.3]), vec![1.0]);
    }

    #[test]
    fn ties_are_uniform_over_leaders() {
        let s = WeightSolver::default();
        assert_eq!(s.optimal_weights(&[0.2, 0.5, 0.5]), vec![0.0, 0.5, 0.5]);
        assert_eq!(s.optimal_weights(&[0.0, 0.0, 0.0, 0.0]), vec![0.25; 4]);
        let w = s.optimal_weights(&[1.0, 1.0, 1.0, 0.1]);
        assert_eq!(w[3], 0.0);
        assert_eq!(w[0], w[1]);
        assert_eq!(w[1], w[2]);
    }

    #[test]
    fn symmetric_pair_splits_evenly() {
        let w = WeightSolver::new(1e-10, 200).optimal_weights(&[0.6, 0.4]);
        assert!((w[0] - 0.5).abs() < 1e-4, "{w:?}");
        assert!((w[1] - 0.5).abs() < 1e-4, "{w:?}");
    }

    #[test]
    fn always_on_the_simplex() {
        let s = WeightSolver::default();
        for means in [
            vec![0.9, 0.1, 0.5, 0.85],
            vec![1.0, 0.0],
            vec![1.0, 0.0, 0.3],
            vec![0.05, 0.0, 0.01],
            vec![0.5, 0.49999, 0.2],
            vec![1.0, 0.0, 0.0, 0.0],
        ] {
            assert_simplex(&s.optimal_weights(&means));
        }
    }

    #[test]
    fn closer_arms_get_more_samples() {
        let w = WeightSolver::default().optimal_weights(&[0.2, 0.9, 0.5]);
        assert_simplex(&w);
        assert!(w[2] > w[0], "{w:?}");
        assert!(w[1] > 0.0);
    }

    #[test]
    fn weights_follow_their_arms() {
        let s = WeightSolver::default();
        let a = s.optimal_weights(&[0.8, 0.3, 0.6]);
        let b = s.optimal_weights(&[0.6, 0.8, 0.3]);
        assert!((a[0] - b[1]).abs() < 1e-9);
        assert!((a[1] - b[2]).abs() < 1e-9);
        assert!((a[2] - b[0]).abs() < 1e-9);
    }

    #[test]
    fn information_cost_is_monotone() {
        let mut prev = information_cost(0.7, 0.3, 0.0);
        assert_eq!(prev, 0.0);
        for i in 1..50 {
            let cur = information_cost(0.7, 0.3, i as f64 * 0.5);
            assert!(cur >= prev);
            assert!(cur < kl_bernoulli(0.7, 0.3));
            prev = cur;
        }
    }

    #[test]
    fn iteration_cap_still_returns_weights() {
        let w = WeightSolver::new(0.0, 3).optimal_weights(&[0.7, 0.4, 0.1]);
        assert_simplex(&w);
    }
}
