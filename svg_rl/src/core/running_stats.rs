//! Running observation statistics (Welford's online algorithm).
//!
//! These statistics are the shared "preprocessing parameters" every network
//! applies before it consumes an observation. They are fitted from observed
//! data by the outer loop and are constants as far as the losses are
//! concerned.

use serde::{Deserialize, Serialize};

/// Per-feature running mean and variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningMeanStd {
    mean: Vec<f64>,
    /// Sum of squared deviations; variance = var_sum / count.
    var_sum: Vec<f64>,
    count: f64,
    epsilon: f64,
}

impl RunningMeanStd {
    /// Statistics for `dim` features with the default epsilon.
    pub fn new(dim: usize) -> Self {
        Self::with_epsilon(dim, 1e-8)
    }

    /// Statistics with a custom lower bound on the standard deviation.
    pub fn with_epsilon(dim: usize, epsilon: f64) -> Self {
        Self {
            mean: vec![0.0; dim],
            var_sum: vec![0.0; dim],
            count: 0.0,
            epsilon,
        }
    }

    /// Fold one observation into the statistics.
    ///
    /// # Panics
    /// Panics if `obs.len()` differs from the tracked dimensionality.
    pub fn update(&mut self, obs: &[f32]) {
        assert_eq!(obs.len(), self.mean.len(), "observation has the wrong number of features");

        self.count += 1.0;
        let n = self.count;
        for ((mean, var_sum), &x) in self.mean.iter_mut().zip(self.var_sum.iter_mut()).zip(obs) {
            let x = f64::from(x);
            let before = x - *mean;
            *mean += before / n;
            *var_sum += before * (x - *mean);
        }
    }

    /// Fold a flattened `[n * dim]` batch into the statistics.
    ///
    /// # Panics
    /// Panics if `dim` is zero or `batch.len()` is not a multiple of it.
    pub fn update_batch(&mut self, batch: &[f32]) {
        let dim = self.mean.len();
        assert_eq!(batch.len() % dim, 0, "flattened batch length must be a multiple of dim");
        for obs in batch.chunks_exact(dim) {
            self.update(obs);
        }
    }

    /// Per-feature mean.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Per-feature population variance; ones until two samples are seen.
    pub fn variance(&self) -> Vec<f64> {
        if self.count < 2.0 {
            vec![1.0; self.mean.len()]
        } else {
            self.var_sum.iter().map(|&v| v / self.count).collect()
        }
    }

    /// Per-feature standard deviation, floored at epsilon.
    pub fn std(&self) -> Vec<f64> {
        self.variance()
            .into_iter()
            .map(|v| v.sqrt().max(self.epsilon))
            .collect()
    }

    /// Number of observations seen.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Number of tracked features.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Combine with statistics gathered elsewhere (parallel Welford).
    pub fn merge(&mut self, other: &RunningMeanStd) {
        assert_eq!(self.mean.len(), other.mean.len(), "cannot merge statistics of different dimensions");

        if other.count == 0.0 {
            return;
        }
        if self.count == 0.0 {
            *self = other.clone();
            return;
        }

        let total = self.count + other.count;
        for i in 0..self.mean.len() {
            let delta = other.mean[i] - self.mean[i];
            self.mean[i] += delta * other.count / total;
            self.var_sum[i] += other.var_sum[i] + delta * delta * self.count * other.count / total;
        }
        self.count = total;
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        self.mean.fill(0.0);
        self.var_sum.fill(0.0);
        self.count = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welford_mean() {
        let mut stats = RunningMeanStd::new(2);
        stats.update(&[1.0, 2.0]);
        stats.update(&[3.0, 4.0]);
        stats.update(&[5.0, 6.0]);

        assert!((stats.mean()[0] - 3.0).abs() < 1e-10);
        assert!((stats.mean()[1] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_welford_variance() {
        let mut stats = RunningMeanStd::new(1);
        // mean 5, variance 4
        stats.update_batch(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);

        assert!((stats.variance()[0] - 4.0).abs() < 1e-10);
        assert!((stats.std()[0] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_unit_variance_before_two_samples() {
        let mut stats = RunningMeanStd::new(3);
        assert_eq!(stats.std(), vec![1.0; 3]);
        stats.update(&[1.0, 2.0, 3.0]);
        assert_eq!(stats.std(), vec![1.0; 3]);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let mut left = RunningMeanStd::new(1);
        let mut right = RunningMeanStd::new(1);
        let mut all = RunningMeanStd::new(1);

        left.update_batch(&[1.0, 2.0, 3.0]);
        right.update_batch(&[4.0, 5.0, 6.0]);
        all.update_batch(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        left.merge(&right);
        assert!((left.mean()[0] - 3.5).abs() < 1e-10);
        assert!((left.variance()[0] - all.variance()[0]).abs() < 1e-10);
        assert_eq!(left.count(), 6.0);
    }

    #[test]
    fn test_reset() {
        let mut stats = RunningMeanStd::new(2);
        stats.update(&[1.0, 1.0]);
        stats.reset();
        assert_eq!(stats.count(), 0.0);
        assert_eq!(stats.mean(), &[0.0, 0.0]);
    }
}
