//! Jittered stride sampling for the downsample.

use rand::Rng;

/// Picks one vertex index per window of `stride` consecutive indices, at a
/// random position inside the window.
///
/// The `k`-th sample is taken at index `k * stride + j` with `j` drawn
/// uniformly from `[0, stride)`, which is a jitter of `[-stride/2, stride/2)`
/// around the window centre. A stride of 1 samples every vertex.
#[derive(Debug)]
pub struct StridedSampler<R> {
    stride: u64,
    window_start: u64,
    next: u64,
    rng: R,
}

impl<R: Rng> StridedSampler<R> {
    /// Creates a sampler.
    ///
    /// # Panics
    /// Panics if `stride` is zero.
    pub fn new(stride: u64, rng: R) -> Self {
        assert!(stride > 0, "Sample stride must be positive");
        let mut sampler = Self {
            stride,
            window_start: 0,
            next: 0,
            rng,
        };
        sampler.reset();
        sampler
    }

    /// Restarts the window sequence at index 0, for a new input file.
    pub fn reset(&mut self) {
        self.window_start = 0;
        self.next = self.draw();
    }

    /// Returns `true` if vertex `index` should be sampled.
    ///
    /// Indices must be presented in increasing order, starting from 0 after
    /// each [`reset`](Self::reset).
    pub fn accept(&mut self, index: u64) -> bool {
        if index != self.next {
            return false;
        }
        self.window_start += self.stride;
        self.next = self.draw();
        true
    }

    /// The sampling stride.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    fn draw(&mut self) -> u64 {
        self.window_start + self.rng.gen_range(0..self.stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sampled(stride: u64, n: u64, seed: u64) -> Vec<u64> {
        let mut sampler = StridedSampler::new(stride, StdRng::seed_from_u64(seed));
        (0..n).filter(|&i| sampler.accept(i)).collect()
    }

    #[test]
    fn stride_one_takes_everything() {
        assert_eq!(sampled(1, 8, 3), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn one_sample_per_window() {
        let picks = sampled(10, 1000, 7);
        assert_eq!(picks.len(), 100);
        for (k, &i) in picks.iter().enumerate() {
            let k = k as u64;
            assert!(i >= k * 10 && i < (k + 1) * 10, "sample {i} outside window {k}");
        }
    }

    #[test]
    fn jitter_is_not_periodic() {
        let picks = sampled(10, 1000, 11);
        let offsets: std::collections::HashSet<u64> = picks.iter().map(|i| i % 10).collect();
        assert!(offsets.len() > 1);
    }

    #[test]
    fn same_seed_same_samples() {
        assert_eq!(sampled(7, 500, 99), sampled(7, 500, 99));
    }

    #[test]
    fn reset_restarts_windows() {
        let mut sampler = StridedSampler::new(4, StdRng::seed_from_u64(1));
        let first: Vec<u64> = (0..8).filter(|&i| sampler.accept(i)).collect();
        sampler.reset();
        let second: Vec<u64> = (0..8).filter(|&i| sampler.accept(i)).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert!(second[0] < 4);
    }
}
