//! Low-pass velocity estimate from successive poses.

/// Default smoothing coefficient (weight of the newest raw estimate).
pub const DEFAULT_VELOCITY_ALPHA: f64 = 0.3;

/// Exponentially smoothed finite-difference velocity.
///
/// Units follow the inputs: millimeters and milliseconds give mm/ms.
#[derive(Clone, Debug)]
pub struct VelocityEstimator {
    alpha: f64,
    previous: Option<([f64; 3], f64)>,
    velocity: [f64; 3],
}

impl VelocityEstimator {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            previous: None,
            velocity: [0.0; 3],
        }
    }

    /// Feed a position sampled at `time`. The first sample only seeds state;
    /// samples with a non-positive time step leave the estimate unchanged.
    pub fn update(&mut self, position: [f64; 3], time: f64) -> [f64; 3] {
        if let Some((prev_position, prev_time)) = self.previous {
            let dt = time - prev_time;
            if dt > 0.0 {
                for axis in 0..3 {
                    let raw = (position[axis] - prev_position[axis]) / dt;
                    self.velocity[axis] =
                        (1.0 - self.alpha) * self.velocity[axis] + self.alpha * raw;
                }
            }
        }
        self.previous = Some((position, time));
        self.velocity
    }

    pub fn velocity(&self) -> [f64; 3] {
        self.velocity
    }
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_VELOCITY_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_only_seeds() {
        let mut est = VelocityEstimator::default();
        assert_eq!(est.update([5.0, 5.0, 5.0], 1.0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn smooths_towards_constant_velocity() {
        let mut est = VelocityEstimator::new(0.5);
        est.update([0.0, 0.0, 0.0], 0.0);
        let v = est.update([2.0, 0.0, -2.0], 1.0);
        assert_eq!(v, [1.0, 0.0, -1.0]);
        let v = est.update([4.0, 0.0, -4.0], 2.0);
        assert_eq!(v, [1.5, 0.0, -1.5]);
    }

    #[test]
    fn ignores_non_advancing_time() {
        let mut est = VelocityEstimator::new(1.0);
        est.update([0.0; 3], 1.0);
        est.update([1.0, 0.0, 0.0], 2.0);
        let v = est.update([9.0, 0.0, 0.0], 2.0);
        assert_eq!(v, [1.0, 0.0, 0.0]);
    }
}
