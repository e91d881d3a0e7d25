use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronState {
    pub voltage: f64,
    pub threshold: f64,
    pub after_spike_currents: Vec<f64>,
}

impl NeuronState {
    pub fn new(voltage: f64, threshold: f64, after_spike_currents: Vec<f64>) -> Self {
        Self {
            voltage,
            threshold,
            after_spike_currents,
        }
    }

    /// False if voltage, threshold or any after-spike current is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.voltage.is_finite()
            && self.threshold.is_finite()
            && self.after_spike_currents.iter().all(|asc| asc.is_finite())
    }
}

/// Per-time-step voltage, threshold and after-spike currents. `after_spike_currents[t][k]` is
/// the value of current `k` at step `t`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectories {
    pub voltage: Vec<f64>,
    pub threshold: Vec<f64>,
    pub after_spike_currents: Vec<Vec<f64>>,
}

impl Trajectories {
    pub fn filled_with_nan(num_steps: usize, num_after_spike_currents: usize) -> Self {
        Self {
            voltage: vec![f64::NAN; num_steps],
            threshold: vec![f64::NAN; num_steps],
            after_spike_currents: vec![vec![f64::NAN; num_after_spike_currents]; num_steps],
        }
    }

    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Copies `segment` into `self` starting at step `offset`. Steps of `segment` that would fall
    /// past the end of `self` are dropped.
    pub fn splice_at(&mut self, offset: usize, segment: &Trajectories) {
        let end = (offset + segment.len()).min(self.len());
        if offset >= end {
            return;
        }

        let n = end - offset;
        self.voltage[offset..end].copy_from_slice(&segment.voltage[..n]);
        self.threshold[offset..end].copy_from_slice(&segment.threshold[..n]);

        for (dst, src) in self.after_spike_currents[offset..end]
            .iter_mut()
            .zip(&segment.after_spike_currents)
        {
            dst.clone_from(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finiteness() {
        assert!(NeuronState::new(-0.07, -0.05, vec![0.0, 1e-12]).is_finite());
        assert!(!NeuronState::new(f64::NAN, -0.05, vec![]).is_finite());
        assert!(!NeuronState::new(-0.07, f64::INFINITY, vec![]).is_finite());
        assert!(!NeuronState::new(-0.07, -0.05, vec![0.0, f64::NEG_INFINITY]).is_finite());
    }

    #[test]
    fn splice() {
        let mut full = Trajectories::filled_with_nan(5, 1);
        let segment = Trajectories {
            voltage: vec![1.0, 2.0],
            threshold: vec![3.0, 4.0],
            after_spike_currents: vec![vec![5.0], vec![6.0]],
        };

        full.splice_at(2, &segment);

        assert!(full.voltage[1].is_nan());
        assert_eq!(full.voltage[2..4], [1.0, 2.0]);
        assert_eq!(full.threshold[2..4], [3.0, 4.0]);
        assert_eq!(full.after_spike_currents[3], vec![6.0]);
        assert!(full.voltage[4].is_nan());
    }

    #[test]
    fn splice_truncates_at_end() {
        let mut full = Trajectories::filled_with_nan(3, 0);
        let segment = Trajectories {
            voltage: vec![1.0, 2.0],
            threshold: vec![1.0, 2.0],
            after_spike_currents: vec![vec![], vec![]],
        };

        full.splice_at(2, &segment);
        assert_eq!(full.voltage[2], 1.0);

        full.splice_at(3, &segment);
        assert_eq!(full.len(), 3);
    }
}
