use serde::{Deserialize, Serialize};

/// Where and when the model would have spiked on its own, relative to the start of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSpike {
    pub grid_time: f64,
    pub grid_voltage: f64,
    pub interpolated_time: f64,
    pub interpolated_voltage: f64,
}

/// Intersection of two lines, one through `(0, v0)` and `(dt, v1)`, the other through `(0, th0)`
/// and `(dt, th1)`. Returns the time offset from 0 and the common value. The intersection may
/// lie outside `[0, dt]`, which is how callers extrapolate. Parallel lines give non-finite results.
pub fn line_crossing(dt: f64, v0: f64, v1: f64, th0: f64, th1: f64) -> (f64, f64) {
    let time = dt * (th0 - v0) / ((v1 - v0) - (th1 - th0));
    let value = th0 + (th1 - th0) * time / dt;
    (time, value)
}

/// Scans for the first sample with `voltage[t] > threshold[t]`. The grid spike is reported one
/// step before the crossing sample, the interpolated spike from the pair `(t - 1, t)`. If there
/// is no crossing inside the trajectory, the pair formed by the last sample and the one-past-end
/// values `(voltage_next, threshold_next)` is checked as well.
pub fn find_first_crossing(
    voltage: &[f64],
    threshold: &[f64],
    voltage_next: f64,
    threshold_next: f64,
    dt: f64,
) -> Option<ModelSpike> {
    debug_assert_eq!(voltage.len(), threshold.len());

    let crossing_step = voltage
        .iter()
        .zip(threshold)
        .position(|(voltage, threshold)| voltage > threshold);

    match crossing_step {
        // started above threshold, nothing to interpolate against
        Some(0) => Some(ModelSpike {
            grid_time: 0.0,
            grid_voltage: voltage[0],
            interpolated_time: 0.0,
            interpolated_voltage: voltage[0],
        }),
        Some(t) => Some(crossing_between(
            t - 1,
            voltage[t - 1],
            voltage[t],
            threshold[t - 1],
            threshold[t],
            voltage[t - 1],
            dt,
        )),
        None => {
            let last = voltage.len().checked_sub(1)?;
            if voltage_next > threshold_next {
                Some(crossing_between(
                    last,
                    voltage[last],
                    voltage_next,
                    threshold[last],
                    threshold_next,
                    voltage_next,
                    dt,
                ))
            } else {
                None
            }
        }
    }
}

fn crossing_between(
    step: usize,
    v0: f64,
    v1: f64,
    th0: f64,
    th1: f64,
    grid_voltage: f64,
    dt: f64,
) -> ModelSpike {
    let (offset, interpolated_voltage) = line_crossing(dt, v0, v1, th0, th1);
    let grid_time = dt * step as f64;

    ModelSpike {
        grid_time,
        grid_voltage,
        interpolated_time: grid_time + offset,
        interpolated_voltage,
    }
}
