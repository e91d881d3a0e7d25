use glif_forced::{model::LinearGlif, simulator};

#[path = "../scenario_params.rs"]
mod scenario_params;

fn main() {
    let params = scenario_params::get_scenario_params();
    let model = LinearGlif::new(params.model).unwrap();
    let mut simulator = simulator::create_simulator(params.simulator, model).unwrap();

    let num_steps = 20_000;

    // 100 ms of rest, then a square pulse until the last 100 ms
    let stimulus: Vec<f64> = (0..num_steps)
        .map(|t| {
            if (2000..num_steps - 2000).contains(&t) {
                3.2e-10
            } else {
                0.0
            }
        })
        .collect();
    let response = vec![0.0; num_steps];
    let bio_spike_indices: Vec<usize> = (2400..num_steps - 2000).step_by(700).collect();

    let result = simulator
        .run_with_biological_spikes(&stimulus, &response, &bio_spike_indices)
        .unwrap();

    let voltage_checksum: f64 = result
        .trajectories
        .voltage
        .iter()
        .filter(|v| v.is_finite())
        .sum();

    let threshold_checksum: f64 = result
        .trajectories
        .threshold
        .iter()
        .filter(|th| th.is_finite())
        .sum();

    let spike_time_checksum: f64 = result.interpolated_model_spike_times.iter().sum();

    println!("batch result:");
    println!("...biological spikes: {}", bio_spike_indices.len());
    println!("...voltage checksum: {}", voltage_checksum);
    println!("...threshold checksum: {}", threshold_checksum);
    println!("...interpolated spike time checksum: {}", spike_time_checksum);

    let per_spike = serde_json::json!({
        "grid_model_spike_times": result.grid_model_spike_times,
        "interpolated_model_spike_times": result.interpolated_model_spike_times,
        "grid_isi": result.grid_isi,
        "interpolated_isi": result.interpolated_isi,
        "grid_bio_spike_model_voltage": result.grid_bio_spike_model_voltage,
        "grid_bio_spike_model_threshold": result.grid_bio_spike_model_threshold,
    });

    println!("{}", serde_json::to_string_pretty(&per_spike).unwrap());
}
