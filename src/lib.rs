pub mod error;
pub mod extrapolation;
pub mod interval;
pub mod model;
pub mod params;
pub mod simulator;
pub mod spike_geometry;
pub mod state;

mod util;
