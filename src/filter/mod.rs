//! Kalman filtering for track kinematics.
//!
//! - `Filter` - ground-plane predict/update interface
//! - `ConstantVelocityKalman` - 2-D constant-velocity model used by the tracker

mod kalman;
mod traits;

pub use kalman::{ConstantVelocityKalman, INITIAL_VELOCITY_VARIANCE};
pub use traits::{Filter, ProcessNoise};
