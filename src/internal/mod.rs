//! Internal numerical routines.
//!
//! - hungarian: optimal rectangular assignment (Kuhn-Munkres)

pub mod hungarian;
