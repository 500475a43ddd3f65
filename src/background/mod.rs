//! Background/foreground separation over a polar occupancy grid.
//!
//! The grid keeps one noise-floor estimate per (ring, azimuth) cell. A point
//! close to its cell's floor is background; anything else is foreground until
//! the same deviation has been seen `neighbour_confirmation_count` times in a
//! row, at which point the floor moves to it.

mod acceptance;
mod cell;
mod grid;
mod params;
mod settle;

pub use acceptance::{default_buckets, AcceptanceMetrics, DEFAULT_BUCKET_METERS};
pub use cell::{BackgroundCell, CellOutcome};
pub use grid::{BackgroundGrid, Classification, GridStatus, LidarPoint};
pub use params::{
    BackgroundParams, BackgroundParamsPatch, GridGeometry, DEFAULT_AZIMUTH_BINS,
    DEFAULT_NEIGHBOUR_CONFIRMATION_COUNT, DEFAULT_RINGS,
};
pub use settle::{wait_for_settle, wait_for_settle_ms, SettleOutcome, DEFAULT_SETTLE_POLL_INTERVAL};
