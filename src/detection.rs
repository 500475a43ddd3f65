//! Detection struct for input to the tracker.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One clustered observation in a frame.
///
/// Produced upstream by point-cloud clustering; the tracker only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Cluster centroid x (metres, sensor frame).
    pub x: f64,
    /// Cluster centroid y (metres, sensor frame).
    pub y: f64,
    /// Cluster centroid z (metres, sensor frame).
    pub z: f64,

    /// Bounding-box length (metres).
    pub length: f64,
    /// Bounding-box width (metres).
    pub width: f64,
    /// Bounding-box height (metres).
    pub height: f64,

    /// Number of points in the cluster.
    pub point_count: u32,

    /// 95th-percentile point height within the cluster.
    pub height_p95: f64,

    /// Mean return intensity of the cluster.
    pub intensity_mean: f64,

    /// Frame timestamp, nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
}

impl Detection {
    /// Create a point-like detection at the given centroid.
    ///
    /// Box dimensions and statistics are zero; use struct update syntax to
    /// fill them in.
    pub fn at(x: f64, y: f64, z: f64, timestamp_ns: i64) -> Self {
        Self {
            x,
            y,
            z,
            length: 0.0,
            width: 0.0,
            height: 0.0,
            point_count: 1,
            height_p95: 0.0,
            intensity_mean: 0.0,
            timestamp_ns,
        }
    }

    /// Set the bounding-box dimensions.
    pub fn with_box(mut self, length: f64, width: f64, height: f64) -> Self {
        self.length = length;
        self.width = width;
        self.height = height;
        self
    }

    /// Check that the detection can be fed to a filter.
    ///
    /// A detection is malformed if any coordinate is non-finite, any box
    /// dimension is negative or non-finite, or it holds no points.
    pub fn validate(&self) -> Result<()> {
        if !(self.x.is_finite() && self.y.is_finite() && self.z.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "non-finite centroid ({}, {}, {})",
                self.x, self.y, self.z
            )));
        }

        for (name, value) in [
            ("length", self.length),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "bounding-box {} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        if self.point_count == 0 {
            return Err(Error::InvalidInput("detection holds no points".to_string()));
        }

        Ok(())
    }

    /// Centroid projected onto the ground plane.
    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Object height: the height percentile when present, else the box height.
    pub fn object_height(&self) -> f64 {
        if self.height_p95 > 0.0 {
            self.height_p95
        } else {
            self.height
        }
    }
}
