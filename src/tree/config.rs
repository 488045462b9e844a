//! Pattern tree generation parameters.

use serde::{Deserialize, Serialize};

use crate::error::{RekhaError, Result};

/// Parameters for pattern tree generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParam {
    /// Maximum tree depth. At depth `d` the detector width is divided
    /// into `2^d` bins. Valid range 1..=16.
    pub max_depth: u16,

    /// Width of the tracking region (m).
    pub width: f64,

    /// Z positions of the detector layers (m).
    ///
    /// Must be strictly increasing with at least two entries.
    pub zpos: Vec<f64>,

    /// Maximum track slope, in units of the detector width per layer-stack
    /// depth (0 = perpendicular tracks only).
    pub max_slope: f64,
}

impl Default for TreeParam {
    fn default() -> Self {
        Self {
            max_depth: 10,
            width: 2.0,
            zpos: vec![0.0, 0.1, 0.2, 0.3],
            max_slope: 0.2,
        }
    }
}

impl TreeParam {
    /// Number of tree levels (`max_depth + 1`, counting the root level).
    #[inline]
    pub fn n_levels(&self) -> u16 {
        self.max_depth + 1
    }

    /// Number of detector layers spanned by each pattern.
    #[inline]
    pub fn n_planes(&self) -> usize {
        self.zpos.len()
    }

    /// Validate the parameters and map the layer z positions affinely to
    /// `[0, 1]`. Degenerate input is rejected.
    pub fn normalized(&self) -> Result<TreeParam> {
        if !(1..=16).contains(&self.max_depth) {
            return Err(RekhaError::Param(format!(
                "max_depth {} outside 1..=16",
                self.max_depth
            )));
        }
        if !(self.width > 0.0) {
            return Err(RekhaError::Param(format!("width {} not positive", self.width)));
        }
        if self.zpos.len() < 2 {
            return Err(RekhaError::Param(format!(
                "need at least 2 layer positions, got {}",
                self.zpos.len()
            )));
        }
        if self.zpos.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RekhaError::Param(
                "layer z positions not strictly increasing".into(),
            ));
        }
        if self.max_slope < 0.0 {
            return Err(RekhaError::Param(format!(
                "max_slope {} is negative",
                self.max_slope
            )));
        }

        let z0 = self.zpos[0];
        let zsize = self.zpos[self.zpos.len() - 1] - z0;
        let zpos = self.zpos.iter().map(|z| (z - z0) / zsize).collect();

        Ok(TreeParam {
            max_depth: self.max_depth,
            width: self.width,
            zpos,
            max_slope: self.max_slope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalized_maps_zpos_to_unit_interval() {
        let param = TreeParam {
            max_depth: 4,
            width: 1.5,
            zpos: vec![1.0, 1.5, 3.0],
            max_slope: 0.1,
        };
        let norm = param.normalized().unwrap();

        assert_relative_eq!(norm.zpos[0], 0.0);
        assert_relative_eq!(norm.zpos[1], 0.25);
        assert_relative_eq!(norm.zpos[2], 1.0);
        assert_relative_eq!(norm.max_slope, 0.1);
        assert_eq!(norm.n_levels(), 5);
        assert_eq!(norm.n_planes(), 3);
    }

    #[test]
    fn test_normalized_rejects_bad_depth() {
        let mut param = TreeParam::default();
        param.max_depth = 0;
        assert!(param.normalized().is_err());
        param.max_depth = 17;
        assert!(param.normalized().is_err());
    }

    #[test]
    fn test_normalized_rejects_degenerate_geometry() {
        let mut param = TreeParam::default();
        param.width = 0.0;
        assert!(param.normalized().is_err());

        let mut param = TreeParam::default();
        param.zpos = vec![0.0];
        assert!(param.normalized().is_err());

        let mut param = TreeParam::default();
        param.zpos = vec![0.0, 0.1, 0.1];
        assert!(param.normalized().is_err());

        let mut param = TreeParam::default();
        param.max_slope = -0.5;
        assert!(param.normalized().is_err());
    }
}
