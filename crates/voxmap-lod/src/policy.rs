//! Distance-based LOD policies.

use voxmap_config::LodConfig;
use voxmap_tile::TileAddress;

use crate::LodError;

/// Maps a cell's horizontal distance from the camera and a quality level to a
/// LOD index, 0 being the finest.
///
/// Implementations should be pure. Callers enforce monotonicity in distance
/// themselves, so a policy that is not monotonic is tolerated.
pub trait LodPolicy {
    fn select_lod(&self, distance: f64, quality: f32) -> u8;
}

impl<F> LodPolicy for F
where
    F: Fn(f64, f32) -> u8,
{
    fn select_lod(&self, distance: f64, quality: f32) -> u8 {
        self(distance, quality)
    }
}

/// Distance boundaries between LOD levels.
///
/// `thresholds[i]` is the distance at which LOD `i + 1` takes over; the last
/// level extends to infinity.
#[derive(Clone, Debug, PartialEq)]
pub struct LodThresholds {
    thresholds: Vec<f64>,
}

impl LodThresholds {
    /// Validate and wrap a list of strictly increasing positive distances.
    pub fn new(thresholds: Vec<f64>) -> Result<Self, LodError> {
        if thresholds.is_empty() {
            return Err(LodError::Empty);
        }
        if thresholds.len() > TileAddress::MAX_LOD as usize {
            return Err(LodError::TooManyLevels {
                count: thresholds.len(),
                max: TileAddress::MAX_LOD,
            });
        }
        for (index, &value) in thresholds.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(LodError::NotPositive { index, value });
            }
            if index > 0 && value <= thresholds[index - 1] {
                return Err(LodError::NotIncreasing { index, value });
            }
        }
        Ok(Self { thresholds })
    }

    /// The coarsest LOD level these thresholds produce.
    pub fn max_lod(&self) -> u8 {
        self.thresholds.len() as u8
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            thresholds: vec![256.0, 512.0, 1024.0, 2048.0],
        }
    }
}

/// The default policy: fixed distance bands stretched by the quality level.
///
/// A quality of 2.0 doubles every band, keeping finer tiles twice as far out.
/// Non-positive or non-finite quality is treated as 1.0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThresholdPolicy {
    thresholds: LodThresholds,
}

impl ThresholdPolicy {
    pub fn new(thresholds: LodThresholds) -> Self {
        Self { thresholds }
    }

    /// Build from the `[lod]` configuration section.
    pub fn from_config(config: &LodConfig) -> Result<Self, LodError> {
        LodThresholds::new(config.thresholds.clone()).map(Self::new)
    }

    pub fn thresholds(&self) -> &LodThresholds {
        &self.thresholds
    }
}

impl LodPolicy for ThresholdPolicy {
    fn select_lod(&self, distance: f64, quality: f32) -> u8 {
        let scale = if quality.is_finite() && quality > 0.0 {
            quality as f64
        } else {
            1.0
        };
        self.thresholds
            .thresholds
            .iter()
            .position(|&t| distance < t * scale)
            .map_or(self.thresholds.max_lod(), |i| i as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ThresholdPolicy {
        ThresholdPolicy::new(LodThresholds::new(vec![100.0, 200.0, 400.0]).unwrap())
    }

    #[test]
    fn test_threshold_boundary_behavior() {
        let policy = policy();
        assert_eq!(policy.select_lod(0.0, 1.0), 0);
        assert_eq!(policy.select_lod(99.9, 1.0), 0);
        assert_eq!(policy.select_lod(100.0, 1.0), 1);
        assert_eq!(policy.select_lod(399.9, 1.0), 2);
        assert_eq!(policy.select_lod(400.0, 1.0), 3);
        assert_eq!(policy.select_lod(f64::MAX, 1.0), 3);
    }

    #[test]
    fn test_quality_scales_bands() {
        let policy = policy();
        assert_eq!(policy.select_lod(150.0, 1.0), 1);
        assert_eq!(policy.select_lod(150.0, 2.0), 0);
        assert_eq!(policy.select_lod(150.0, 0.5), 2);
        assert_eq!(policy.select_lod(150.0, 0.0), 1);
        assert_eq!(policy.select_lod(150.0, f32::NAN), 1);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert_eq!(LodThresholds::new(vec![]), Err(LodError::Empty));
        assert!(matches!(
            LodThresholds::new(vec![100.0, 50.0]),
            Err(LodError::NotIncreasing { index: 1, .. })
        ));
        assert!(matches!(
            LodThresholds::new(vec![-1.0]),
            Err(LodError::NotPositive { index: 0, .. })
        ));
        assert!(matches!(
            LodThresholds::new((1..=40).map(f64::from).collect()),
            Err(LodError::TooManyLevels { count: 40, .. })
        ));
    }

    #[test]
    fn test_from_config_uses_configured_bands() {
        let config = LodConfig {
            thresholds: vec![64.0, 128.0],
            ..Default::default()
        };
        let policy = ThresholdPolicy::from_config(&config).unwrap();
        assert_eq!(policy.thresholds().max_lod(), 2);
        assert_eq!(policy.select_lod(100.0, 1.0), 1);
    }

    #[test]
    fn test_closures_are_policies() {
        let flat = |_: f64, _: f32| 3u8;
        assert_eq!(flat.select_lod(10.0, 1.0), 3);
    }
}
