//! Marker distance fade.
//!
//! A marker fill surface fades in over `[min, 1.5 * min]` and fades out over
//! `[max, 1.5 * max]` of view-space distance. A non-positive threshold
//! disables that side of the fade. The WGSL `marker_fade` function in the
//! `fade` chunk evaluates the same formula.

/// Marker fade uniform, bound by the marker fill program.
///
/// Padded to 16 bytes for uniform buffer alignment.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MarkerFade {
    pub fade_distance_min: f32,
    pub fade_distance_max: f32,
    pub _pad: [f32; 2],
}

static_assertions::assert_eq_size!(MarkerFade, [u8; 16]);

impl MarkerFade {
    /// Create fade parameters. Non-positive values disable that threshold.
    pub fn new(fade_distance_min: f32, fade_distance_max: f32) -> Self {
        Self {
            fade_distance_min,
            fade_distance_max,
            _pad: [0.0; 2],
        }
    }

    /// Opacity at view-space `distance`.
    pub fn opacity(&self, distance: f32) -> f32 {
        fade_opacity(distance, self.fade_distance_min, self.fade_distance_max)
    }
}

/// Opacity of a marker fragment at view-space `distance`.
pub fn fade_opacity(distance: f32, fade_min: f32, fade_max: f32) -> f32 {
    let near = if fade_min > 0.0 {
        ((distance - fade_min) / (fade_min * 0.5)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let far = if fade_max > 0.0 {
        (1.0 - (distance - fade_max) / (fade_max * 0.5)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    near * far
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_opaque_between_thresholds() {
        assert_eq!(fade_opacity(50.0, 10.0, 100.0), 1.0);
        assert_eq!(fade_opacity(15.0, 10.0, 100.0), 1.0);
        assert_eq!(fade_opacity(100.0, 10.0, 100.0), 1.0);
    }

    #[test]
    fn test_transparent_outside_ramps() {
        assert_eq!(fade_opacity(10.0, 10.0, 100.0), 0.0);
        assert_eq!(fade_opacity(3.0, 10.0, 100.0), 0.0);
        assert_eq!(fade_opacity(150.0, 10.0, 100.0), 0.0);
        assert_eq!(fade_opacity(400.0, 10.0, 100.0), 0.0);
    }

    #[test]
    fn test_ramps_are_linear_and_monotonic() {
        assert!((fade_opacity(12.5, 10.0, 100.0) - 0.5).abs() < 1e-6);
        assert!((fade_opacity(125.0, 10.0, 100.0) - 0.5).abs() < 1e-6);

        let mut prev = 0.0;
        for i in 0..=50 {
            let o = fade_opacity(10.0 + i as f32 * 0.1, 10.0, 100.0);
            assert!(o >= prev);
            prev = o;
        }
        for i in 0..=50 {
            let o = fade_opacity(100.0 + i as f32, 10.0, 100.0);
            assert!(o <= prev);
            prev = o;
        }
    }

    #[test]
    fn test_non_positive_thresholds_disable_fade() {
        assert_eq!(fade_opacity(1.0e6, 10.0, 0.0), 1.0);
        assert_eq!(fade_opacity(0.0, 0.0, 100.0), 1.0);
        assert_eq!(fade_opacity(0.0, -1.0, -1.0), 1.0);
    }

    #[test]
    fn test_uniform_delegates_to_formula() {
        let fade = MarkerFade::new(10.0, 100.0);
        assert_eq!(fade.opacity(50.0), 1.0);
        assert_eq!(bytemuck::bytes_of(&fade).len(), 16);
    }
}
