/// Auto-adjust from the raw luminance histogram
///
/// The raw histogram bins linear luma in log2 space, so percentiles read
/// straight off it as stops. The heuristic is closed-form: pick exposure so
/// the median lands on the target, back off if that would clip the high
/// percentile, then set tone offsets from how much of the histogram sits in
/// the deep shadows or above the white target.

use crate::config::AutoAdjustConfig;
use crate::gpu::histogram::{raw_bin_ev, HISTOGRAM_BINS, RAW_EV_MAX};
use crate::state::uniforms::{Field, Uniforms};

/// Tone offsets derived by [`calculate_auto_settings`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutoSettings {
    /// Total exposure shift in stops (includes whatever base exposure provides)
    pub exposure: f32,
    pub blacks: f32,
    pub whites: f32,
    pub shadows: f32,
    pub highlights: f32,
}

impl AutoSettings {
    /// Write into `uniforms`, accounting for the image's base exposure
    pub fn apply(&self, uniforms: &mut Uniforms) {
        let base = uniforms.base_exposure;
        uniforms.set_clamped(Field::Exposure, self.exposure - base);
        uniforms.set_clamped(Field::Blacks, self.blacks);
        uniforms.set_clamped(Field::Whites, self.whites);
        uniforms.set_clamped(Field::Shadows, self.shadows);
        uniforms.set_clamped(Field::Highlights, self.highlights);
    }
}

/// Cumulative view of a raw histogram
struct Distribution<'a> {
    bins: &'a [u32; HISTOGRAM_BINS],
    total: f64,
}

impl Distribution<'_> {
    /// EV at which `fraction` of the pixels lie at or below
    fn percentile(&self, fraction: f32) -> f32 {
        let target = (fraction.clamp(0.0, 1.0) as f64) * self.total;
        let mut cumulative = 0.0;
        for (i, &count) in self.bins.iter().enumerate() {
            cumulative += count as f64;
            if cumulative >= target && count > 0 {
                return raw_bin_ev(i);
            }
        }
        RAW_EV_MAX
    }

    /// Fraction of pixels whose EV, after shifting by `shift`, is below `ev`
    fn fraction_below(&self, ev: f32, shift: f32) -> f32 {
        let below: u64 = self
            .bins
            .iter()
            .enumerate()
            .filter(|(i, _)| raw_bin_ev(*i) + shift < ev)
            .map(|(_, &c)| c as u64)
            .sum();
        (below as f64 / self.total) as f32
    }
}

/// Derive tone settings from a raw log-luma histogram
pub fn calculate_auto_settings(raw: &[u32; HISTOGRAM_BINS], config: &AutoAdjustConfig) -> AutoSettings {
    let total: u64 = raw.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return AutoSettings::default();
    }
    let dist = Distribution { bins: raw, total: total as f64 };

    let low = dist.percentile(config.low_clip);
    let median = dist.percentile(0.5);
    let high = dist.percentile(1.0 - config.high_clip);

    let target_mid = config.target_median.max(1e-4).log2();
    let target_white = config.target_white.max(1e-4).log2();

    let from_median = target_mid - median;
    let from_white = target_white - high;
    // Meet in the middle when hitting the median target would clip
    let exposure = if high + from_median > target_white {
        (from_median + from_white) * 0.5
    } else {
        from_median
    }
    .clamp(-config.max_exposure_shift, config.max_exposure_shift);

    let low_after = low + exposure;
    let high_after = high + exposure;

    // Deep shadows: more than ~4 stops under mid-gray
    let deep = dist.fraction_below(target_mid - 4.0, exposure);
    let shadows = ((deep - 0.05) * 4.0).clamp(0.0, 0.6);

    let over = 1.0 - dist.fraction_below(target_white, exposure);
    let highlights = -((over - 0.02) * 4.0).clamp(0.0, 0.6);

    // Lift-free shadows look hazy; pull blacks down when the low end is high
    let black_floor = target_mid - 6.0;
    let blacks = -((low_after - black_floor) / 6.0).clamp(0.0, 0.5);

    let whites = ((target_white - high_after) / 2.0).clamp(0.0, 0.5);

    let settings = AutoSettings {
        exposure,
        blacks,
        whites,
        shadows,
        highlights,
    };
    tracing::info!(
        "🪄 Auto adjust: low {:.2} EV, median {:.2} EV, high {:.2} EV -> {:?}",
        low,
        median,
        high,
        settings
    );
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::histogram::raw_bin_for_luma;

    fn histogram_of(lumas: &[(f32, u32)]) -> [u32; HISTOGRAM_BINS] {
        let mut h = [0u32; HISTOGRAM_BINS];
        for &(luma, count) in lumas {
            h[raw_bin_for_luma(luma)] += count;
        }
        h
    }

    #[test]
    fn test_empty_histogram() {
        let h = [0u32; HISTOGRAM_BINS];
        assert_eq!(calculate_auto_settings(&h, &AutoAdjustConfig::default()), AutoSettings::default());
    }

    #[test]
    fn test_dark_image_is_brightened() {
        let h = histogram_of(&[(0.01, 500), (0.02, 400), (0.04, 100)]);
        let s = calculate_auto_settings(&h, &AutoAdjustConfig::default());
        assert!(s.exposure > 1.5, "{s:?}");
        assert!(s.exposure <= 3.0);
    }

    #[test]
    fn test_bright_image_is_darkened() {
        let h = histogram_of(&[(0.5, 500), (0.7, 400), (0.95, 100)]);
        let s = calculate_auto_settings(&h, &AutoAdjustConfig::default());
        assert!(s.exposure < 0.0, "{s:?}");
    }

    #[test]
    fn test_shift_respects_config() {
        let h = histogram_of(&[(0.0005, 1000)]);
        let config = AutoAdjustConfig {
            max_exposure_shift: 1.0,
            ..AutoAdjustConfig::default()
        };
        let s = calculate_auto_settings(&h, &config);
        assert_eq!(s.exposure, 1.0);
    }

    #[test]
    fn test_apply_subtracts_base_exposure() {
        let mut u = Uniforms::defaults();
        u.base_exposure = 0.5;
        let s = AutoSettings { exposure: 1.5, shadows: 0.2, ..AutoSettings::default() };
        s.apply(&mut u);
        assert!((u.exposure - 1.0).abs() < 1e-6);
        assert_eq!(u.shadows, 0.2);
    }
}
