//! Statistical significance of variant conversion rates.
//!
//! Each non-control variant is compared with the control using a pooled
//! two-proportion z-test on `conversions / views`. The reported confidence is
//! `(1 - p_two_sided) * 100`, i.e. `erf(|z| / sqrt(2)) * 100`.

use serde::{Deserialize, Serialize};

/// Default confidence threshold (percent)
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 95.0;

/// Successes out of trials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proportion {
    pub successes: u64,
    pub trials: u64,
}

impl Proportion {
    pub fn new(successes: u64, trials: u64) -> Self {
        Self { successes, trials }
    }

    /// Rate as a percentage, 0 when there are no trials
    pub fn rate_percent(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.successes as f64 / self.trials as f64 * 100.0
        }
    }

    fn fraction(&self) -> f64 {
        self.rate_percent() / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub variant_id: String,
    pub control_variant_id: String,
    /// Control conversion rate (percent)
    pub control_rate: f64,
    /// Variant conversion rate (percent)
    pub variant_rate: f64,
    /// Relative lift over control (percent)
    pub improvement: f64,
    pub z_score: f64,
    /// Confidence that the rates differ (percent, 0-100)
    pub confidence_level: f64,
    pub is_significant: bool,
}

/// Compare one variant against the control.
pub fn compare_to_control(
    control_variant_id: &str,
    control: Proportion,
    variant_id: &str,
    variant: Proportion,
    threshold: f64,
) -> SignificanceResult {
    let control_rate = control.rate_percent();
    let variant_rate = variant.rate_percent();

    let improvement = if control_rate > 0.0 {
        (variant_rate - control_rate) / control_rate * 100.0
    } else {
        0.0
    };

    let z_score = two_proportion_z(control, variant);
    let confidence_level = confidence_from_z(z_score);

    SignificanceResult {
        variant_id: variant_id.to_string(),
        control_variant_id: control_variant_id.to_string(),
        control_rate,
        variant_rate,
        improvement,
        z_score,
        confidence_level,
        is_significant: confidence_level >= threshold,
    }
}

/// Pooled two-proportion z statistic (variant minus control).
/// Zero when either side has no trials or the pooled variance vanishes.
pub fn two_proportion_z(control: Proportion, variant: Proportion) -> f64 {
    if control.trials == 0 || variant.trials == 0 {
        return 0.0;
    }

    let n_c = control.trials as f64;
    let n_v = variant.trials as f64;
    let pooled = (control.successes + variant.successes) as f64 / (n_c + n_v);
    let se = (pooled * (1.0 - pooled) * (1.0 / n_c + 1.0 / n_v)).sqrt();

    if se <= 0.0 || !se.is_finite() {
        return 0.0;
    }

    (variant.fraction() - control.fraction()) / se
}

/// Two-sided confidence (percent) for a z statistic
pub fn confidence_from_z(z: f64) -> f64 {
    if z == 0.0 || !z.is_finite() {
        return 0.0;
    }
    (erf(z.abs() / std::f64::consts::SQRT_2) * 100.0).clamp(0.0, 100.0)
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7)
pub fn erf(x: f64) -> f64 {
    const P: f64 = 0.327_591_1;
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;

    // the approximation leaves a 1e-9 residue at the origin
    if x == 0.0 {
        return 0.0;
    }

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
