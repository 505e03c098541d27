use serde::{Deserialize, Serialize};

/// Declared range of a numeric device parameter (brightness, focus, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamConfig {
    pub tag: String,
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

/// An auto-mode toggle (auto exposure, auto white balance, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoConfig {
    pub tag: String,
    pub default: bool,
}

impl ParamConfig {
    pub fn new(tag: impl Into<String>, min: i32, max: i32, default: i32) -> Self {
        Self {
            tag: tag.into(),
            min,
            max,
            default,
        }
    }

    fn span(&self) -> f64 {
        (self.max as f64 - self.min as f64).max(0.0)
    }

    /// Position of `value` within the range, clamped to 0..=1.
    fn fraction(&self, value: i32) -> f64 {
        let span = self.span();
        if span == 0.0 {
            return 0.0;
        }
        ((value as f64 - self.min as f64) / span).clamp(0.0, 1.0)
    }

    fn value_at(&self, fraction: f64) -> i32 {
        let value = self.min as f64 + self.span() * fraction.clamp(0.0, 1.0);
        (value.round() as i32).clamp(self.min, self.max.max(self.min))
    }

    /// Linear percentage (0-100) of `value` within the range
    pub fn percent_by_value(&self, value: i32) -> i32 {
        (self.fraction(value) * 100.0).round() as i32
    }

    /// Value at `percent` of the range, linearly
    pub fn value_by_percent(&self, percent: i32) -> i32 {
        self.value_at(percent.clamp(0, 100) as f64 / 100.0)
    }

    /// Inverse of [`ParamConfig::value_by_percent_quadratic`]
    pub fn percent_by_value_quadratic(&self, value: i32) -> i32 {
        (self.fraction(value).sqrt() * 100.0).round() as i32
    }

    /// Value at `percent` along a quadratic curve: fine steps near `min`,
    /// coarse steps near `max`.
    pub fn value_by_percent_quadratic(&self, percent: i32) -> i32 {
        let p = percent.clamp(0, 100) as f64 / 100.0;
        self.value_at(p * p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn focus() -> ParamConfig {
        ParamConfig::new("focus", 0, 200, 100)
    }

    #[test]
    fn test_linear_mapping() {
        let cfg = focus();
        assert_eq!(cfg.value_by_percent(0), 0);
        assert_eq!(cfg.value_by_percent(50), 100);
        assert_eq!(cfg.value_by_percent(100), 200);
        assert_eq!(cfg.percent_by_value(150), 75);
    }

    #[test]
    fn test_linear_mapping_with_negative_range() {
        let cfg = ParamConfig::new("brightness", -64, 64, 0);
        assert_eq!(cfg.value_by_percent(50), 0);
        assert_eq!(cfg.percent_by_value(-64), 0);
        assert_eq!(cfg.percent_by_value(64), 100);
    }

    #[test]
    fn test_quadratic_mapping() {
        let cfg = focus();
        assert_eq!(cfg.value_by_percent_quadratic(50), 50);
        assert_eq!(cfg.value_by_percent_quadratic(100), 200);
        assert_eq!(cfg.percent_by_value_quadratic(50), 50);
        assert_eq!(cfg.percent_by_value_quadratic(200), 100);
        // Inverse agrees with the forward curve
        for p in [0, 10, 33, 70, 100] {
            let value = cfg.value_by_percent_quadratic(p);
            assert!((cfg.percent_by_value_quadratic(value) - p).abs() <= 1);
        }
    }

    #[test]
    fn test_out_of_range_inputs_clamp() {
        let cfg = focus();
        assert_eq!(cfg.value_by_percent(150), 200);
        assert_eq!(cfg.value_by_percent(-5), 0);
        assert_eq!(cfg.percent_by_value(500), 100);
        assert_eq!(cfg.percent_by_value(-500), 0);
    }

    #[test]
    fn test_degenerate_range() {
        let cfg = ParamConfig::new("fixed", 10, 10, 10);
        assert_eq!(cfg.percent_by_value(10), 0);
        assert_eq!(cfg.value_by_percent(80), 10);
        assert_eq!(cfg.value_by_percent_quadratic(80), 10);
    }
}
