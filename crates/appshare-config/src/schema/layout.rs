//! Window layout configuration types.

use serde::{Deserialize, Serialize};

/// Window layout parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Gap between tiled/grid cells in pixels (valid range: 0-100).
    pub gap: u32,
    /// Margin between the screen edge and the usable area in pixels (valid range: 0-200).
    pub outer_margin: u32,
    /// Diagonal offset between cascaded windows in pixels (valid range: 1-200).
    pub cascade_step: u32,
    /// Cascaded window size as a fraction of the usable area (valid range: 0.2-1.0).
    pub cascade_scale: f64,
    /// Recompute attempts when windows change mid-layout (valid range: 1-10).
    pub max_attempts: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            gap: 0,
            outer_margin: 0,
            cascade_step: 30,
            cascade_scale: 0.5,
            max_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_config_defaults() {
        let config = LayoutConfig::default();
        assert_eq!(config.gap, 0);
        assert_eq!(config.outer_margin, 0);
        assert_eq!(config.cascade_step, 30);
        assert!((config.cascade_scale - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn layout_config_partial_toml() {
        let toml_str = r#"
gap = 10
cascade_scale = 0.6
"#;
        let config: LayoutConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gap, 10);
        assert!((config.cascade_scale - 0.6).abs() < f64::EPSILON);
        // Defaults preserved
        assert_eq!(config.cascade_step, 30);
    }
}
