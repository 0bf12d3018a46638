//! Optional YAML settings. Every field has a default, so an absent file,
//! an empty file, or a file naming only one field are all valid.
//!
//! ```yaml
//! source:
//!   character_delimiters: ["，", ";"]
//! graph:
//!   node_size: { min: 10, max: 60, neutral: 20 }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub display: DisplaySettings,
    pub graph: GraphSettings,
    pub markers: MarkerSettings,
}

impl Settings {
    /// Load settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .map_err(|e| AtlasError::config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let settings: Settings = if raw.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(raw).map_err(AtlasError::config)?
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.source.character_delimiters.iter().all(|d| d.is_empty()) {
            return Err(AtlasError::config(
                "source.character_delimiters needs at least one non-empty delimiter",
            ));
        }
        if self.display.excerpt_chars == 0 || self.markers.excerpt_chars == 0 {
            return Err(AtlasError::config("excerpt lengths must be positive"));
        }
        self.graph.node_size.validate("graph.node_size")?;
        self.graph.edge_width.validate("graph.edge_width")?;
        self.markers.radius.validate("markers.radius")?;
        Ok(())
    }
}

// ── Source columns ───────────────────────────────────────────────────────

/// Accepted header names for each canonical field. The first header in the
/// file matching any alias wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub chapter: Vec<String>,
    pub location: Vec<String>,
    pub longitude: Vec<String>,
    pub latitude: Vec<String>,
    pub location_frequency: Vec<String>,
    pub characters: Vec<String>,
    pub activity_type: Vec<String>,
    pub plot_text: Vec<String>,
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            chapter: aliases(&["chapter", "回次"]),
            location: aliases(&["location", "地名"]),
            longitude: aliases(&["longitude", "lon", "经度"]),
            latitude: aliases(&["latitude", "lat", "纬度"]),
            location_frequency: aliases(&[
                "location_frequency",
                "loc_total_freq",
                "城市出现次数",
            ]),
            characters: aliases(&["characters", "涉及主要人物"]),
            activity_type: aliases(&["activity_type", "活动类型"]),
            plot_text: aliases(&["plot_text", "plot_summary", "情节"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub columns: ColumnAliases,
    pub character_delimiters: Vec<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            columns: ColumnAliases::default(),
            character_delimiters: aliases(&["，", ",", "；", ";", "、"]),
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Characters kept from a plot text before the ellipsis.
    pub excerpt_chars: usize,
    /// Shown when a group has no plot text at all.
    pub no_plot: String,
    /// Shown when a list of related entities is empty.
    pub none_marker: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            excerpt_chars: 80,
            no_plot: "无相关情节".to_string(),
            none_marker: "无".to_string(),
        }
    }
}

// ── Scales ───────────────────────────────────────────────────────────────

/// Output range of a size scale, plus the value used when every input is
/// equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: f64,
    pub max: f64,
    pub neutral: f64,
}

impl SizeRange {
    pub const fn new(min: f64, max: f64, neutral: f64) -> Self {
        Self { min, max, neutral }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let finite = self.min.is_finite() && self.max.is_finite() && self.neutral.is_finite();
        if !finite || self.min > self.max {
            return Err(AtlasError::config(format!(
                "{name}: expected finite min <= max, got {}..{}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub node_size: SizeRange,
    /// Width range for weighted (location–activity) edges.
    pub edge_width: SizeRange,
    /// Width of every character–location edge.
    pub flat_edge_width: f64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            node_size: SizeRange::new(20.0, 80.0, 30.0),
            edge_width: SizeRange::new(2.0, 8.0, 2.0),
            flat_edge_width: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSettings {
    pub radius: SizeRange,
    pub excerpt_chars: usize,
    /// Marker colour per dominant activity type.
    pub palette: BTreeMap<String, String>,
    pub fallback_colour: String,
}

impl MarkerSettings {
    pub fn colour_for(&self, activity: &str) -> &str {
        self.palette
            .get(activity)
            .map(String::as_str)
            .unwrap_or(&self.fallback_colour)
    }
}

impl Default for MarkerSettings {
    fn default() -> Self {
        let palette = [
            ("官场任职", "#E67E22"),
            ("家庭生活", "#EEAA9C"),
            ("科举备考", "#3498DB"),
            ("商业经济", "#8E44AD"),
            ("社交往来", "#F39C12"),
            ("特殊变故", "#E74C3C"),
            ("文人雅集", "#b9dec9"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            radius: SizeRange::new(12.0, 32.0, 12.0),
            excerpt_chars: 120,
            palette,
            fallback_colour: "#95A5A6".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let settings = Settings::from_yaml(
            "graph:\n  node_size: { min: 10, max: 60, neutral: 25 }\ndisplay:\n  excerpt_chars: 40\n",
        )
        .unwrap();
        assert_eq!(settings.graph.node_size, SizeRange::new(10.0, 60.0, 25.0));
        assert_eq!(settings.graph.flat_edge_width, 2.0);
        assert_eq!(settings.display.excerpt_chars, 40);
        assert_eq!(settings.display.no_plot, "无相关情节");
        assert_eq!(settings.source, SourceSettings::default());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = Settings::from_yaml("markers:\n  radius: { min: 30, max: 10, neutral: 12 }\n")
            .unwrap_err();
        assert!(matches!(err, AtlasError::Config { .. }));
        assert!(err.to_string().contains("markers.radius"));
    }

    #[test]
    fn test_blank_delimiters_are_rejected() {
        let err = Settings::from_yaml("source:\n  character_delimiters: [\"\"]\n").unwrap_err();
        assert!(matches!(err, AtlasError::Config { .. }));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atlas.yml");
        fs::write(&path, "markers:\n  fallback_colour: \"#000000\"\n").unwrap();
        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.markers.colour_for("不存在"), "#000000");
        assert_eq!(settings.markers.colour_for("官场任职"), "#E67E22");
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/atlas.yml"))).unwrap_err();
        assert!(matches!(err, AtlasError::Config { .. }));
    }
}
