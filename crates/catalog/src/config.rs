use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::descriptor::{builtin_demos, DemoDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GalleryConfig {
    pub version: u32,
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub full: FullSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default = "builtin_demos")]
    pub demos: Vec<DemoDescriptor>,
}

/// Reduced-fidelity thumbnail knobs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PreviewSettings {
    #[serde(default = "default_preview_ratio")]
    pub max_pixel_ratio: f64,
    #[serde(default = "default_preview_width")]
    pub max_css_width: f64,
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FullSettings {
    #[serde(default = "default_full_ratio")]
    pub max_pixel_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TimingSettings {
    #[serde(
        default = "default_max_tick_delta",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub max_tick_delta: Duration,
}

fn default_preview_ratio() -> f64 {
    1.5
}

fn default_preview_width() -> f64 {
    640.0
}

fn default_visibility_threshold() -> f64 {
    0.1
}

fn default_full_ratio() -> f64 {
    2.0
}

fn default_max_tick_delta() -> Duration {
    Duration::from_millis(250)
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            max_pixel_ratio: default_preview_ratio(),
            max_css_width: default_preview_width(),
            visibility_threshold: default_visibility_threshold(),
        }
    }
}

impl Default for FullSettings {
    fn default() -> Self {
        Self {
            max_pixel_ratio: default_full_ratio(),
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            max_tick_delta: default_max_tick_delta(),
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            version: 1,
            preview: PreviewSettings::default(),
            full: FullSettings::default(),
            timing: TimingSettings::default(),
            demos: builtin_demos(),
        }
    }
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl GalleryConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: GalleryConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn demo(&self, id: &str) -> Option<&DemoDescriptor> {
        self.demos.iter().find(|demo| demo.id == id)
    }

    /// The descriptor for `id`, or the first one when `id` is unknown.
    pub fn find_demo(&self, id: &str) -> Option<&DemoDescriptor> {
        self.demo(id).or_else(|| self.demos.first())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        for (name, ratio) in [
            ("preview.max_pixel_ratio", self.preview.max_pixel_ratio),
            ("full.max_pixel_ratio", self.full.max_pixel_ratio),
        ] {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let width = self.preview.max_css_width;
        if !width.is_finite() || width <= 0.0 {
            return Err(ConfigError::Invalid(
                "preview.max_css_width must be greater than zero".into(),
            ));
        }

        let threshold = self.preview.visibility_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "preview.visibility_threshold must be within [0, 1], got {threshold}"
            )));
        }

        if self.timing.max_tick_delta.is_zero() {
            return Err(ConfigError::Invalid(
                "timing.max_tick_delta must be greater than zero".into(),
            ));
        }

        if self.demos.is_empty() {
            return Err(ConfigError::Invalid(
                "config must list at least one demo".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        for demo in &self.demos {
            if demo.id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "demo ids may not be empty".into(),
                ));
            }
            if !seen.insert(demo.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "demo '{}' is listed more than once",
                    demo.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[preview]
max_pixel_ratio = 1.25
max_css_width = 480

[timing]
max_tick_delta = "100ms"

[[demos]]
id = "clear-colors"
title = "Colours"

[[demos]]
id = "texture"
title = "Texture"
description = "drop an image"
"#;

    #[test]
    fn parses_sample_config() {
        let config = GalleryConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.preview.max_pixel_ratio, 1.25);
        assert_eq!(config.preview.max_css_width, 480.0);
        assert_eq!(config.preview.visibility_threshold, 0.1);
        assert_eq!(config.full.max_pixel_ratio, 2.0);
        assert_eq!(config.timing.max_tick_delta, Duration::from_millis(100));
        assert_eq!(config.demos.len(), 2);
        assert_eq!(config.demos[0].description, "");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = GalleryConfig::from_toml_str("version = 1").expect("parse config");
        assert_eq!(config, GalleryConfig::default());
        assert_eq!(config.demos, builtin_demos());
    }

    #[test]
    fn numeric_tick_delta_is_seconds() {
        let config = GalleryConfig::from_toml_str("version = 1\n[timing]\nmax_tick_delta = 0.5\n")
            .expect("parse config");
        assert_eq!(config.timing.max_tick_delta, Duration::from_millis(500));
    }

    #[test]
    fn rejects_bad_values() {
        for input in [
            "version = 2",
            "version = 1\n[preview]\nmax_pixel_ratio = 0\n",
            "version = 1\n[full]\nmax_pixel_ratio = -1.0\n",
            "version = 1\n[preview]\nmax_css_width = 0\n",
            "version = 1\n[preview]\nvisibility_threshold = 1.5\n",
            "version = 1\n[timing]\nmax_tick_delta = \"0s\"\n",
            "version = 1\n[[demos]]\nid = \"a\"\ntitle = \"A\"\n[[demos]]\nid = \"a\"\ntitle = \"B\"\n",
            "version = 1\n[[demos]]\nid = \" \"\ntitle = \"Blank\"\n",
        ] {
            let err = GalleryConfig::from_toml_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{input}: {err}");
        }
    }

    #[test]
    fn rejects_malformed_toml_and_durations() {
        let err = GalleryConfig::from_toml_str("version = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = GalleryConfig::from_toml_str("version = 1\n[timing]\nmax_tick_delta = \"soon\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn find_demo_falls_back_to_first() {
        let config = GalleryConfig::default();
        assert_eq!(
            config.find_demo("texture").map(|demo| demo.title.as_str()),
            Some("Texture Hue Shift")
        );
        assert_eq!(
            config.find_demo("nope").map(|demo| demo.id.as_str()),
            Some("rotating-triangle")
        );
        assert!(config.demo("nope").is_none());
    }

    #[test]
    fn serialises_back_to_parseable_toml() {
        let config = GalleryConfig::default();
        let text = config.to_toml_string().expect("serialize");
        assert!(text.contains("max_tick_delta = \"250ms\""));
        let parsed = GalleryConfig::from_toml_str(&text).expect("reparse");
        assert_eq!(parsed, config);
    }
}
