//! Visual tokens for the dashboard.
//!
//! Every color and layout constant the panels use lives in [`Theme`], which
//! round-trips through TOML. Missing keys fall back to the defaults, so a theme
//! file only needs the values it overrides.

use vello::peniko::Color;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Theme {
    pub colors: ColorTokens,
    pub layout: LayoutTokens,
    pub text: TextTokens,
}

/// RGBA colors as `[r, g, b, a]` in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ColorTokens {
    pub background: [f32; 4],
    pub panel: [f32; 4],
    pub panel_border: [f32; 4],
    pub header: [f32; 4],
    pub text: [f32; 4],
    pub text_secondary: [f32; 4],
    pub accent: [f32; 4],
    pub warning: [f32; 4],
    pub control: [f32; 4],
    pub control_active: [f32; 4],
    pub overlay: [f32; 4],
    pub plot_line: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LayoutTokens {
    pub margin: f64,
    pub panel_gap: f64,
    pub panel_padding: f64,
    pub header_height: f64,
    pub row_height: f64,
    pub corner_radius: f64,
    pub label_width_frac: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct TextTokens {
    pub title: f64,
    pub body: f64,
    pub small: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ColorTokens::default(),
            layout: LayoutTokens::default(),
            text: TextTokens::default(),
        }
    }
}

impl Default for ColorTokens {
    fn default() -> Self {
        Self {
            background: [1.0, 0.894, 0.769, 1.0],
            panel: [1.0, 0.922, 0.827, 1.0],
            panel_border: [0.87, 0.72, 0.53, 1.0],
            header: [0.80, 0.62, 0.40, 1.0],
            text: [0.0, 0.0, 0.0, 1.0],
            text_secondary: [0.0, 0.0, 0.0, 0.6],
            accent: [0.22, 0.46, 0.72, 1.0],
            warning: [0.85, 0.60, 0.10, 1.0],
            control: [0.96, 0.87, 0.75, 1.0],
            control_active: [0.87, 0.72, 0.53, 1.0],
            overlay: [1.0, 0.97, 0.92, 0.96],
            plot_line: [0.80, 0.20, 0.18, 1.0],
        }
    }
}

impl Default for LayoutTokens {
    fn default() -> Self {
        Self {
            margin: 12.0,
            panel_gap: 10.0,
            panel_padding: 8.0,
            header_height: 26.0,
            row_height: 22.0,
            corner_radius: 6.0,
            label_width_frac: 0.42,
        }
    }
}

impl Default for TextTokens {
    fn default() -> Self {
        Self {
            title: 15.0,
            body: 13.0,
            small: 11.0,
        }
    }
}

impl Theme {
    pub fn color(rgba: [f32; 4]) -> Color {
        Color::new(rgba)
    }

    pub fn background(&self) -> Color {
        Self::color(self.colors.background)
    }

    pub fn text(&self) -> Color {
        Self::color(self.colors.text)
    }

    pub fn text_secondary(&self) -> Color {
        Self::color(self.colors.text_secondary)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialize from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
