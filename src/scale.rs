//! Scalar-to-intensity mapping shared by every heatmap panel.
//!
//! All panels speak the same device range `[0, 255]`. A raw value is first
//! mapped linearly from its data range, then optionally re-mapped through a
//! user-adjustable contrast window. Degenerate ranges never produce NaN or
//! infinity; they collapse to a constant intensity instead.

/// Upper bound of the device intensity range.
pub const INTENSITY_MAX: f64 = 255.0;

/// Intensity returned when the data range or the window has zero width.
pub const DEGENERATE_INTENSITY: u8 = 0;

/// Observed `(min, max)` of some quantity across the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRange {
    pub min: f64,
    pub max: f64,
}

impl DataRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Min/max over the finite values of `values`. `None` when there are none.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some(Self::new(v, v)),
                Some(r) => Some(Self::new(r.min.min(v), r.max.max(v))),
            })
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.max - self.min).is_normal()
    }
}

/// Linear map of `value` from `[data_min, data_max]` onto `[0, 255]`, unrounded.
///
/// Returns `None` for a degenerate range or a non-finite value.
fn scale_unit(value: f64, data_max: f64, data_min: f64) -> Option<f64> {
    let span = data_max - data_min;
    if !span.is_normal() || !value.is_finite() {
        return None;
    }
    Some(((value - data_min) * INTENSITY_MAX / span).clamp(0.0, INTENSITY_MAX))
}

fn to_intensity(v: f64) -> u8 {
    v.round().clamp(0.0, INTENSITY_MAX) as u8
}

/// Map `value` from its data range onto `[0, 255]`.
pub fn scale(value: f64, data_max: f64, data_min: f64) -> u8 {
    scale_unit(value, data_max, data_min).map_or(DEGENERATE_INTENSITY, to_intensity)
}

/// Map `value` through [`scale`], then stretch `[window_lower, window_upper]`
/// of the resulting intensity back onto `[0, 255]`.
pub fn scale_with_window(
    value: f64,
    data_max: f64,
    data_min: f64,
    window_upper: f64,
    window_lower: f64,
) -> u8 {
    let Some(scaled) = scale_unit(value, data_max, data_min).map(to_intensity) else {
        return DEGENERATE_INTENSITY;
    };
    let width = window_upper - window_lower;
    if !width.is_normal() {
        return DEGENERATE_INTENSITY;
    }
    let factor = INTENSITY_MAX / width;
    to_intensity((f64::from(scaled) - window_lower) * factor)
}

/// User-adjustable `(lower, upper)` contrast bounds in device range.
///
/// The setters keep `0 <= lower <= upper <= 255`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastWindow {
    lower: f64,
    upper: f64,
}

impl Default for ContrastWindow {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: INTENSITY_MAX,
        }
    }
}

impl ContrastWindow {
    pub fn new(lower: f64, upper: f64) -> Self {
        let mut window = Self::default();
        window.set_upper(upper);
        window.set_lower(lower);
        window
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn set_lower(&mut self, lower: f64) {
        self.lower = sanitize(lower).min(self.upper);
    }

    pub fn set_upper(&mut self, upper: f64) {
        self.upper = sanitize(upper).max(self.lower);
    }

    /// Scale `value` within `range` and apply this window.
    pub fn apply(&self, value: f64, range: DataRange) -> u8 {
        scale_with_window(value, range.max, range.min, self.upper, self.lower)
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, INTENSITY_MAX) }
}
