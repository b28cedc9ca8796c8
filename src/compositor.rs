//! RGB composites of three independently selected feature channels.

use vello::peniko::Color;

use crate::model::Model;
use crate::scale::{DataRange, scale};

/// Which per-cell vector a composite reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSource {
    Weights,
    Sigmas,
}

impl VectorSource {
    fn value(self, model: &dyn Model, index: usize, feature: usize) -> Option<f64> {
        match self {
            Self::Weights => model.weight_at(index, feature),
            Self::Sigmas => model.sigma_at(index, feature),
        }
    }

    fn range(self, model: &dyn Model, feature: usize) -> Option<DataRange> {
        match self {
            Self::Weights => model.weight_range(feature),
            Self::Sigmas => model.sigma_range(feature),
        }
    }
}

/// Feature index per color channel. `None` means "no feature", which is the
/// only possible value while the dataset has no features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSelection {
    pub red: Option<usize>,
    pub green: Option<usize>,
    pub blue: Option<usize>,
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self::none()
    }
}

impl ChannelSelection {
    pub const fn none() -> Self {
        Self {
            red: None,
            green: None,
            blue: None,
        }
    }

    /// Initial selection for `feature_count` features: features 0, 1, 2
    /// where they exist, otherwise the last feature.
    pub fn initial(feature_count: usize) -> Self {
        let pick = |i: usize| feature_count.checked_sub(1).map(|last| i.min(last));
        Self {
            red: pick(0),
            green: pick(1),
            blue: pick(2),
        }
    }

    /// Keep every channel inside `[0, feature_count)`.
    pub fn clamp_to(&mut self, feature_count: usize) {
        let fix = |channel: &mut Option<usize>, default: usize| {
            *channel = match feature_count.checked_sub(1) {
                None => None,
                Some(last) => Some(channel.unwrap_or(default).min(last)),
            };
        };
        fix(&mut self.red, 0);
        fix(&mut self.green, 1);
        fix(&mut self.blue, 2);
    }

    pub fn channels(&self) -> [Option<usize>; 3] {
        [self.red, self.green, self.blue]
    }

    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut Option<usize>> {
        match channel {
            0 => Some(&mut self.red),
            1 => Some(&mut self.green),
            2 => Some(&mut self.blue),
            _ => None,
        }
    }
}

/// Per-frame channel ranges for one composite panel.
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    source: VectorSource,
    channels: [Option<(usize, DataRange)>; 3],
}

impl Compositor {
    /// Query the data range of each selected feature. Ranges are read fresh on
    /// every call since training moves them.
    pub fn prepare(model: &dyn Model, source: VectorSource, selection: &ChannelSelection) -> Self {
        let channels = selection
            .channels()
            .map(|feature| feature.and_then(|f| source.range(model, f).map(|r| (f, r))));
        Self { source, channels }
    }

    pub fn source(&self) -> VectorSource {
        self.source
    }

    /// Color of cell `index`. An unselected channel, or one whose value is
    /// missing, contributes zero.
    pub fn composite(&self, model: &dyn Model, index: usize) -> Color {
        let [r, g, b] = self.channels.map(|channel| {
            channel
                .and_then(|(feature, range)| {
                    self.source
                        .value(model, index, feature)
                        .map(|v| scale(v, range.max, range.min))
                })
                .unwrap_or(0)
        });
        Color::from_rgb8(r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Som;

    fn model() -> Som {
        Som::from_fn(3, 2, 4, |cell, feature| (cell * (feature + 1)) as f64)
    }

    #[test]
    fn same_feature_in_every_channel_is_gray() {
        let som = model();
        let selection = ChannelSelection {
            red: Some(2),
            green: Some(2),
            blue: Some(2),
        };
        let compositor = Compositor::prepare(&som, VectorSource::Weights, &selection);
        for index in 0..som.cell_count() {
            let [r, g, b, _] = compositor.composite(&som, index).to_rgba8().to_u8_array();
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn channels_are_scaled_independently() {
        let som = model();
        let selection = ChannelSelection {
            red: Some(0),
            green: Some(3),
            blue: None,
        };
        let compositor = Compositor::prepare(&som, VectorSource::Weights, &selection);
        let first = compositor.composite(&som, 0).to_rgba8().to_u8_array();
        let last = compositor.composite(&som, 5).to_rgba8().to_u8_array();
        assert_eq!(&first[..3], &[0, 0, 0]);
        assert_eq!(&last[..3], &[255, 255, 0]);
    }

    #[test]
    fn sigmas_start_degenerate() {
        let som = model();
        let compositor =
            Compositor::prepare(&som, VectorSource::Sigmas, &ChannelSelection::initial(4));
        assert_eq!(compositor.source(), VectorSource::Sigmas);
        let rgba = compositor.composite(&som, 3).to_rgba8().to_u8_array();
        assert_eq!(&rgba[..3], &[0, 0, 0]);
    }

    #[test]
    fn selection_follows_feature_count() {
        assert_eq!(ChannelSelection::initial(0), ChannelSelection::none());
        let two = ChannelSelection::initial(2);
        assert_eq!(two.channels(), [Some(0), Some(1), Some(1)]);

        let mut selection = ChannelSelection {
            red: Some(9),
            green: None,
            blue: Some(1),
        };
        selection.clamp_to(3);
        assert_eq!(selection.channels(), [Some(2), Some(1), Some(1)]);
        selection.clamp_to(0);
        assert_eq!(selection, ChannelSelection::none());
    }
}
