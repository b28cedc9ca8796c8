//! Detail overlay for the grid cell under the pointer.
//!
//! Grid panels report the hovered cell; after all panels are drawn the
//! dashboard asks the inspector to render one overlay for it, either as a
//! per-feature listing or as the vector reinterpreted as an image.

use vello::Scene;
use vello::kurbo::{Affine, Point, Rect, RoundedRect, Size, Stroke};
use vello::peniko::Fill;

use crate::grid_view::{HoveredCell, gray};
use crate::model::{Dataset, Model};
use crate::scale::scale;
use crate::text::TextStyle;
use crate::theme::Theme;
use crate::widgets::format_number;

/// Distance between the pointer and the overlay corner.
const POINTER_OFFSET: f64 = 16.0;
const MAX_TABLE_LINES: usize = 24;
const IMAGE_CELL: f64 = 12.0;

/// Presentation shared by every panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HoverDisplay {
    #[default]
    Tabular,
    Image,
}

impl HoverDisplay {
    pub const ALL: [HoverDisplay; 2] = [HoverDisplay::Tabular, HoverDisplay::Image];

    pub fn label(self) -> &'static str {
        match self {
            Self::Tabular => "Tabular",
            Self::Image => "Image",
        }
    }
}

/// Pixel grid a vector is folded into for [`HoverDisplay::Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub width: usize,
    pub height: usize,
}

impl Default for ImageShape {
    fn default() -> Self {
        Self { width: 1, height: 1 }
    }
}

impl ImageShape {
    /// Negative requests collapse to zero.
    pub fn from_signed(width: i64, height: i64) -> Self {
        Self {
            width: usize::try_from(width).unwrap_or(0),
            height: usize::try_from(height).unwrap_or(0),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// A cell some panel reported this frame, and whether that panel shows
/// uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverTarget {
    pub cell: HoveredCell,
    pub with_sigma: bool,
}

/// Display names for the first `count` features, `f{i}` where the dataset
/// has none.
pub fn feature_names(count: usize, dataset: Option<&dyn Dataset>) -> Vec<String> {
    (0..count)
        .map(|i| {
            dataset
                .and_then(|d| d.feature_name(i))
                .map_or_else(|| format!("f{i}"), str::to_string)
        })
        .collect()
}

/// `name: value` per feature, with `± sigma` when sigmas are given.
pub fn tabular_lines(
    names: &[String],
    values: &[f64],
    sigmas: Option<&[f64]>,
) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let name = names.get(i).cloned().unwrap_or_else(|| format!("f{i}"));
            match sigmas.and_then(|s| s.get(i)) {
                Some(sigma) => {
                    format!("{name}: {} ± {}", format_number(*v), format_number(*sigma))
                }
                None => format!("{name}: {}", format_number(*v)),
            }
        })
        .collect()
}

/// Gray level of each pixel of `values` folded into `shape`, row-major.
/// Values are read as if already in `[0, 255]`.
pub fn image_intensities(values: &[f64], shape: ImageShape) -> Vec<u8> {
    values
        .iter()
        .take(shape.pixel_count())
        .map(|v| scale(*v, 255.0, 0.0))
        .collect()
}

/// Place an overlay of `size` beside `pointer`, flipped to the other side
/// when it would leave `viewport`, then clamped into it.
pub fn overlay_rect(pointer: Point, size: Size, viewport: Rect) -> Rect {
    let mut x = pointer.x + POINTER_OFFSET;
    let mut y = pointer.y + POINTER_OFFSET;
    if x + size.width > viewport.x1 {
        x = pointer.x - POINTER_OFFSET - size.width;
    }
    if y + size.height > viewport.y1 {
        y = pointer.y - POINTER_OFFSET - size.height;
    }
    let x = x.min(viewport.x1 - size.width).max(viewport.x0);
    let y = y.min(viewport.y1 - size.height).max(viewport.y0);
    Rect::from_origin_size((x, y), size)
}

pub struct HoverInspector<'a> {
    pub theme: &'a Theme,
    pub text: &'a TextStyle,
    pub display: HoverDisplay,
    pub shape: ImageShape,
}

impl HoverInspector<'_> {
    pub fn draw(
        &self,
        scene: &mut Scene,
        model: &dyn Model,
        dataset: Option<&dyn Dataset>,
        target: &HoverTarget,
        viewport: Rect,
    ) {
        let Some(values) = model.neuron(target.cell.index) else {
            return;
        };
        let title = format!("cell ({}, {})", target.cell.x, target.cell.y);
        match self.display {
            HoverDisplay::Tabular => {
                let sigmas = if target.with_sigma { model.sigma(target.cell.index) } else { None };
                let names = feature_names(values.len(), dataset);
                let lines = tabular_lines(&names, &values, sigmas.as_deref());
                self.draw_table(scene, &title, &lines, target.cell.pointer, viewport);
            }
            HoverDisplay::Image => {
                let pixels = image_intensities(&values, self.shape);
                self.draw_image(scene, &title, &pixels, target.cell.pointer, viewport);
            }
        }
    }

    fn frame(&self, scene: &mut Scene, rect: Rect) {
        let rounded = RoundedRect::from_rect(rect, self.theme.layout.corner_radius);
        let fill = Theme::color(self.theme.colors.overlay);
        scene.fill(Fill::NonZero, Affine::IDENTITY, fill, None, &rounded);
        scene.stroke(
            &Stroke::new(1.0),
            Affine::IDENTITY,
            Theme::color(self.theme.colors.panel_border),
            None,
            &rounded,
        );
    }

    fn draw_table(
        &self,
        scene: &mut Scene,
        title: &str,
        lines: &[String],
        pointer: Point,
        viewport: Rect,
    ) {
        let size = self.theme.text.small;
        let line_h = size * 1.4;
        let pad = self.theme.layout.panel_padding;

        let more = lines.len().saturating_sub(MAX_TABLE_LINES);
        let more_line = format!("+{more} more");
        let mut shown: Vec<&str> = lines.iter().take(MAX_TABLE_LINES).map(String::as_str).collect();
        if more > 0 {
            shown.push(&more_line);
        }

        let text_w = shown
            .iter()
            .chain(std::iter::once(&title))
            .map(|l| self.text.width(l, size))
            .fold(0.0, f64::max);
        let overlay = Size::new(text_w + 2.0 * pad, (shown.len() + 1) as f64 * line_h + 2.0 * pad);
        let rect = overlay_rect(pointer, overlay, viewport);
        self.frame(scene, rect);

        let mut baseline = rect.y0 + pad + size;
        self.text.draw(scene, rect.x0 + pad, baseline, title, self.theme.text_secondary(), size);
        for line in shown {
            baseline += line_h;
            self.text.draw(scene, rect.x0 + pad, baseline, line, self.theme.text(), size);
        }
    }

    fn draw_image(
        &self,
        scene: &mut Scene,
        title: &str,
        pixels: &[u8],
        pointer: Point,
        viewport: Rect,
    ) {
        let size = self.theme.text.small;
        let pad = self.theme.layout.panel_padding;
        let shape = self.shape;
        let title_h = size * 1.4;

        let image_w = shape.width as f64 * IMAGE_CELL;
        let image_h = shape.height as f64 * IMAGE_CELL;
        let width = image_w.max(self.text.width(title, size)) + 2.0 * pad;
        let overlay = Size::new(width, image_h + title_h + 2.0 * pad);
        let rect = overlay_rect(pointer, overlay, viewport);
        self.frame(scene, rect);
        let color = self.theme.text_secondary();
        self.text.draw(scene, rect.x0 + pad, rect.y0 + pad + size, title, color, size);

        if shape.width == 0 {
            return;
        }
        let origin = Point::new(rect.x0 + pad, rect.y0 + pad + title_h);
        for (i, level) in pixels.iter().enumerate() {
            let (px, py) = ((i % shape.width) as f64, (i / shape.width) as f64);
            let cell = Rect::new(
                origin.x + px * IMAGE_CELL,
                origin.y + py * IMAGE_CELL,
                origin.x + (px + 1.0) * IMAGE_CELL,
                origin.y + (py + 1.0) * IMAGE_CELL,
            );
            scene.fill(Fill::NonZero, Affine::IDENTITY, gray(*level), None, &cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InMemoryDataset, Som};

    #[test]
    fn tabular_lines_include_sigma_when_given() {
        let names = vec!["red".to_string(), "green".to_string()];
        let lines = tabular_lines(&names, &[1.0, 2.5], None);
        assert_eq!(lines, vec!["red: 1", "green: 2.500"]);

        let lines = tabular_lines(&names, &[1.0, 2.0, 3.0], Some(&[0.5, 0.0, 1.0]));
        assert_eq!(lines, vec!["red: 1 ± 0.500", "green: 2 ± 0", "f2: 3 ± 1"]);
    }

    #[test]
    fn image_uses_fixed_byte_range() {
        let shape = ImageShape { width: 2, height: 2 };
        let pixels = image_intensities(&[0.0, 127.5, 255.0, 400.0, 9.0], shape);
        assert_eq!(pixels, vec![0, 128, 255, 255]);
    }

    #[test]
    fn negative_shape_collapses_to_empty() {
        let shape = ImageShape::from_signed(-3, 4);
        assert_eq!(shape, ImageShape { width: 0, height: 4 });
        assert!(image_intensities(&[1.0, 2.0], shape).is_empty());
    }

    #[test]
    fn overlay_stays_inside_viewport() {
        let viewport = Rect::new(0.0, 0.0, 800.0, 600.0);
        let size = Size::new(200.0, 100.0);

        let near = overlay_rect(Point::new(100.0, 100.0), size, viewport);
        assert_eq!(near.origin(), Point::new(116.0, 116.0));

        let corner = overlay_rect(Point::new(790.0, 590.0), size, viewport);
        assert_eq!(corner.origin(), Point::new(574.0, 474.0));

        let huge = overlay_rect(Point::new(10.0, 10.0), Size::new(900.0, 700.0), viewport);
        assert_eq!(huge.origin(), Point::ZERO);
    }

    #[test]
    fn draw_handles_missing_cells_and_both_modes() {
        let som = Som::from_fn(2, 2, 3, |cell, f| (cell + f) as f64);
        let data = InMemoryDataset::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![0.0, 0.0, 0.0]],
        );
        let theme = Theme::default();
        let text = TextStyle::default();
        let viewport = Rect::new(0.0, 0.0, 400.0, 300.0);
        let mut scene = Scene::new();
        let target = |index| HoverTarget {
            cell: HoveredCell {
                x: 0,
                y: 0,
                index,
                pointer: Point::new(10.0, 10.0),
            },
            with_sigma: true,
        };

        for display in HoverDisplay::ALL {
            let inspector = HoverInspector {
                theme: &theme,
                text: &text,
                display,
                shape: ImageShape { width: 3, height: 1 },
            };
            inspector.draw(&mut scene, &som, Some(&data), &target(3), viewport);
            inspector.draw(&mut scene, &som, None, &target(99), viewport);
        }
        assert_eq!(HoverDisplay::default().label(), "Tabular");
    }
}
