//! Generic heatmap grid: layout, drawing and pointer-to-cell mapping.
//!
//! Every map panel lays its grid out with [`GridLayout`], so a cell index
//! means the same thing in all of them regardless of panel size.

use vello::Scene;
use vello::kurbo::{Affine, Point, Rect, Vec2};
use vello::peniko::{Color, Fill};

use crate::input::FrameInput;

/// Screen placement of a `cols x rows` grid inside a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub cols: usize,
    pub rows: usize,
    pub origin: Point,
    pub step_x: f64,
    pub step_y: f64,
}

impl GridLayout {
    /// Stretch the grid over `surface`.
    pub fn new(cols: usize, rows: usize, surface: Rect) -> Self {
        let step_x = if cols == 0 { 0.0 } else { surface.width() / cols as f64 };
        let step_y = if rows == 0 { 0.0 } else { surface.height() / rows as f64 };
        Self {
            cols,
            rows,
            origin: surface.origin(),
            step_x,
            step_y,
        }
    }

    pub fn surface(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y,
            self.origin.x + self.cols as f64 * self.step_x,
            self.origin.y + self.rows as f64 * self.step_y,
        )
    }

    pub fn cell_rect(&self, x: usize, y: usize) -> Rect {
        Rect::new(
            self.origin.x + x as f64 * self.step_x,
            self.origin.y + y as f64 * self.step_y,
            self.origin.x + (x + 1) as f64 * self.step_x,
            self.origin.y + (y + 1) as f64 * self.step_y,
        )
    }

    pub fn linear_index(&self, x: usize, y: usize) -> usize {
        y * self.cols + x
    }

    /// The cell under the pointer, or `None` when the pointer is not over the
    /// surface. The result is always inside the grid.
    pub fn hovered(&self, input: &FrameInput) -> Option<HoveredCell> {
        let pointer = input.pointer?;
        if !self.surface().contains(pointer) {
            return None;
        }
        let raw = cell_under_pointer(pointer, self.origin, Vec2::ZERO, self.step_x, self.step_y);
        let (x, y) = clamp_cell(raw, self.cols, self.rows)?;
        Some(HoveredCell {
            x,
            y,
            index: self.linear_index(x, y),
            pointer,
        })
    }

    /// Fill every cell in row-major order with the color `color_at(x, y, index)`.
    pub fn draw(&self, scene: &mut Scene, mut color_at: impl FnMut(usize, usize, usize) -> Color) {
        for y in 0..self.rows {
            for x in 0..self.cols {
                let color = color_at(x, y, self.linear_index(x, y));
                scene.fill(Fill::NonZero, Affine::IDENTITY, color, None, &self.cell_rect(x, y));
            }
        }
    }
}

/// A grid cell reported by a panel for this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoveredCell {
    pub x: usize,
    pub y: usize,
    pub index: usize,
    pub pointer: Point,
}

/// Unclamped cell coordinates of `pointer`:
/// `floor((pointer - origin - scroll) / step)` per axis.
pub fn cell_under_pointer(
    pointer: Point,
    origin: Point,
    scroll: Vec2,
    step_x: f64,
    step_y: f64,
) -> (i64, i64) {
    let local = pointer - origin - scroll;
    let axis = |offset: f64, step: f64| -> i64 {
        if step > 0.0 && offset.is_finite() {
            (offset / step).floor() as i64
        } else {
            0
        }
    };
    (axis(local.x, step_x), axis(local.y, step_y))
}

/// Clamp a raw cell to `[0, cols) x [0, rows)`. `None` for an empty grid.
pub fn clamp_cell(cell: (i64, i64), cols: usize, rows: usize) -> Option<(usize, usize)> {
    if cols == 0 || rows == 0 {
        return None;
    }
    let x = cell.0.clamp(0, cols as i64 - 1) as usize;
    let y = cell.1.clamp(0, rows as i64 - 1) as usize;
    Some((x, y))
}

/// Grayscale color for an intensity.
pub fn gray(intensity: u8) -> Color {
    Color::from_rgb8(intensity, intensity, intensity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_follow_surface_size() {
        let layout = GridLayout::new(3, 2, Rect::new(10.0, 20.0, 310.0, 120.0));
        assert_eq!(layout.step_x, 100.0);
        assert_eq!(layout.step_y, 50.0);
        assert_eq!(layout.cell_rect(2, 1), Rect::new(210.0, 70.0, 310.0, 120.0));
        assert_eq!(layout.linear_index(2, 1), 5);
    }

    #[test]
    fn pointer_inside_cell_maps_to_that_cell() {
        for (cols, rows) in [(1, 1), (3, 2), (7, 5), (40, 30)] {
            let layout = GridLayout::new(cols, rows, Rect::new(13.0, 7.0, 613.0, 457.0));
            for y in 0..rows {
                for x in 0..cols {
                    let r = layout.cell_rect(x, y);
                    for (fx, fy) in [(0.5, 0.5), (0.01, 0.01), (0.99, 0.99)] {
                        let p = Point::new(r.x0 + r.width() * fx, r.y0 + r.height() * fy);
                        let cell = cell_under_pointer(
                            p,
                            layout.origin,
                            Vec2::ZERO,
                            layout.step_x,
                            layout.step_y,
                        );
                        assert_eq!(cell, (x as i64, y as i64), "grid {cols}x{rows}");
                    }
                }
            }
        }
    }

    #[test]
    fn scroll_offset_shifts_the_mapping() {
        let cell = cell_under_pointer(
            Point::new(55.0, 15.0),
            Point::ZERO,
            Vec2::new(20.0, 0.0),
            10.0,
            10.0,
        );
        assert_eq!(cell, (3, 1));
    }

    #[test]
    fn out_of_range_cells_are_clamped() {
        assert_eq!(clamp_cell((-4, 9), 3, 2), Some((0, 1)));
        assert_eq!(clamp_cell((3, -1), 3, 2), Some((2, 0)));
        assert_eq!(clamp_cell((0, 0), 0, 2), None);
    }

    #[test]
    fn hover_requires_pointer_over_surface() {
        let layout = GridLayout::new(4, 4, Rect::new(0.0, 0.0, 40.0, 40.0));
        let mut input = FrameInput::default();
        assert!(layout.hovered(&input).is_none());
        input.pointer_moved(Point::new(50.0, 5.0));
        assert!(layout.hovered(&input).is_none());
        input.pointer_moved(Point::new(25.0, 35.0));
        let hovered = layout.hovered(&input).unwrap();
        assert_eq!((hovered.x, hovered.y, hovered.index), (2, 3, 14));
    }

    #[test]
    fn zero_step_does_not_divide() {
        let raw = cell_under_pointer(Point::new(5.0, 5.0), Point::ZERO, Vec2::ZERO, 0.0, 0.0);
        assert_eq!(raw, (0, 0));
    }
}
