//! Immediate-mode controls drawn straight into the scene.
//!
//! Panels re-declare their widgets every frame. The only state that survives
//! a frame is [`UiMemory`], which remembers the slider being dragged.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::RangeInclusive;

use vello::Scene;
use vello::kurbo::{Affine, Rect, RoundedRect, Stroke};
use vello::peniko::{Color, Fill};

use crate::input::FrameInput;
use crate::text::{TextStyle, ellipsize};
use crate::theme::Theme;

const ROW_GAP: f64 = 4.0;
const STEP_BUTTON_WIDTH: f64 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId(u64);

#[derive(Debug, Default)]
pub struct UiMemory {
    active: Option<WidgetId>,
}

impl UiMemory {
    pub fn active(&self) -> Option<WidgetId> {
        self.active
    }

    /// Release the drag once the button is up.
    pub fn end_frame(&mut self, input: &FrameInput) {
        if !input.down {
            self.active = None;
        }
    }
}

/// Draw a titled panel background and return the content rectangle.
pub fn panel_frame(
    scene: &mut Scene,
    theme: &Theme,
    text: &TextStyle,
    rect: Rect,
    title: &str,
) -> Rect {
    let layout = &theme.layout;
    let rounded = RoundedRect::from_rect(rect, layout.corner_radius);
    scene.fill(Fill::NonZero, Affine::IDENTITY, Theme::color(theme.colors.panel), None, &rounded);
    scene.stroke(
        &Stroke::new(1.5),
        Affine::IDENTITY,
        Theme::color(theme.colors.panel_border),
        None,
        &rounded,
    );

    let header = Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + layout.header_height);
    let header_rounded = RoundedRect::from_rect(header, layout.corner_radius);
    let header_color = Theme::color(theme.colors.header);
    scene.fill(Fill::NonZero, Affine::IDENTITY, header_color, None, &header_rounded);
    let size = theme.text.title;
    let title = ellipsize(text, title, size, header.width() - 2.0 * layout.panel_padding);
    let baseline = header.y0 + (layout.header_height + size * 0.7) / 2.0;
    text.draw(scene, header.x0 + layout.panel_padding, baseline, &title, theme.text(), size);

    Rect::new(
        rect.x0 + layout.panel_padding,
        header.y1 + layout.panel_padding,
        rect.x1 - layout.panel_padding,
        rect.y1 - layout.panel_padding,
    )
    .abs()
}

/// Layout cursor and widget factory for one panel.
pub struct Ui<'a> {
    pub scene: &'a mut Scene,
    pub theme: &'a Theme,
    pub text: &'a TextStyle,
    pub input: &'a FrameInput,
    memory: &'a mut UiMemory,
    salt: u64,
    rect: Rect,
    cursor_y: f64,
    enabled: bool,
}

impl<'a> Ui<'a> {
    pub fn new(
        scene: &'a mut Scene,
        theme: &'a Theme,
        text: &'a TextStyle,
        input: &'a FrameInput,
        memory: &'a mut UiMemory,
        panel: &str,
        rect: Rect,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        panel.hash(&mut hasher);
        Self {
            scene,
            theme,
            text,
            input,
            memory,
            salt: hasher.finish(),
            rect,
            cursor_y: rect.y0,
            enabled: true,
        }
    }

    /// Unused space below the cursor.
    pub fn remaining(&self) -> Rect {
        Rect::new(self.rect.x0, self.cursor_y.min(self.rect.y1), self.rect.x1, self.rect.y1)
    }

    /// Claim a full-width strip of `height` and advance the cursor.
    pub fn allocate(&mut self, height: f64) -> Rect {
        let top = self.cursor_y;
        self.cursor_y += height + ROW_GAP;
        Rect::new(self.rect.x0, top, self.rect.x1, top + height)
    }

    pub fn row(&mut self) -> Rect {
        self.allocate(self.theme.layout.row_height)
    }

    /// Vertical distance between consecutive rows.
    pub fn row_pitch(&self) -> f64 {
        self.theme.layout.row_height + ROW_GAP
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn id(&self, label: &str) -> WidgetId {
        let mut hasher = DefaultHasher::new();
        self.salt.hash(&mut hasher);
        label.hash(&mut hasher);
        WidgetId(hasher.finish())
    }

    fn body_color(&self) -> Color {
        if self.enabled { self.theme.text() } else { self.theme.text_secondary() }
    }

    fn baseline(&self, row: Rect) -> f64 {
        row.y0 + (row.height() + self.theme.text.body * 0.7) / 2.0
    }

    fn split(&self, row: Rect) -> (Rect, Rect) {
        let label_w = row.width() * self.theme.layout.label_width_frac;
        (
            Rect::new(row.x0, row.y0, row.x0 + label_w, row.y1),
            Rect::new(row.x0 + label_w, row.y0, row.x1, row.y1),
        )
    }

    /// Draw `text` left-aligned in `rect`, cut to fit.
    pub fn text_in(&mut self, rect: Rect, text: &str, color: Color, size: f64) {
        let fitted = ellipsize(self.text, text, size, rect.width());
        let baseline = rect.y0 + (rect.height() + size * 0.7) / 2.0;
        self.text.draw(self.scene, rect.x0, baseline, &fitted, color, size);
    }

    pub fn label(&mut self, text: &str) {
        let row = self.row();
        let color = self.body_color();
        self.text_in(row, text, color, self.theme.text.body);
    }

    pub fn small_label(&mut self, text: &str) {
        let row = self.allocate(self.theme.text.small + 6.0);
        self.text_in(row, text, self.theme.text_secondary(), self.theme.text.small);
    }

    /// Secondary-colored label on the left, value on the right.
    pub fn label_value(&mut self, label: &str, value: &str) {
        let row = self.row();
        let (left, right) = self.split(row);
        let size = self.theme.text.body;
        self.text_in(left, label, self.theme.text_secondary(), size);
        let color = self.body_color();
        self.text_in(right, value, color, size);
    }

    fn control_box(&mut self, rect: Rect, hovered: bool, active: bool) {
        let color = if !self.enabled {
            Theme::color(self.theme.colors.panel)
        } else if active || hovered {
            Theme::color(self.theme.colors.control_active)
        } else {
            Theme::color(self.theme.colors.control)
        };
        let rounded = RoundedRect::from_rect(rect, 3.0);
        self.scene.fill(Fill::NonZero, Affine::IDENTITY, color, None, &rounded);
        self.scene.stroke(
            &Stroke::new(1.0),
            Affine::IDENTITY,
            Theme::color(self.theme.colors.panel_border),
            None,
            &rounded,
        );
    }

    fn centered_text(&mut self, rect: Rect, text: &str) {
        let size = self.theme.text.body;
        let fitted = ellipsize(self.text, text, size, rect.width() - 4.0);
        let w = self.text.width(&fitted, size);
        let color = self.body_color();
        let baseline = self.baseline(rect);
        self.text.draw(self.scene, rect.center().x - w / 2.0, baseline, &fitted, color, size);
    }

    /// Push button in `rect`. Returns `true` on the frame it is clicked.
    pub fn button_in(&mut self, rect: Rect, label: &str) -> bool {
        let hovered = self.enabled && self.input.hovers(rect);
        let clicked = self.enabled && self.input.clicked_in(rect);
        self.control_box(rect, hovered, clicked);
        self.centered_text(rect, label);
        clicked
    }

    pub fn button(&mut self, label: &str) -> bool {
        let row = self.row();
        self.button_in(row, label)
    }

    /// Horizontal slider. Dragging starts on a press over the track and
    /// follows the pointer until the button is released.
    pub fn slider(&mut self, label: &str, value: &mut f64, range: RangeInclusive<f64>) -> bool {
        let row = self.row();
        let (left, right) = self.split(row);
        let size = self.theme.text.body;
        let label_color = self.body_color();
        self.text_in(left, label, label_color, size);

        let value_w = self.text.width("0000.000", size).min(right.width() * 0.4);
        let track = Rect::new(right.x0, row.y0 + 4.0, right.x1 - value_w - 6.0, row.y1 - 4.0);
        let id = self.id(label);
        let (lo, hi) = (*range.start(), *range.end());

        if self.enabled && self.input.clicked_in(track) {
            self.memory.active = Some(id);
        }
        let dragging = self.memory.active == Some(id);
        let mut changed = false;
        if self.enabled && dragging && self.input.down {
            if let Some(p) = self.input.pointer {
                let t = ((p.x - track.x0) / track.width().max(1.0)).clamp(0.0, 1.0);
                let next = lo + t * (hi - lo);
                changed = next != *value;
                *value = next;
            }
        }

        let hovered = self.enabled && self.input.hovers(track);
        self.control_box(track, hovered, dragging);
        let t = if hi > lo { ((*value - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.0 };
        if t > 0.0 {
            let fill = Rect::new(track.x0, track.y0, track.x0 + track.width() * t, track.y1);
            let color = if self.enabled {
                Theme::color(self.theme.colors.accent)
            } else {
                self.theme.text_secondary()
            };
            let filled = RoundedRect::from_rect(fill, 3.0);
            self.scene.fill(Fill::NonZero, Affine::IDENTITY, color, None, &filled);
        }
        let value_rect = Rect::new(track.x1 + 6.0, row.y0, row.x1, row.y1);
        let color = self.body_color();
        self.text_in(value_rect, &format_number(*value), color, size);
        changed
    }

    /// `[-] value [+]` row. Returns -1, 0 or 1.
    fn step_buttons(&mut self, label: &str, value_text: &str) -> i8 {
        let row = self.row();
        let (left, right) = self.split(row);
        let label_color = self.body_color();
        self.text_in(left, label, label_color, self.theme.text.body);

        let minus = Rect::new(right.x0, row.y0, right.x0 + STEP_BUTTON_WIDTH, row.y1);
        let plus = Rect::new(right.x1 - STEP_BUTTON_WIDTH, row.y0, right.x1, row.y1);
        let middle = Rect::new(minus.x1, row.y0, plus.x0, row.y1);
        let down = self.button_in(minus, "-");
        self.centered_text(middle, value_text);
        let up = self.button_in(plus, "+");
        i8::from(up) - i8::from(down)
    }

    pub fn stepper(
        &mut self,
        label: &str,
        value: &mut usize,
        range: RangeInclusive<usize>,
    ) -> bool {
        let step = self.step_buttons(label, &value.to_string());
        let next = match step {
            1 => value.saturating_add(1),
            -1 => value.saturating_sub(1),
            _ => *value,
        }
        .clamp(*range.start(), *range.end());
        let changed = next != *value;
        *value = next;
        changed
    }

    pub fn stepper_u64(&mut self, label: &str, value: &mut u64) -> bool {
        match self.step_buttons(label, &value.to_string()) {
            1 => *value = value.wrapping_add(1),
            -1 => *value = value.wrapping_sub(1),
            _ => return false,
        }
        true
    }

    /// Option picker cycled with `<` and `>`. `selected` is clamped into
    /// `options`.
    pub fn choice(&mut self, label: &str, selected: &mut usize, options: &[&str]) -> bool {
        if options.is_empty() {
            self.label_value(label, "-");
            return false;
        }
        let current = (*selected).min(options.len() - 1);
        let step = self.step_buttons(label, options[current]);
        let n = options.len();
        let next = match step {
            1 => (current + 1) % n,
            -1 => (current + n - 1) % n,
            _ => current,
        };
        let changed = next != *selected;
        *selected = next;
        changed
    }

    pub fn separator(&mut self) {
        let strip = self.allocate(2.0);
        let line = Rect::new(strip.x0, strip.y0, strip.x1, strip.y0 + 1.0);
        let color = Theme::color(self.theme.colors.panel_border);
        self.scene.fill(Fill::NonZero, Affine::IDENTITY, color, None, &line);
    }
}

/// Compact number formatting for slider values and table cells.
pub fn format_number(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let magnitude = v.abs();
    if magnitude != 0.0 && !(1e-3..1e5).contains(&magnitude) {
        format!("{v:.2e}")
    } else if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.3}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vello::kurbo::Point;

    struct Harness {
        scene: Scene,
        theme: Theme,
        text: TextStyle,
        memory: UiMemory,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                scene: Scene::new(),
                theme: Theme::default(),
                text: TextStyle::default(),
                memory: UiMemory::default(),
            }
        }

        fn ui<'a>(&'a mut self, input: &'a FrameInput) -> Ui<'a> {
            Ui::new(
                &mut self.scene,
                &self.theme,
                &self.text,
                input,
                &mut self.memory,
                "test",
                Rect::new(0.0, 0.0, 200.0, 400.0),
            )
        }
    }

    fn click_at(x: f64, y: f64) -> FrameInput {
        let mut input = FrameInput::default();
        input.pointer_moved(Point::new(x, y));
        input.button(true);
        input
    }

    #[test]
    fn allocate_advances_cursor() {
        let mut h = Harness::new();
        let input = FrameInput::default();
        let mut ui = h.ui(&input);
        let first = ui.row();
        let second = ui.allocate(10.0);
        assert_eq!(first.y0, 0.0);
        assert_eq!(second.y0, first.y1 + ROW_GAP);
        assert_eq!(ui.remaining().y0, second.y1 + ROW_GAP);
    }

    #[test]
    fn disabled_button_ignores_clicks() {
        let mut h = Harness::new();
        let input = click_at(100.0, 5.0);
        let mut ui = h.ui(&input);
        ui.set_enabled(false);
        assert!(!ui.button("Train"));

        let mut h = Harness::new();
        let mut ui = h.ui(&input);
        assert!(ui.button("Train"));
    }

    #[test]
    fn stepper_respects_range() {
        let mut h = Harness::new();
        // "+" sits at the right edge of the first row.
        let input = click_at(195.0, 5.0);
        let mut value = 4;
        assert!(!h.ui(&input).stepper("w", &mut value, 1..=4));
        assert_eq!(value, 4);
        let mut value = 2;
        assert!(h.ui(&input).stepper("w", &mut value, 1..=4));
        assert_eq!(value, 3);
    }

    #[test]
    fn slider_drag_follows_pointer_until_release() {
        let mut h = Harness::new();
        let mut value = 0.0;
        let track_x = 200.0 * Theme::default().layout.label_width_frac + 1.0;

        let input = click_at(track_x, 10.0);
        h.ui(&input).slider("rate", &mut value, 0.0..=1.0);
        assert!(h.memory.active().is_some());

        // Pointer leaves the row while still dragging.
        let mut input = input;
        input.end_frame();
        input.pointer_moved(Point::new(500.0, 300.0));
        assert!(h.ui(&input).slider("rate", &mut value, 0.0..=1.0));
        assert_eq!(value, 1.0);

        input.button(false);
        h.memory.end_frame(&input);
        assert!(h.memory.active().is_none());
    }

    #[test]
    fn choice_wraps_around() {
        let mut h = Harness::new();
        let input = click_at(195.0, 5.0);
        let mut selected = 2;
        assert!(h.ui(&input).choice("decay", &mut selected, &["a", "b", "c"]));
        assert_eq!(selected, 0);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.25), "0.250");
        assert_eq!(format_number(123456.0), "1.23e5");
    }
}
