//! Per-frame pointer state accumulated from window events.

use vello::kurbo::{Point, Rect};

/// Pointer input as seen by one rendered frame.
///
/// `pressed`, `released` and `wheel` are edges: the host clears them with
/// [`FrameInput::end_frame`] after each render.
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Pointer position in surface pixels, `None` when outside the window.
    pub pointer: Option<Point>,
    /// Primary button currently held.
    pub down: bool,
    /// Primary button went down during this frame.
    pub pressed: bool,
    /// Primary button went up during this frame.
    pub released: bool,
    /// Wheel movement in lines, positive scrolls content up.
    pub wheel: f64,
}

impl FrameInput {
    pub fn pointer_moved(&mut self, pos: Point) {
        self.pointer = Some(pos);
    }

    pub fn pointer_left(&mut self) {
        self.pointer = None;
        self.down = false;
    }

    pub fn button(&mut self, down: bool) {
        if down && !self.down {
            self.pressed = true;
        }
        if !down && self.down {
            self.released = true;
        }
        self.down = down;
    }

    pub fn scrolled(&mut self, lines: f64) {
        self.wheel += lines;
    }

    pub fn end_frame(&mut self) {
        self.pressed = false;
        self.released = false;
        self.wheel = 0.0;
    }

    /// Whether the pointer is over `rect`.
    pub fn hovers(&self, rect: Rect) -> bool {
        self.pointer.is_some_and(|p| rect.contains(p))
    }

    /// Whether the button went down over `rect` this frame.
    pub fn clicked_in(&self, rect: Rect) -> bool {
        self.pressed && self.hovers(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_are_edges() {
        let mut input = FrameInput::default();
        input.pointer_moved(Point::new(5.0, 5.0));
        input.button(true);
        assert!(input.pressed && input.down);
        input.end_frame();
        input.button(true);
        assert!(!input.pressed);
        input.button(false);
        assert!(input.released && !input.down);
        input.end_frame();
        assert!(!input.released);
    }

    #[test]
    fn click_requires_pointer_inside() {
        let mut input = FrameInput::default();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        input.button(true);
        assert!(!input.clicked_in(rect));
        input.pointer_moved(Point::new(3.0, 4.0));
        assert!(input.clicked_in(rect));
        input.pointer_left();
        assert!(!input.hovers(rect));
    }
}
