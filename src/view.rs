//! Auto-scroll heuristics for the message list.
//!
//! All quantities are terminal rows. The offset is the first visible row of
//! the wrapped transcript.

use std::time::{Duration, Instant};

/// Rows between the viewport bottom and the content bottom that still count
/// as "at the bottom"
pub const AT_BOTTOM_THRESHOLD: u16 = 3;

/// Wait before following a new message, so the frame that lays it out has
/// been drawn
pub const AUTOSCROLL_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ViewSync {
    offset: u16,
    content_height: u16,
    viewport_height: u16,
    threshold: u16,
    is_at_bottom: bool,
    message_count: usize,
    autoscroll_at: Option<Instant>,
}

impl Default for ViewSync {
    fn default() -> Self {
        Self::new(AT_BOTTOM_THRESHOLD)
    }
}

impl ViewSync {
    pub fn new(threshold: u16) -> Self {
        Self {
            offset: 0,
            content_height: 0,
            viewport_height: 0,
            threshold,
            is_at_bottom: true,
            message_count: 0,
            autoscroll_at: None,
        }
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn is_at_bottom(&self) -> bool {
        self.is_at_bottom
    }

    pub fn viewport_height(&self) -> u16 {
        self.viewport_height
    }

    pub fn autoscroll_pending(&self) -> bool {
        self.autoscroll_at.is_some()
    }

    pub fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    /// Record the layout of the last drawn frame.
    ///
    /// Only clamps the offset; `is_at_bottom` keeps the value from the last
    /// scroll or message-count change.
    pub fn measure(&mut self, content_height: u16, viewport_height: u16) {
        self.content_height = content_height;
        self.viewport_height = viewport_height;
        self.offset = self.offset.min(self.max_offset());
    }

    fn recompute(&mut self) {
        let viewport_bottom = self.offset.saturating_add(self.viewport_height);
        let distance = self.content_height.saturating_sub(viewport_bottom);
        self.is_at_bottom = distance <= self.threshold;
    }

    /// Scroll by `delta` rows (negative is up)
    pub fn scroll_by(&mut self, delta: i32) {
        let target = (self.offset as i32 + delta).clamp(0, self.max_offset() as i32);
        self.offset = target as u16;
        if delta < 0 {
            self.autoscroll_at = None;
        }
        self.recompute();
    }

    pub fn scroll_to_top(&mut self) {
        self.offset = 0;
        self.autoscroll_at = None;
        self.recompute();
    }

    /// Bring `row` into the viewport, moving as little as possible
    pub fn reveal_row(&mut self, row: u16) {
        if row < self.offset {
            self.offset = row;
        } else if self.viewport_height > 0 && row >= self.offset.saturating_add(self.viewport_height) {
            self.offset = row.saturating_add(1).saturating_sub(self.viewport_height);
        }
        self.offset = self.offset.min(self.max_offset());
        self.autoscroll_at = None;
        self.recompute();
    }

    pub fn jump_to_bottom(&mut self) {
        self.offset = self.max_offset();
        self.is_at_bottom = true;
        self.autoscroll_at = None;
    }

    /// React to the transcript length. Returns true if an auto-scroll was
    /// scheduled.
    pub fn on_message_count(&mut self, count: usize, now: Instant) -> bool {
        if count == self.message_count {
            return false;
        }
        let previous = self.message_count;
        self.message_count = count;

        if count == 0 {
            self.offset = 0;
            self.is_at_bottom = true;
            self.autoscroll_at = None;
            return false;
        }

        let first_message = previous == 0 && count == 1;
        if self.is_at_bottom || first_message {
            self.autoscroll_at = Some(now + AUTOSCROLL_DELAY);
            true
        } else {
            false
        }
    }

    /// Fire a due auto-scroll. Returns true if the view moved to the bottom.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.autoscroll_at {
            Some(due) if now >= due => {
                self.jump_to_bottom();
                true
            }
            _ => false,
        }
    }

    /// Whether the "jump to bottom" affordance should be drawn
    pub fn show_jump_to_bottom(&self) -> bool {
        self.message_count > 0 && !self.is_at_bottom && !self.autoscroll_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_with(content: u16, viewport: u16) -> ViewSync {
        let mut view = ViewSync::default();
        view.measure(content, viewport);
        view
    }

    #[test]
    fn test_at_bottom_within_threshold() {
        let mut view = view_with(100, 20);
        view.scroll_by(80);
        assert!(view.is_at_bottom());

        view.scroll_by(-(AT_BOTTOM_THRESHOLD as i32));
        assert!(view.is_at_bottom());

        view.scroll_by(-1);
        assert!(!view.is_at_bottom());
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut view = view_with(50, 20);
        view.scroll_by(1000);
        assert_eq!(view.offset(), 30);
        view.scroll_by(-1000);
        assert_eq!(view.offset(), 0);
    }

    #[test]
    fn test_new_message_at_bottom_scrolls_after_delay() {
        let start = Instant::now();
        let mut view = view_with(40, 20);
        view.on_message_count(3, start);
        view.tick(start + AUTOSCROLL_DELAY);
        assert_eq!(view.offset(), 20);

        // Next frame lays out the new message
        view.measure(50, 20);
        assert!(view.on_message_count(4, start));
        assert!(!view.tick(start + AUTOSCROLL_DELAY / 2));
        assert_eq!(view.offset(), 20);

        assert!(view.tick(start + AUTOSCROLL_DELAY));
        assert_eq!(view.offset(), 30);
        assert!(view.is_at_bottom());
    }

    #[test]
    fn test_new_message_scrolled_up_does_not_follow() {
        let start = Instant::now();
        let mut view = view_with(100, 20);
        view.on_message_count(6, start);
        view.tick(start + AUTOSCROLL_DELAY);
        assert_eq!(view.offset(), 80);

        view.scroll_by(-(AT_BOTTOM_THRESHOLD as i32) - 10);
        assert!(!view.is_at_bottom());
        let offset = view.offset();

        view.measure(120, 20);
        assert!(!view.on_message_count(7, start));
        view.tick(start + AUTOSCROLL_DELAY * 5);

        assert_eq!(view.offset(), offset);
        assert!(view.show_jump_to_bottom());

        view.jump_to_bottom();
        assert_eq!(view.offset(), 100);
        assert!(!view.show_jump_to_bottom());
    }

    #[test]
    fn test_first_message_always_scrolls() {
        let start = Instant::now();
        let mut view = ViewSync::default();
        assert!(view.on_message_count(1, start));
    }

    #[test]
    fn test_clear_resets_to_top() {
        let start = Instant::now();
        let mut view = view_with(100, 20);
        view.on_message_count(10, start);
        view.tick(start + AUTOSCROLL_DELAY);
        view.scroll_by(-50);

        view.on_message_count(0, start);
        assert_eq!(view.offset(), 0);
        assert!(view.is_at_bottom());
        assert!(!view.show_jump_to_bottom());
    }

    #[test]
    fn test_scrolling_up_cancels_pending_autoscroll() {
        let start = Instant::now();
        let mut view = view_with(100, 20);
        view.scroll_by(80);
        view.on_message_count(2, start);
        assert!(view.autoscroll_pending());

        view.scroll_by(-30);
        assert!(!view.autoscroll_pending());
        assert!(!view.tick(start + AUTOSCROLL_DELAY));
        assert_eq!(view.offset(), 50);
    }

    #[test]
    fn test_affordance_hidden_while_autoscroll_pending() {
        let start = Instant::now();
        let mut view = view_with(30, 20);
        view.scroll_by(10);
        view.on_message_count(1, start);
        view.measure(60, 20);
        assert!(!view.show_jump_to_bottom());
    }

    #[test]
    fn test_reveal_row() {
        let mut view = view_with(100, 20);
        view.reveal_row(45);
        assert_eq!(view.offset(), 26);
        view.reveal_row(10);
        assert_eq!(view.offset(), 10);
        view.reveal_row(15);
        assert_eq!(view.offset(), 10);
    }

    #[test]
    fn test_reveal_last_possible_row() {
        let mut view = view_with(u16::MAX, 20);
        view.reveal_row(u16::MAX);
        assert_eq!(view.offset(), view.max_offset());
        assert!(view.is_at_bottom());
    }
}
