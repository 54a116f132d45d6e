/// Near-bottom distance used to resume follow mode deterministically.
const AUTO_FOLLOW_RESUME_THRESHOLD: f32 = 24.0;
/// Small delta used to ignore floating-point scroll jitter.
const SCROLL_DELTA_EPSILON: f32 = 1.0;

/// Tracks whether the transcript should keep following its newest content.
///
/// Offsets use the browser convention: `offset` grows downward from 0 and
/// reaches `max_offset` at the tail. The host feeds positions through
/// [`ScrollFollow::observe`]; the renderer asks [`ScrollFollow::apply_pending_scroll`]
/// after every create/update.
#[derive(Debug, Clone)]
pub struct ScrollFollow {
    pending_scroll_to_bottom: bool,
    follow_bottom: bool,
    last_scroll_offset: f32,
    last_max_offset: f32,
}

impl ScrollFollow {
    pub fn new() -> Self {
        Self {
            pending_scroll_to_bottom: false,
            follow_bottom: true,
            last_scroll_offset: 0.0,
            last_max_offset: 0.0,
        }
    }

    pub fn is_following_bottom(&self) -> bool {
        self.follow_bottom
    }

    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
        self.follow_bottom = true;
    }

    pub fn request_scroll_to_bottom_if_following(&mut self) {
        if self.follow_bottom || self.was_near_bottom() {
            self.pending_scroll_to_bottom = true;
        }
    }

    pub fn reset(&mut self) {
        self.last_scroll_offset = 0.0;
        self.last_max_offset = 0.0;
        self.follow_bottom = true;
        self.pending_scroll_to_bottom = true;
    }

    /// Records one scroll position report from the host display.
    pub fn observe(&mut self, offset: f32, max_offset: f32) {
        let offset_delta = offset - self.last_scroll_offset;
        let max_delta = (max_offset - self.last_max_offset).abs();
        let content_size_changed = max_delta > SCROLL_DELTA_EPSILON;
        let user_scrolled_up = offset_delta < -SCROLL_DELTA_EPSILON && !content_size_changed;
        let user_scrolled_down = offset_delta > SCROLL_DELTA_EPSILON && !content_size_changed;

        // Keep follow mode enabled while we are fulfilling an explicit follow request.
        if self.pending_scroll_to_bottom || (content_size_changed && self.was_near_bottom()) {
            self.follow_bottom = true;
        } else if self.follow_bottom {
            // Pause follow mode only when the user manually scrolls away from the tail.
            if user_scrolled_up {
                self.follow_bottom = false;
            }
        } else if user_scrolled_down && is_near_bottom(offset, max_offset) {
            // Resume follow mode once user intentionally returns near the bottom boundary.
            self.follow_bottom = true;
        }

        self.last_scroll_offset = offset;
        self.last_max_offset = max_offset;
    }

    /// Consumes the pending request; returns true when the display should
    /// scroll to its tail now.
    pub fn apply_pending_scroll(&mut self) -> bool {
        let should_scroll = self.follow_bottom || self.pending_scroll_to_bottom;
        self.pending_scroll_to_bottom = false;
        should_scroll
    }

    fn was_near_bottom(&self) -> bool {
        is_near_bottom(self.last_scroll_offset, self.last_max_offset)
    }
}

impl Default for ScrollFollow {
    fn default() -> Self {
        Self::new()
    }
}

fn is_near_bottom(offset: f32, max_offset: f32) -> bool {
    if max_offset <= 0.0 {
        return true;
    }
    (max_offset - offset).abs() <= AUTO_FOLLOW_RESUME_THRESHOLD
}
