// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visible-rect forwarding with suppression of repeated values.

use kurbo::{Rect, Vec2};

/// What part of the content is on screen and where it is heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    /// Visible rect in content coordinates.
    pub visible_rect: Rect,
    /// Content scale.
    pub scale: f64,
    /// Scroll direction and speed, used to prioritize tiles ahead of the
    /// viewport.
    pub trajectory: Vec2,
}

/// Drops viewport updates that match the last one sent.
///
/// Rects are compared after rounding to whole pixels; scale and trajectory
/// are compared exactly.
#[derive(Clone, Debug, Default)]
pub struct ViewportLimiter {
    last: Option<ViewportState>,
}

impl ViewportLimiter {
    /// Creates a limiter that lets the first update through.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records `state` if it differs from the last value
    /// sent.
    pub fn should_send(&mut self, state: &ViewportState) -> bool {
        let rounded = ViewportState {
            visible_rect: state.visible_rect.round(),
            ..*state
        };
        if self.last == Some(rounded) {
            return false;
        }
        self.last = Some(rounded);
        true
    }

    /// Forgets the last value, so the next update is always sent.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(x: f64, scale: f64) -> ViewportState {
        ViewportState {
            visible_rect: Rect::new(x, 0.0, x + 800.0, 600.0),
            scale,
            trajectory: Vec2::ZERO,
        }
    }

    #[test]
    fn repeated_state_is_suppressed() {
        let mut limiter = ViewportLimiter::new();
        assert!(limiter.should_send(&state(0.0, 1.0)));
        assert!(!limiter.should_send(&state(0.0, 1.0)));
        assert!(!limiter.should_send(&state(0.2, 1.0)), "sub-pixel moves round away");
        assert!(limiter.should_send(&state(10.0, 1.0)));
        assert!(limiter.should_send(&state(10.0, 2.0)));
    }

    #[test]
    fn trajectory_change_is_sent() {
        let mut limiter = ViewportLimiter::new();
        let mut s = state(0.0, 1.0);
        assert!(limiter.should_send(&s));
        s.trajectory = Vec2::new(0.0, 1.0);
        assert!(limiter.should_send(&s));
    }

    #[test]
    fn reset_lets_the_same_state_through() {
        let mut limiter = ViewportLimiter::new();
        assert!(limiter.should_send(&state(0.0, 1.0)));
        limiter.reset();
        assert!(limiter.should_send(&state(0.0, 1.0)));
    }
}
