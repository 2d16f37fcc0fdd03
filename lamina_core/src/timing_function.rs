// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Easing curves applied to keyframe progress.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

const NEWTON_ITERATIONS: u8 = 8;
const BISECTION_ITERATIONS: u8 = 64;

/// A unit cubic Bézier from `(0, 0)` to `(1, 1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct UnitBezier {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

impl UnitBezier {
    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        Self {
            ax: 1.0 - cx - bx,
            bx,
            cx,
            ay: 1.0 - cy - by,
            by,
            cy,
        }
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_dx(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    fn solve_x(&self, x: f64, epsilon: f64) -> f64 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let x2 = self.sample_x(t) - x;
            if x2.abs() < epsilon {
                return t;
            }
            let dx = self.sample_dx(t);
            if dx.abs() < 1e-6 {
                break;
            }
            t -= x2 / dx;
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        t = x;
        if t < lo {
            return lo;
        }
        if t > hi {
            return hi;
        }
        for _ in 0..BISECTION_ITERATIONS {
            let x2 = self.sample_x(t);
            if (x2 - x).abs() < epsilon {
                return t;
            }
            if x > x2 {
                lo = t;
            } else {
                hi = t;
            }
            t = (hi - lo) / 2.0 + lo;
        }
        t
    }

    fn solve(&self, x: f64, epsilon: f64) -> f64 {
        self.sample_y(self.solve_x(x, epsilon))
    }
}

/// Where a step function jumps within each interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepPosition {
    /// Jump at the start of each interval.
    Start,
    /// Jump at the end of each interval.
    End,
}

/// An easing curve mapping linear progress to eased progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimingFunction {
    /// Identity easing.
    Linear,
    /// A cubic Bézier with control points `(x1, y1)` and `(x2, y2)`.
    CubicBezier {
        /// First control point X.
        x1: f64,
        /// First control point Y.
        y1: f64,
        /// Second control point X.
        x2: f64,
        /// Second control point Y.
        y2: f64,
    },
    /// A staircase of `steps` equal jumps.
    Steps {
        /// Number of intervals (at least one is used).
        steps: u32,
        /// Jump position.
        position: StepPosition,
    },
}

impl TimingFunction {
    /// The CSS `ease` keyword.
    pub const EASE: Self = Self::cubic(0.25, 0.1, 0.25, 1.0);
    /// The CSS `ease-in` keyword.
    pub const EASE_IN: Self = Self::cubic(0.42, 0.0, 1.0, 1.0);
    /// The CSS `ease-out` keyword.
    pub const EASE_OUT: Self = Self::cubic(0.0, 0.0, 0.58, 1.0);
    /// The CSS `ease-in-out` keyword.
    pub const EASE_IN_OUT: Self = Self::cubic(0.42, 0.0, 0.58, 1.0);

    /// Creates a cubic Bézier easing.
    #[must_use]
    pub const fn cubic(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::CubicBezier { x1, y1, x2, y2 }
    }

    /// Creates a step easing.
    #[must_use]
    pub const fn steps(steps: u32, position: StepPosition) -> Self {
        Self::Steps { steps, position }
    }

    /// Solver tolerance for an animation lasting `duration` seconds.
    ///
    /// Longer animations need more precision to avoid visible jitter.
    #[must_use]
    pub fn epsilon_for_duration(duration: f64) -> f64 {
        1.0 / (200.0 * duration)
    }

    /// Evaluates the curve at `progress`, solving to within `epsilon`.
    #[must_use]
    pub fn evaluate(&self, progress: f64, epsilon: f64) -> f64 {
        match *self {
            Self::Linear => progress,
            Self::CubicBezier { x1, y1, x2, y2 } => {
                UnitBezier::new(x1, y1, x2, y2).solve(progress, epsilon)
            }
            Self::Steps { steps, position } => {
                let n = f64::from(steps.max(1));
                match position {
                    StepPosition::Start => ((n * progress).floor() + 1.0).min(n) / n,
                    StepPosition::End => (n * progress).floor() / n,
                }
            }
        }
    }
}

impl Default for TimingFunction {
    fn default() -> Self {
        Self::EASE
    }
}
