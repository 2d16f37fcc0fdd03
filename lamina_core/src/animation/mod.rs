// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyframe animation evaluation.
//!
//! An [`Animation`] maps a point in time to a property value by:
//!
//! 1. computing the running time (`now - start`, or the frozen pause time);
//! 2. folding it into the current iteration, reversing odd or even
//!    iterations for alternating directions;
//! 3. locating the keyframe pair that brackets the iteration progress and
//!    easing the local progress with the start keyframe's timing function;
//! 4. blending the pair and handing the result to an [`AnimationClient`].
//!
//! Finished animations are retired by their [`Animations`] set and leave the
//! property at the layer's base value.

mod keyframes;
mod set;

pub use keyframes::{AnimatedProperty, AnimationValue, Keyframe, KeyframeList};
pub use set::Animations;

use alloc::string::String;
use core::fmt;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::Size;

use crate::filter::FilterOperations;
use crate::timing_function::TimingFunction;
use crate::transform::Transform3d;

/// Receives animated values.
pub trait AnimationClient {
    /// A new transform for this frame.
    fn set_animated_transform(&mut self, transform: Transform3d);
    /// A new opacity for this frame.
    fn set_animated_opacity(&mut self, opacity: f32);
    /// A new filter chain for this frame.
    fn set_animated_filters(&mut self, filters: FilterOperations);
}

/// Playback direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Every iteration runs forwards.
    #[default]
    Normal,
    /// Every iteration runs backwards.
    Reverse,
    /// Odd iterations run backwards.
    Alternate,
    /// Even iterations run backwards.
    AlternateReverse,
}

impl Direction {
    fn reverses(self, loop_count: u64) -> bool {
        match self {
            Self::Normal => false,
            Self::Reverse => true,
            Self::Alternate => loop_count % 2 == 1,
            Self::AlternateReverse => loop_count % 2 == 0,
        }
    }
}

/// What is shown outside the active interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillMode {
    /// Nothing.
    #[default]
    None,
    /// The end value after finishing.
    Forwards,
    /// The start value before starting.
    Backwards,
    /// Both.
    Both,
}

impl FillMode {
    /// Returns `true` for [`Forwards`](Self::Forwards) and [`Both`](Self::Both).
    #[must_use]
    pub const fn fills_forwards(self) -> bool {
        matches!(self, Self::Forwards | Self::Both)
    }

    /// Returns `true` for [`Backwards`](Self::Backwards) and [`Both`](Self::Both).
    #[must_use]
    pub const fn fills_backwards(self) -> bool {
        matches!(self, Self::Backwards | Self::Both)
    }
}

/// Number of iterations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IterationCount {
    /// A finite, possibly fractional, count.
    Finite(f64),
    /// Repeats forever.
    Infinite,
}

impl Default for IterationCount {
    fn default() -> Self {
        Self::Finite(1.0)
    }
}

/// Timing parameters of an animation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationTiming {
    /// Length of one iteration in seconds.
    pub duration: f64,
    /// Iteration count.
    pub iterations: IterationCount,
    /// Direction.
    pub direction: Direction,
    /// Fill mode.
    pub fill_mode: FillMode,
    /// Easing used when a keyframe does not set its own.
    pub timing_function: TimingFunction,
}

impl AnimationTiming {
    /// One forward iteration of `duration` seconds with `ease`.
    #[must_use]
    pub const fn new(duration: f64) -> Self {
        Self {
            duration,
            iterations: IterationCount::Finite(1.0),
            direction: Direction::Normal,
            fill_mode: FillMode::None,
            timing_function: TimingFunction::EASE,
        }
    }

    /// Sets the iteration count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: IterationCount) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the fill mode.
    #[must_use]
    pub const fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Sets the default easing.
    #[must_use]
    pub const fn with_timing_function(mut self, timing_function: TimingFunction) -> Self {
        self.timing_function = timing_function;
        self
    }
}

/// Why an animation was not accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnimationRejection {
    /// No timing parameters were supplied.
    MissingTiming,
    /// The duration is zero, negative or not finite.
    InvalidDuration,
    /// Fewer than two keyframes.
    TooFewKeyframes,
    /// The property cannot be animated by the compositor.
    UnsupportedProperty(AnimatedProperty),
    /// A keyframe value belongs to a different property.
    MismatchedValue,
    /// Filter chains do not line up across keyframes.
    MismatchedFilterLists,
    /// A keyframe contains a filter the compositor cannot apply.
    NonCompositableFilter,
}

impl fmt::Display for AnimationRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTiming => f.write_str("animation has no timing parameters"),
            Self::InvalidDuration => f.write_str("animation duration must be positive"),
            Self::TooFewKeyframes => f.write_str("animation needs at least two keyframes"),
            Self::UnsupportedProperty(p) => {
                write!(f, "property `{}` cannot be animated by the compositor", p.name())
            }
            Self::MismatchedValue => f.write_str("keyframe value does not match the animated property"),
            Self::MismatchedFilterLists => f.write_str("filter lists differ between keyframes"),
            Self::NonCompositableFilter => f.write_str("keyframe contains a non-compositable filter"),
        }
    }
}

impl core::error::Error for AnimationRejection {}

/// Playback state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayState {
    /// Advancing with the clock.
    Playing,
    /// Frozen at the pause time.
    Paused,
    /// Finished; will be retired.
    Stopped,
}

/// A named keyframe animation of one property.
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    name: String,
    keyframes: KeyframeList,
    box_size: Size,
    timing: AnimationTiming,
    start_time: f64,
    pause_time: f64,
    state: PlayState,
    transform_lists_match: bool,
}

impl Animation {
    /// Validates the inputs and creates a playing animation.
    ///
    /// `start_time` is in the same clock as the `now` later passed to
    /// [`apply`](Self::apply).
    pub fn new(
        name: impl Into<String>,
        keyframes: KeyframeList,
        box_size: Size,
        timing: Option<&AnimationTiming>,
        start_time: f64,
    ) -> Result<Self, AnimationRejection> {
        let timing = timing.ok_or(AnimationRejection::MissingTiming)?;
        if timing.duration <= 0.0 || !timing.duration.is_finite() {
            return Err(AnimationRejection::InvalidDuration);
        }
        if keyframes.len() < 2 {
            return Err(AnimationRejection::TooFewKeyframes);
        }
        if keyframes.property() == AnimatedProperty::BackgroundColor {
            return Err(AnimationRejection::UnsupportedProperty(keyframes.property()));
        }
        if !keyframes.values_match_property() {
            return Err(AnimationRejection::MismatchedValue);
        }
        if keyframes.property() == AnimatedProperty::Filter {
            if !keyframes.filters_compositable() {
                return Err(AnimationRejection::NonCompositableFilter);
            }
            if !keyframes.filter_lists_match() {
                return Err(AnimationRejection::MismatchedFilterLists);
            }
        }
        let transform_lists_match = keyframes.transform_lists_match();
        Ok(Self {
            name: name.into(),
            keyframes,
            box_size,
            timing: *timing,
            start_time,
            pause_time: 0.0,
            state: PlayState::Playing,
            transform_lists_match,
        })
    }

    /// The animation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The animated property.
    #[must_use]
    pub const fn property(&self) -> AnimatedProperty {
        self.keyframes.property()
    }

    /// The keyframes.
    #[must_use]
    pub const fn keyframes(&self) -> &KeyframeList {
        &self.keyframes
    }

    /// The box size percentages resolve against.
    #[must_use]
    pub const fn box_size(&self) -> Size {
        self.box_size
    }

    /// Timing parameters.
    #[must_use]
    pub const fn timing(&self) -> &AnimationTiming {
        &self.timing
    }

    /// Start time.
    #[must_use]
    pub const fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Current playback state.
    #[must_use]
    pub const fn state(&self) -> PlayState {
        self.state
    }

    /// Returns `true` unless the animation has finished.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != PlayState::Stopped
    }

    /// Freezes the animation at `time_offset` seconds of running time.
    pub fn pause(&mut self, time_offset: f64) {
        self.state = PlayState::Paused;
        self.pause_time = time_offset;
    }

    /// Running time at `now`.
    #[must_use]
    pub fn running_time(&self, now: f64) -> f64 {
        match self.state {
            PlayState::Paused => self.pause_time,
            _ => now - self.start_time,
        }
    }

    /// Iteration progress in `0..=1` at `running_time`, after direction.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "loop count is floored and clamped to zero; only its parity is used"
    )]
    pub fn iteration_progress(&self, running_time: f64) -> f64 {
        let duration = self.timing.duration;
        if duration == 0.0 {
            return 0.0;
        }
        let loop_count = (running_time / duration).floor().max(0.0);
        let remainder = running_time - duration * loop_count;
        let at_end = matches!(self.timing.iterations, IterationCount::Finite(n) if loop_count == n);
        let normalized = if at_end { 1.0 } else { remainder / duration };
        if self.timing.direction.reverses(loop_count as u64) {
            1.0 - normalized
        } else {
            normalized
        }
    }

    /// Returns `true` once `running_time` reaches the end of the last
    /// iteration.
    #[must_use]
    pub fn is_finished_at(&self, running_time: f64) -> bool {
        match self.timing.iterations {
            IterationCount::Finite(n) => running_time >= self.timing.duration * n,
            IterationCount::Infinite => false,
        }
    }

    /// Evaluates at `now` and hands the value to `client`.
    ///
    /// Finishing moves the animation to [`PlayState::Stopped`] without
    /// touching the client, so the property returns to its base value.
    pub fn apply(&mut self, client: &mut dyn AnimationClient, now: f64) {
        if !self.is_active() {
            return;
        }
        let running_time = self.running_time(now);
        if running_time < 0.0 {
            if self.timing.fill_mode.fills_backwards() {
                let start = if self.timing.direction.reverses(0) { 1.0 } else { 0.0 };
                self.apply_at(client, start);
            }
            return;
        }
        if self.is_finished_at(running_time) {
            self.state = PlayState::Stopped;
            return;
        }
        let progress = self.iteration_progress(running_time);
        self.apply_at(client, progress);
    }

    /// Applies the value at iteration progress `progress`.
    fn apply_at(&self, client: &mut dyn AnimationClient, progress: f64) {
        let frames = self.keyframes.keyframes();
        let last = frames.len() - 1;
        if progress <= 0.0 {
            self.apply_pair(client, 0, 1, 0.0);
            return;
        }
        if progress >= 1.0 {
            self.apply_pair(client, last - 1, last, 1.0);
            return;
        }
        if frames.len() == 2 {
            let eased = self.ease(0, progress);
            self.apply_pair(client, 0, 1, eased);
            return;
        }
        for i in 0..last {
            let (from, to) = (&frames[i], &frames[i + 1]);
            if from.key > progress || to.key < progress {
                continue;
            }
            let span = to.key - from.key;
            let local = if span > 0.0 {
                (progress - from.key) / span
            } else {
                1.0
            };
            let eased = self.ease(i, local);
            self.apply_pair(client, i, i + 1, eased);
            return;
        }
    }

    fn ease(&self, from_index: usize, progress: f64) -> f64 {
        let timing_function = self.keyframes.keyframes()[from_index]
            .timing_function
            .unwrap_or(self.timing.timing_function);
        let epsilon = TimingFunction::epsilon_for_duration(self.timing.duration);
        timing_function.evaluate(progress, epsilon)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "opacity is stored as f32"
    )]
    fn apply_pair(&self, client: &mut dyn AnimationClient, from: usize, to: usize, progress: f64) {
        let frames = self.keyframes.keyframes();
        match (&frames[from].value, &frames[to].value) {
            (AnimationValue::Opacity(a), AnimationValue::Opacity(b)) => {
                let value = if progress <= 0.0 {
                    *a
                } else if progress >= 1.0 {
                    *b
                } else {
                    a + (b - a) * progress as f32
                };
                client.set_animated_opacity(value);
            }
            (AnimationValue::Transform(a), AnimationValue::Transform(b)) => {
                let value = b.blend(a, progress, self.box_size, self.transform_lists_match);
                client.set_animated_transform(value);
            }
            (AnimationValue::Filter(a), AnimationValue::Filter(b)) => {
                client.set_animated_filters(b.blend(a, progress));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;
    use core::f64::consts::PI;

    use super::*;
    use crate::transform_ops::{TransformOperation, TransformOperations};

    #[derive(Default)]
    struct Recorder {
        opacity: Vec<f32>,
        transform: Vec<Transform3d>,
        filters: Vec<FilterOperations>,
    }

    impl AnimationClient for Recorder {
        fn set_animated_transform(&mut self, transform: Transform3d) {
            self.transform.push(transform);
        }
        fn set_animated_opacity(&mut self, opacity: f32) {
            self.opacity.push(opacity);
        }
        fn set_animated_filters(&mut self, filters: FilterOperations) {
            self.filters.push(filters);
        }
    }

    fn fade(from: f32, to: f32) -> KeyframeList {
        KeyframeList::new(AnimatedProperty::Opacity)
            .with(Keyframe::new(0.0, AnimationValue::Opacity(from)))
            .with(Keyframe::new(1.0, AnimationValue::Opacity(to)))
    }

    fn linear(duration: f64) -> AnimationTiming {
        AnimationTiming::new(duration).with_timing_function(TimingFunction::Linear)
    }

    #[test]
    fn opacity_midpoint_is_linear() {
        let mut a = Animation::new("fade", fade(0.0, 1.0), Size::ZERO, Some(&linear(1.0)), 0.0)
            .expect("valid");
        let mut r = Recorder::default();
        a.apply(&mut r, 0.5);
        assert_eq!(r.opacity, vec![0.5]);
    }

    #[test]
    fn endpoints_are_exact() {
        let timing = AnimationTiming::new(1.0);
        let a = Animation::new("fade", fade(0.3, 0.7), Size::ZERO, Some(&timing), 0.0)
            .expect("valid");
        let mut r = Recorder::default();
        a.apply_at(&mut r, 0.0);
        a.apply_at(&mut r, 1.0);
        assert_eq!(r.opacity, vec![0.3, 0.7]);
    }

    #[test]
    fn rotate_halfway_through_identity() {
        let keyframes = KeyframeList::new(AnimatedProperty::Transform)
            .with(Keyframe::new(0.0, AnimationValue::Transform(TransformOperations::default())))
            .with(Keyframe::new(
                1.0,
                AnimationValue::Transform(TransformOperations::new(vec![TransformOperation::rotate(180.0)])),
            ));
        let mut a = Animation::new("spin", keyframes, Size::new(10.0, 10.0), Some(&linear(1.0)), 0.0)
            .expect("valid");
        let mut r = Recorder::default();
        a.apply(&mut r, 0.5);
        assert!(r.transform[0].approx_eq(&Transform3d::from_rotation_z(PI / 2.0), 1e-9));
    }

    #[test]
    fn finishes_after_last_iteration() {
        let timing = linear(1.0).with_iterations(IterationCount::Finite(2.0));
        let mut a = Animation::new("fade", fade(0.0, 1.0), Size::ZERO, Some(&timing), 0.0)
            .expect("valid");
        let mut r = Recorder::default();
        a.apply(&mut r, 1.25);
        assert_eq!(r.opacity, vec![0.25]);
        a.apply(&mut r, 2.5);
        assert_eq!(a.state(), PlayState::Stopped);
        assert_eq!(r.opacity.len(), 1, "finished animation must not write a value");
    }

    #[test]
    fn alternate_reverses_odd_iterations() {
        let timing = linear(1.0)
            .with_iterations(IterationCount::Infinite)
            .with_direction(Direction::Alternate);
        let mut a = Animation::new("fade", fade(0.0, 1.0), Size::ZERO, Some(&timing), 0.0)
            .expect("valid");
        let mut r = Recorder::default();
        a.apply(&mut r, 0.25);
        a.apply(&mut r, 1.25);
        assert_eq!(r.opacity, vec![0.25, 0.75]);
    }

    #[test]
    fn paused_animation_is_frozen() {
        let mut a = Animation::new("fade", fade(0.0, 1.0), Size::ZERO, Some(&linear(1.0)), 0.0)
            .expect("valid");
        a.pause(0.4);
        let mut r = Recorder::default();
        a.apply(&mut r, 0.9);
        a.apply(&mut r, 100.0);
        assert_eq!(r.opacity.len(), 2);
        assert!((r.opacity[0] - 0.4).abs() < 1e-6);
        assert_eq!(r.opacity[0], r.opacity[1]);
    }

    #[test]
    fn three_keyframes_use_bracket() {
        let keyframes = KeyframeList::new(AnimatedProperty::Opacity)
            .with(Keyframe::new(0.0, AnimationValue::Opacity(0.0)))
            .with(Keyframe::new(0.5, AnimationValue::Opacity(1.0)))
            .with(Keyframe::new(1.0, AnimationValue::Opacity(0.0)));
        let mut a = Animation::new("pulse", keyframes, Size::ZERO, Some(&linear(2.0)), 0.0)
            .expect("valid");
        let mut r = Recorder::default();
        a.apply(&mut r, 1.5);
        assert!((r.opacity[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn delay_without_backwards_fill_writes_nothing() {
        let mut a = Animation::new("fade", fade(0.2, 1.0), Size::ZERO, Some(&linear(1.0)), 5.0)
            .expect("valid");
        let mut r = Recorder::default();
        a.apply(&mut r, 4.0);
        assert!(r.opacity.is_empty());

        let timing = linear(1.0).with_fill_mode(FillMode::Backwards);
        let mut b = Animation::new("fade", fade(0.2, 1.0), Size::ZERO, Some(&timing), 5.0)
            .expect("valid");
        b.apply(&mut r, 4.0);
        assert_eq!(r.opacity, vec![0.2]);
    }

    #[test]
    fn rejections() {
        let timing = AnimationTiming::new(1.0);
        assert_eq!(
            Animation::new("a", fade(0.0, 1.0), Size::ZERO, None, 0.0).unwrap_err(),
            AnimationRejection::MissingTiming
        );
        assert_eq!(
            Animation::new("a", fade(0.0, 1.0), Size::ZERO, Some(&AnimationTiming::new(0.0)), 0.0)
                .unwrap_err(),
            AnimationRejection::InvalidDuration
        );
        let single = KeyframeList::new(AnimatedProperty::Opacity)
            .with(Keyframe::new(0.0, AnimationValue::Opacity(0.0)));
        assert_eq!(
            Animation::new("a", single, Size::ZERO, Some(&timing), 0.0).unwrap_err(),
            AnimationRejection::TooFewKeyframes
        );
        let color = KeyframeList::new(AnimatedProperty::BackgroundColor)
            .with(Keyframe::new(0.0, AnimationValue::BackgroundColor(crate::color::Color::BLACK)))
            .with(Keyframe::new(1.0, AnimationValue::BackgroundColor(crate::color::Color::WHITE)));
        assert_eq!(
            Animation::new("a", color, Size::ZERO, Some(&timing), 0.0).unwrap_err(),
            AnimationRejection::UnsupportedProperty(AnimatedProperty::BackgroundColor)
        );
    }

    #[test]
    fn rejection_displays() {
        let text = alloc::format!("{}", AnimationRejection::UnsupportedProperty(AnimatedProperty::BackgroundColor));
        assert_eq!(text, "property `background-color` cannot be animated by the compositor");
    }
}
