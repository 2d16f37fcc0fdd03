// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The set of animations running on one layer.

use alloc::vec::Vec;

use super::{AnimatedProperty, Animation, AnimationClient, PlayState};

/// Animations attached to one layer, keyed by `(name, property)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animations {
    animations: Vec<Animation>,
}

impl Animations {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            animations: Vec::new(),
        }
    }

    /// Adds `animation`, replacing any with the same name and property.
    pub fn add(&mut self, animation: Animation) {
        self.animations
            .retain(|a| !(a.name() == animation.name() && a.property() == animation.property()));
        self.animations.push(animation);
    }

    /// Removes every animation called `name`.
    pub fn remove(&mut self, name: &str) {
        self.animations.retain(|a| a.name() != name);
    }

    /// Removes the animation called `name` on `property`.
    pub fn remove_property(&mut self, name: &str, property: AnimatedProperty) {
        self.animations
            .retain(|a| !(a.name() == name && a.property() == property));
    }

    /// Pauses every animation called `name` at `time_offset`.
    ///
    /// Returns `true` if any animation matched.
    pub fn pause(&mut self, name: &str, time_offset: f64) -> bool {
        let mut found = false;
        for animation in self.animations.iter_mut().filter(|a| a.name() == name) {
            animation.pause(time_offset);
            found = true;
        }
        found
    }

    /// Evaluates every animation at `now` and retires the finished ones.
    pub fn apply(&mut self, client: &mut dyn AnimationClient, now: f64) {
        for animation in &mut self.animations {
            animation.apply(client, now);
        }
        self.animations.retain(Animation::is_active);
    }

    /// Drops animations that are stopped or have played their last
    /// iteration by `now`. Paused animations are kept.
    ///
    /// Returns `true` if any animation was dropped.
    pub fn retire_finished(&mut self, now: f64) -> bool {
        let before = self.animations.len();
        self.animations.retain(|a| match a.state() {
            PlayState::Playing => !a.is_finished_at(a.running_time(now)),
            PlayState::Paused => true,
            PlayState::Stopped => false,
        });
        self.animations.len() != before
    }

    /// Returns `true` if any animation is still advancing.
    #[must_use]
    pub fn has_running_animations(&self) -> bool {
        self.animations
            .iter()
            .any(|a| a.state() == PlayState::Playing)
    }

    /// Returns `true` if an active animation drives `property`.
    #[must_use]
    pub fn has_active_animation_of(&self, property: AnimatedProperty) -> bool {
        self.animations
            .iter()
            .any(|a| a.is_active() && a.property() == property)
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Number of animations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    /// Iterates over the animations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Animation> {
        self.animations.iter()
    }
}
