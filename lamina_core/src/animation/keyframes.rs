// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyframe values and lists.

use alloc::vec::Vec;

use crate::color::Color;
use crate::filter::FilterOperations;
use crate::timing_function::TimingFunction;
use crate::transform_ops::TransformOperations;

/// A property that can be animated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimatedProperty {
    /// The layer transform.
    Transform,
    /// The layer opacity.
    Opacity,
    /// The layer filter chain.
    Filter,
    /// The background color. Not animated by the compositor.
    BackgroundColor,
}

impl AnimatedProperty {
    /// Short name used in dumps and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Opacity => "opacity",
            Self::Filter => "filter",
            Self::BackgroundColor => "background-color",
        }
    }
}

/// The value of one keyframe.
#[derive(Clone, Debug, PartialEq)]
pub enum AnimationValue {
    /// An opacity.
    Opacity(f32),
    /// A transform function list.
    Transform(TransformOperations),
    /// A filter chain.
    Filter(FilterOperations),
    /// A background color.
    BackgroundColor(Color),
}

impl AnimationValue {
    /// The property this value belongs to.
    #[must_use]
    pub const fn property(&self) -> AnimatedProperty {
        match self {
            Self::Opacity(_) => AnimatedProperty::Opacity,
            Self::Transform(_) => AnimatedProperty::Transform,
            Self::Filter(_) => AnimatedProperty::Filter,
            Self::BackgroundColor(_) => AnimatedProperty::BackgroundColor,
        }
    }
}

/// One keyframe: an offset in `0..=1`, a value, and the easing used from
/// this keyframe to the next.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    /// Offset within one iteration.
    pub key: f64,
    /// Value at this offset.
    pub value: AnimationValue,
    /// Easing towards the next keyframe; `None` uses the animation's.
    pub timing_function: Option<TimingFunction>,
}

impl Keyframe {
    /// Creates a keyframe with no easing override.
    #[must_use]
    pub const fn new(key: f64, value: AnimationValue) -> Self {
        Self {
            key,
            value,
            timing_function: None,
        }
    }

    /// Sets the easing towards the next keyframe.
    #[must_use]
    pub fn with_timing_function(mut self, timing_function: TimingFunction) -> Self {
        self.timing_function = Some(timing_function);
        self
    }
}

/// Keyframes of one property, kept sorted by offset.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyframeList {
    property: AnimatedProperty,
    keyframes: Vec<Keyframe>,
}

impl KeyframeList {
    /// Creates an empty list for `property`.
    #[must_use]
    pub const fn new(property: AnimatedProperty) -> Self {
        Self {
            property,
            keyframes: Vec::new(),
        }
    }

    /// Inserts a keyframe, keeping offsets ordered. Equal offsets keep
    /// insertion order.
    pub fn insert(&mut self, keyframe: Keyframe) {
        let at = self.keyframes.partition_point(|k| k.key <= keyframe.key);
        self.keyframes.insert(at, keyframe);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, keyframe: Keyframe) -> Self {
        self.insert(keyframe);
        self
    }

    /// The animated property.
    #[must_use]
    pub const fn property(&self) -> AnimatedProperty {
        self.property
    }

    /// The keyframes in offset order.
    #[must_use]
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Number of keyframes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Returns `true` if there are no keyframes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Returns `true` if every value belongs to the list's property.
    #[must_use]
    pub fn values_match_property(&self) -> bool {
        self.keyframes
            .iter()
            .all(|k| k.value.property() == self.property)
    }

    /// Returns `true` if all non-empty transform lists line up function by
    /// function, so per-function blending applies.
    #[must_use]
    pub fn transform_lists_match(&self) -> bool {
        let mut reference: Option<&TransformOperations> = None;
        for keyframe in &self.keyframes {
            let AnimationValue::Transform(ops) = &keyframe.value else {
                continue;
            };
            if ops.is_empty() {
                continue;
            }
            match reference {
                None => reference = Some(ops),
                Some(r) if r.operations_match(ops) => {}
                Some(_) => return false,
            }
        }
        true
    }

    /// Returns `true` if all non-empty filter chains line up filter by
    /// filter.
    #[must_use]
    pub fn filter_lists_match(&self) -> bool {
        let mut reference: Option<&FilterOperations> = None;
        for keyframe in &self.keyframes {
            let AnimationValue::Filter(ops) = &keyframe.value else {
                continue;
            };
            if ops.is_empty() {
                continue;
            }
            match reference {
                None => reference = Some(ops),
                Some(r) if r.operations_match(ops) => {}
                Some(_) => return false,
            }
        }
        true
    }

    /// Returns `true` if every filter in every keyframe can be composited.
    #[must_use]
    pub fn filters_compositable(&self) -> bool {
        self.keyframes.iter().all(|k| match &k.value {
            AnimationValue::Filter(ops) => ops.can_be_composited(),
            _ => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::transform_ops::TransformOperation;

    fn transform(ops: Vec<TransformOperation>) -> AnimationValue {
        AnimationValue::Transform(TransformOperations::new(ops))
    }

    #[test]
    fn insert_keeps_order() {
        let list = KeyframeList::new(AnimatedProperty::Opacity)
            .with(Keyframe::new(1.0, AnimationValue::Opacity(1.0)))
            .with(Keyframe::new(0.0, AnimationValue::Opacity(0.0)))
            .with(Keyframe::new(0.5, AnimationValue::Opacity(0.2)));
        let keys: Vec<f64> = list.keyframes().iter().map(|k| k.key).collect();
        assert_eq!(keys, vec![0.0, 0.5, 1.0]);
        assert!(list.values_match_property());
    }

    #[test]
    fn empty_lists_do_not_break_matching() {
        let list = KeyframeList::new(AnimatedProperty::Transform)
            .with(Keyframe::new(0.0, transform(vec![])))
            .with(Keyframe::new(0.5, transform(vec![TransformOperation::rotate(10.0)])))
            .with(Keyframe::new(1.0, transform(vec![TransformOperation::rotate(90.0)])));
        assert!(list.transform_lists_match());
    }

    #[test]
    fn different_kinds_do_not_match() {
        let list = KeyframeList::new(AnimatedProperty::Transform)
            .with(Keyframe::new(0.0, transform(vec![TransformOperation::rotate(10.0)])))
            .with(Keyframe::new(1.0, transform(vec![TransformOperation::scale(2.0, 2.0)])));
        assert!(!list.transform_lists_match());
    }

    #[test]
    fn mixed_values_are_detected() {
        let list = KeyframeList::new(AnimatedProperty::Opacity)
            .with(Keyframe::new(0.0, AnimationValue::Opacity(0.0)))
            .with(Keyframe::new(1.0, transform(vec![])));
        assert!(!list.values_match_property());
    }
}
