// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channels and per-layer change masks.
//!
//! Both trees in the crate family use [`understory_dirty`] for invalidation.
//!
//! The scene graph ([`LayerTree`](crate::layer::LayerTree)) marks:
//!
//! - [`SYNC`] whenever any property of a layer changes. Local-only; the
//!   flush drains it to learn which layers need their state pushed to the
//!   compositing side. *What* changed is recorded in the layer's
//!   [`ChangeMask`].
//! - [`TOPOLOGY`] on child-list mutations of the parent.
//!
//! The compositing tree (in `lamina_render`) marks:
//!
//! - [`TRANSFORM`] with eager propagation along child→parent edges, since a
//!   layer's combined transform depends on every ancestor's. Mask and
//!   replica layers depend on their effect target the same way.
//! - [`CONTENT`] when a backing store or image needs re-uploading. Local-only.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use understory_dirty::Channel;

/// A layer's properties changed and need to be synced.
pub const SYNC: Channel = Channel::new(0);

/// A layer's child list changed.
pub const TOPOLOGY: Channel = Channel::new(1);

/// Geometry changed; combined transforms must be recomputed for the subtree.
pub const TRANSFORM: Channel = Channel::new(2);

/// Backing content changed.
pub const CONTENT: Channel = Channel::new(3);

/// Bit set of property categories that changed on a layer since its last
/// sync.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChangeMask(u32);

impl ChangeMask {
    /// Nothing changed.
    pub const NONE: Self = Self(0);
    /// The layer was attached to or detached from a parent.
    pub const PARENT: Self = Self(1 << 0);
    /// The child list changed.
    pub const CHILDREN: Self = Self(1 << 1);
    /// Position changed.
    pub const POSITION: Self = Self(1 << 2);
    /// Anchor point changed.
    pub const ANCHOR_POINT: Self = Self(1 << 3);
    /// Size changed.
    pub const SIZE: Self = Self(1 << 4);
    /// Local transform changed.
    pub const TRANSFORM: Self = Self(1 << 5);
    /// Children (sublayer) transform changed.
    pub const CHILDREN_TRANSFORM: Self = Self(1 << 6);
    /// Opacity changed.
    pub const OPACITY: Self = Self(1 << 7);
    /// Background color changed.
    pub const BACKGROUND_COLOR: Self = Self(1 << 8);
    /// Solid-color or image contents changed.
    pub const CONTENTS: Self = Self(1 << 9);
    /// One of the boolean rendering flags changed.
    pub const FLAGS: Self = Self(1 << 10);
    /// Mask layer changed.
    pub const MASK: Self = Self(1 << 11);
    /// Replica layer changed.
    pub const REPLICA: Self = Self(1 << 12);
    /// Filter list changed.
    pub const FILTERS: Self = Self(1 << 13);
    /// Animation set changed.
    pub const ANIMATIONS: Self = Self(1 << 14);
    /// Contents rect or contents scale changed.
    pub const CONTENTS_RECT: Self = Self(1 << 15);
    /// Bounds origin changed.
    pub const BOUNDS_ORIGIN: Self = Self(1 << 16);
    /// Content needs repainting.
    pub const DISPLAY: Self = Self(1 << 17);
    /// Debug name changed.
    pub const NAME: Self = Self(1 << 18);

    /// Bits that are carried by a full layer state record.
    pub const STATE: Self = Self(
        Self::PARENT.0
            | Self::POSITION.0
            | Self::ANCHOR_POINT.0
            | Self::SIZE.0
            | Self::TRANSFORM.0
            | Self::CHILDREN_TRANSFORM.0
            | Self::OPACITY.0
            | Self::BACKGROUND_COLOR.0
            | Self::CONTENTS.0
            | Self::FLAGS.0
            | Self::MASK.0
            | Self::REPLICA.0
            | Self::CONTENTS_RECT.0
            | Self::BOUNDS_ORIGIN.0
            | Self::NAME.0,
    );

    /// Bits that affect the combined transform.
    pub const GEOMETRY: Self = Self(
        Self::POSITION.0
            | Self::ANCHOR_POINT.0
            | Self::SIZE.0
            | Self::TRANSFORM.0
            | Self::CHILDREN_TRANSFORM.0
            | Self::FLAGS.0,
    );

    /// Every bit.
    pub const ALL: Self = Self((1 << 19) - 1);

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both masks.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if any bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ChangeMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ChangeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeMask({:#07x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_query() {
        let mut m = ChangeMask::NONE;
        assert!(m.is_empty());
        m |= ChangeMask::OPACITY;
        m |= ChangeMask::SIZE;
        assert!(m.contains(ChangeMask::OPACITY));
        assert!(m.intersects(ChangeMask::GEOMETRY));
        assert!(!m.contains(ChangeMask::GEOMETRY));
        assert!(ChangeMask::ALL.contains(ChangeMask::STATE | ChangeMask::FILTERS));
    }
}
