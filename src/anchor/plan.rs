// message_viewport — Scroll-stable chat history viewport
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Pure scroll-correction planning. Everything here works on numbers already
//! measured from the layout, so it can be tested without a rendering surface.

use crate::history::MessageId;

/// A rendered item whose on-screen position should survive an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub id: MessageId,
    /// Top edge relative to the visible top of the container.
    pub top: f64,
}

/// Which rule decided the new scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionKind {
    /// Pinned near the bottom and a message was appended: follow the tail.
    Follow,
    /// Only the container height changed while at the bottom.
    Resize,
    /// Keep the captured anchor visually stationary.
    Anchor,
    /// Keep the unread divider at a fixed distance from the top.
    Divider,
    /// Restore the remembered distance from the bottom of the content.
    Offset,
}

/// Layout numbers read after the new ids were laid out, before any write.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub container_height: f64,
    /// Current top of the captured anchor, if it is still rendered.
    pub anchor_top: Option<f64>,
    /// Content offset of the unread divider, if it is rendered.
    pub divider_offset: Option<f64>,
    /// Content offset of the bottom edge of the last rendered item.
    pub tail_bottom: Option<f64>,
}

/// What changed between the previous and the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateShape {
    /// Previous and next frame both end at the newest message and the user was
    /// within the bottom threshold before the update.
    pub was_at_bottom: bool,
    /// The tail id changed and the previous tail is still rendered.
    pub appended: bool,
    pub ids_changed: bool,
    pub resized: bool,
    pub anchor: Option<Anchor>,
    /// Distance from the top of the visible area to the bottom of the content
    /// before the update.
    pub scroll_offset: f64,
}

/// Knobs the plan needs from [`ViewportConfig`](crate::config::ViewportConfig).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanPolicy {
    pub bottom_focus_margin: f64,
    /// Distance kept between the container top and the unread divider.
    pub divider_top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub kind: CorrectionKind,
    /// Clamped to the scrollable range.
    pub scroll_top: f64,
    /// `scroll_height - scroll_top`, never below the container height.
    pub scroll_offset: f64,
}

/// Decide where the container should scroll to after an update.
///
/// Rules apply in order: follow, resize, anchor, divider, offset. The result
/// is always finite and within `0..=scroll_height - container_height`.
#[must_use]
pub fn plan_correction(shape: &UpdateShape, m: &Measurements, policy: PlanPolicy) -> Correction {
    let max_top = (m.scroll_height - m.container_height).max(0.0);
    let (kind, target) = if shape.was_at_bottom && shape.appended {
        let target = m
            .tail_bottom
            .map_or(max_top, |bottom| bottom + policy.bottom_focus_margin - m.container_height);
        (CorrectionKind::Follow, target)
    } else if shape.resized && !shape.ids_changed && shape.was_at_bottom {
        (CorrectionKind::Resize, max_top)
    } else if let (Some(anchor), Some(anchor_top)) = (shape.anchor, m.anchor_top) {
        (CorrectionKind::Anchor, m.scroll_top + anchor_top - anchor.top)
    } else if let Some(divider) = m.divider_offset {
        (CorrectionKind::Divider, divider - policy.divider_top)
    } else {
        (CorrectionKind::Offset, m.scroll_height - shape.scroll_offset)
    };

    let scroll_top = if target.is_finite() { target.clamp(0.0, max_top) } else { max_top };
    let scroll_offset = (m.scroll_height - scroll_top).max(m.container_height);
    Correction { kind, scroll_top, scroll_offset }
}
