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

//! Scroll-Anchor Controller.
//!
//! The host calls [`ScrollAnchorController::capture`] before it lays out a new
//! set of viewport ids and [`ScrollAnchorController::correct`] right after.
//! `correct` reads every layout number it needs first, plans the new scroll
//! position with [`plan_correction`], and only then writes to the host.

mod plan;

pub use plan::{
    Anchor, Correction, CorrectionKind, Measurements, PlanPolicy, UpdateShape, plan_correction,
};

use crate::config::ViewportConfig;
use crate::history::MessageId;
use std::sync::Arc;

/// Read side of a scroll container.
///
/// Item positions are relative to the visible top of the container; the
/// divider position is relative to the top of the content.
pub trait LayoutMeasure {
    fn scroll_top(&self) -> f64;
    fn scroll_height(&self) -> f64;
    fn container_height(&self) -> f64;
    /// Ids currently laid out, in render order.
    fn rendered_ids(&self) -> Vec<MessageId>;
    fn item_top(&self, id: MessageId) -> Option<f64>;
    fn item_height(&self, id: MessageId) -> Option<f64>;
    /// Content offset of the unread divider, if one is rendered.
    fn divider_offset(&self) -> Option<f64>;
}

/// Write side of a scroll container.
pub trait LayoutMutate {
    fn set_scroll_top(&mut self, scroll_top: f64);
}

/// The ids the host is about to lay out.
#[derive(Debug, Clone, Copy)]
pub struct ViewportFrame<'a> {
    pub ids: &'a [MessageId],
    /// The frame ends at the newest known message of the thread.
    pub is_newest: bool,
}

/// What the rendering layer needs besides the ids themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderHints {
    pub viewport_ids: Arc<[MessageId]>,
    pub is_at_bottom: bool,
    pub unread_divider_id: Option<MessageId>,
}

#[derive(Debug, Clone, Copy)]
struct Captured {
    anchor: Option<Anchor>,
}

/// Keeps what the user is looking at in place across viewport updates.
#[derive(Debug)]
pub struct ScrollAnchorController {
    config: ViewportConfig,
    tools_visible: bool,
    /// In-memory scroll offset, updated on every scroll and correction.
    scroll_offset: f64,
    unread_divider_id: Option<MessageId>,
    captured: Option<Captured>,
    prev_ids: Vec<MessageId>,
    prev_is_newest: bool,
    prev_container_height: Option<f64>,
    /// Scroll top written by the last correction; the scroll event it causes
    /// is not a user scroll.
    written_scroll_top: Option<f64>,
}

impl ScrollAnchorController {
    #[must_use]
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            tools_visible: false,
            scroll_offset: 0.0,
            unread_divider_id: None,
            captured: None,
            prev_ids: Vec::new(),
            prev_is_newest: true,
            prev_container_height: None,
            written_scroll_top: None,
        }
    }

    /// Reset for a freshly opened thread.
    ///
    /// `initial_offset` is the persisted distance from the bottom (pinned to
    /// the bottom when absent). The unread divider is fixed for the lifetime
    /// of this open so reading messages does not move it.
    pub fn open(&mut self, initial_offset: Option<f64>, unread_divider_id: Option<MessageId>) {
        let config = self.config;
        let tools_visible = self.tools_visible;
        *self = Self::new(config);
        self.tools_visible = tools_visible;
        self.scroll_offset = initial_offset.filter(|offset| offset.is_finite()).unwrap_or(0.0).max(0.0);
        self.unread_divider_id = unread_divider_id;
        tracing::debug!(offset = self.scroll_offset, ?unread_divider_id, "anchor controller opened");
    }

    #[must_use]
    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    #[must_use]
    pub fn unread_divider_id(&self) -> Option<MessageId> {
        self.unread_divider_id
    }

    #[must_use]
    pub fn anchor(&self) -> Option<Anchor> {
        self.captured.and_then(|captured| captured.anchor)
    }

    /// Extra chrome over the list pushes the divider further down.
    pub fn set_tools_visible(&mut self, visible: bool) {
        self.tools_visible = visible;
    }

    /// Record the anchor before `next_ids` replace what is rendered now.
    ///
    /// The anchor is the second rendered item that survives into `next_ids`;
    /// the first may belong to a group that is about to be pruned. A lone
    /// survivor is used as is.
    pub fn capture(&mut self, measure: &impl LayoutMeasure, next_ids: &[MessageId]) {
        let mut survivors =
            measure.rendered_ids().into_iter().filter(|id| next_ids.binary_search(id).is_ok());
        let first = survivors.next();
        let anchor = survivors
            .next()
            .or(first)
            .and_then(|id| measure.item_top(id).map(|top| Anchor { id, top }));
        self.captured = Some(Captured { anchor });
    }

    /// A local message was acknowledged under a new id.
    pub fn transfer_anchor(&mut self, local_id: MessageId, server_id: MessageId) {
        if let Some(Captured { anchor: Some(anchor) }) = self.captured.as_mut()
            && anchor.id == local_id
        {
            anchor.id = server_id;
        }
        if self.unread_divider_id == Some(local_id) {
            self.unread_divider_id = Some(server_id);
        }
        for id in &mut self.prev_ids {
            if *id == local_id {
                *id = server_id;
            }
        }
        self.prev_ids.sort_unstable();
    }

    /// Correct the scroll position after `frame` was laid out.
    pub fn correct<H>(&mut self, host: &mut H, frame: ViewportFrame<'_>) -> Correction
    where
        H: LayoutMeasure + LayoutMutate,
    {
        let captured = self.captured.take();
        let container_height = host.container_height();
        let anchor = captured.and_then(|captured| captured.anchor);

        // Measure everything before the first write.
        let measurements = Measurements {
            scroll_top: host.scroll_top(),
            scroll_height: host.scroll_height(),
            container_height,
            anchor_top: anchor.and_then(|anchor| host.item_top(anchor.id)),
            divider_offset: self.unread_divider_id.and(host.divider_offset()),
            tail_bottom: frame.ids.last().and_then(|&id| {
                let top = host.item_top(id)?;
                let height = host.item_height(id)?;
                Some(host.scroll_top() + top + height)
            }),
        };
        let shape = self.shape(frame, anchor, container_height);
        let correction = plan_correction(&shape, &measurements, self.policy());

        if (correction.scroll_top - measurements.scroll_top).abs() >= 0.5 {
            host.set_scroll_top(correction.scroll_top);
            self.written_scroll_top = Some(correction.scroll_top);
        }
        if anchor.is_some()
            && matches!(correction.kind, CorrectionKind::Divider | CorrectionKind::Offset)
        {
            tracing::debug!(kind = ?correction.kind, "anchor lost, used fallback correction");
        }

        self.scroll_offset = correction.scroll_offset;
        self.prev_ids.clear();
        self.prev_ids.extend_from_slice(frame.ids);
        self.prev_is_newest = frame.is_newest;
        self.prev_container_height = Some(container_height);
        correction
    }

    /// Handle a scroll event from the container.
    ///
    /// Returns the new offset to persist, or `None` for the event caused by
    /// our own correction.
    pub fn on_scroll(&mut self, measure: &impl LayoutMeasure) -> Option<f64> {
        let scroll_top = measure.scroll_top();
        if let Some(written) = self.written_scroll_top.take()
            && (written - scroll_top).abs() < 0.5
        {
            return None;
        }
        let offset = (measure.scroll_height() - scroll_top).max(measure.container_height());
        self.scroll_offset = offset;
        self.prev_container_height = Some(measure.container_height());
        Some(offset)
    }

    /// Whether the last frame ends at the newest message and is scrolled to
    /// within the bottom threshold.
    #[must_use]
    pub fn is_at_bottom(&self) -> bool {
        let container_height = self.prev_container_height.unwrap_or(0.0);
        self.prev_is_newest && self.scroll_offset - container_height <= self.config.bottom_threshold
    }

    #[must_use]
    pub fn render_hints(&self, viewport_ids: Arc<[MessageId]>) -> RenderHints {
        RenderHints {
            viewport_ids,
            is_at_bottom: self.is_at_bottom(),
            unread_divider_id: self.unread_divider_id,
        }
    }

    fn shape(
        &self,
        frame: ViewportFrame<'_>,
        anchor: Option<Anchor>,
        container_height: f64,
    ) -> UpdateShape {
        let prev_height = self.prev_container_height.unwrap_or(container_height);
        let was_at_bottom = frame.is_newest
            && self.prev_is_newest
            && self.scroll_offset - prev_height <= self.config.bottom_threshold;
        let appended = match (self.prev_ids.last(), frame.ids.last()) {
            (Some(prev_last), Some(last)) => {
                prev_last != last && frame.ids.binary_search(prev_last).is_ok()
            }
            _ => false,
        };
        UpdateShape {
            was_at_bottom,
            appended,
            ids_changed: self.prev_ids != frame.ids,
            resized: self
                .prev_container_height
                .is_some_and(|height| (height - container_height).abs() >= 0.5),
            anchor,
            scroll_offset: self.scroll_offset,
        }
    }

    fn policy(&self) -> PlanPolicy {
        let divider_top = if self.tools_visible {
            self.config.divider_top_with_tools
        } else {
            self.config.divider_top
        };
        PlanPolicy { bottom_focus_margin: self.config.bottom_focus_margin, divider_top }
    }
}
