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

//! Viewport windowing over a known id sequence.
//!
//! Pure functions only: the same ids, reference and direction always produce
//! the same [`Slice`]. Indices are computed in signed space and clamped at the
//! end so references outside the sequence degrade to the nearest edge.

use super::ids::MessageId;
use serde::{Deserialize, Serialize};

/// Semantic of a load or slice request relative to a reference id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Around,
    /// Towards older messages (scrolling up).
    Backwards,
    /// Towards newer messages (scrolling down).
    Forwards,
}

/// Window of ids to materialize, plus how much of it the local ids satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice {
    pub ids: Vec<MessageId>,
    /// At least part of the requested window exists locally and can be shown
    /// before any fetch.
    pub is_partially_local: bool,
    /// The whole requested window exists locally; no fetch is needed.
    pub is_fully_local: bool,
}

/// Index of `reference` in `ids`, or of its nearest older neighbour when the
/// reference is missing (deleted or never loaded). References before the first
/// id map to `0`, references after the last id map to the last index.
///
/// Returns `None` only for an empty sequence.
#[must_use]
pub fn find_nearest_index(ids: &[MessageId], reference: MessageId) -> Option<usize> {
    let (first, last) = (*ids.first()?, *ids.last()?);
    if reference <= first {
        return Some(0);
    }
    if reference >= last {
        return Some(ids.len() - 1);
    }
    Some(match ids.binary_search(&reference) {
        Ok(index) => index,
        // `reference > first`, so the insertion point is at least 1.
        Err(insert_at) => insert_at - 1,
    })
}

/// Compute the viewport window for `reference` in `direction`.
///
/// With `W = window_size`:
/// - `Around` keeps `W - 1` ids on each side of the reference (at most
///   `2W - 1` ids in total).
/// - `Backwards` reaches `W` ids older than the reference and keeps the
///   reference plus `W - 1` newer ids, so the previous viewport overlaps.
/// - `Forwards` mirrors `Backwards`: `W` newer ids plus the reference and
///   `W - 1` older ids.
///
/// A missing reference means "the end" for `Around`/`Backwards` and "the start"
/// for `Forwards`.
#[must_use]
pub fn resolve_slice(
    ids: &[MessageId],
    reference: Option<MessageId>,
    direction: Direction,
    window_size: usize,
) -> Slice {
    let len = ids.len() as isize;
    let w = window_size.max(1) as isize;
    let index = match reference {
        Some(reference) => find_nearest_index(ids, reference).map_or(-1, |i| i as isize),
        None if direction == Direction::Forwards => -1,
        None => len - 1,
    };

    let (from, to) = match direction {
        Direction::Around => (index - (w - 1), index + (w - 1)),
        Direction::Backwards => (index - w, index + w - 1),
        Direction::Forwards => (index + 1 - w, index + w),
    };

    let start = from.max(0);
    let end = to.min(len - 1);
    let window = if len == 0 || start > end {
        Vec::new()
    } else {
        ids[start as usize..=end as usize].to_vec()
    };

    let (is_partially_local, is_fully_local) = match direction {
        Direction::Around => (!window.is_empty(), from >= 0 && to <= len - 1),
        Direction::Backwards => (index >= 0, index >= 0 && from >= 0),
        Direction::Forwards => (index + 1 < len, to <= len - 1),
    };

    Slice { ids: window, is_partially_local, is_fully_local }
}
