//! Segment stitching: move per-window output onto the buffer's timeline.
//!
//! Adjacent windows share `stride` seconds of audio, so the overlap may be
//! transcribed twice. `OverlapPolicy::Keep` leaves that as is;
//! `OverlapPolicy::DropOverlapping` discards segments starting inside audio
//! already covered by an emitted segment.

use serde::{Deserialize, Serialize};

use crate::inference::RawSegment;
use crate::ipc::events::Segment;

/// How segments from the shared region of adjacent windows are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Emit every segment the engine reports; overlap text may repeat.
    #[default]
    Keep,
    /// Drop segments that start before the end of the last emitted segment.
    DropOverlapping,
}

/// Shift `raw` segments by `offset_seconds`. Text passes through verbatim.
pub fn stitch(raw: Vec<RawSegment>, offset_seconds: f64) -> Vec<Segment> {
    raw.into_iter()
        .map(|seg| Segment {
            text: seg.text,
            timestamp: [
                seg.timestamp[0] + offset_seconds,
                seg.timestamp[1] + offset_seconds,
            ],
        })
        .collect()
}

/// Keep only segments starting at or after `covered_until` (seconds).
///
/// `covered_until` is advanced past every kept segment, so the caller threads
/// it through consecutive windows.
pub fn dedupe_overlap(segments: Vec<Segment>, covered_until: &mut f64) -> Vec<Segment> {
    let mut kept = Vec::with_capacity(segments.len());
    for seg in segments {
        if seg.start() < *covered_until {
            continue;
        }
        *covered_until = covered_until.max(seg.end());
        kept.push(seg);
    }
    kept
}
