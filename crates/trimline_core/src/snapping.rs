use crate::types::*;

/// Find the nearest snap point within the threshold.
/// Returns the snapped position if within threshold, otherwise the original position.
/// A negative threshold never snaps.
pub fn find_snap_point(position: TimeUs, snap_points: &[TimeUs], threshold: TimeUs) -> TimeUs {
    let Ok(limit) = u64::try_from(threshold.0) else {
        return position;
    };

    snap_points
        .iter()
        .map(|&point| (point, position.0.abs_diff(point.0)))
        .filter(|&(_, dist)| dist <= limit)
        .min_by_key(|&(_, dist)| dist)
        .map_or(position, |(point, _)| point)
}

/// Trim edges a scrub may snap onto. While a handle is held only that edge counts.
pub fn edge_snap_points(range: TrimRange, active_edge: Option<TrimEdge>) -> Vec<TimeUs> {
    match active_edge {
        Some(TrimEdge::Leading) => vec![range.start],
        Some(TrimEdge::Trailing) => vec![range.end],
        None => vec![range.start, range.end],
    }
}
