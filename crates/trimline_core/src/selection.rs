use crate::config::EditorSettings;
use crate::error::{CoreError, Result};
use crate::snapping::{edge_snap_points, find_snap_point};
use crate::types::*;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Trim range, playhead and drag state for one editing session.
///
/// Every mutation happens through the methods below. Side effects meant for the
/// player or the export step are queued as [`TimelineEvent`]s and handed out, in
/// order, by [`TimelineSelection::drain_events`].
#[derive(Debug)]
pub struct TimelineSelection {
    settings: EditorSettings,
    state: Option<SelectionState>,
    events: VecDeque<TimelineEvent>,
}

#[derive(Debug, Clone)]
struct SelectionState {
    total: TimeUs,
    trim_start: TimeUs,
    trim_end: TimeUs,
    position: TimeUs,
    active_edge: Option<TrimEdge>,
    is_scrubbing: bool,
    is_playing: bool,
    resume_after_drag: bool,
    resume_after_scrub: bool,
}

impl SelectionState {
    fn range(&self) -> TrimRange {
        TrimRange::new(self.trim_start, self.trim_end)
    }
}

impl TimelineSelection {
    /// Negative durations in `settings` are clamped to zero.
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            settings: settings.sanitized(),
            state: None,
            events: VecDeque::new(),
        }
    }

    /// Set the media duration once it is known. The range starts as the whole media.
    pub fn initialize(&mut self, total: TimeUs) -> Result<()> {
        if self.state.is_some() {
            return Err(CoreError::AlreadyInitialized);
        }
        if total <= TimeUs::ZERO {
            return Err(CoreError::InvalidDuration(total));
        }

        self.state = Some(SelectionState {
            total,
            trim_start: TimeUs::ZERO,
            trim_end: total,
            position: TimeUs::ZERO,
            active_edge: None,
            is_scrubbing: false,
            is_playing: false,
            resume_after_drag: false,
            resume_after_scrub: false,
        });
        self.events.push_back(TimelineEvent::Ready { total });
        info!("Timeline ready, duration {}", total);
        Ok(())
    }

    /// Move the playhead. The result is always kept inside the trim range.
    ///
    /// User-driven input starts (or continues) a scrub. While a scrub is in
    /// progress, updates reported by the player are dropped so they cannot pull
    /// the playhead away from the user's finger.
    pub fn set_playback_position(
        &mut self,
        input: PositionInput,
        user_driven: bool,
    ) -> Result<TimeUs> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;

        if !user_driven && st.is_scrubbing {
            debug!("Ignoring player position update during scrub");
            return Ok(st.position);
        }

        let mut target = input.resolve(st.total);

        if user_driven {
            if !st.is_scrubbing {
                st.is_scrubbing = true;
                st.resume_after_scrub = st.is_playing;
                if st.is_playing {
                    st.is_playing = false;
                    self.events.push_back(TimelineEvent::Player(PlayerCommand::Pause));
                }
            }
            if self.settings.snap_threshold_us > TimeUs::ZERO {
                let points = edge_snap_points(st.range(), st.active_edge);
                target = find_snap_point(target, &points, self.settings.snap_threshold_us);
            }
        }

        st.position = target.clamp(st.trim_start, st.trim_end);
        if user_driven {
            self.events
                .push_back(TimelineEvent::Player(PlayerCommand::Seek(st.position)));
        }
        Ok(st.position)
    }

    /// Finish a scrub started by a user-driven [`set_playback_position`](Self::set_playback_position).
    pub fn end_scrubbing(&mut self) -> Result<()> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;
        if !st.is_scrubbing {
            return Ok(());
        }
        st.is_scrubbing = false;
        if st.resume_after_scrub && self.settings.resume_after_scrub {
            st.is_playing = true;
            self.events.push_back(TimelineEvent::Player(PlayerCommand::Play));
        }
        st.resume_after_scrub = false;
        Ok(())
    }

    /// Grab a trim handle. Playback pauses for the duration of the drag.
    pub fn begin_trim_drag(&mut self, edge: TrimEdge) -> Result<()> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;

        // Switching handles mid-drag keeps the transport state captured at the first grab.
        if st.active_edge.is_none() {
            st.resume_after_drag = st.is_playing;
            if st.is_playing {
                st.is_playing = false;
                self.events.push_back(TimelineEvent::Player(PlayerCommand::Pause));
            }
        }
        st.active_edge = Some(edge);
        debug!("Trim drag started on {:?} edge", edge);
        Ok(())
    }

    /// Move the held handle and seek the playhead to it.
    ///
    /// Only the dragged edge yields: it stops `minimum_selection_us` short of
    /// the opposite edge, which never moves.
    pub fn update_trim_drag(&mut self, input: PositionInput) -> Result<Adjustment> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;
        let edge = st.active_edge.ok_or(CoreError::NoActiveDrag)?;
        let floor = self.settings.minimum_selection_us.min(st.total);
        let requested = input.resolve(st.total);

        let (applied, adjustment) = match edge {
            TrimEdge::Leading => {
                let upper = st.trim_end - floor;
                let applied = requested.clamp(TimeUs::ZERO, upper);
                let adjustment = if requested > upper {
                    Adjustment::RangeTooNarrow
                } else if requested < TimeUs::ZERO {
                    Adjustment::OutOfBounds
                } else {
                    Adjustment::Exact
                };
                st.trim_start = applied;
                (applied, adjustment)
            }
            TrimEdge::Trailing => {
                let lower = st.trim_start + floor;
                let applied = requested.clamp(lower, st.total);
                let adjustment = if requested < lower {
                    Adjustment::RangeTooNarrow
                } else if requested > st.total {
                    Adjustment::OutOfBounds
                } else {
                    Adjustment::Exact
                };
                st.trim_end = applied;
                (applied, adjustment)
            }
        };

        if adjustment == Adjustment::RangeTooNarrow {
            debug!(
                "Trim {:?} edge held at {} to keep a {} selection",
                edge, applied, floor
            );
        }

        st.position = applied;
        self.events
            .push_back(TimelineEvent::Player(PlayerCommand::Seek(applied)));
        self.events
            .push_back(TimelineEvent::SelectionChanged(st.range()));
        Ok(adjustment)
    }

    /// Release the handle and commit the range. Returns the committed range.
    pub fn end_trim_drag(&mut self) -> Result<TrimRange> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;
        st.active_edge.take().ok_or(CoreError::NoActiveDrag)?;

        let range = st.range();
        st.position = range.start;
        self.events.push_back(TimelineEvent::TrimCommitted(range));
        self.events
            .push_back(TimelineEvent::Player(PlayerCommand::SetForwardEnd(range.end)));
        self.events
            .push_back(TimelineEvent::Player(PlayerCommand::Seek(range.start)));
        if st.resume_after_drag {
            st.is_playing = true;
            self.events.push_back(TimelineEvent::Player(PlayerCommand::Play));
        }
        st.resume_after_drag = false;

        info!("Trim committed: {} ~ {}", range.start, range.end);
        Ok(range)
    }

    /// The player started playing on its own (or confirmed a play command).
    pub fn player_started(&mut self) -> Result<()> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;
        st.is_playing = true;
        Ok(())
    }

    /// The player paused on its own (or confirmed a pause command).
    pub fn player_paused(&mut self) -> Result<()> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;
        st.is_playing = false;
        Ok(())
    }

    pub fn toggle_playback(&mut self) -> Result<()> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;
        let command = if st.is_playing {
            PlayerCommand::Pause
        } else {
            PlayerCommand::Play
        };
        st.is_playing = !st.is_playing;
        self.events.push_back(TimelineEvent::Player(command));
        Ok(())
    }

    /// Playback hit the end of the range: go back to the start and keep playing.
    pub fn playback_reached_end(&mut self) -> Result<()> {
        let st = self.state.as_mut().ok_or(CoreError::NotReady)?;
        st.position = st.trim_start;
        st.is_playing = true;
        self.events
            .push_back(TimelineEvent::Player(PlayerCommand::Seek(st.trim_start)));
        self.events.push_back(TimelineEvent::Player(PlayerCommand::Play));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn current_selection(&self) -> Result<SelectionSnapshot> {
        let st = self.ready()?;
        Ok(SelectionSnapshot {
            trim_start: st.trim_start,
            trim_end: st.trim_end,
            playback_position: st.position,
        })
    }

    pub fn selected_range(&self) -> Result<TrimRange> {
        Ok(self.ready()?.range())
    }

    pub fn selection_duration(&self) -> Result<TimeUs> {
        Ok(self.ready()?.range().duration())
    }

    /// True when the selection still covers the whole media.
    pub fn is_full_range(&self) -> Result<bool> {
        let st = self.ready()?;
        Ok(st.trim_start == TimeUs::ZERO && st.trim_end == st.total)
    }

    pub fn display_strings(&self) -> Result<DisplayLabels> {
        let range = self.ready()?.range();
        Ok(DisplayLabels {
            trim_start: range.start.display_label(),
            trim_end: range.end.display_label(),
            duration: range.duration().display_label(),
        })
    }

    /// `"MM:SS.cc ~ MM:SS.cc"` for the trim label.
    pub fn range_label(&self) -> Result<String> {
        let range = self.ready()?.range();
        Ok(format!(
            "{} ~ {}",
            range.start.display_label(),
            range.end.display_label()
        ))
    }

    /// `"Maximum N sec"` with the total duration rounded to two decimals.
    pub fn maximum_duration_label(&self) -> Result<String> {
        let total = self.ready()?.total;
        let rounded = (total.as_seconds() * 100.0).round() / 100.0;
        Ok(format!("Maximum {rounded:?} sec"))
    }

    pub fn total_duration(&self) -> Option<TimeUs> {
        self.state.as_ref().map(|st| st.total)
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    pub fn active_edge(&self) -> Option<TrimEdge> {
        self.state.as_ref().and_then(|st| st.active_edge)
    }

    pub fn is_scrubbing(&self) -> bool {
        self.state.as_ref().is_some_and(|st| st.is_scrubbing)
    }

    pub fn is_playing(&self) -> bool {
        self.state.as_ref().is_some_and(|st| st.is_playing)
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<TimelineEvent> {
        self.events.drain(..).collect()
    }

    fn ready(&self) -> Result<&SelectionState> {
        self.state.as_ref().ok_or(CoreError::NotReady)
    }
}

impl Default for TimelineSelection {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
