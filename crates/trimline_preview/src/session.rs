use std::path::Path;
use trimline_core::types::*;
use trimline_core::{EditorSettings, TimelineSelection};

use crate::error::{PreviewError, Result};
use crate::player::PlayerControl;

/// How close to the trim end a reported position counts as having reached it.
const END_TOLERANCE: TimeUs = TimeUs(50_000);

/// Receives every timeline event after the player has been told about it.
pub trait SessionObserver {
    fn on_event(&mut self, event: &TimelineEvent);
}

impl<F: FnMut(&TimelineEvent)> SessionObserver for F {
    fn on_event(&mut self, event: &TimelineEvent) {
        self(event)
    }
}

/// One editing screen: the selection model, the player showing it, and the
/// observers (labels, export button, ...) that follow along.
pub struct EditorSession<P: PlayerControl> {
    selection: TimelineSelection,
    player: P,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl<P: PlayerControl> EditorSession<P> {
    pub fn new(player: P, settings: EditorSettings) -> Self {
        Self {
            selection: TimelineSelection::new(settings),
            player,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn selection(&self) -> &TimelineSelection {
        &self.selection
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Load the media and start playing it once its duration is known.
    pub fn open(&mut self, path: &Path, duration: TimeUs) -> Result<()> {
        self.selection.initialize(duration)?;
        self.player.load(path)?;
        self.selection.toggle_playback()?;
        self.dispatch()
    }

    pub fn toggle_playback(&mut self) -> Result<()> {
        self.selection.toggle_playback()?;
        self.dispatch()
    }

    pub fn scrub_to(&mut self, input: PositionInput) -> Result<TimeUs> {
        let position = self.selection.set_playback_position(input, true)?;
        self.dispatch()?;
        Ok(position)
    }

    pub fn end_scrubbing(&mut self) -> Result<()> {
        self.selection.end_scrubbing()?;
        self.dispatch()
    }

    pub fn begin_trim(&mut self, edge: TrimEdge) -> Result<()> {
        self.selection.begin_trim_drag(edge)?;
        self.dispatch()
    }

    pub fn update_trim(&mut self, input: PositionInput) -> Result<Adjustment> {
        let adjustment = self.selection.update_trim_drag(input)?;
        self.dispatch()?;
        Ok(adjustment)
    }

    pub fn end_trim(&mut self) -> Result<TrimRange> {
        let range = self.selection.end_trim_drag()?;
        self.dispatch()?;
        Ok(range)
    }

    /// Play/pause that happened in the player itself rather than through the session.
    pub fn player_state_changed(&mut self, playing: bool) -> Result<()> {
        if playing {
            self.selection.player_started()?;
        } else {
            self.selection.player_paused()?;
        }
        self.dispatch()
    }

    /// Read the player's position as a periodic update, looping back to the
    /// trim start when playback has run to the end of the range.
    pub fn poll(&mut self) -> Result<Option<TimeUs>> {
        if !self.selection.is_ready() {
            return Err(PreviewError::Core(trimline_core::CoreError::NotReady));
        }
        let Some(position) = self.player.position()? else {
            return Ok(None);
        };

        let range = self.selection.selected_range()?;
        let at_end = TimeUs(position.0.saturating_add(END_TOLERANCE.0)) >= range.end;
        if self.selection.is_playing()
            && !self.selection.is_scrubbing()
            && (at_end || self.player.reached_end()?)
        {
            tracing::debug!("Reached trim end at {}, looping", position);
            self.selection.playback_reached_end()?;
        } else {
            self.selection
                .set_playback_position(PositionInput::Absolute(position), false)?;
        }
        self.dispatch()?;
        Ok(Some(self.selection.current_selection()?.playback_position))
    }

    /// Hand queued events to the player and the observers, oldest first.
    /// A failing player command does not stop later events; the first error is returned.
    fn dispatch(&mut self) -> Result<()> {
        let mut first_err = None;
        for event in self.selection.drain_events() {
            if let TimelineEvent::Player(command) = event {
                if let Err(e) = self.player.apply(command) {
                    tracing::warn!("Player rejected {:?}: {}", command, e);
                    first_err.get_or_insert(e);
                }
            }
            for observer in &mut self.observers {
                observer.on_event(&event);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct FakePlayer {
        loaded: Option<PathBuf>,
        commands: Vec<PlayerCommand>,
        position: Option<TimeUs>,
        at_eof: bool,
        fail_seeks: bool,
    }

    impl PlayerControl for FakePlayer {
        fn load(&mut self, path: &Path) -> Result<()> {
            self.loaded = Some(path.to_path_buf());
            Ok(())
        }
        fn play(&mut self) -> Result<()> {
            self.commands.push(PlayerCommand::Play);
            Ok(())
        }
        fn pause(&mut self) -> Result<()> {
            self.commands.push(PlayerCommand::Pause);
            Ok(())
        }
        fn seek(&mut self, time: TimeUs) -> Result<()> {
            if self.fail_seeks {
                return Err(PreviewError::Rejected("seek failed".into()));
            }
            self.commands.push(PlayerCommand::Seek(time));
            self.position = Some(time);
            Ok(())
        }
        fn set_forward_end(&mut self, time: TimeUs) -> Result<()> {
            self.commands.push(PlayerCommand::SetForwardEnd(time));
            Ok(())
        }
        fn position(&mut self) -> Result<Option<TimeUs>> {
            Ok(self.position)
        }
        fn reached_end(&mut self) -> Result<bool> {
            Ok(self.at_eof)
        }
    }

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn open_session(total: f64) -> EditorSession<FakePlayer> {
        let mut session = EditorSession::new(FakePlayer::default(), EditorSettings::default());
        session.open(Path::new("/tmp/clip.mov"), secs(total)).unwrap();
        session.player_mut().commands.clear();
        session
    }

    #[test]
    fn open_loads_and_starts_playing() {
        let mut session = EditorSession::new(FakePlayer::default(), EditorSettings::default());
        session.open(Path::new("/tmp/clip.mov"), secs(10.0)).unwrap();

        assert_eq!(session.player().loaded, Some(PathBuf::from("/tmp/clip.mov")));
        assert_eq!(session.player().commands, vec![PlayerCommand::Play]);
        assert!(session.selection().is_playing());
    }

    #[test]
    fn open_with_bad_duration_fails() {
        let mut session = EditorSession::new(FakePlayer::default(), EditorSettings::default());
        let err = session.open(Path::new("/tmp/clip.mov"), TimeUs::ZERO).unwrap_err();
        assert!(matches!(
            err,
            PreviewError::Core(trimline_core::CoreError::InvalidDuration(_))
        ));
        assert_eq!(session.player().loaded, None);
        assert!(session.player().commands.is_empty());
    }

    #[test]
    fn trim_drag_drives_player_in_order() {
        let mut session = open_session(100.0);

        session.begin_trim(TrimEdge::Trailing).unwrap();
        session.update_trim(PositionInput::Normalized(0.4)).unwrap();
        let range = session.end_trim().unwrap();

        assert_eq!(range, TrimRange::new(TimeUs::ZERO, secs(40.0)));
        assert_eq!(
            session.player().commands,
            vec![
                PlayerCommand::Pause,
                PlayerCommand::Seek(secs(40.0)),
                PlayerCommand::SetForwardEnd(secs(40.0)),
                PlayerCommand::Seek(TimeUs::ZERO),
                PlayerCommand::Play,
            ]
        );
    }

    #[test]
    fn observers_see_every_event() {
        let mut session = open_session(20.0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.subscribe(move |event: &TimelineEvent| sink.borrow_mut().push(*event));

        session.begin_trim(TrimEdge::Leading).unwrap();
        session.update_trim(PositionInput::Absolute(secs(5.0))).unwrap();
        session.end_trim().unwrap();

        let seen = seen.borrow();
        assert!(seen.contains(&TimelineEvent::SelectionChanged(TrimRange::new(
            secs(5.0),
            secs(20.0)
        ))));
        assert!(seen.contains(&TimelineEvent::TrimCommitted(TrimRange::new(
            secs(5.0),
            secs(20.0)
        ))));
        assert_eq!(seen.first(), Some(&TimelineEvent::Player(PlayerCommand::Pause)));
    }

    #[test]
    fn poll_tracks_player_position() {
        let mut session = open_session(30.0);
        session.player_mut().position = Some(secs(3.0));

        assert_eq!(session.poll().unwrap(), Some(secs(3.0)));
        assert!(session.player().commands.is_empty());
    }

    #[test]
    fn poll_without_position_is_none() {
        let mut session = open_session(30.0);
        assert_eq!(session.poll().unwrap(), None);
    }

    #[test]
    fn poll_is_ignored_while_scrubbing() {
        let mut session = open_session(30.0);
        session.scrub_to(PositionInput::Absolute(secs(12.0))).unwrap();
        session.player_mut().position = Some(secs(13.0));

        assert_eq!(session.poll().unwrap(), Some(secs(12.0)));

        session.end_scrubbing().unwrap();
        assert_eq!(session.player().commands.last(), Some(&PlayerCommand::Play));
    }

    #[test]
    fn poll_at_trim_end_loops() {
        let mut session = open_session(30.0);
        session.begin_trim(TrimEdge::Leading).unwrap();
        session.update_trim(PositionInput::Absolute(secs(4.0))).unwrap();
        session.begin_trim(TrimEdge::Trailing).unwrap();
        session.update_trim(PositionInput::Absolute(secs(10.0))).unwrap();
        session.end_trim().unwrap();
        session.player_mut().commands.clear();

        session.player_mut().position = Some(secs(9.98));
        assert_eq!(session.poll().unwrap(), Some(secs(4.0)));
        assert_eq!(
            session.player().commands,
            vec![PlayerCommand::Seek(secs(4.0)), PlayerCommand::Play]
        );
    }

    #[test]
    fn poll_loops_on_player_eof() {
        let mut session = open_session(30.0);
        session.player_mut().position = Some(secs(20.0));
        session.player_mut().at_eof = true;

        assert_eq!(session.poll().unwrap(), Some(TimeUs::ZERO));
    }

    #[test]
    fn poll_while_paused_does_not_loop() {
        let mut session = open_session(30.0);
        session.toggle_playback().unwrap();
        session.player_mut().commands.clear();
        session.player_mut().position = Some(secs(30.0));

        assert_eq!(session.poll().unwrap(), Some(secs(30.0)));
        assert!(session.player().commands.is_empty());
    }

    #[test]
    fn player_failure_is_reported_after_all_events() {
        let mut session = open_session(30.0);
        session.player_mut().fail_seeks = true;
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        session.subscribe(move |_: &TimelineEvent| *sink.borrow_mut() += 1);

        session.begin_trim(TrimEdge::Trailing).unwrap();
        let err = session.update_trim(PositionInput::Normalized(0.5)).unwrap_err();
        assert!(matches!(err, PreviewError::Rejected(_)));
        // Pause from begin_trim, then Seek and SelectionChanged from the update.
        assert_eq!(*count.borrow(), 3);
        assert_eq!(
            session.selection().selected_range().unwrap().end,
            secs(15.0)
        );
    }

    #[test]
    fn external_pause_is_tracked_without_commands() {
        let mut session = open_session(30.0);
        session.player_state_changed(false).unwrap();
        assert!(!session.selection().is_playing());
        assert!(session.player().commands.is_empty());

        session.toggle_playback().unwrap();
        assert_eq!(session.player().commands, vec![PlayerCommand::Play]);
    }

    #[test]
    fn poll_before_open_is_not_ready() {
        let mut session = EditorSession::new(FakePlayer::default(), EditorSettings::default());
        assert!(matches!(
            session.poll().unwrap_err(),
            PreviewError::Core(trimline_core::CoreError::NotReady)
        ));
    }
}
