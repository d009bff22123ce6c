//! Engine-time state machine driven by transport commands.

use super::command::TransportCommand;

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// Time advances with real time.
    #[default]
    Playing,
    /// Time is frozen.
    Stopped,
    /// Time runs backwards until it reaches zero.
    Rewinding,
}

/// Virtual engine time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineTime {
    state: PlaybackState,
    vtime: f32,
    dtime: f32,
    loop_point_end: f32,
}

impl EngineTime {
    /// Playing from zero, no loop point.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stopped at zero, no loop point.
    #[must_use]
    pub fn stopped() -> Self {
        Self {
            state: PlaybackState::Stopped,
            ..Self::default()
        }
    }

    /// Current playback state.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Engine time in seconds.
    #[must_use]
    pub fn vtime(&self) -> f32 {
        self.vtime
    }

    /// Pending jump applied on the next [`Self::advance`].
    #[must_use]
    pub fn pending_delta(&self) -> f32 {
        self.dtime
    }

    /// Loop end, `0.0` when not looping.
    #[must_use]
    pub fn loop_point(&self) -> f32 {
        self.loop_point_end
    }

    /// Apply `command`. `fps` is the measured frame rate reported by
    /// [`TransportCommand::Fps`]. Returns the reply line, if the command
    /// has one.
    pub fn execute(&mut self, command: TransportCommand, fps: f32) -> Option<String> {
        match command {
            TransportCommand::Play => self.state = PlaybackState::Playing,
            TransportCommand::Stop => self.state = PlaybackState::Stopped,
            TransportCommand::Rewind => self.state = PlaybackState::Rewinding,
            TransportCommand::SetLoopPoint { seconds } => {
                self.loop_point_end = seconds;
            }
            TransportCommand::SetTime { seconds } => {
                self.dtime = seconds - self.vtime;
            }
            TransportCommand::Fps => return Some(format!("fps_d {fps}")),
        }
        log::debug!("transport {command:?} -> {:?}", self.state);
        None
    }

    /// Advance by `real_dt` seconds of wall time. Returns the change in
    /// engine time.
    pub fn advance(&mut self, real_dt: f32) -> f32 {
        let before = self.vtime;
        let step = match self.state {
            PlaybackState::Playing => real_dt,
            PlaybackState::Stopped => 0.0,
            PlaybackState::Rewinding => -real_dt,
        };
        self.vtime += step + self.dtime;
        self.dtime = 0.0;

        if self.vtime < 0.0 {
            self.vtime = 0.0;
            if self.state == PlaybackState::Rewinding {
                self.state = PlaybackState::Stopped;
            }
        }
        if self.loop_point_end > 0.0 && self.vtime > self.loop_point_end {
            self.vtime = 0.0;
        }
        self.vtime - before
    }
}
