//! Textual transport commands.
//!
//! One command per line, whitespace separated:
//!
//! ```text
//! play
//! stop
//! rewind
//! time_set_loop_point 12.5
//! time_set 3
//! fps
//! ```

use std::fmt;
use std::str::FromStr;

/// A playback command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    /// Start or resume playback.
    Play,
    /// Freeze engine time.
    Stop,
    /// Run engine time backwards.
    Rewind,
    /// Wrap back to zero after `seconds`; zero or negative disables
    /// looping.
    SetLoopPoint {
        /// Loop end, in seconds of engine time.
        seconds: f32,
    },
    /// Jump to `seconds` on the next frame.
    SetTime {
        /// Target engine time.
        seconds: f32,
    },
    /// Report the measured frame rate.
    Fps,
}

/// Why a command line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line.
    Empty,
    /// First word is not a known command.
    Unknown(String),
    /// Command needs an argument that was not given.
    MissingArgument(&'static str),
    /// Argument is not a number.
    InvalidNumber(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::Unknown(cmd) => write!(f, "unknown command: {cmd}"),
            Self::MissingArgument(cmd) => {
                write!(f, "{cmd} needs a time in seconds")
            }
            Self::InvalidNumber(arg) => write!(f, "not a number: {arg}"),
        }
    }
}

impl std::error::Error for CommandError {}

fn seconds(
    cmd: &'static str,
    arg: Option<&str>,
) -> Result<f32, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(cmd))?;
    arg.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(arg.to_owned()))
}

impl FromStr for TransportCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = words.next().ok_or(CommandError::Empty)?;
        match cmd {
            "play" => Ok(Self::Play),
            "stop" => Ok(Self::Stop),
            "rewind" => Ok(Self::Rewind),
            "fps" | "fps_d" => Ok(Self::Fps),
            "time_set_loop_point" => Ok(Self::SetLoopPoint {
                seconds: seconds("time_set_loop_point", words.next())?,
            }),
            "time_set" => Ok(Self::SetTime {
                seconds: seconds("time_set", words.next())?,
            }),
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        assert_eq!("play".parse(), Ok(TransportCommand::Play));
        assert_eq!(" stop ".parse(), Ok(TransportCommand::Stop));
        assert_eq!("rewind".parse(), Ok(TransportCommand::Rewind));
        assert_eq!("fps".parse(), Ok(TransportCommand::Fps));
        assert_eq!("fps_d".parse(), Ok(TransportCommand::Fps));
        assert_eq!(
            "time_set_loop_point 12.5".parse(),
            Ok(TransportCommand::SetLoopPoint { seconds: 12.5 })
        );
        assert_eq!(
            "time_set 3".parse(),
            Ok(TransportCommand::SetTime { seconds: 3.0 })
        );
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!("".parse::<TransportCommand>(), Err(CommandError::Empty));
        assert_eq!(
            "jump".parse::<TransportCommand>(),
            Err(CommandError::Unknown("jump".into()))
        );
        assert_eq!(
            "time_set".parse::<TransportCommand>(),
            Err(CommandError::MissingArgument("time_set"))
        );
        assert_eq!(
            "time_set soon".parse::<TransportCommand>(),
            Err(CommandError::InvalidNumber("soon".into()))
        );
        assert!("time_set NaN".parse::<TransportCommand>().is_err());
    }
}
