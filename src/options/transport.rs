use serde::{Deserialize, Serialize};

/// Initial playback settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportOptions {
    /// Start playing instead of stopped.
    pub autoplay: bool,
    /// Loop end in seconds; `0.0` disables looping.
    pub loop_point: f32,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            loop_point: 0.0,
        }
    }
}
