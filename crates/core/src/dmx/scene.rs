use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Static look for one universe, optionally faded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmxScene {
    pub name: String,
    pub universe: u16,
    /// 1-based channel -> value
    pub channel_values: BTreeMap<u16, u8>,
    #[serde(default)]
    pub fade_time: Duration,
}

impl DmxScene {
    pub fn new(name: impl Into<String>, universe: u16) -> Self {
        Self {
            name: name.into(),
            universe,
            channel_values: BTreeMap::new(),
            fade_time: Duration::ZERO,
        }
    }

    pub fn with_value(mut self, channel: u16, value: u8) -> Self {
        self.channel_values.insert(channel, value);
        self
    }

    pub fn with_fade(mut self, fade_time: Duration) -> Self {
        self.fade_time = fade_time;
        self
    }
}

/// Output universe and how the transport reaches it. The connection fields
/// are owned by the transport; the engine only records what it was told.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmxUniverse {
    pub universe_number: u16,
    /// e.g. "ArtNet", "Enttec"
    pub dongle_type: String,
    /// IP address, serial port, ...
    pub connection_string: String,
    #[serde(default)]
    pub is_connected: bool,
}

impl DmxUniverse {
    pub fn new(universe_number: u16) -> Self {
        Self {
            universe_number,
            dongle_type: String::new(),
            connection_string: String::new(),
            is_connected: false,
        }
    }
}
