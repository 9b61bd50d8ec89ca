// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Process-wide configuration consumed read-only by the server core.
//!
//! The core never reads the environment itself; [`Config::from_env`] is a
//! convenience an embedding binary can call before constructing a
//! [`crate::server::VncServer`].

use std::env;

const DEFAULT_PORT: u16 = 5900;
const DEFAULT_TIMER_INTERVAL_MS: u64 = 30;
const MIN_TIMER_INTERVAL_MS: u64 = 10;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to bind. The dispatcher increments past this on `AddrInUse`.
    pub initial_port: u16,
    /// Interval, in milliseconds, between update-tick evaluations.
    pub timer_interval_ms: u64,
    /// Whether the embedding application should auto-start the server.
    /// The core reads this field but does not act on it.
    pub auto_start: bool,
    /// VNC authentication password. Empty means no authentication.
    pub password: Vec<u8>,
    /// Desktop name advertised in `ServerInit`.
    pub server_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_port: DEFAULT_PORT,
            timer_interval_ms: DEFAULT_TIMER_INTERVAL_MS,
            auto_start: false,
            password: Vec::new(),
            server_name: "VNC Server".to_string(),
        }
    }
}

impl Config {
    /// Returns `timer_interval_ms`, clamped to the enforced floor.
    #[must_use]
    pub fn timer_interval_ms(&self) -> u64 {
        self.timer_interval_ms.max(MIN_TIMER_INTERVAL_MS)
    }

    /// Builds a `Config` from defaults, overlaying `QVNC_GL_PORT` and
    /// `QVNC_GL_TIMER_INTERVAL` when present and parseable. Malformed values
    /// are logged and ignored; the default stands.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = env::var("QVNC_GL_PORT") {
            match value.parse::<u16>() {
                Ok(port) => config.initial_port = port,
                Err(_) => log::warn!("ignoring malformed QVNC_GL_PORT={value:?}"),
            }
        }

        if let Ok(value) = env::var("QVNC_GL_TIMER_INTERVAL") {
            match value.parse::<u64>() {
                Ok(ms) => config.timer_interval_ms = ms,
                Err(_) => log::warn!("ignoring malformed QVNC_GL_TIMER_INTERVAL={value:?}"),
            }
        }

        config
    }
}
