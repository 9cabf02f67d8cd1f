//! Configuration system.
//!
//! Loads game configuration from JSON strings (file IO left to app).

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Frames per second for the client loop and server spawn ticks.
    pub tick_hz: u32,
    /// Room to join. `None` asks the server for a new room (client only).
    #[serde(default)]
    pub room: Option<String>,
    /// Seed for enemy placement; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Play without a server.
    #[serde(default)]
    pub local: bool,
    /// Local mode: spawn a companion cube next to the player.
    #[serde(default)]
    pub local_companion: bool,
    /// Stop after this many frames (0 = run until crash or disconnect).
    #[serde(default)]
    pub max_frames: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: 60,
            room: None,
            seed: None,
            local: false,
            local_companion: false,
            max_frames: 0,
        }
    }
}

impl GameConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default() {
        let cfg =
            GameConfig::from_json_str(r#"{"server_addr":"10.0.0.1:5000","tick_hz":30}"#).unwrap();
        assert_eq!(cfg.server_addr, "10.0.0.1:5000");
        assert_eq!(cfg.tick_hz, 30);
        assert!(cfg.room.is_none());
        assert!(!cfg.local);
        assert_eq!(cfg.max_frames, 0);
    }

    #[test]
    fn room_and_seed() {
        let cfg = GameConfig::from_json_str(
            r#"{"server_addr":"127.0.0.1:1","tick_hz":60,"room":"Ab12cd","seed":9}"#,
        )
        .unwrap();
        assert_eq!(cfg.room.as_deref(), Some("Ab12cd"));
        assert_eq!(cfg.seed, Some(9));
    }
}
