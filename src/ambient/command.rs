//! Ambient light commands and their wire format.
//!
//! Commands are published as `"<mode>:<R>:<G>:<B>:"`, e.g. `throb:255:0:0:`.

use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// An RGB color understood by the light controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color::new(255, 0, 0);
    pub const YELLOW: Color = Color::new(255, 255, 0);
    /// Resting "all clear" color.
    pub const TEAL: Color = Color::new(0, 128, 128);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Animation mode on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AmbientMode {
    Throb,
    Glow,
}

/// Command for the downstream light controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientCommand {
    /// Pulse; a sensor is open right now.
    Throb(Color),
    /// Steady light; a sensor closed recently.
    Glow(Color),
    /// Steady resting light; nothing happened recently.
    Idle(Color),
}

impl AmbientCommand {
    pub fn mode(&self) -> AmbientMode {
        match self {
            AmbientCommand::Throb(_) => AmbientMode::Throb,
            AmbientCommand::Glow(_) | AmbientCommand::Idle(_) => AmbientMode::Glow,
        }
    }

    pub fn color(&self) -> Color {
        match *self {
            AmbientCommand::Throb(color)
            | AmbientCommand::Glow(color)
            | AmbientCommand::Idle(color) => color,
        }
    }

    pub fn payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AmbientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Color { r, g, b } = self.color();
        write!(f, "{}:{}:{}:{}:", self.mode(), r, g, b)
    }
}

/// Error returned when a payload is not a valid ambient command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ambient command payload: {0:?}")]
pub struct ParseCommandError(String);

impl FromStr for AmbientCommand {
    type Err = ParseCommandError;

    /// Parses a published payload. A teal glow reads back as [`AmbientCommand::Idle`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseCommandError(s.to_string());

        let body = s.trim().strip_suffix(':').ok_or_else(invalid)?;
        let mut parts = body.split(':');
        let mode = parts
            .next()
            .and_then(|m| m.parse::<AmbientMode>().ok())
            .ok_or_else(invalid)?;
        let mut channel = || {
            parts
                .next()
                .and_then(|c| c.parse::<u8>().ok())
                .ok_or_else(invalid)
        };
        let color = Color::new(channel()?, channel()?, channel()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(match mode {
            AmbientMode::Throb => AmbientCommand::Throb(color),
            AmbientMode::Glow if color == Color::TEAL => AmbientCommand::Idle(color),
            AmbientMode::Glow => AmbientCommand::Glow(color),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format() {
        assert_eq!(AmbientCommand::Throb(Color::RED).payload(), "throb:255:0:0:");
        assert_eq!(
            AmbientCommand::Glow(Color::YELLOW).payload(),
            "glow:255:255:0:"
        );
    }

    #[test]
    fn test_idle_is_a_teal_glow_on_the_wire() {
        let idle = AmbientCommand::Idle(Color::TEAL);
        assert_eq!(idle.mode(), AmbientMode::Glow);
        assert_eq!(idle.payload(), "glow:0:128:128:");
    }

    #[test]
    fn test_parse_published_payloads() {
        assert_eq!(
            "throb:255:255:0:".parse::<AmbientCommand>().unwrap(),
            AmbientCommand::Throb(Color::YELLOW)
        );
        assert_eq!(
            "glow:0:128:128:".parse::<AmbientCommand>().unwrap(),
            AmbientCommand::Idle(Color::TEAL)
        );
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        for payload in [
            "",
            "throb:255:0:0",
            "blink:255:0:0:",
            "glow:256:0:0:",
            "glow:1:2:",
            "glow:1:2:3:4:",
        ] {
            assert!(
                payload.parse::<AmbientCommand>().is_err(),
                "{payload:?} should not parse"
            );
        }
    }
}
