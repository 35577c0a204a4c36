//! Pointer input socket events.
//!
//! The pointer socket does not speak JSON: each event is a block of
//! `key:value` lines terminated by an empty line.
//!
//! # Example
//!
//! ```
//! use webos_remote::protocol::{Button, InputEvent};
//!
//! assert_eq!(
//!     InputEvent::Button(Button::Home).to_frame(),
//!     "type:button\nname:HOME\n\n"
//! );
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;

use crate::error::{Error, Result};

// ============================================================================
// Button
// ============================================================================

/// Remote control buttons accepted by the pointer socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    // ========================================================================
    // Navigation
    // ========================================================================
    /// Arrow left
    Left,
    /// Arrow right
    Right,
    /// Arrow up
    Up,
    /// Arrow down
    Down,
    /// OK / Enter
    Enter,
    /// Home
    Home,
    /// Back
    Back,
    /// Exit
    Exit,

    // ========================================================================
    // Colour Keys
    // ========================================================================
    /// Red
    Red,
    /// Green
    Green,
    /// Blue
    Blue,

    // ========================================================================
    // Audio, Channels, Playback
    // ========================================================================
    /// Mute toggle
    Mute,
    /// Volume up
    VolumeUp,
    /// Volume down
    VolumeDown,
    /// Channel up
    ChannelUp,
    /// Channel down
    ChannelDown,
    /// Play
    Play,
    /// Pause
    Pause,

    // ========================================================================
    // Misc
    // ========================================================================
    /// Dash
    Dash,
    /// Info
    Info,
    /// Asterisk
    Asterisk,
    /// Closed captions
    Cc,
    /// Digit key (0-9)
    Number(u8),
}

impl Button {
    /// Creates a digit button.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `digit` is greater than 9.
    pub fn number(digit: u8) -> Result<Self> {
        if digit > 9 {
            return Err(Error::invalid_argument(format!(
                "number button must be 0-9, got {digit}"
            )));
        }
        Ok(Self::Number(digit))
    }

    /// Returns the name sent on the wire.
    #[must_use]
    pub fn name(self) -> String {
        let name = match self {
            Button::Left => "LEFT",
            Button::Right => "RIGHT",
            Button::Up => "UP",
            Button::Down => "DOWN",
            Button::Enter => "ENTER",
            Button::Home => "HOME",
            Button::Back => "BACK",
            Button::Exit => "EXIT",
            Button::Red => "RED",
            Button::Green => "GREEN",
            Button::Blue => "BLUE",
            Button::Mute => "MUTE",
            Button::VolumeUp => "VOLUMEUP",
            Button::VolumeDown => "VOLUMEDOWN",
            Button::ChannelUp => "CHANNELUP",
            Button::ChannelDown => "CHANNELDOWN",
            Button::Play => "PLAY",
            Button::Pause => "PAUSE",
            Button::Dash => "DASH",
            Button::Info => "INFO",
            Button::Asterisk => "ASTERISK",
            Button::Cc => "CC",
            Button::Number(digit) => return digit.to_string(),
        };
        name.to_string()
    }
}

// ============================================================================
// InputEvent
// ============================================================================

/// One event on the pointer input socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Button press.
    Button(Button),
    /// Relative cursor move, optionally with the button held down.
    Move {
        /// Horizontal delta.
        dx: i32,
        /// Vertical delta.
        dy: i32,
        /// Whether the pointer button is held.
        down: bool,
    },
    /// Pointer click.
    Click,
    /// Scroll.
    Scroll {
        /// Horizontal delta.
        dx: i32,
        /// Vertical delta.
        dy: i32,
    },
}

impl InputEvent {
    /// Encodes the event as a pointer socket frame.
    #[must_use]
    pub fn to_frame(&self) -> String {
        let mut frame = String::with_capacity(48);

        // Writing into a String cannot fail.
        let _ = match self {
            Self::Button(button) => write!(frame, "type:button\nname:{}\n", button.name()),
            Self::Move { dx, dy, down } => write!(
                frame,
                "type:move\ndx:{dx}\ndy:{dy}\ndown:{}\n",
                u8::from(*down)
            ),
            Self::Click => write!(frame, "type:click\n"),
            Self::Scroll { dx, dy } => write!(frame, "type:scroll\ndx:{dx}\ndy:{dy}\n"),
        };

        frame.push('\n');
        frame
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_frame() {
        assert_eq!(
            InputEvent::Button(Button::VolumeUp).to_frame(),
            "type:button\nname:VOLUMEUP\n\n"
        );
    }

    #[test]
    fn test_number_button() {
        let button = Button::number(7).expect("digit");
        assert_eq!(button.name(), "7");
        assert!(Button::number(10).is_err());
    }

    #[test]
    fn test_move_frame() {
        let frame = InputEvent::Move {
            dx: 10,
            dy: -4,
            down: false,
        }
        .to_frame();
        assert_eq!(frame, "type:move\ndx:10\ndy:-4\ndown:0\n\n");
    }

    #[test]
    fn test_click_and_scroll_frames() {
        assert_eq!(InputEvent::Click.to_frame(), "type:click\n\n");
        assert_eq!(
            InputEvent::Scroll { dx: 0, dy: 3 }.to_frame(),
            "type:scroll\ndx:0\ndy:3\n\n"
        );
    }
}
