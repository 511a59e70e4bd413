//! Input actions in absolute display coordinates.

use appshare_common::DisplayError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// X11 button number.
    pub fn code(&self) -> u8 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    Move,
    Down,
    Up,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    #[default]
    Press,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// X11 wheel button number.
    pub fn button(&self) -> u8 {
        match self {
            ScrollDirection::Up => 4,
            ScrollDirection::Down => 5,
            ScrollDirection::Left => 6,
            ScrollDirection::Right => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Super,
}

impl Modifier {
    pub fn keysym(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Alt => "alt",
            Modifier::Super => "super",
        }
    }
}

/// A single input action ready for injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputAction {
    Pointer {
        x: i32,
        y: i32,
        action: PointerAction,
        #[serde(default)]
        button: MouseButton,
    },
    Key {
        key: String,
        #[serde(default)]
        modifiers: Vec<Modifier>,
        #[serde(default)]
        action: KeyAction,
    },
    Scroll {
        x: i32,
        y: i32,
        direction: ScrollDirection,
        amount: u32,
    },
}

/// Longest key name accepted; keysym names are far shorter.
const MAX_KEY_LEN: usize = 32;

/// Upper bound on wheel clicks per scroll action.
pub const MAX_SCROLL_AMOUNT: u32 = 50;

impl InputAction {
    /// Reject actions that no backend should ever receive.
    pub fn validate(&self) -> Result<(), DisplayError> {
        match self {
            InputAction::Key { key, .. } => {
                let ok = !key.is_empty()
                    && key.len() <= MAX_KEY_LEN
                    && !key.starts_with('-')
                    && key
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_');
                if ok {
                    Ok(())
                } else {
                    Err(DisplayError::InjectFailed(format!("invalid key name: {key:?}")))
                }
            }
            InputAction::Scroll { amount, .. } if *amount == 0 || *amount > MAX_SCROLL_AMOUNT => {
                Err(DisplayError::InjectFailed(format!(
                    "scroll amount {amount} outside 1..={MAX_SCROLL_AMOUNT}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Key chord in xdotool syntax, e.g. `ctrl+shift+t`.
    pub fn key_chord(key: &str, modifiers: &[Modifier]) -> String {
        let mut parts: Vec<&str> = modifiers.iter().map(Modifier::keysym).collect();
        parts.push(key);
        parts.join("+")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_restricted() {
        let key = |k: &str| InputAction::Key {
            key: k.into(),
            modifiers: vec![],
            action: KeyAction::Press,
        };
        assert!(key("Return").validate().is_ok());
        assert!(key("a").validate().is_ok());
        assert!(key("F12").validate().is_ok());
        assert!(key("").validate().is_err());
        assert!(key("--help").validate().is_err());
        assert!(key("a b").validate().is_err());
        assert!(key("a;rm").validate().is_err());
    }

    #[test]
    fn scroll_amount_bounds() {
        let scroll = |amount| InputAction::Scroll {
            x: 0,
            y: 0,
            direction: ScrollDirection::Down,
            amount,
        };
        assert!(scroll(0).validate().is_err());
        assert!(scroll(3).validate().is_ok());
        assert!(scroll(MAX_SCROLL_AMOUNT + 1).validate().is_err());
    }

    #[test]
    fn chord_puts_modifiers_first() {
        let chord = InputAction::key_chord("t", &[Modifier::Ctrl, Modifier::Shift]);
        assert_eq!(chord, "ctrl+shift+t");
    }

    #[test]
    fn pointer_action_deserializes_with_default_button() {
        let action: InputAction =
            serde_json::from_str(r#"{"type":"pointer","x":5,"y":6,"action":"click"}"#).unwrap();
        assert_eq!(
            action,
            InputAction::Pointer {
                x: 5,
                y: 6,
                action: PointerAction::Click,
                button: MouseButton::Left
            }
        );
    }
}
