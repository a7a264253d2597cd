//! Key bindings for the terminal surface
//!
//! Drive keys map to fixed commands and are gated by the keyboard
//! subscription. Chrome keys (mode tabs, speed selector, quit) are
//! always live.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::control::{DriveCommand, SpeedLevel};
use crate::state::Mode;

/// Keys that drive the bot in manual mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKey {
    Up,
    Down,
    Left,
    Right,
    Space,
}

impl DriveKey {
    /// The command this key sends
    pub fn command(&self) -> DriveCommand {
        match self {
            DriveKey::Up => DriveCommand::Forward,
            DriveKey::Down => DriveCommand::Backward,
            DriveKey::Left => DriveCommand::Left,
            DriveKey::Right => DriveCommand::Right,
            DriveKey::Space => DriveCommand::Stop,
        }
    }

    pub fn from_code(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Up => Some(DriveKey::Up),
            KeyCode::Down => Some(DriveKey::Down),
            KeyCode::Left => Some(DriveKey::Left),
            KeyCode::Right => Some(DriveKey::Right),
            KeyCode::Char(' ') => Some(DriveKey::Space),
            _ => None,
        }
    }
}

/// What a key press means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Drive(DriveKey),
    SelectMode(Mode),
    Speed(SpeedLevel),
    Quit,
}

/// Classify a terminal key event; releases and unbound keys yield `None`
pub fn classify(event: &KeyEvent) -> Option<KeyAction> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') => Some(KeyAction::Quit),
            _ => None,
        };
    }

    if let Some(drive) = DriveKey::from_code(event.code) {
        return Some(KeyAction::Drive(drive));
    }

    match event.code {
        KeyCode::Char('m') => Some(KeyAction::SelectMode(Mode::Manual)),
        KeyCode::Char('v') => Some(KeyAction::SelectMode(Mode::Voice)),
        KeyCode::Char('1') => Some(KeyAction::Speed(SpeedLevel::Slow)),
        KeyCode::Char('2') => Some(KeyAction::Speed(SpeedLevel::Medium)),
        KeyCode::Char('3') => Some(KeyAction::Speed(SpeedLevel::Fast)),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_drive_key_bindings() {
        let cases = [
            (KeyCode::Up, DriveCommand::Forward),
            (KeyCode::Down, DriveCommand::Backward),
            (KeyCode::Left, DriveCommand::Left),
            (KeyCode::Right, DriveCommand::Right),
            (KeyCode::Char(' '), DriveCommand::Stop),
        ];
        for (code, command) in cases {
            match classify(&press(code)) {
                Some(KeyAction::Drive(key)) => assert_eq!(key.command(), command),
                other => panic!("unexpected action for {code:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_unbound_keys_ignored() {
        assert_eq!(classify(&press(KeyCode::Char('x'))), None);
        assert_eq!(classify(&press(KeyCode::Enter)), None);
        assert_eq!(classify(&press(KeyCode::PageUp)), None);
    }

    #[test]
    fn test_release_events_ignored() {
        let mut event = press(KeyCode::Up);
        event.kind = KeyEventKind::Release;
        assert_eq!(classify(&event), None);
    }

    #[test]
    fn test_repeat_events_drive() {
        let mut event = press(KeyCode::Up);
        event.kind = KeyEventKind::Repeat;
        assert_eq!(classify(&event), Some(KeyAction::Drive(DriveKey::Up)));
    }

    #[test]
    fn test_chrome_keys() {
        assert_eq!(
            classify(&press(KeyCode::Char('v'))),
            Some(KeyAction::SelectMode(Mode::Voice))
        );
        assert_eq!(
            classify(&press(KeyCode::Char('3'))),
            Some(KeyAction::Speed(SpeedLevel::Fast))
        );
        assert_eq!(classify(&press(KeyCode::Esc)), Some(KeyAction::Quit));
        assert_eq!(
            classify(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Quit)
        );
    }
}
