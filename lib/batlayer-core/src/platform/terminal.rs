use crate::platform::{Key, KeyInputImpl, PlatformResult};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use log::{trace, warn};
use std::time::Duration;

/// Key presses from the controlling terminal. The terminal is put in raw mode for as long as this
/// value lives, so single key presses arrive without waiting for a newline.
pub struct TerminalKeys {
    _private: (),
}

impl TerminalKeys {
    pub fn new() -> PlatformResult<Self> {
        terminal::enable_raw_mode().map_err(|e| format!("Could not enable raw mode: {e}"))?;
        Ok(Self { _private: () })
    }

    fn translate(key: KeyEvent) -> Key {
        match key.code {
            KeyCode::Esc => Key::Escape,
            // Raw mode stops the terminal from turning Ctrl+C into SIGINT.
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Escape,
            KeyCode::Char(c) => Key::Char(c),
            _ => Key::Other,
        }
    }
}

impl KeyInputImpl for TerminalKeys {
    fn poll_key(&mut self) -> PlatformResult<Option<Key>> {
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let key = Self::translate(key);
                    trace!("Key pressed: {key:?}");
                    return Ok(Some(key));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Could not restore terminal mode: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_translate() {
        assert_eq!(
            TerminalKeys::translate(press(KeyCode::Esc, KeyModifiers::NONE)),
            Key::Escape
        );
        assert_eq!(
            TerminalKeys::translate(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Key::Escape
        );
        assert_eq!(
            TerminalKeys::translate(press(KeyCode::Char('c'), KeyModifiers::NONE)),
            Key::Char('c')
        );
        assert_eq!(
            TerminalKeys::translate(press(KeyCode::Enter, KeyModifiers::NONE)),
            Key::Other
        );
    }
}
