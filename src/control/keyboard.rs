// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Terminal keyboard trigger.
//!
//! Reads key events in raw mode. Space or Enter is a press; Esc, `q` or
//! Ctrl+C ends the session. Bindings can be changed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::warn;

use super::TriggerSource;
use crate::error::TriggerError;

/// Poll slice used by the blocking `await_trigger`
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// A key plus modifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    /// Key code
    pub code: KeyCode,
    /// Required modifiers
    pub modifiers: KeyModifiers,
}

impl Shortcut {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Shortcut with no modifiers
    pub fn key(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    /// Shortcut with Ctrl held
    pub fn ctrl(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::CONTROL)
    }
}

/// What a bound key does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Counts as a button press
    Trigger,
    /// Closes the trigger source
    Quit,
}

/// Trigger source reading the terminal keyboard
pub struct KeyboardTrigger {
    bindings: HashMap<Shortcut, KeyAction>,
    raw_mode: bool,
}

impl KeyboardTrigger {
    /// Keyboard trigger with no bindings
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            raw_mode: false,
        }
    }

    /// Keyboard trigger with the default bindings
    pub fn with_defaults() -> Self {
        let mut keyboard = Self::new();
        keyboard.bind(Shortcut::key(KeyCode::Char(' ')), KeyAction::Trigger);
        keyboard.bind(Shortcut::key(KeyCode::Enter), KeyAction::Trigger);
        keyboard.bind(Shortcut::key(KeyCode::Esc), KeyAction::Quit);
        keyboard.bind(Shortcut::key(KeyCode::Char('q')), KeyAction::Quit);
        keyboard.bind(Shortcut::ctrl(KeyCode::Char('c')), KeyAction::Quit);
        keyboard
    }

    /// Bind a key, replacing any previous binding
    pub fn bind(&mut self, shortcut: Shortcut, action: KeyAction) {
        self.bindings.insert(shortcut, action);
    }

    /// Remove a binding
    pub fn unbind(&mut self, shortcut: &Shortcut) -> Option<KeyAction> {
        self.bindings.remove(shortcut)
    }

    /// Action bound to a key, if any
    pub fn action_for(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<KeyAction> {
        self.bindings.get(&Shortcut::new(code, modifiers)).copied()
    }

    /// Keys bound to `action`, formatted for a prompt
    pub fn keys_for(&self, action: KeyAction) -> Vec<String> {
        let mut keys: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(shortcut, _)| format_shortcut(shortcut))
            .collect();
        keys.sort();
        keys
    }

    fn enter_raw_mode(&mut self) -> Result<(), TriggerError> {
        if !self.raw_mode {
            terminal::enable_raw_mode().map_err(|e| TriggerError::Device(e.to_string()))?;
            self.raw_mode = true;
        }
        Ok(())
    }
}

impl Default for KeyboardTrigger {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Drop for KeyboardTrigger {
    fn drop(&mut self) {
        if self.raw_mode {
            if let Err(e) = terminal::disable_raw_mode() {
                warn!("failed to restore terminal: {}", e);
            }
        }
    }
}

impl TriggerSource for KeyboardTrigger {
    fn await_trigger(&mut self) -> Result<(), TriggerError> {
        loop {
            if self.poll_trigger(IDLE_WAIT)? {
                return Ok(());
            }
        }
    }

    fn poll_trigger(&mut self, timeout: Duration) -> Result<bool, TriggerError> {
        self.enter_raw_mode()?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining).map_err(|e| TriggerError::Device(e.to_string()))? {
                return Ok(false);
            }
            let read = event::read().map_err(|e| TriggerError::Device(e.to_string()))?;
            let TermEvent::Key(key) = read else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match self.action_for(key.code, key.modifiers) {
                Some(KeyAction::Trigger) => return Ok(true),
                Some(KeyAction::Quit) => return Err(TriggerError::Closed),
                None => {}
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "keyboard (press {}, quit with {})",
            self.keys_for(KeyAction::Trigger).join("/"),
            self.keys_for(KeyAction::Quit).join("/")
        )
    }
}

/// Format a shortcut for display
pub fn format_shortcut(shortcut: &Shortcut) -> String {
    let mut parts = Vec::new();

    if shortcut.modifiers.contains(KeyModifiers::CONTROL) {
        parts.push("Ctrl".to_string());
    }
    if shortcut.modifiers.contains(KeyModifiers::ALT) {
        parts.push("Alt".to_string());
    }
    if shortcut.modifiers.contains(KeyModifiers::SHIFT) {
        parts.push("Shift".to_string());
    }

    let key = match shortcut.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_uppercase().to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        other => format!("{:?}", other),
    };
    parts.push(key);

    parts.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let keyboard = KeyboardTrigger::with_defaults();
        assert_eq!(
            keyboard.action_for(KeyCode::Char(' '), KeyModifiers::NONE),
            Some(KeyAction::Trigger)
        );
        assert_eq!(
            keyboard.action_for(KeyCode::Enter, KeyModifiers::NONE),
            Some(KeyAction::Trigger)
        );
        assert_eq!(
            keyboard.action_for(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(KeyAction::Quit)
        );
        assert_eq!(keyboard.action_for(KeyCode::Char('x'), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_rebind() {
        let mut keyboard = KeyboardTrigger::with_defaults();
        keyboard.bind(Shortcut::key(KeyCode::F(1)), KeyAction::Trigger);
        assert_eq!(
            keyboard.unbind(&Shortcut::key(KeyCode::Char('q'))),
            Some(KeyAction::Quit)
        );
        assert_eq!(keyboard.keys_for(KeyAction::Quit), vec!["Ctrl+C", "Esc"]);
        assert_eq!(
            keyboard.keys_for(KeyAction::Trigger),
            vec!["Enter", "F1", "Space"]
        );
    }

    #[test]
    fn test_format_shortcut() {
        assert_eq!(format_shortcut(&Shortcut::key(KeyCode::Char(' '))), "Space");
        assert_eq!(format_shortcut(&Shortcut::ctrl(KeyCode::Char('c'))), "Ctrl+C");
        assert_eq!(format_shortcut(&Shortcut::key(KeyCode::F(2))), "F2");
    }
}
