//! Builder for pinentry-style prompt dialogues
//!
//! Drives a pinentry helper program over its stdio: window options are
//! queued as commands, then a terminal `GETPIN`, `CONFIRM` or `MESSAGE`
//! requests the interaction.

use std::time::Duration;

use shroud_core::Result;

use crate::protocol::{ChildTransport, Outcome, ProtocolCommand, Session};

/// A pinentry prompt under construction.
///
/// Setting the same option twice replaces the earlier value; command order
/// is otherwise preserved.
pub struct PinEntry {
    program: String,
    commands: Vec<ProtocolCommand>,
}

impl PinEntry {
    /// Prompt through the pinentry executable at `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            commands: Vec::new(),
        }
    }

    /// Stable key handle allowing an external password cache
    pub fn key_info(self, key_info: impl Into<String>) -> Self {
        self.set("OPTION", Some("allow-external-password-cache".to_string()))
            .set("SETKEYINFO", Some(key_info.into()))
    }

    /// Window title
    pub fn title(self, title: impl Into<String>) -> Self {
        self.set("SETTITLE", Some(title.into()))
    }

    /// Additional text in the window
    pub fn description(self, description: impl Into<String>) -> Self {
        self.set("SETDESC", Some(description.into()))
    }

    /// The prompt next to the input field
    pub fn prompt(self, prompt: impl Into<String>) -> Self {
        self.set("SETPROMPT", Some(prompt.into()))
    }

    /// OK button label
    pub fn ok_label(self, label: impl Into<String>) -> Self {
        self.set("SETOK", Some(label.into()))
    }

    /// Cancel button label
    pub fn cancel_label(self, label: impl Into<String>) -> Self {
        self.set("SETCANCEL", Some(label.into()))
    }

    /// Error text shown for a second attempt ("bad password")
    pub fn error_text(self, error: impl Into<String>) -> Self {
        self.set("SETERROR", Some(error.into()))
    }

    /// Require the pin to be typed twice
    pub fn confirm_pin(self) -> Self {
        self.set("SETREPEAT", None)
    }

    /// Dialogue timeout; expiry classifies as [`Outcome::Timeout`]
    pub fn timeout(self, timeout: Duration) -> Self {
        self.set("SETTIMEOUT", Some(timeout.as_secs().to_string()))
    }

    /// Show the dialogue with input field(s) and collect the pin
    pub fn get_pin(self) -> Result<Outcome> {
        self.set("GETPIN", None).execute()
    }

    /// Show a confirmation dialogue without input
    pub fn confirm(self) -> Result<Outcome> {
        self.set("CONFIRM", None).execute()
    }

    /// Show a message dialogue without input
    pub fn message(self) -> Result<Outcome> {
        self.set("MESSAGE", None).execute()
    }

    fn set(mut self, verb: &str, arg: Option<String>) -> Self {
        if let Some(existing) = self.commands.iter_mut().find(|c| c.verb == verb) {
            existing.arg = arg;
        } else {
            self.commands.push(ProtocolCommand::new(verb, arg));
        }
        self
    }

    fn execute(self) -> Result<Outcome> {
        let transport = ChildTransport::spawn(&self.program)?;
        Session::new(transport, self.commands).run()
    }
}
