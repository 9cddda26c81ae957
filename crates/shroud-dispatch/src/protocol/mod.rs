//! Line-oriented passphrase retrieval protocol
//!
//! One command per line from the client; every server response is a success
//! line (`OK …`), an error line (`ERR …`), a data line (`D …`) or an
//! ignorable status/comment line (`S …`, `#…`). A [`Session`] runs a queued
//! command sequence against a [`Transport`] and yields exactly one
//! [`Outcome`].
//!
//! Individual line reads have no enforced timeout; only transport teardown
//! is time-bounded. Nothing here retries: a malformed greeting, a malformed
//! intermediate response or an I/O error is a hard failure, and retry
//! policy (for example re-prompting) belongs to the caller.

pub mod pinentry;
pub mod transport;

use std::time::Duration;

use shroud_core::{Error, Result};
use tracing::debug;

pub use pinentry::PinEntry;
#[cfg(unix)]
pub use transport::SocketTransport;
pub use transport::ChildTransport;

/// Error code embedded in an `ERR` line when the prompt timed out
const ERR_CODE_TIMEOUT: &str = "83886142";
/// Error code embedded in an `ERR` line when the user canceled
const ERR_CODE_CANCELED: &str = "83886179";
/// Error code embedded in an `ERR` line when the repeated entry differed
const ERR_CODE_NOT_CONFIRMED: &str = "83886194";

/// Termination command closing a session
const BYE: &str = "BYE";

/// Bound on waiting for the transport to close after termination
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Final classification of a protocol exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The terminal response carried a payload
    Success(String),
    /// The prompt timed out
    Timeout,
    /// The user canceled the prompt
    Canceled,
    /// The repeated entry did not match
    NotConfirmed,
    /// Any other failure, with detail
    Failed(String),
}

/// A single protocol command: verb plus optional argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolCommand {
    pub verb: String,
    pub arg: Option<String>,
}

impl ProtocolCommand {
    pub fn new(verb: impl Into<String>, arg: Option<String>) -> Self {
        Self {
            verb: verb.into(),
            arg,
        }
    }

    fn line(&self) -> String {
        match &self.arg {
            Some(arg) => format!("{} {}", self.verb, arg),
            None => self.verb.clone(),
        }
    }
}

/// A duplex line-oriented byte channel: subprocess stdio or a local socket
pub trait Transport {
    /// Send one command line
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Receive one response line, without the trailing newline
    fn read_line(&mut self) -> Result<String>;

    /// Close the channel, waiting at most `timeout` for orderly teardown.
    /// The error detail downgrades an apparent success.
    fn close(&mut self, timeout: Duration) -> std::result::Result<(), String>;
}

/// One protocol exchange: greeting, queued commands, classification,
/// termination.
pub struct Session<T: Transport> {
    transport: T,
    commands: Vec<ProtocolCommand>,
}

impl<T: Transport> Session<T> {
    /// Create a session over `transport` running `commands` in order. The
    /// last command is the one requesting data; every earlier command must
    /// be answered with a success line.
    pub fn new(transport: T, commands: Vec<ProtocolCommand>) -> Self {
        Self {
            transport,
            commands,
        }
    }

    /// Execute the exchange and classify its result.
    ///
    /// Protocol violations are hard errors; a classified non-success (user
    /// canceled, prompt timed out) is a regular [`Outcome`].
    pub fn run(mut self) -> Result<Outcome> {
        if self.commands.is_empty() {
            return Err(Error::protocol("no commands queued"));
        }

        self.expect_ok()?;

        let last_index = self.commands.len() - 1;
        let commands = std::mem::take(&mut self.commands);
        for (index, command) in commands.iter().enumerate() {
            let line = command.line();
            debug!("> {line}");
            self.transport.write_line(&line)?;
            if index < last_index {
                self.expect_ok()?;
            }
        }

        let outcome = self.classify_terminal()?;

        debug!("> {BYE}");
        self.transport.write_line(BYE)?;
        match self.transport.close(CLOSE_TIMEOUT) {
            Ok(()) => Ok(outcome),
            // only an apparent success is downgraded; a classified
            // cancel/timeout survives a grumpy exit
            Err(detail) => Ok(match outcome {
                Outcome::Success(_) => Outcome::Failed(detail),
                other => other,
            }),
        }
    }

    /// Read exactly one line and require it to be a success line
    fn expect_ok(&mut self) -> Result<()> {
        let response = self.transport.read_line()?;
        debug!("< {response}");
        if !response.starts_with("OK") {
            return Err(Error::protocol(format!(
                "expected OK but got this instead: {response}"
            )));
        }
        Ok(())
    }

    /// Classify the terminal response, skipping ignorable lines
    fn classify_terminal(&mut self) -> Result<Outcome> {
        loop {
            let response = self.transport.read_line()?;
            debug!("< {response}");
            if response.starts_with('#') || response.starts_with('S') {
                continue;
            }
            if response.starts_with("ERR") {
                return Ok(if response.contains(ERR_CODE_TIMEOUT) {
                    Outcome::Timeout
                } else if response.contains(ERR_CODE_CANCELED) {
                    Outcome::Canceled
                } else if response.contains(ERR_CODE_NOT_CONFIRMED) {
                    Outcome::NotConfirmed
                } else {
                    Outcome::Failed(response)
                });
            }
            if let Some(payload) = response.strip_prefix("D ") {
                return Ok(Outcome::Success(payload.to_string()));
            }
            if let Some(rest) = response.strip_prefix("OK") {
                return Ok(Outcome::Success(rest.trim().to_string()));
            }
            return Err(Error::protocol(format!(
                "unexpected response line: {response}"
            )));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Transport replaying a scripted server conversation
    pub(crate) struct ScriptedTransport {
        responses: VecDeque<String>,
        pub sent: Arc<Mutex<Vec<String>>>,
        close_result: std::result::Result<(), String>,
    }

    impl ScriptedTransport {
        pub fn new(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                sent: Arc::new(Mutex::new(Vec::new())),
                close_result: Ok(()),
            }
        }

        pub fn with_close_failure(mut self, detail: &str) -> Self {
            self.close_result = Err(detail.to_string());
            self
        }

        pub fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
            self.sent.clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn write_line(&mut self, line: &str) -> Result<()> {
            self.sent.lock().unwrap().push(line.to_string());
            Ok(())
        }

        fn read_line(&mut self) -> Result<String> {
            self.responses
                .pop_front()
                .ok_or_else(|| Error::protocol("transport closed unexpectedly"))
        }

        fn close(&mut self, _timeout: Duration) -> std::result::Result<(), String> {
            self.close_result.clone()
        }
    }

    fn commands(verbs: &[&str]) -> Vec<ProtocolCommand> {
        verbs
            .iter()
            .map(|v| ProtocolCommand::new(*v, None))
            .collect()
    }

    #[test]
    fn test_data_line_yields_success_payload() {
        let transport = ScriptedTransport::new(&[
            "OK Pleased to meet you",
            "OK",
            "OK",
            "# nothing to see",
            "S progress",
            "D s3cr3t",
        ]);
        let sent = transport.sent_log();
        let outcome = Session::new(transport, commands(&["SETTITLE", "SETPROMPT", "GETPIN"]))
            .run()
            .unwrap();

        assert_eq!(outcome, Outcome::Success("s3cr3t".to_string()));
        let sent = sent.lock().unwrap();
        assert_eq!(*sent, vec!["SETTITLE", "SETPROMPT", "GETPIN", "BYE"]);
    }

    #[test]
    fn test_cancel_code_classifies_as_canceled() {
        let transport = ScriptedTransport::new(&[
            "OK",
            "ERR 83886179 Operation cancelled <Pinentry>",
        ]);
        let outcome = Session::new(transport, commands(&["GETPIN"])).run().unwrap();
        assert_eq!(outcome, Outcome::Canceled);
    }

    #[test]
    fn test_timeout_code_classifies_as_timeout() {
        let transport = ScriptedTransport::new(&["OK", "ERR 83886142 Timeout <Pinentry>"]);
        let outcome = Session::new(transport, commands(&["GETPIN"])).run().unwrap();
        assert_eq!(outcome, Outcome::Timeout);
    }

    #[test]
    fn test_not_confirmed_code_classifies_as_not_confirmed() {
        let transport = ScriptedTransport::new(&["OK", "ERR 83886194 Not confirmed"]);
        let outcome = Session::new(transport, commands(&["CONFIRM"])).run().unwrap();
        assert_eq!(outcome, Outcome::NotConfirmed);
    }

    #[test]
    fn test_unknown_error_code_classifies_as_failed() {
        let transport = ScriptedTransport::new(&["OK", "ERR 83886999 No pinentry"]);
        let outcome = Session::new(transport, commands(&["GETPIN"])).run().unwrap();
        assert_eq!(outcome, Outcome::Failed("ERR 83886999 No pinentry".to_string()));
    }

    #[test]
    fn test_terminal_ok_line_carries_remainder_payload() {
        let transport = ScriptedTransport::new(&["OK", "OK 73336372337421"]);
        let outcome = Session::new(transport, commands(&["GET_PASSPHRASE x"])).run().unwrap();
        assert_eq!(outcome, Outcome::Success("73336372337421".to_string()));
    }

    #[test]
    fn test_malformed_greeting_is_a_hard_error() {
        let transport = ScriptedTransport::new(&["ERR 1 unavailable"]);
        let err = Session::new(transport, commands(&["GETPIN"])).run().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("expected OK"));
    }

    #[test]
    fn test_malformed_intermediate_response_is_a_hard_error() {
        let transport = ScriptedTransport::new(&["OK", "D sneaky", "D pin"]);
        let err = Session::new(transport, commands(&["SETTITLE", "GETPIN"]))
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_nonzero_exit_downgrades_success_to_failed() {
        let transport =
            ScriptedTransport::new(&["OK", "D pin"]).with_close_failure("exit code: 2");
        let outcome = Session::new(transport, commands(&["GETPIN"])).run().unwrap();
        assert_eq!(outcome, Outcome::Failed("exit code: 2".to_string()));
    }

    #[test]
    fn test_nonzero_exit_keeps_classified_cancel() {
        let transport = ScriptedTransport::new(&["OK", "ERR 83886179 cancelled"])
            .with_close_failure("exit code: 2");
        let outcome = Session::new(transport, commands(&["GETPIN"])).run().unwrap();
        assert_eq!(outcome, Outcome::Canceled);
    }

    #[test]
    fn test_exhausted_transport_is_a_hard_error() {
        let transport = ScriptedTransport::new(&["OK"]);
        let err = Session::new(transport, commands(&["GETPIN"])).run().unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_unclassifiable_line_is_a_hard_error() {
        let transport = ScriptedTransport::new(&["OK", "WAT"]);
        let err = Session::new(transport, commands(&["GETPIN"])).run().unwrap_err();
        assert!(err.to_string().contains("WAT"));
    }
}
