//! GnuPG agent master source
//!
//! Reference: `gpg-agent:$agentSocketPath[?non-interactive]`. Queries a
//! running agent over its unix domain socket; with `non-interactive` the
//! agent only serves already-cached passphrases and never prompts.

use std::path::PathBuf;

use shroud_core::{Error, Result, SecretString, ValidationResponse};

use crate::protocol::{Outcome, ProtocolCommand, Session};
use crate::sources::{MasterSource, Scheme};

/// Cache key under which the agent stores the passphrase
const CACHE_ID: &str = "shroud:masterSecret";

/// Query string flag suppressing interactive prompting
const NON_INTERACTIVE: &str = "non-interactive";

/// Display/terminal hints sent to the agent before the query.
///
/// Captured explicitly rather than read inside the protocol code, so tests
/// and embedders control what reaches the agent. Absent values are simply
/// not sent.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub display: Option<String>,
    pub term: Option<String>,
}

impl AgentOptions {
    /// Capture `DISPLAY` and `TERM` from the process environment
    pub fn from_env() -> Self {
        Self {
            display: std::env::var("DISPLAY").ok(),
            term: std::env::var("TERM").ok(),
        }
    }
}

pub struct GpgAgentSource {
    scheme: Scheme,
    options: AgentOptions,
}

impl GpgAgentSource {
    pub const NAME: &'static str = "gpg-agent";

    /// Create a source with environment-derived agent options
    pub fn new() -> Self {
        Self::with_options(AgentOptions::from_env())
    }

    /// Create a source with explicit agent options
    pub fn with_options(options: AgentOptions) -> Self {
        Self {
            scheme: Scheme::new(Self::NAME),
            options,
        }
    }

    /// The option/query preamble and terminal command for one lookup
    fn commands(&self, interactive: bool) -> Vec<ProtocolCommand> {
        let mut commands = Vec::new();
        if let Some(display) = &self.options.display {
            commands.push(ProtocolCommand::new(
                "OPTION",
                Some(format!("display={display}")),
            ));
        }
        if let Some(term) = &self.options.term {
            commands.push(ProtocolCommand::new(
                "OPTION",
                Some(format!("ttytype={term}")),
            ));
        }
        let no_ask = if interactive { "" } else { "--no-ask " };
        commands.push(ProtocolCommand::new(
            "GET_PASSPHRASE",
            Some(format!(
                "{no_ask}{CACHE_ID} X Master+Secret \
                 Please+enter+the+master+secret+used+to+decrypt+protected+configuration+values"
            )),
        ));
        commands
    }
}

impl Default for GpgAgentSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `socketPath[?flags]` and resolve relative paths against home
fn socket_location(reference: &str) -> (PathBuf, bool) {
    let (path, query) = match reference.split_once('?') {
        Some((path, query)) => (path, query),
        None => (reference, ""),
    };
    let interactive = !query.contains(NON_INTERACTIVE);
    let mut socket = PathBuf::from(path);
    if !socket.is_absolute() {
        if let Some(home) = dirs::home_dir() {
            socket = home.join(socket);
        }
    }
    (socket, interactive)
}

impl MasterSource for GpgAgentSource {
    fn handle(&self, reference: &str) -> Result<Option<SecretString>> {
        let Some(rest) = self.scheme.strip(reference) else {
            return Ok(None);
        };
        #[cfg(not(unix))]
        {
            let _ = rest;
            Err(Error::configuration(
                "gpg-agent sockets are only supported on unix platforms",
            ))
        }
        #[cfg(unix)]
        {
            let (socket, interactive) = socket_location(rest);
            let transport = crate::protocol::SocketTransport::connect(&socket)?;
            let outcome = Session::new(transport, self.commands(interactive)).run()?;
            match outcome {
                Outcome::Success(payload) => {
                    let bytes = hex::decode(payload.trim()).map_err(|e| {
                        Error::protocol(format!("agent payload is not valid hex: {e}"))
                    })?;
                    let text = String::from_utf8(bytes).map_err(|e| {
                        Error::protocol(format!("agent payload is not valid UTF-8: {e}"))
                    })?;
                    Ok(Some(SecretString::new(text)))
                }
                Outcome::Canceled => Err(Error::configuration("user canceled the operation")),
                Outcome::Timeout => Err(Error::configuration("agent query timed out")),
                Outcome::NotConfirmed => Err(Error::configuration("entry not confirmed")),
                Outcome::Failed(detail) => {
                    Err(Error::configuration(format!("agent query failed: {detail}")))
                }
            }
        }
    }

    fn validate(&self, reference: &str) -> Option<ValidationResponse> {
        let rest = self.scheme.strip(reference)?;
        let (socket, interactive) = socket_location(rest);
        let mut builder = ValidationResponse::builder("gpg-agent-source");
        if socket.exists() {
            builder = builder.info("unix domain socket for the agent exists").valid(true);
        } else {
            builder = builder.error(
                "unix domain socket for the agent does not exist; maybe the agent needs starting",
            );
        }
        if !interactive {
            builder = builder.warning(
                "non-interactive flag found; the agent will not prompt and can only serve cached passphrases",
            );
        }
        Some(builder.build())
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "GnuPG agent (agent socket path should be edited)"
    }

    fn config_template(&self) -> Option<String> {
        Some(format!("{}:$agentSocketPath", Self::NAME))
    }
}
