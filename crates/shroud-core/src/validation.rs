//! Recursive validation report tree
//!
//! Configuration validation never fails with an error; problems become
//! ERROR-level report entries so callers always receive a complete
//! diagnostic tree to render.

use std::collections::BTreeMap;

/// Severity of a single report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// Validation result of one subsystem, with nested subsystem results
#[derive(Debug, Clone)]
pub struct ValidationResponse {
    source: String,
    valid: bool,
    report: BTreeMap<Level, Vec<String>>,
    subsystems: Vec<ValidationResponse>,
}

impl ValidationResponse {
    /// Start building a response attributed to `source`
    pub fn builder(source: impl Into<String>) -> ValidationResponseBuilder {
        ValidationResponseBuilder {
            source: source.into(),
            valid: false,
            report: BTreeMap::new(),
            subsystems: Vec::new(),
        }
    }

    /// Name of the subsystem this response describes
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether this subsystem considers its configuration valid
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Report entries grouped by level
    pub fn report(&self) -> &BTreeMap<Level, Vec<String>> {
        &self.report
    }

    /// Messages recorded at `level`
    pub fn messages(&self, level: Level) -> &[String] {
        self.report.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nested subsystem responses
    pub fn subsystems(&self) -> &[ValidationResponse] {
        &self.subsystems
    }
}

/// Builder collecting report entries and subsystem responses
#[derive(Debug)]
pub struct ValidationResponseBuilder {
    source: String,
    valid: bool,
    report: BTreeMap<Level, Vec<String>>,
    subsystems: Vec<ValidationResponse>,
}

impl ValidationResponseBuilder {
    pub fn info(mut self, message: impl Into<String>) -> Self {
        self.report.entry(Level::Info).or_default().push(message.into());
        self
    }

    pub fn warning(mut self, message: impl Into<String>) -> Self {
        self.report
            .entry(Level::Warning)
            .or_default()
            .push(message.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.report
            .entry(Level::Error)
            .or_default()
            .push(message.into());
        self
    }

    pub fn subsystem(mut self, response: ValidationResponse) -> Self {
        self.subsystems.push(response);
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn build(self) -> ValidationResponse {
        ValidationResponse {
            source: self.source,
            valid: self.valid,
            report: self.report,
            subsystems: self.subsystems,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_levels_in_order() {
        let response = ValidationResponse::builder("registry")
            .info("configuration file present")
            .warning("legacy dispatcher not operational")
            .error("no default dispatcher set")
            .build();

        assert_eq!(response.source(), "registry");
        assert!(!response.is_valid());
        assert_eq!(response.messages(Level::Info).len(), 1);
        assert_eq!(response.messages(Level::Warning).len(), 1);
        assert_eq!(
            response.messages(Level::Error),
            ["no default dispatcher set".to_string()]
        );
    }

    #[test]
    fn test_subsystems_nest() {
        let source = ValidationResponse::builder("env-source")
            .info("configured environment variable exists")
            .valid(true)
            .build();
        let dispatcher = ValidationResponse::builder("master")
            .info("configured cipher supported")
            .subsystem(source)
            .valid(true)
            .build();
        let top = ValidationResponse::builder("registry")
            .subsystem(dispatcher)
            .valid(true)
            .build();

        assert_eq!(top.subsystems().len(), 1);
        assert_eq!(top.subsystems()[0].subsystems()[0].source(), "env-source");
        assert!(top.is_valid());
    }

    #[test]
    fn test_messages_for_unused_level_are_empty() {
        let response = ValidationResponse::builder("x").valid(true).build();
        assert!(response.messages(Level::Error).is_empty());
    }
}
