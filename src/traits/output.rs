#[cfg(test)]
use std::sync::Mutex;

/// Verbosity threshold for diagnostic output.
///
/// Ordered from least to most verbose; a message is shown when its level is
/// less than or equal to the configured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Map the number of `-v` flags to a level, starting at `Error`.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Output message captured by MockOutput for testing
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMessage {
    Success(String),
    Error(String),
    Warning(String),
    Info(String),
    Debug(String),
    Trace(String),
    KeyValue(String, String),
}

/// Trait for diagnostic output, injected into every component that logs
pub trait Output: Send + Sync {
    /// Print a success message, regardless of verbosity
    fn success(&self, message: &str);

    /// Print an error message
    fn error(&self, message: &str);

    /// Print a warning message
    fn warning(&self, message: &str);

    /// Print an info message
    fn info(&self, message: &str);

    /// Print a debug message
    fn debug(&self, message: &str);

    /// Print a trace message
    fn trace(&self, message: &str);

    /// Print a key-value pair at info level
    fn key_value(&self, key: &str, value: &str);
}

/// Real terminal output implementation using the output module
pub struct TerminalOutput {
    level: LogLevel,
}

impl TerminalOutput {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level <= self.level
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new(LogLevel::Error)
    }
}

impl Output for TerminalOutput {
    fn success(&self, message: &str) {
        crate::output::success(message);
    }

    fn error(&self, message: &str) {
        if self.enabled(LogLevel::Error) {
            crate::output::error(message);
        }
    }

    fn warning(&self, message: &str) {
        if self.enabled(LogLevel::Warn) {
            crate::output::warning(message);
        }
    }

    fn info(&self, message: &str) {
        if self.enabled(LogLevel::Info) {
            crate::output::info(message);
        }
    }

    fn debug(&self, message: &str) {
        if self.enabled(LogLevel::Debug) {
            crate::output::debug(message);
        }
    }

    fn trace(&self, message: &str) {
        if self.enabled(LogLevel::Trace) {
            crate::output::trace(message);
        }
    }

    fn key_value(&self, key: &str, value: &str) {
        if self.enabled(LogLevel::Info) {
            crate::output::key_value(key, value);
        }
    }
}

/// Mock output implementation for testing (captures output)
#[cfg(test)]
pub struct MockOutput {
    messages: Mutex<Vec<OutputMessage>>,
}

#[cfg(test)]
#[allow(dead_code)]
impl MockOutput {
    /// Create new mock output
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Get all captured messages
    pub fn get_messages(&self) -> Vec<OutputMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Check if a specific message was output
    pub fn contains_message(&self, message: &OutputMessage) -> bool {
        self.messages.lock().unwrap().contains(message)
    }

    /// Check if any success message was output
    pub fn has_success(&self) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| matches!(m, OutputMessage::Success(_)))
    }

    /// Check if any error message was output
    pub fn has_error(&self) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| matches!(m, OutputMessage::Error(_)))
    }

    /// Get all messages formatted as text
    pub fn to_text(&self) -> String {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|msg| match msg {
                OutputMessage::Success(s) => format!("✓ {}", s),
                OutputMessage::Error(s) => format!("✗ {}", s),
                OutputMessage::Warning(s) => format!("⚠ {}", s),
                OutputMessage::Info(s) => s.clone(),
                OutputMessage::Debug(s) => s.clone(),
                OutputMessage::Trace(s) => s.clone(),
                OutputMessage::KeyValue(k, v) => format!("{}: {}", k, v),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&self, message: OutputMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

#[cfg(test)]
impl Default for MockOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Output for MockOutput {
    fn success(&self, message: &str) {
        self.push(OutputMessage::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(OutputMessage::Error(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(OutputMessage::Warning(message.to_string()));
    }

    fn info(&self, message: &str) {
        self.push(OutputMessage::Info(message.to_string()));
    }

    fn debug(&self, message: &str) {
        self.push(OutputMessage::Debug(message.to_string()));
    }

    fn trace(&self, message: &str) {
        self.push(OutputMessage::Trace(message.to_string()));
    }

    fn key_value(&self, key: &str, value: &str) {
        self.push(OutputMessage::KeyValue(key.to_string(), value.to_string()));
    }
}
