//! Error types for deckhand

// This warning is a false positive from thiserror macro expansion
#![allow(unused_assignments)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for deckhand operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for deckhand
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Local source tree is missing or unreadable
    #[error("Source tree not found: {path}")]
    #[diagnostic(help("Check that the directory exists and is readable"))]
    NotFound {
        /// Path that could not be read
        path: Utf8PathBuf,
    },

    /// Remote command, upload or download failed
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[help]
        help: String,
    },

    /// A template referenced a variable that is not set
    #[error("Missing substitution for '{{{key}}}'")]
    #[diagnostic(help("Define the variable under [vars] in deckhand.toml or pass it to the task"))]
    MissingSubstitution {
        /// Placeholder name without braces
        key: String,
    },

    /// Malformed template text
    #[error("Template error: {message}")]
    Template {
        message: String,
        #[help]
        help: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[help]
        help: String,
    },

    /// Task precondition or local tool failure
    #[error("Task error: {message}")]
    Task {
        message: String,
        #[help]
        help: String,
    },
}

impl Error {
    /// Create a source-not-found error
    pub fn not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a missing substitution error
    pub fn missing_substitution(key: impl Into<String>) -> Self {
        Self::MissingSubstitution { key: key.into() }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a task error
    pub fn task(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
            help: help.into(),
        }
    }
}
