//! Error types for wiki-infra.
//!
//! Every failure this crate can report happens at synthesis time: bad
//! configuration, an address plan that does not fit, a missing user-data
//! script or a cross-stack reference that cannot be wired. Provisioning
//! failures belong to the control plane and never show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wiki-infra operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for wiki-infra.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// A CIDR block could not be parsed.
    #[error("Invalid CIDR block '{cidr}': {message}")]
    InvalidCidr {
        /// The offending block
        cidr: String,
        /// Error message
        message: String,
    },

    /// The parent range has no room left for a subnet.
    #[error("Cannot allocate a /{mask} subnet for '{subnet}' inside {parent}")]
    SubnetAllocation {
        /// Subnet configuration name
        subnet: String,
        /// Requested mask
        mask: u8,
        /// Parent CIDR block
        parent: String,
    },

    // ========================================================================
    // Construct Errors
    // ========================================================================
    /// Two constructs in the same stack resolved to the same logical id.
    #[error("Duplicate construct '{path}' in stack '{stack}' (logical id {logical_id})")]
    DuplicateConstruct {
        /// Stack id
        stack: String,
        /// Construct path
        path: String,
        /// Colliding logical id
        logical_id: String,
    },

    /// A resource was asked to live somewhere it must not.
    #[error("Invalid placement for '{resource}': {message}")]
    InvalidPlacement {
        /// Construct id
        resource: String,
        /// Error message
        message: String,
    },

    /// A construct received an argument it cannot use.
    #[error("Invalid property '{property}' on '{resource}': {message}")]
    InvalidProperty {
        /// Construct id
        resource: String,
        /// Property name
        property: String,
        /// Error message
        message: String,
    },

    /// User data script is missing.
    #[error("User data script not found: {0}")]
    UserDataNotFound(PathBuf),

    // ========================================================================
    // Assembly Errors
    // ========================================================================
    /// Stack not found in the app.
    #[error("Stack '{0}' not found")]
    StackNotFound(String),

    /// Duplicate stack id or stack name.
    #[error("Duplicate stack '{0}'")]
    DuplicateStack(String),

    /// A value references a stack that is not part of the app.
    #[error("Unresolved reference to '{logical_id}' in stack '{stack}'")]
    UnresolvedReference {
        /// Producing stack
        stack: String,
        /// Referenced logical id
        logical_id: String,
    },

    /// Stacks reference each other in a cycle.
    #[error("Cyclic dependency between stacks: {0}")]
    DependencyCycle(String),

    /// Two exports share a name.
    #[error("Export name '{0}' is declared more than once")]
    DuplicateExport(String),

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new invalid configuration error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid CIDR error.
    pub fn invalid_cidr(cidr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCidr {
            cidr: cidr.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid placement error.
    pub fn invalid_placement(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPlacement {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid property error.
    pub fn invalid_property(
        resource: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidProperty {
            resource: resource.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => 2,
            Error::InvalidCidr { .. } | Error::SubnetAllocation { .. } => 3,
            Error::DuplicateConstruct { .. }
            | Error::InvalidPlacement { .. }
            | Error::InvalidProperty { .. }
            | Error::UserDataNotFound(_) => 4,
            Error::StackNotFound(_)
            | Error::DuplicateStack(_)
            | Error::UnresolvedReference { .. }
            | Error::DependencyCycle(_)
            | Error::DuplicateExport(_) => 5,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
