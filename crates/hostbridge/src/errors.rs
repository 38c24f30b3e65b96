use crate::dispatch::Operation;
use crate::foreign::Arity;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Faults reported by a host backend from inside a capability
///
/// Backends never return [`DispatchError`] or [`ResolverError`] directly; the
/// dispatcher and the resolver are the only places that translate these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostFault {
    #[error("expected {expected} arguments, got {found}")]
    Arity { expected: Arity, found: usize },

    #[error("argument {position} must be {expected}, got {found}")]
    ArgumentType {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("{0}")]
    Raised(String),
}

/// Errors that can occur while dispatching an operation on a foreign value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("{type_name} does not support {operation}")]
    UnsupportedOperation {
        operation: Operation,
        type_name: String,
    },

    #[error("{type_name} has no member '{member}'")]
    UnknownMember { member: String, type_name: String },

    #[error("Arity mismatch: expected {expected} arguments, got {found}")]
    ArityMismatch { expected: Arity, found: usize },

    #[error("Unsupported argument type at position {position}: expected {expected}, got {found}")]
    UnsupportedArgumentType {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Host raised: {message}")]
    ForeignException { message: String },
}

impl From<HostFault> for DispatchError {
    fn from(fault: HostFault) -> Self {
        match fault {
            HostFault::Arity { expected, found } => DispatchError::ArityMismatch { expected, found },
            HostFault::ArgumentType {
                position,
                expected,
                found,
            } => DispatchError::UnsupportedArgumentType {
                position,
                expected,
                found,
            },
            HostFault::Raised(message) => DispatchError::ForeignException { message },
        }
    }
}

/// Errors that can occur while maintaining the search path or resolving symbols
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    #[error("Invalid location '{descriptor}': {reason}")]
    InvalidLocation { descriptor: String, reason: String },

    #[error("Symbol '{0}' not found")]
    SymbolNotFound(String),

    #[error("Failed to load '{name}' from {location}: {message}")]
    LoadFailed {
        name: String,
        location: String,
        message: String,
    },
}

/// The failure reported to the interpreter by a bridge operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("{builtin} expects {expected} arguments, got {found}")]
    ArgumentCount {
        builtin: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{builtin}: argument '{parameter}' must be {expected}, got {found}")]
    ArgumentType {
        builtin: &'static str,
        parameter: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<hostbridge_config::ConfigError> for BridgeError {
    fn from(err: hostbridge_config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}

/// Run host code, turning a panic into [`HostFault::Raised`]
pub(crate) fn contain<T>(f: impl FnOnce() -> Result<T, HostFault>) -> Result<T, HostFault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(HostFault::Raised(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("host code panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("host code panicked: {}", msg)
    } else {
        "host code panicked".to_string()
    }
}
