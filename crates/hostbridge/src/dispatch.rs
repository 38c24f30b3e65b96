//! Capability dispatch over opaque host values
//!
//! Every dispatch is a three-way branch: the value lacks the capability
//! (`UnsupportedOperation`), the host rejects the request (unknown member,
//! arity, argument type, raised error), or the host returns a value. Panics
//! raised by host code are contained here and reported as
//! `ForeignException`.

use crate::errors::{contain, DispatchError};
use crate::foreign::ForeignValue;
use std::fmt;
use tracing::{debug, trace};

/// Generic operations the dispatcher can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadMember,
    Execute,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ReadMember => write!(f, "member access"),
            Operation::Execute => write!(f, "execution"),
        }
    }
}

/// Stateless dispatcher shared by all bridge operations
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher
    }

    /// Capability query without performing the operation
    pub fn supports(&self, obj: &ForeignValue, operation: Operation) -> bool {
        let Some(host) = obj.as_object() else {
            return false;
        };
        match operation {
            Operation::ReadMember => host.object().as_readable().is_some(),
            Operation::Execute => host.object().as_callable().is_some(),
        }
    }

    /// Read the member `name` off `obj`
    pub fn read_member(&self, obj: &ForeignValue, name: &str) -> Result<ForeignValue, DispatchError> {
        trace!(member = name, receiver = %obj.type_name(), "dispatch read member");

        let readable = obj
            .as_object()
            .and_then(|host| host.object().as_readable())
            .ok_or_else(|| unsupported(obj, Operation::ReadMember))?;

        match contain(|| readable.read_member(name)) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => {
                debug!(member = name, receiver = %obj.type_name(), "unknown member");
                Err(DispatchError::UnknownMember {
                    member: name.to_string(),
                    type_name: obj.type_name(),
                })
            }
            Err(fault) => {
                debug!(member = name, error = %fault, "member read failed in host");
                Err(fault.into())
            }
        }
    }

    /// Execute `obj` with positional `args`
    pub fn execute(&self, obj: &ForeignValue, args: &[ForeignValue]) -> Result<ForeignValue, DispatchError> {
        trace!(receiver = %obj.type_name(), argc = args.len(), "dispatch execute");

        let callable = obj
            .as_object()
            .and_then(|host| host.object().as_callable())
            .ok_or_else(|| unsupported(obj, Operation::Execute))?;

        let arity = contain(|| Ok(callable.arity()))?;
        if !arity.accepts(args.len()) {
            debug!(expected = %arity, found = args.len(), "arity mismatch");
            return Err(DispatchError::ArityMismatch {
                expected: arity,
                found: args.len(),
            });
        }

        contain(|| callable.call(args)).map_err(|fault| {
            debug!(receiver = %obj.type_name(), error = %fault, "execution failed in host");
            DispatchError::from(fault)
        })
    }
}

fn unsupported(obj: &ForeignValue, operation: Operation) -> DispatchError {
    debug!(%operation, receiver = %obj.type_name(), "capability missing");
    DispatchError::UnsupportedOperation {
        operation,
        type_name: obj.type_name(),
    }
}
