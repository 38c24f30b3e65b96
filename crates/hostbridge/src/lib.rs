//! Interop bridge between an interpreter and a host object model
//!
//! The bridge offers four operations to the interpreter:
//! 1. Resolving a fully-qualified class name against a search path
//! 2. Appending a location to that search path
//! 3. Reading a named member off a host object
//! 4. Invoking a host callable with two arguments
//!
//! Host objects are driven through capability queries rather than static
//! types, and every host-side failure comes back as a typed error value.

pub mod bridge;
pub mod dispatch;
pub mod errors;
pub mod foreign;
pub mod memory;
#[cfg(feature = "python")]
pub mod python;
pub mod resolver;
pub mod value;

pub use bridge::{init_logging, Arguments, Bridge, Builtin, Stateful};
pub use dispatch::{Dispatcher, Operation};
pub use errors::{BridgeError, DispatchError, HostFault, ResolverError};
pub use foreign::{Arity, Callable, ForeignObject, ForeignValue, HostRef, Readable};
pub use resolver::{HostRuntime, Location, LocationKind, Resolver, SearchPath, SymbolName};
pub use value::Value;
