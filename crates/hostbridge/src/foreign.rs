//! The foreign (host) object model as seen by the bridge
//!
//! Host objects are opaque: the bridge only ever asks an object which
//! capabilities it has ([`ForeignObject::as_readable`],
//! [`ForeignObject::as_callable`]) and drives it through those. A missing
//! capability is reported as `None`, never as a failed cast.
//!
//! Primitive values (null, booleans, integers, floats, strings) are shared
//! by both sides and travel as plain [`ForeignValue`] variants.

use crate::errors::HostFault;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Number of positional arguments a callable accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arity {
    pub min: usize,
    /// `None` when the callable is variadic
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exact(n: usize) -> Self {
        Arity {
            min: n,
            max: Some(n),
        }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Arity {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Arity { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// An object living in the host object model
pub trait ForeignObject: Send + Sync + fmt::Debug {
    /// Host-side type name, used for diagnostics only
    fn type_name(&self) -> String;

    /// Member access capability
    fn as_readable(&self) -> Option<&dyn Readable> {
        None
    }

    /// Execution capability
    fn as_callable(&self) -> Option<&dyn Callable> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    /// Host-defined identity, consulted when two handles are not the same reference
    fn same_object(&self, _other: &dyn ForeignObject) -> bool {
        false
    }
}

/// Objects whose named members can be read
pub trait Readable {
    /// `Ok(None)` when the object has no member called `name`
    fn read_member(&self, name: &str) -> Result<Option<ForeignValue>, HostFault>;
}

/// Objects that can be executed with positional arguments
pub trait Callable {
    fn arity(&self) -> Arity;

    /// Called only with an argument count accepted by [`Callable::arity`]
    fn call(&self, args: &[ForeignValue]) -> Result<ForeignValue, HostFault>;
}

/// Shared reference to a host object
///
/// Cloning clones the reference; the host object itself is never copied or
/// dropped by the bridge while the host still refers to it.
#[derive(Clone)]
pub struct HostRef(Arc<dyn ForeignObject>);

impl HostRef {
    pub fn new<T: ForeignObject + 'static>(object: T) -> Self {
        HostRef(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn ForeignObject>) -> Self {
        HostRef(object)
    }

    pub fn object(&self) -> &dyn ForeignObject {
        self.0.as_ref()
    }

    pub fn type_name(&self) -> String {
        self.0.type_name()
    }

    /// Whether both handles point at the same allocation
    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for HostRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.same_object(other.object())
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// A value crossing the bridge on the host side
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Object(HostRef),
}

impl ForeignValue {
    pub fn object<T: ForeignObject + 'static>(object: T) -> Self {
        ForeignValue::Object(HostRef::new(object))
    }

    pub fn string(s: &str) -> Self {
        ForeignValue::Str(Arc::from(s))
    }

    pub fn type_name(&self) -> String {
        match self {
            ForeignValue::Null => "null".to_string(),
            ForeignValue::Bool(_) => "bool".to_string(),
            ForeignValue::Int(_) => "int".to_string(),
            ForeignValue::Float(_) => "float".to_string(),
            ForeignValue::Str(_) => "str".to_string(),
            ForeignValue::Object(obj) => obj.type_name(),
        }
    }

    pub fn as_object(&self) -> Option<&HostRef> {
        match self {
            ForeignValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ForeignValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ForeignValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ForeignValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ForeignValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for ForeignValue {
    fn from(b: bool) -> Self {
        ForeignValue::Bool(b)
    }
}

impl From<i64> for ForeignValue {
    fn from(i: i64) -> Self {
        ForeignValue::Int(i)
    }
}

impl From<f64> for ForeignValue {
    fn from(x: f64) -> Self {
        ForeignValue::Float(x)
    }
}

impl From<&str> for ForeignValue {
    fn from(s: &str) -> Self {
        ForeignValue::string(s)
    }
}

impl From<String> for ForeignValue {
    fn from(s: String) -> Self {
        ForeignValue::Str(Arc::from(s))
    }
}

impl From<HostRef> for ForeignValue {
    fn from(obj: HostRef) -> Self {
        ForeignValue::Object(obj)
    }
}
