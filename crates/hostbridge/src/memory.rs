//! In-process host object model
//!
//! Exposes Rust data and closures as host objects: [`HostObject`] carries
//! named members (and optionally a constructor, which makes it a class),
//! [`NativeFunction`] is a callable with typed positional parameters, and
//! [`MemoryHost`] registers classes per location so they can be resolved
//! through the search path.

use crate::errors::{HostFault, ResolverError};
use crate::foreign::{Arity, Callable, ForeignObject, ForeignValue, Readable};
use crate::resolver::{HostRuntime, Location, SymbolName};
use hostbridge_logger as logger;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Representation a native parameter expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Any,
    Bool,
    Int,
    /// Accepts floats, and integers widened to floats
    Float,
    Str,
    Object,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Any => "any",
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "str",
            ParamKind::Object => "object",
        }
    }

    fn adapt(self, position: usize, value: &ForeignValue) -> Result<ForeignValue, HostFault> {
        match (self, value) {
            (ParamKind::Any, _)
            | (ParamKind::Bool, ForeignValue::Bool(_))
            | (ParamKind::Int, ForeignValue::Int(_))
            | (ParamKind::Float, ForeignValue::Float(_))
            | (ParamKind::Str, ForeignValue::Str(_))
            | (ParamKind::Object, ForeignValue::Object(_)) => Ok(value.clone()),
            (ParamKind::Float, ForeignValue::Int(i)) => Ok(ForeignValue::Float(*i as f64)),
            _ => Err(HostFault::ArgumentType {
                position,
                expected: self.name().to_string(),
                found: value.type_name(),
            }),
        }
    }
}

type NativeBody = dyn Fn(&[ForeignValue]) -> Result<ForeignValue, HostFault> + Send + Sync;

/// A Rust closure exposed as a host callable
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    params: Vec<ParamKind>,
    body: Arc<NativeBody>,
}

impl NativeFunction {
    /// The body only ever sees arguments already adapted to `params`
    pub fn new<F>(name: &str, params: Vec<ParamKind>, body: F) -> Self
    where
        F: Fn(&[ForeignValue]) -> Result<ForeignValue, HostFault> + Send + Sync + 'static,
    {
        NativeFunction {
            name: name.to_string(),
            params,
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn into_value(self) -> ForeignValue {
        ForeignValue::object(self)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl ForeignObject for NativeFunction {
    fn type_name(&self) -> String {
        format!("{}()", self.name)
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> Arity {
        Arity::exact(self.params.len())
    }

    fn call(&self, args: &[ForeignValue]) -> Result<ForeignValue, HostFault> {
        if args.len() != self.params.len() {
            return Err(HostFault::Arity {
                expected: self.arity(),
                found: args.len(),
            });
        }
        let adapted = self
            .params
            .iter()
            .zip(args)
            .enumerate()
            .map(|(position, (kind, arg))| kind.adapt(position, arg))
            .collect::<Result<Vec<_>, _>>()?;
        (self.body)(&adapted)
    }
}

/// A host object with named members; with a constructor it is also a class
#[derive(Debug, Clone)]
pub struct HostObject {
    type_name: String,
    members: BTreeMap<String, ForeignValue>,
    constructor: Option<NativeFunction>,
}

impl HostObject {
    pub fn new(type_name: &str) -> Self {
        HostObject {
            type_name: type_name.to_string(),
            members: BTreeMap::new(),
            constructor: None,
        }
    }

    pub fn with_member(mut self, name: &str, value: impl Into<ForeignValue>) -> Self {
        self.members.insert(name.to_string(), value.into());
        self
    }

    /// Add a callable member named `name`
    pub fn with_method<F>(self, name: &str, params: Vec<ParamKind>, body: F) -> Self
    where
        F: Fn(&[ForeignValue]) -> Result<ForeignValue, HostFault> + Send + Sync + 'static,
    {
        let function = NativeFunction::new(&format!("{}.{}", self.type_name, name), params, body);
        self.with_member(name, function.into_value())
    }

    /// Make the object itself callable
    pub fn with_constructor<F>(mut self, params: Vec<ParamKind>, body: F) -> Self
    where
        F: Fn(&[ForeignValue]) -> Result<ForeignValue, HostFault> + Send + Sync + 'static,
    {
        self.constructor = Some(NativeFunction::new(&self.type_name, params, body));
        self
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn into_value(self) -> ForeignValue {
        ForeignValue::object(self)
    }
}

impl ForeignObject for HostObject {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        self.constructor.as_ref().map(|c| c as &dyn Callable)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Readable for HostObject {
    fn read_member(&self, name: &str) -> Result<Option<ForeignValue>, HostFault> {
        Ok(self.members.get(name).cloned())
    }
}

/// Host runtime whose classes are registered in memory per location
#[derive(Debug, Default)]
pub struct MemoryHost {
    builtins: RwLock<HashMap<String, ForeignValue>>,
    locations: RwLock<HashMap<PathBuf, HashMap<String, ForeignValue>>>,
    notified: Mutex<Vec<Location>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol visible without any search path entry
    pub fn define_builtin(&self, name: &str, value: ForeignValue) {
        self.builtins.write().insert(name.to_string(), value);
    }

    /// Register a symbol reachable only through `location`
    pub fn define(&self, location: &str, name: &str, value: ForeignValue) -> Result<(), ResolverError> {
        let location = Location::parse(location)?;
        self.locations
            .write()
            .entry(location.path().to_path_buf())
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Locations the resolver has announced, in announcement order
    pub fn notified_locations(&self) -> Vec<Location> {
        self.notified.lock().clone()
    }
}

impl HostRuntime for MemoryHost {
    fn find_default(&self, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
        Ok(self.builtins.read().get(name.as_str()).cloned())
    }

    fn find_in(&self, location: &Location, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
        Ok(self
            .locations
            .read()
            .get(location.path())
            .and_then(|classes| classes.get(name.as_str()))
            .cloned())
    }

    fn location_added(&self, location: &Location) -> Result<(), HostFault> {
        logger::host(&format!("registered location {}", location));
        self.notified.lock().push(location.clone());
        Ok(())
    }
}
