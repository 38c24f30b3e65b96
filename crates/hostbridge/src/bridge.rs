//! Bridge operations exposed to the interpreter
//!
//! Four builtins, each a thin composition of the resolver and the
//! dispatcher:
//!
//! | Builtin                  | Parameters                  | Result                |
//! |--------------------------|-----------------------------|-----------------------|
//! | `Host.lookup_class`      | `this`, `name`              | resolved host class   |
//! | `Host.add_to_class_path` | `this`, `path`              | unit                  |
//! | `Host.get_member`        | `this`, `obj`, `name`       | member value          |
//! | `Host.execute2`          | `this`, `obj`, `arg1`, `arg2` | call result         |
//!
//! The interpreter state token travels through [`Bridge::call`] untouched and
//! every failure comes back as a [`BridgeError`] next to it.

use crate::dispatch::Dispatcher;
use crate::errors::BridgeError;
use crate::foreign::ForeignValue;
use crate::resolver::{HostRuntime, Location, Resolver};
use crate::value::Value;
use hostbridge_config::{Config, LoggingConfig};
use hostbridge_logger as logger;

/// The interpreter-visible entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    LookupClass,
    AddToClassPath,
    GetMember,
    Execute2,
}

impl Builtin {
    pub const ALL: [Builtin; 4] = [
        Builtin::LookupClass,
        Builtin::AddToClassPath,
        Builtin::GetMember,
        Builtin::Execute2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::LookupClass => "Host.lookup_class",
            Builtin::AddToClassPath => "Host.add_to_class_path",
            Builtin::GetMember => "Host.get_member",
            Builtin::Execute2 => "Host.execute2",
        }
    }

    /// Positional parameter names; the first is always the unused receiver
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            Builtin::LookupClass => &["this", "name"],
            Builtin::AddToClassPath => &["this", "path"],
            Builtin::GetMember => &["this", "obj", "name"],
            Builtin::Execute2 => &["this", "obj", "arg1", "arg2"],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// Arguments of one builtin call as the interpreter passes them
#[derive(Debug, Clone)]
pub struct Arguments<S> {
    pub state: S,
    pub positional: Vec<Value>,
}

impl<S> Arguments<S> {
    pub fn new(state: S, positional: Vec<Value>) -> Self {
        Arguments { state, positional }
    }
}

/// Result of one builtin call, paired with the unchanged state token
#[derive(Debug, Clone)]
pub struct Stateful<S> {
    pub state: S,
    pub result: Result<Value, BridgeError>,
}

impl<S> Stateful<S> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<Value, BridgeError> {
        self.result
    }
}

/// The bridge between the interpreter and one host runtime
pub struct Bridge<H> {
    resolver: Resolver<H>,
    dispatcher: Dispatcher,
}

impl<H: HostRuntime> Bridge<H> {
    /// Bridge with an empty search path
    pub fn new(host: H) -> Self {
        Self::with_resolver(Resolver::new(host))
    }

    pub fn with_resolver(resolver: Resolver<H>) -> Self {
        Bridge {
            resolver,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Bridge whose default locations come from configuration
    ///
    /// Each default location is registered with the host before the bridge
    /// is returned.
    pub fn from_config(host: H, config: &Config) -> Result<Self, BridgeError> {
        let defaults = config
            .default_locations()
            .iter()
            .map(|descriptor| Location::parse(descriptor))
            .collect::<Result<Vec<_>, _>>()?;
        logger::debug(&format!(
            "Configured {} default location(s)",
            defaults.len()
        ));
        Ok(Self::with_resolver(Resolver::with_defaults(host, defaults)?))
    }

    /// Bridge configured from `$HOSTBRIDGE_CONFIG` or the user config file
    pub fn from_user_config(host: H) -> Result<Self, BridgeError> {
        let config = Config::load()?;
        init_logging(&config.logging)?;
        Self::from_config(host, &config)
    }

    pub fn resolver(&self) -> &Resolver<H> {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Resolve a fully-qualified class name against the current search path
    pub fn resolve_symbol(&self, name: &str) -> Result<ForeignValue, BridgeError> {
        Ok(self.resolver.resolve_symbol(name)?)
    }

    /// Append a location to the search path
    pub fn extend_search_path(&self, location: &str) -> Result<(), BridgeError> {
        Ok(self.resolver.extend_search_path(location)?)
    }

    /// Read a named member off a host value
    pub fn read_member(&self, obj: &ForeignValue, name: &str) -> Result<ForeignValue, BridgeError> {
        Ok(self.dispatcher.read_member(obj, name)?)
    }

    /// Execute a host callable with exactly two arguments
    pub fn invoke2(
        &self,
        obj: &ForeignValue,
        arg1: ForeignValue,
        arg2: ForeignValue,
    ) -> Result<ForeignValue, BridgeError> {
        Ok(self.dispatcher.execute(obj, &[arg1, arg2])?)
    }

    /// Run a builtin with interpreter-level arguments
    pub fn call<S>(&self, builtin: Builtin, args: Arguments<S>) -> Stateful<S> {
        let Arguments { state, positional } = args;

        logger::set_current_operation(Some(builtin.name().to_string()));
        let result = self.run(builtin, &positional);
        match &result {
            Ok(value) => logger::trace(&format!("{} returned {}", builtin.name(), value.kind())),
            Err(e) => logger::debug(&format!("{} failed: {}", builtin.name(), e)),
        }
        logger::set_current_operation(None);

        Stateful { state, result }
    }

    fn run(&self, builtin: Builtin, positional: &[Value]) -> Result<Value, BridgeError> {
        let expected = builtin.parameters().len();
        if positional.len() != expected {
            return Err(BridgeError::ArgumentCount {
                builtin: builtin.name(),
                expected,
                found: positional.len(),
            });
        }

        match builtin {
            Builtin::LookupClass => {
                let name = text_arg(builtin, positional, 1)?;
                self.resolve_symbol(name).map(Value::from)
            }
            Builtin::AddToClassPath => {
                let path = text_arg(builtin, positional, 1)?;
                self.extend_search_path(path)?;
                Ok(Value::Unit)
            }
            Builtin::GetMember => {
                let obj = foreign_arg(positional, 1);
                let name = text_arg(builtin, positional, 2)?;
                self.read_member(&obj, name).map(Value::from)
            }
            Builtin::Execute2 => {
                let obj = foreign_arg(positional, 1);
                let arg1 = foreign_arg(positional, 2);
                let arg2 = foreign_arg(positional, 3);
                self.invoke2(&obj, arg1, arg2).map(Value::from)
            }
        }
    }
}

/// Point the process-wide logger at the configured file and verbosity
pub fn init_logging(logging: &LoggingConfig) -> Result<(), BridgeError> {
    match &logging.file {
        Some(file) => logger::init_with_log_file(file, logging.verbosity, logging.no_stderr),
        None => logger::init_with_verbosity(logging.verbosity, logging.no_stderr),
    }
    .map_err(BridgeError::Config)
}

fn text_arg<'a>(builtin: Builtin, positional: &'a [Value], index: usize) -> Result<&'a str, BridgeError> {
    match positional.get(index) {
        Some(Value::Text(text)) => Ok(text.as_str()),
        other => Err(BridgeError::ArgumentType {
            builtin: builtin.name(),
            parameter: builtin.parameters().get(index).copied().unwrap_or("?"),
            expected: "text",
            found: other.map_or("nothing", Value::kind).to_string(),
        }),
    }
}

fn foreign_arg(positional: &[Value], index: usize) -> ForeignValue {
    positional
        .get(index)
        .map_or(ForeignValue::Null, Value::to_foreign)
}
