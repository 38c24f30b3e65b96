//! Python as the host object model
//!
//! Locations appended to the search path are mirrored into `sys.path`, in
//! the same order. A symbol `pkg.mod.Cls` resolves by importing `pkg.mod`
//! and reading its `Cls` attribute; a symbol without a namespace is looked up
//! in `builtins`. Member reads are `getattr` and execution is a positional
//! call whose arity comes from `inspect.signature`.
//!
//! Python ints, floats, strings, booleans and `None` cross as primitives;
//! everything else stays a Python object behind a [`PyObjectRef`].

use crate::errors::HostFault;
use crate::foreign::{Arity, Callable, ForeignObject, ForeignValue, HostRef, Readable};
use crate::resolver::{HostRuntime, Location, LocationKind, SymbolName};
use hostbridge_logger as logger;
use pyo3::exceptions::{PyAttributeError, PyModuleNotFoundError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyFloat, PyInt, PyModule, PyString, PyTuple};
use pyo3::IntoPyObjectExt;
use std::any::Any;
use std::fmt;
use std::path::PathBuf;

// inspect.Parameter kinds
const POSITIONAL_ONLY: i64 = 0;
const POSITIONAL_OR_KEYWORD: i64 = 1;
const VAR_POSITIONAL: i64 = 2;

impl From<PyErr> for HostFault {
    fn from(err: PyErr) -> Self {
        HostFault::Raised(format!("{}", err))
    }
}

/// A Python object held by the bridge
pub struct PyObjectRef {
    obj: Py<PyAny>,
    type_name: String,
    callable: bool,
}

impl PyObjectRef {
    fn new(obj: &Bound<'_, PyAny>) -> Self {
        let type_name = obj
            .get_type()
            .name()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "object".to_string());
        PyObjectRef {
            obj: obj.clone().unbind(),
            type_name,
            callable: obj.is_callable(),
        }
    }

    pub fn object(&self) -> &Py<PyAny> {
        &self.obj
    }
}

impl fmt::Debug for PyObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyObjectRef")
            .field("type_name", &self.type_name)
            .field("callable", &self.callable)
            .finish()
    }
}

impl ForeignObject for PyObjectRef {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_callable(&self) -> Option<&dyn Callable> {
        if self.callable {
            Some(self)
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn same_object(&self, other: &dyn ForeignObject) -> bool {
        other
            .as_any()
            .downcast_ref::<PyObjectRef>()
            .is_some_and(|o| o.obj.as_ptr() == self.obj.as_ptr())
    }
}

impl Readable for PyObjectRef {
    fn read_member(&self, name: &str) -> Result<Option<ForeignValue>, HostFault> {
        Python::attach(|py| match self.obj.bind(py).getattr(name) {
            Ok(value) => Ok(Some(to_foreign(&value))),
            Err(e) if e.is_instance_of::<PyAttributeError>(py) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }
}

impl Callable for PyObjectRef {
    fn arity(&self) -> Arity {
        Python::attach(|py| signature_arity(self.obj.bind(py)))
            .ok()
            .flatten()
            .unwrap_or(Arity::at_least(0))
    }

    fn call(&self, args: &[ForeignValue]) -> Result<ForeignValue, HostFault> {
        Python::attach(|py| {
            let converted = args
                .iter()
                .enumerate()
                .map(|(position, arg)| to_python(py, position, arg))
                .collect::<Result<Vec<_>, _>>()?;
            let tuple = PyTuple::new(py, converted)?;
            let result = self.obj.bind(py).call1(tuple)?;
            Ok(to_foreign(&result))
        })
    }
}

/// Positional arity from `inspect.signature`, `None` when Python has no signature
fn signature_arity(callable: &Bound<'_, PyAny>) -> PyResult<Option<Arity>> {
    let py = callable.py();
    let inspect = PyModule::import(py, "inspect")?;
    let Ok(signature) = inspect.call_method1("signature", (callable,)) else {
        return Ok(None);
    };
    let empty = inspect.getattr("Parameter")?.getattr("empty")?;

    let mut min = 0;
    let mut max = 0;
    let mut variadic = false;
    for param in signature.getattr("parameters")?.call_method0("values")?.try_iter()? {
        let param = param?;
        let kind: i64 = param.getattr("kind")?.extract()?;
        match kind {
            POSITIONAL_ONLY | POSITIONAL_OR_KEYWORD => {
                max += 1;
                if param.getattr("default")?.as_ptr() == empty.as_ptr() {
                    min += 1;
                }
            }
            VAR_POSITIONAL => variadic = true,
            _ => {}
        }
    }

    Ok(Some(if variadic {
        Arity::at_least(min)
    } else {
        Arity::range(min, max)
    }))
}

fn to_foreign(obj: &Bound<'_, PyAny>) -> ForeignValue {
    if obj.is_none() {
        return ForeignValue::Null;
    }
    if obj.is_instance_of::<PyBool>() {
        if let Ok(b) = obj.extract::<bool>() {
            return ForeignValue::Bool(b);
        }
    } else if obj.is_instance_of::<PyInt>() {
        // ints beyond i64 stay Python objects
        if let Ok(i) = obj.extract::<i64>() {
            return ForeignValue::Int(i);
        }
    } else if obj.is_instance_of::<PyFloat>() {
        if let Ok(x) = obj.extract::<f64>() {
            return ForeignValue::Float(x);
        }
    } else if obj.is_instance_of::<PyString>() {
        if let Ok(s) = obj.extract::<String>() {
            return ForeignValue::from(s);
        }
    }
    ForeignValue::Object(HostRef::new(PyObjectRef::new(obj)))
}

fn to_python<'py>(
    py: Python<'py>,
    position: usize,
    value: &ForeignValue,
) -> Result<Bound<'py, PyAny>, HostFault> {
    let converted = match value {
        ForeignValue::Null => Ok(py.None().into_bound(py)),
        ForeignValue::Bool(b) => b.into_bound_py_any(py),
        ForeignValue::Int(i) => i.into_bound_py_any(py),
        ForeignValue::Float(x) => x.into_bound_py_any(py),
        ForeignValue::Str(s) => (&**s).into_bound_py_any(py),
        ForeignValue::Object(host) => match host.downcast_ref::<PyObjectRef>() {
            Some(obj) => Ok(obj.object().bind(py).clone()),
            None => {
                return Err(HostFault::ArgumentType {
                    position,
                    expected: "Python object".to_string(),
                    found: host.type_name(),
                })
            }
        },
    };
    Ok(converted?)
}

fn import_symbol(py: Python<'_>, module: &str, attr: &str) -> Result<Option<ForeignValue>, HostFault> {
    let module = match PyModule::import(py, module) {
        Ok(module) => module,
        Err(e) if e.is_instance_of::<PyModuleNotFoundError>(py) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match module.getattr(attr) {
        Ok(value) => Ok(Some(to_foreign(&value))),
        Err(e) if e.is_instance_of::<PyAttributeError>(py) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Host runtime backed by the embedded Python interpreter
#[derive(Debug, Default)]
pub struct PythonHost;

impl PythonHost {
    pub fn new() -> Self {
        PythonHost
    }
}

impl HostRuntime for PythonHost {
    fn find_default(&self, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
        Python::attach(|py| match name.namespace() {
            None => import_symbol(py, "builtins", name.simple_name()),
            Some(module) => {
                let util = PyModule::import(py, "importlib.util")?;
                let spec = match util.call_method1("find_spec", (module,)) {
                    Ok(spec) => spec,
                    Err(e) if e.is_instance_of::<PyModuleNotFoundError>(py) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                if spec.is_none() {
                    return Ok(None);
                }
                import_symbol(py, module, name.simple_name())
            }
        })
    }

    fn find_in(&self, location: &Location, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
        let Some(module) = name.namespace() else {
            return Ok(None);
        };

        if location.kind() == LocationKind::Directory {
            let relative: PathBuf = module.split('.').collect();
            let base = location.path().join(&relative);
            let present = base.with_extension("py").is_file() || base.join("__init__.py").is_file();
            if !present {
                return Ok(None);
            }
        }

        Python::attach(|py| import_symbol(py, module, name.simple_name()))
    }

    fn location_added(&self, location: &Location) -> Result<(), HostFault> {
        Python::attach(|py| {
            let sys = PyModule::import(py, "sys")?;
            sys.getattr("path")?
                .call_method1("append", (location.to_string(),))?;
            Ok::<(), HostFault>(())
        })?;
        logger::host(&format!("Appended {} to sys.path", location));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::errors::{BridgeError, DispatchError};
    use hostbridge_config::Config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_stdlib_function_invoke2() {
        let bridge = Bridge::new(PythonHost::new());
        let pow = bridge.resolve_symbol("math.pow");
        assert!(pow.is_ok(), "{:?}", pow);
        let Ok(pow) = pow else {
            return;
        };
        let result = bridge.invoke2(&pow, ForeignValue::Int(2), ForeignValue::Int(3));
        assert_eq!(result, Ok(ForeignValue::Float(8.0)));
    }

    #[test]
    fn test_package_on_appended_location() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let pkg = dir.path().join("hb_pkg_scenario");
        assert!(fs::create_dir_all(&pkg).is_ok());
        assert!(fs::write(
            pkg.join("__init__.py"),
            "class Foo:\n    bar = 42\n\n    @staticmethod\n    def add(a, b):\n        return a + b\n\n    @staticmethod\n    def neg(a):\n        return -a\n",
        )
        .is_ok());

        let bridge = Bridge::new(PythonHost::new());
        assert!(bridge.resolve_symbol("hb_pkg_scenario.Foo").is_err());
        assert!(bridge
            .extend_search_path(&dir.path().to_string_lossy())
            .is_ok());

        let foo = bridge.resolve_symbol("hb_pkg_scenario.Foo");
        assert!(foo.is_ok(), "{:?}", foo);
        let Ok(foo) = foo else {
            return;
        };
        assert_eq!(bridge.read_member(&foo, "bar"), Ok(ForeignValue::Int(42)));
        assert_eq!(bridge.resolve_symbol("hb_pkg_scenario.Foo"), Ok(foo.clone()));

        let add = bridge.read_member(&foo, "add");
        assert!(add.is_ok(), "{:?}", add);
        let Ok(add) = add else {
            return;
        };
        assert_eq!(
            bridge.invoke2(&add, ForeignValue::Int(1), ForeignValue::Int(2)),
            Ok(ForeignValue::Int(3))
        );

        let neg = bridge.read_member(&foo, "neg");
        assert!(neg.is_ok(), "{:?}", neg);
        let Ok(neg) = neg else {
            return;
        };
        assert!(matches!(
            bridge.invoke2(&neg, ForeignValue::Int(1), ForeignValue::Int(2)),
            Err(BridgeError::Dispatch(DispatchError::ArityMismatch { .. }))
        ));
    }

    #[test]
    fn test_configured_default_location_is_importable() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        assert!(fs::write(
            dir.path().join("hb_site_defaults.py"),
            "class Widget:\n    size = 3\n",
        )
        .is_ok());

        let config = Config {
            search_path: vec![dir.path().to_string_lossy().into_owned()],
            ..Config::default()
        };
        let bridge = Bridge::from_config(PythonHost::new(), &config);
        assert!(bridge.is_ok());
        let Ok(bridge) = bridge else {
            return;
        };
        assert!(bridge.resolver().search_path().is_empty());

        let widget = bridge.resolve_symbol("hb_site_defaults.Widget");
        assert!(widget.is_ok(), "{:?}", widget);
        let Ok(widget) = widget else {
            return;
        };
        assert_eq!(bridge.read_member(&widget, "size"), Ok(ForeignValue::Int(3)));
    }
}
