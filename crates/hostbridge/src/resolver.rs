//! Search path state and symbol resolution
//!
//! The search path is append-only. Resolution consults the host's implicit
//! defaults, then the configured default locations, then the search path in
//! append order; the first location that yields a value wins. Nothing is
//! cached here, so a lookup always sees locations appended before it.

use crate::errors::{contain, HostFault, ResolverError};
use crate::foreign::ForeignValue;
use parking_lot::RwLock;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip", "whl", "egg"];

/// How a location stores its classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Directory,
    Archive,
}

/// A validated, absolute search location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    path: PathBuf,
    kind: LocationKind,
}

impl Location {
    /// Validate a location descriptor coming from the interpreter
    ///
    /// The location does not have to exist yet.
    pub fn parse(descriptor: &str) -> Result<Self, ResolverError> {
        if descriptor.trim().is_empty() {
            return Err(invalid(descriptor, "location is empty"));
        }
        if descriptor.contains('\0') {
            return Err(invalid(descriptor, "location contains a NUL byte"));
        }
        Self::from_path(Path::new(descriptor))
    }

    /// Build a location from a path, anchoring relative paths at the working directory
    pub fn from_path(path: &Path) -> Result<Self, ResolverError> {
        let descriptor = path.to_string_lossy();
        if path.as_os_str().is_empty() {
            return Err(invalid(&descriptor, "location is empty"));
        }

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|e| {
                invalid(
                    &descriptor,
                    &format!("cannot resolve relative location: {}", e),
                )
            })?;
            cwd.join(path)
        };

        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                // `..` at the root stays at the root
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other),
            }
        }

        let kind = match normalized.extension().and_then(|e| e.to_str()) {
            Some(ext) if ARCHIVE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
                LocationKind::Archive
            }
            _ => LocationKind::Directory,
        };

        Ok(Location {
            path: normalized,
            kind,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn invalid(descriptor: &str, reason: &str) -> ResolverError {
    ResolverError::InvalidLocation {
        descriptor: descriptor.to_string(),
        reason: reason.to_string(),
    }
}

/// A fully-qualified, dot-separated class or namespace name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolName(String);

impl SymbolName {
    /// `None` for blank names and names with an empty segment (`a..b`, `.a`)
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() || name.split('.').any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
            return None;
        }
        Some(SymbolName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Enclosing namespace, if any (`pkg` for `pkg.Foo`)
    pub fn namespace(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(ns, _)| ns)
    }

    /// Last segment (`Foo` for `pkg.Foo`)
    pub fn simple_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Path of the symbol relative to a location root (`pkg/Foo`)
    pub fn relative_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for SymbolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The foreign runtime's class-loading mechanism
///
/// Implementations must not call back into the resolver that owns them.
pub trait HostRuntime: Send + Sync {
    /// Look a symbol up in the host's own implicit locations
    fn find_default(&self, _name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
        Ok(None)
    }

    /// Look a symbol up in one location; `Ok(None)` when it is not there
    fn find_in(&self, location: &Location, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault>;

    /// Called once for each location appended to the search path, in append order
    fn location_added(&self, _location: &Location) -> Result<(), HostFault> {
        Ok(())
    }
}

impl<H: HostRuntime + ?Sized> HostRuntime for Arc<H> {
    fn find_default(&self, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
        (**self).find_default(name)
    }

    fn find_in(&self, location: &Location, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
        (**self).find_in(location, name)
    }

    fn location_added(&self, location: &Location) -> Result<(), HostFault> {
        (**self).location_added(location)
    }
}

/// Immutable snapshot of the search path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Arc<Vec<Location>>,
}

impl SearchPath {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.entries.contains(location)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a SearchPath {
    type Item = &'a Location;
    type IntoIter = std::slice::Iter<'a, Location>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owns the search path and answers symbol lookups against it
pub struct Resolver<H> {
    host: H,
    defaults: Vec<Location>,
    search_path: RwLock<SearchPath>,
}

impl<H: HostRuntime> Resolver<H> {
    /// Resolver with an empty search path and no configured defaults
    pub fn new(host: H) -> Self {
        Resolver {
            host,
            defaults: Vec::new(),
            search_path: RwLock::new(SearchPath::default()),
        }
    }

    /// Resolver whose default locations are searched before the search path
    ///
    /// The host is told about every default location, in order, before the
    /// resolver is handed out.
    pub fn with_defaults(host: H, defaults: Vec<Location>) -> Result<Self, ResolverError> {
        for location in &defaults {
            notify(&host, location)?;
        }
        debug!(count = defaults.len(), "default locations registered");
        Ok(Resolver {
            defaults,
            ..Self::new(host)
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn defaults(&self) -> &[Location] {
        &self.defaults
    }

    /// Snapshot of the current search path
    pub fn search_path(&self) -> SearchPath {
        self.search_path.read().clone()
    }

    /// Validate `descriptor` and append it to the search path
    pub fn extend_search_path(&self, descriptor: &str) -> Result<(), ResolverError> {
        let location = Location::parse(descriptor)?;
        self.append(location)
    }

    /// Append an already validated location
    ///
    /// Appending a location that is already present leaves the path unchanged.
    /// The location only lands on the path once the host has accepted it, so
    /// a failed append can be retried.
    pub fn append(&self, location: Location) -> Result<(), ResolverError> {
        let mut search_path = self.search_path.write();
        if search_path.contains(&location) {
            debug!(%location, "location already on search path");
            return Ok(());
        }

        // Notify under the write lock so the host sees appends in path order
        notify(&self.host, &location)?;
        Arc::make_mut(&mut search_path.entries).push(location);
        debug!(entries = search_path.len(), "search path extended");
        Ok(())
    }

    /// Resolve `name` against the defaults and the current search path
    pub fn resolve_symbol(&self, name: &str) -> Result<ForeignValue, ResolverError> {
        let Some(symbol) = SymbolName::parse(name) else {
            debug!(name, "malformed symbol name");
            return Err(ResolverError::SymbolNotFound(name.to_string()));
        };

        let found = contain(|| self.host.find_default(&symbol))
            .map_err(|fault| load_failed(&symbol, "host defaults", &fault))?;
        if let Some(value) = found {
            trace!(%symbol, "resolved from host defaults");
            return Ok(value);
        }

        let snapshot = self.search_path();
        for location in self.defaults.iter().chain(snapshot.iter()) {
            let found = contain(|| self.host.find_in(location, &symbol))
                .map_err(|fault| load_failed(&symbol, &location.to_string(), &fault))?;
            if let Some(value) = found {
                trace!(%symbol, %location, "resolved");
                return Ok(value);
            }
        }

        debug!(
            %symbol,
            searched = self.defaults.len() + snapshot.len(),
            "symbol not found"
        );
        Err(ResolverError::SymbolNotFound(symbol.to_string()))
    }
}

fn notify<H: HostRuntime>(host: &H, location: &Location) -> Result<(), ResolverError> {
    contain(|| host.location_added(location)).map_err(|fault| {
        debug!(%location, error = %fault, "host rejected location");
        ResolverError::LoadFailed {
            name: "(search path registration)".to_string(),
            location: location.to_string(),
            message: fault.to_string(),
        }
    })
}

fn load_failed(symbol: &SymbolName, location: &str, fault: &HostFault) -> ResolverError {
    debug!(%symbol, location, error = %fault, "host failed to load symbol");
    ResolverError::LoadFailed {
        name: symbol.to_string(),
        location: location.to_string(),
        message: fault.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HostObject, MemoryHost};
    use parking_lot::Mutex;

    /// Memory host that fails at chosen points
    #[derive(Debug, Default)]
    struct FaultyHost {
        inner: MemoryHost,
        failing_location: Option<PathBuf>,
        panicking_location: Option<PathBuf>,
        failing_defaults: bool,
        rejections_left: Mutex<usize>,
        registrations_attempted: Mutex<usize>,
    }

    impl HostRuntime for FaultyHost {
        fn find_default(&self, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
            if self.failing_defaults {
                return Err(HostFault::Raised("defaults unavailable".to_string()));
            }
            self.inner.find_default(name)
        }

        fn find_in(&self, location: &Location, name: &SymbolName) -> Result<Option<ForeignValue>, HostFault> {
            if self.failing_location.as_deref() == Some(location.path()) {
                return Err(HostFault::Raised("corrupt archive".to_string()));
            }
            if self.panicking_location.as_deref() == Some(location.path()) {
                panic!("class reader crashed");
            }
            self.inner.find_in(location, name)
        }

        fn location_added(&self, location: &Location) -> Result<(), HostFault> {
            *self.registrations_attempted.lock() += 1;
            let mut left = self.rejections_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(HostFault::Raised("transient".to_string()));
            }
            self.inner.location_added(location)
        }
    }

    fn class(name: &str, origin: &str) -> ForeignValue {
        HostObject::new(name).with_member("origin", origin).into_value()
    }

    fn origin_of(value: &ForeignValue) -> Option<String> {
        let readable = value.as_object()?.object().as_readable()?;
        let origin = readable.read_member("origin").ok()??;
        origin.as_str().map(str::to_string)
    }

    #[test]
    fn test_location_parse_rejects_malformed() {
        assert!(matches!(
            Location::parse(""),
            Err(ResolverError::InvalidLocation { .. })
        ));
        assert!(matches!(
            Location::parse("   "),
            Err(ResolverError::InvalidLocation { .. })
        ));
        assert!(matches!(
            Location::parse("/libs\0/x"),
            Err(ResolverError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn test_location_kind_and_normalization() {
        let dir = Location::parse("/libs/./classes");
        assert!(dir.is_ok_and(|l| l.path() == Path::new("/libs/classes")
            && l.kind() == LocationKind::Directory));

        let parent = Location::parse("/libs/classes/../vendor/..");
        assert!(parent.is_ok_and(|l| l.path() == Path::new("/libs")));

        let above_root = Location::parse("/../libs");
        assert!(above_root.is_ok_and(|l| l.path() == Path::new("/libs")));

        let archive = Location::parse("/libs/vendor.JAR");
        assert!(archive.is_ok_and(|l| l.kind() == LocationKind::Archive));
    }

    #[test]
    fn test_relative_location_is_anchored() {
        let location = Location::parse("vendor/lib");
        assert!(location.is_ok_and(|l| l.path().is_absolute() && l.path().ends_with("vendor/lib")));
    }

    #[test]
    fn test_symbol_name_parse() {
        assert!(SymbolName::parse("").is_none());
        assert!(SymbolName::parse("pkg..Foo").is_none());
        assert!(SymbolName::parse(".Foo").is_none());
        assert!(SymbolName::parse("pkg.Foo.").is_none());

        let symbol = SymbolName::parse("org.pkg.Foo");
        assert!(symbol.is_some());
        let Some(symbol) = symbol else {
            return;
        };
        assert_eq!(symbol.namespace(), Some("org.pkg"));
        assert_eq!(symbol.simple_name(), "Foo");
        assert_eq!(symbol.relative_path(), PathBuf::from("org/pkg/Foo"));
    }

    #[test]
    fn test_empty_search_path_resolution_fails() {
        let resolver = Resolver::new(MemoryHost::new());
        assert_eq!(
            resolver.resolve_symbol("does.not.Exist"),
            Err(ResolverError::SymbolNotFound("does.not.Exist".to_string()))
        );
    }

    #[test]
    fn test_append_makes_symbol_reachable() {
        let host = Arc::new(MemoryHost::new());
        assert!(host.define("/libs", "pkg.Foo", class("pkg.Foo", "libs")).is_ok());
        let resolver = Resolver::new(Arc::clone(&host));

        assert!(resolver.resolve_symbol("pkg.Foo").is_err());
        assert!(resolver.extend_search_path("/libs").is_ok());
        assert!(resolver.resolve_symbol("pkg.Foo").is_ok());
    }

    #[test]
    fn test_earliest_location_wins() {
        let host = Arc::new(MemoryHost::new());
        assert!(host.define("/first", "pkg.Foo", class("pkg.Foo", "first")).is_ok());
        assert!(host.define("/second", "pkg.Foo", class("pkg.Foo", "second")).is_ok());
        let resolver = Resolver::new(Arc::clone(&host));

        assert!(resolver.extend_search_path("/first").is_ok());
        assert!(resolver.extend_search_path("/second").is_ok());

        let resolved = resolver.resolve_symbol("pkg.Foo");
        assert_eq!(resolved.ok().as_ref().and_then(origin_of), Some("first".to_string()));
    }

    #[test]
    fn test_defaults_searched_before_search_path() {
        let host = Arc::new(MemoryHost::new());
        assert!(host.define("/site", "pkg.Foo", class("pkg.Foo", "site")).is_ok());
        assert!(host.define("/libs", "pkg.Foo", class("pkg.Foo", "libs")).is_ok());
        let Ok(site) = Location::parse("/site") else {
            return;
        };
        let resolver = Resolver::with_defaults(Arc::clone(&host), vec![site]);
        assert!(resolver.is_ok());
        let Ok(resolver) = resolver else {
            return;
        };
        assert!(resolver.extend_search_path("/libs").is_ok());

        let resolved = resolver.resolve_symbol("pkg.Foo");
        assert_eq!(resolved.ok().as_ref().and_then(origin_of), Some("site".to_string()));
        assert_eq!(resolver.search_path().len(), 1);
    }

    #[test]
    fn test_duplicate_append_is_noop() {
        let host = Arc::new(MemoryHost::new());
        let resolver = Resolver::new(Arc::clone(&host));
        assert!(resolver.extend_search_path("/a").is_ok());
        assert!(resolver.extend_search_path("/b").is_ok());
        assert!(resolver.extend_search_path("/a/.").is_ok());

        let paths: Vec<PathBuf> = resolver
            .search_path()
            .iter()
            .map(|l| l.path().to_path_buf())
            .collect();
        assert_eq!(paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(host.notified_locations().len(), 2);
    }

    #[test]
    fn test_invalid_location_leaves_path_unchanged() {
        let resolver = Resolver::new(MemoryHost::new());
        assert!(resolver.extend_search_path("").is_err());
        assert!(resolver.search_path().is_empty());
    }

    #[test]
    fn test_parent_components_do_not_duplicate_entries() {
        let resolver = Resolver::new(MemoryHost::new());
        assert!(resolver.extend_search_path("/a").is_ok());
        assert!(resolver.extend_search_path("/a/b/..").is_ok());
        assert_eq!(resolver.search_path().len(), 1);
        assert_eq!(resolver.host().notified_locations().len(), 1);
    }

    #[test]
    fn test_failed_registration_can_be_retried() {
        let host = FaultyHost {
            rejections_left: Mutex::new(1),
            ..FaultyHost::default()
        };
        assert!(host.inner.define("/libs", "pkg.Foo", class("pkg.Foo", "libs")).is_ok());
        let resolver = Resolver::new(host);

        assert!(matches!(
            resolver.extend_search_path("/libs"),
            Err(ResolverError::LoadFailed { .. })
        ));
        assert!(resolver.search_path().is_empty());

        assert!(resolver.extend_search_path("/libs").is_ok());
        assert_eq!(*resolver.host().registrations_attempted.lock(), 2);
        assert_eq!(resolver.host().inner.notified_locations().len(), 1);
        assert!(resolver.resolve_symbol("pkg.Foo").is_ok());
    }

    #[test]
    fn test_defaults_are_registered_with_host() {
        let host = Arc::new(MemoryHost::new());
        let Ok(site) = Location::parse("/site") else {
            return;
        };
        let resolver = Resolver::with_defaults(Arc::clone(&host), vec![site.clone()]);
        assert!(resolver.is_ok_and(|r| r.defaults().len() == 1 && r.search_path().is_empty()));
        assert_eq!(host.notified_locations(), vec![site]);
    }

    #[test]
    fn test_rejected_default_fails_construction() {
        let host = FaultyHost {
            rejections_left: Mutex::new(1),
            ..FaultyHost::default()
        };
        let Ok(site) = Location::parse("/site") else {
            return;
        };
        assert!(matches!(
            Resolver::with_defaults(host, vec![site]),
            Err(ResolverError::LoadFailed { location, .. }) if location == "/site"
        ));
    }

    #[test]
    fn test_host_fault_stops_search() {
        let host = FaultyHost {
            failing_location: Some(PathBuf::from("/broken")),
            ..FaultyHost::default()
        };
        assert!(host.inner.define("/libs", "pkg.Foo", class("pkg.Foo", "libs")).is_ok());
        let resolver = Resolver::new(host);
        assert!(resolver.extend_search_path("/broken").is_ok());
        assert!(resolver.extend_search_path("/libs").is_ok());

        assert_eq!(
            resolver.resolve_symbol("pkg.Foo"),
            Err(ResolverError::LoadFailed {
                name: "pkg.Foo".to_string(),
                location: "/broken".to_string(),
                message: "corrupt archive".to_string(),
            })
        );
    }

    #[test]
    fn test_panicking_lookup_is_contained() {
        let host = FaultyHost {
            panicking_location: Some(PathBuf::from("/crash")),
            ..FaultyHost::default()
        };
        let resolver = Resolver::new(host);
        assert!(resolver.extend_search_path("/crash").is_ok());

        assert!(matches!(
            resolver.resolve_symbol("pkg.Foo"),
            Err(ResolverError::LoadFailed { location, message, .. })
                if location == "/crash" && message.contains("class reader crashed")
        ));
    }

    #[test]
    fn test_default_lookup_fault_is_reported() {
        let host = FaultyHost {
            failing_defaults: true,
            ..FaultyHost::default()
        };
        let resolver = Resolver::new(host);
        assert!(matches!(
            resolver.resolve_symbol("pkg.Foo"),
            Err(ResolverError::LoadFailed { location, .. }) if location == "host defaults"
        ));
    }
}
