//! Process-wide logging for the bridge and its host backends
//!
//! Every record is appended to the log file when one is configured. Records
//! are echoed to stderr when the verbosity admits their level, unless echo
//! is switched off. File lines look like
//! `[2026-01-01 12:00:00] [HOST] [Host.lookup_class] DEBUG message`.

use colored::Colorize;
use std::cell::RefCell;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_FILE_NAME: &str = "hostbridge.log";

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
static VERBOSITY: Mutex<u8> = Mutex::new(0);
static NO_STDERR: Mutex<bool> = Mutex::new(false);

thread_local! {
    static CURRENT_OPERATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Severity of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    /// Lowest verbosity at which records of this level reach stderr
    fn echo_threshold(self) -> u8 {
        match self {
            Level::Error | Level::Warn => 0,
            Level::Info | Level::Debug => 1,
            Level::Trace => 2,
        }
    }

    /// Most detailed level admitted by a verbosity (0 = warn, 1 = debug, 2+ = trace)
    pub fn for_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => Level::Warn,
            1 => Level::Debug,
            _ => Level::Trace,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which side of the bridge produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Bridge,
    Host,
}

impl Source {
    fn tag(self) -> &'static str {
        match self {
            Source::Bridge => "BRIDGE",
            Source::Host => "HOST",
        }
    }
}

fn read<T: Clone>(slot: &Mutex<T>, fallback: T) -> T {
    slot.lock().map(|guard| guard.clone()).unwrap_or(fallback)
}

fn store<T>(slot: &Mutex<T>, value: T) {
    if let Ok(mut guard) = slot.lock() {
        *guard = value;
    }
}

pub fn get_verbosity() -> u8 {
    read(&VERBOSITY, 0)
}

pub fn set_verbosity(verbosity: u8) {
    store(&VERBOSITY, verbosity);
}

pub fn get_no_stderr() -> bool {
    read(&NO_STDERR, false)
}

pub fn set_no_stderr(disabled: bool) {
    store(&NO_STDERR, disabled);
}

/// Name of the builtin running on this thread, stamped onto file records
pub fn get_current_operation() -> Option<String> {
    CURRENT_OPERATION.with(|current| current.borrow().clone())
}

/// Set the builtin running on this thread; other threads are unaffected
pub fn set_current_operation(operation: Option<String>) {
    CURRENT_OPERATION.with(|current| *current.borrow_mut() = operation);
}

/// Log into `<config dir>/hostbridge/hostbridge.log`
pub fn init_with_verbosity(verbosity: u8, no_stderr: bool) -> Result<(), String> {
    init_with_log_file(&default_log_dir()?.join(LOG_FILE_NAME), verbosity, no_stderr)
}

/// Log into `log_file`, replacing whatever a previous process left there
pub fn init_with_log_file(log_file: &Path, verbosity: u8, no_stderr: bool) -> Result<(), String> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create log directory {}: {}", parent.display(), e))?;
    }
    match fs::remove_file(log_file) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            return Err(format!("Failed to reset log file {}: {}", log_file.display(), e));
        }
        _ => {}
    }

    set_verbosity(verbosity);
    set_no_stderr(no_stderr);
    let mut slot = LOG_FILE
        .lock()
        .map_err(|_| "Log file lock poisoned".to_string())?;
    *slot = Some(log_file.to_path_buf());
    Ok(())
}

fn default_log_dir() -> Result<PathBuf, String> {
    let base = if cfg!(target_os = "windows") {
        dirs::config_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".config"))
    };
    base.map(|dir| dir.join("hostbridge"))
        .ok_or_else(|| "Could not determine a configuration directory".to_string())
}

fn append_to_file(source: Source, level: Level, message: &str) {
    let Some(path) = get_log_path() else {
        return;
    };
    let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let mut line = format!(
        "[{}] [{}]",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        source.tag()
    );
    if let Some(operation) = get_current_operation() {
        line.push_str(&format!(" [{}]", operation));
    }
    // write failures are dropped
    let _ = writeln!(file, "{} {} {}", line, level, message);
}

fn echo(source: Source, level: Level, message: &str) {
    if get_no_stderr() || get_verbosity() < level.echo_threshold() {
        return;
    }
    let prefix = match (source, level) {
        (Source::Host, _) => "host:".cyan().bold(),
        (_, Level::Error) => "error:".red().bold(),
        (_, Level::Warn) => "warning:".yellow().bold(),
        (_, Level::Info) => "info:".normal(),
        (_, Level::Debug) => "debug:".blue().bold(),
        (_, Level::Trace) => "trace:".dimmed(),
    };
    eprintln!("{} {}", prefix, message);
}

/// Record one message
pub fn log(source: Source, level: Level, message: &str) {
    append_to_file(source, level, message);
    echo(source, level, message);
}

pub fn error(message: &str) {
    log(Source::Bridge, Level::Error, message);
}

pub fn warn(message: &str) {
    log(Source::Bridge, Level::Warn, message);
}

pub fn info(message: &str) {
    log(Source::Bridge, Level::Info, message);
}

pub fn debug(message: &str) {
    log(Source::Bridge, Level::Debug, message);
}

pub fn trace(message: &str) {
    log(Source::Bridge, Level::Trace, message);
}

/// Record a message on behalf of the host runtime
pub fn host(message: &str) {
    log(Source::Host, Level::Debug, message);
}

pub fn get_log_path() -> Option<PathBuf> {
    read(&LOG_FILE, None)
}

/// Where records go, or would go once logging is initialized
pub fn show_log_path() {
    match get_log_path().map_or_else(|| default_log_dir().map(|d| d.join(LOG_FILE_NAME)), Ok) {
        Ok(path) => eprintln!("Log file: {}", path.display()),
        Err(_) => eprintln!("Log file location not available"),
    }
}
