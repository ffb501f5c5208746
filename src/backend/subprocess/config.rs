//! Configuration constants for the subprocess backend

/// Default maximum buffer size for one JSON message (1MB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Maximum number of stderr bytes kept for error reports
pub const MAX_STDERR_CAPTURE: usize = 8 * 1024;

/// Dangerous environment variables that should not be passed to subprocess
///
/// These variables can affect how the subprocess loads and executes code,
/// potentially creating security vulnerabilities.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

