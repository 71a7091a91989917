//! File sink and the strategies that open its file.
//!
//! A [`FileSink`] asks its [`FileStrategy`] for a file whenever it (re)opens.
//! [`RotationStrategy`] rotates the main file first if it is due, then opens
//! it; [`PlainFileStrategy`] just opens it.

use {
    crate::{
        config::{RotationConfig, RotationSize, DEFAULT_FORMAT},
        engine::{RotationEngine, RotationOutcome, RotationReport},
        fs::{FileSystem, RealFileSystem},
        RotationError,
    },
    std::{
        fmt,
        fs,
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::{PoisonError, RwLock},
    },
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Minimum severity a sink accepts. Interpreted by the logging core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Which kind of records a sink accepts. Interpreted by the logging core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    Normal,
    Special,
    All,
}

/// Sink attributes owned by the logging core and carried as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SinkSettings {
    severity: Severity,
    log_type: LogType,
    format: String,
    file_mode: Option<u32>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        SinkSettings {
            severity: Severity::Trace,
            log_type: LogType::All,
            format: DEFAULT_FORMAT.to_string(),
            file_mode: None,
        }
    }
}

/// How a [`FileSink`] gets its file.
pub trait FileStrategy: Send + Sync {
    /// Path of the file the sink writes to.
    fn filename(&self) -> &Path;

    fn severity(&self) -> Severity;

    fn log_type(&self) -> LogType;

    /// Record template, opaque to the sink.
    fn format(&self) -> &str;

    /// Open for append rather than truncate.
    fn append(&self) -> bool {
        true
    }

    /// Unix permissions for the opened file.
    fn file_mode(&self) -> Option<u32> {
        None
    }

    /// Called right before the file is opened; runs to completion first.
    fn prepare_for_write(&self) -> RotationReport;

    /// Open the file as it is, creating it and its directory if needed.
    fn open_file(&self) -> Result<fs::File, RotationError> {
        open_log_file(self.filename(), self.append(), self.file_mode())
    }

    /// Prepare, then open the file.
    /// # Returns
    /// The opened file and the report of the preparation.
    fn open(&self) -> Result<(fs::File, RotationReport), RotationError> {
        let report = self.prepare_for_write();
        let file = self.open_file()?;
        Ok((file, report))
    }
}

/// Open a log file for writing.
///
/// If the file cannot be opened, its parent directory is created and the
/// open retried. Permissions are applied to the opened file when a mode is
/// given.
/// # Arguments
/// * `log_path` - The path to the log file.
/// * `append` - Append to an existing file instead of truncating it.
/// * `file_mode` - Optional Unix permissions, e.g. `0o644`.
/// # Returns
/// The log file.
fn open_log_file(log_path: &Path, append: bool, file_mode: Option<u32>) -> Result<fs::File, RotationError> {
    let mut open_options = fs::OpenOptions::new();
    open_options.write(true).create(true);
    if append {
        open_options.append(true);
    } else {
        open_options.truncate(true);
    }

    let mut open_res = open_options.open(log_path);
    if open_res.is_err() {
        if let Some(parent) = log_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| RotationError::CreateDirectoryFailed(parent.to_path_buf(), err.to_string()))?;
            open_res = open_options.open(log_path);
        }
    }
    let log_file = open_res.map_err(|err| RotationError::CreateFileFailed(log_path.to_path_buf(), err.to_string()))?;

    if let Some(mode) = file_mode {
        set_permissions(log_path, mode)?;
    }
    Ok(log_file)
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), RotationError> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|err| RotationError::SetFilePermissionsError {
        path: path.to_path_buf(),
        error: err.to_string(),
    })
}

#[cfg(not(unix))]
fn set_permissions(path: &Path, _mode: u32) -> Result<(), RotationError> {
    eprintln!(
        "Warning: setting permissions of {} is not supported on non-Unix platforms",
        path.display()
    );
    Ok(())
}

/// Opens the file as it is, never rotating it.
#[derive(Debug, Clone)]
pub struct PlainFileStrategy {
    path: PathBuf,
    append: bool,
    settings: SinkSettings,
}

impl PlainFileStrategy {
    pub fn new<P: AsRef<Path>>(path: P, append: bool) -> Self {
        PlainFileStrategy {
            path: path.as_ref().to_path_buf(),
            append,
            settings: SinkSettings::default(),
        }
    }
}

impl FileStrategy for PlainFileStrategy {
    fn filename(&self) -> &Path {
        &self.path
    }

    fn severity(&self) -> Severity {
        self.settings.severity
    }

    fn log_type(&self) -> LogType {
        self.settings.log_type
    }

    fn format(&self) -> &str {
        &self.settings.format
    }

    fn append(&self) -> bool {
        self.append
    }

    fn prepare_for_write(&self) -> RotationReport {
        RotationReport::new(RotationOutcome::Disabled)
    }
}

/// Rotates the main file into numbered backups before opening it.
#[derive(Debug, Clone)]
pub struct RotationStrategy<F: FileSystem = RealFileSystem> {
    config: RotationConfig,
    settings: SinkSettings,
    engine: RotationEngine<F>,
}

impl RotationStrategy<RealFileSystem> {
    /// Create a strategy on the real filesystem, validating `config`.
    pub fn new(config: RotationConfig) -> Result<Self, RotationError> {
        Self::with_file_system(config, RealFileSystem)
    }
}

impl<F: FileSystem> RotationStrategy<F> {
    /// Create a strategy rotating through the given filesystem, validating
    /// `config`.
    pub fn with_file_system(config: RotationConfig, fs: F) -> Result<Self, RotationError> {
        config.validate()?;
        Ok(RotationStrategy {
            config,
            settings: SinkSettings::default(),
            engine: RotationEngine::new(fs),
        })
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    pub fn engine(&self) -> &RotationEngine<F> {
        &self.engine
    }
}

impl<F: FileSystem> FileStrategy for RotationStrategy<F> {
    fn filename(&self) -> &Path {
        &self.config.base_path
    }

    fn severity(&self) -> Severity {
        self.settings.severity
    }

    fn log_type(&self) -> LogType {
        self.settings.log_type
    }

    fn format(&self) -> &str {
        &self.settings.format
    }

    fn append(&self) -> bool {
        self.config.append_on_open
    }

    fn file_mode(&self) -> Option<u32> {
        self.settings.file_mode
    }

    fn prepare_for_write(&self) -> RotationReport {
        self.engine.maybe_rotate(&self.config)
    }
}

/// A log sink writing to a file opened through a [`FileStrategy`].
pub struct FileSink<S: FileStrategy = RotationStrategy> {
    strategy: S,
    writer: RwLock<fs::File>,
}

/// A file sink that rotates its file on the real filesystem.
pub type RotatingFile = FileSink<RotationStrategy>;

impl<S: FileStrategy> FileSink<S> {
    /// Open the sink's file through `strategy`.
    pub fn new(strategy: S) -> Result<Self, RotationError> {
        Self::with_report(strategy).map(|(sink, _)| sink)
    }

    /// Like [`FileSink::new`], also returning the report of the rotation
    /// check made before the file was opened.
    pub fn with_report(strategy: S) -> Result<(Self, RotationReport), RotationError> {
        let (file, report) = strategy.open()?;
        let sink = FileSink {
            strategy,
            writer: RwLock::new(file),
        };
        Ok((sink, report))
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Rotate the file if due, then swap in a freshly opened one.
    ///
    /// Writes made while rotation runs still go to the old file. The writer
    /// lock is held only to flush the old file and swap in the new one.
    /// # Returns
    /// The report of the rotation check.
    pub fn reopen(&self) -> Result<RotationReport, RotationError> {
        // Rotation logs through `tracing`, whose writer may be this sink.
        let report = self.strategy.prepare_for_write();
        let file = self.strategy.open_file()?;

        let mut writer = self.writer.write().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        *writer = file;
        Ok(report)
    }
}

impl<S: FileStrategy> fmt::Debug for FileSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSink")
            .field("filename", &self.strategy.filename())
            .finish_non_exhaustive()
    }
}

impl<S: FileStrategy> io::Write for FileSink<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.get_mut().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.get_mut().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

impl<S: FileStrategy> io::Write for &FileSink<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.write().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

/// Provides a fluent interface for configuring rotating file sinks.
///
/// # Default Configuration
///
/// If not explicitly configured, the sink uses these defaults:
/// * Rotation disabled (no backups kept)
/// * Rotate whenever the main file exists once rotation is enabled
/// * Append to the main file on open
/// * Two-digit backup indices (`app.log.01`)
/// * Severity `Trace`, log type `All` and [`DEFAULT_FORMAT`]
/// * Standard file permissions
///
/// # Examples
///
/// Keep three 5 KB backups:
/// ```rust
/// use logcascade::{RotatingFileBuilder, RotationSize};
///
/// # let dir = tempfile::tempdir().unwrap();
/// let sink = RotatingFileBuilder::new(dir.path().join("rotation.log"))
///     .rotation_size(RotationSize::KB(5))
///     .max_keep_files(3)
///     .build()
///     .unwrap();
/// ```
///
/// Start every run with an empty file, restricted to its owner:
/// ```rust
/// use logcascade::{RotatingFileBuilder, Severity};
///
/// # let dir = tempfile::tempdir().unwrap();
/// let sink = RotatingFileBuilder::new(dir.path().join("error.log"))
///     .severity(Severity::Error)
///     .append(false)
///     .max_keep_files(10)
///     .file_mode(0o600)
///     .build()
///     .unwrap();
/// ```
pub struct RotatingFileBuilder {
    config: RotationConfig,
    settings: SinkSettings,
}

impl RotatingFileBuilder {
    /// Create a new builder.
    /// # Arguments
    /// * `path` - The path of the main log file.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        RotatingFileBuilder {
            config: RotationConfig::new(path),
            settings: SinkSettings::default(),
        }
    }

    /// Set the minimum severity of the sink.
    pub fn severity(self, severity: Severity) -> Self {
        Self {
            settings: SinkSettings {
                severity,
                ..self.settings
            },
            ..self
        }
    }

    /// Set which kind of records the sink accepts.
    pub fn log_type(self, log_type: LogType) -> Self {
        Self {
            settings: SinkSettings {
                log_type,
                ..self.settings
            },
            ..self
        }
    }

    /// Set the record template.
    pub fn format<T: Into<String>>(self, format: T) -> Self {
        Self {
            settings: SinkSettings {
                format: format.into(),
                ..self.settings
            },
            ..self
        }
    }

    /// Append to (`true`) or truncate (`false`) the main file on open.
    pub fn append(self, append_on_open: bool) -> Self {
        Self {
            config: RotationConfig {
                append_on_open,
                ..self.config
            },
            ..self
        }
    }

    /// Set the maximum number of backups to keep. `0` disables rotation.
    pub fn max_keep_files(self, retention_count: u32) -> Self {
        Self {
            config: RotationConfig {
                retention_count,
                ..self.config
            },
            ..self
        }
    }

    /// Set the size at which the main file is rotated.
    pub fn rotation_size(self, size: RotationSize) -> Self {
        Self {
            config: RotationConfig {
                size_threshold_bytes: size.bytes(),
                ..self.config
            },
            ..self
        }
    }

    /// Set the number of digits in backup indices.
    pub fn index_width(self, index_width: usize) -> Self {
        Self {
            config: RotationConfig {
                index_width,
                ..self.config
            },
            ..self
        }
    }

    /// Set the file permissions for the main file (Unix-like systems only).
    /// This sets the file mode bits in octal notation like when using chmod.
    /// For example, 0o644 for rw-r--r-- permissions.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            settings: SinkSettings {
                file_mode: Some(mode),
                ..self.settings
            },
            ..self
        }
    }

    /// Validate the configuration, rotate the main file if due and open it.
    pub fn build(self) -> Result<RotatingFile, RotationError> {
        self.build_with_report().map(|(sink, _)| sink)
    }

    /// Like [`RotatingFileBuilder::build`], also returning the report of the
    /// rotation check made at build time.
    pub fn build_with_report(self) -> Result<(RotatingFile, RotationReport), RotationError> {
        let mut strategy = RotationStrategy::new(self.config)?;
        strategy.settings = self.settings;
        FileSink::with_report(strategy)
    }
}
