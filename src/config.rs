//! Construction-time configuration of the rotation subsystem.

use {
    crate::RotationError,
    std::path::{Path, PathBuf},
};

/// Number of decimal digits in a backup index (`app.log.01`).
pub const DEFAULT_INDEX_WIDTH: usize = 2;

/// Widest backup index supported; `10^9 - 1` still fits in a `u32`.
pub const MAX_INDEX_WIDTH: usize = 9;

/// Record template handed to the logging core when none is configured.
pub const DEFAULT_FORMAT: &str = "%Y%m%d %H:%M:%S.#ms #file(#line) [#severity]: #message";

/// Defines size thresholds for rotating log files in various units.
///
/// Once the main log file has reached the threshold when the sink opens it,
/// the file is moved into the backup history and a fresh one is started:
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `GB` - Gigabytes (1 GB = 1024 MB)
///
/// # Examples
/// ```
/// use logcascade::{RotatingFileBuilder, RotationSize};
///
/// # let dir = tempfile::tempdir().unwrap();
/// // Rotate when the file has reached 100 MB
/// let sink = RotatingFileBuilder::new(dir.path().join("large.log"))
///     .rotation_size(RotationSize::MB(100))
///     .max_keep_files(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// Get the threshold in bytes, saturating on overflow.
    pub fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb.saturating_mul(1024),
            RotationSize::MB(mb) => mb.saturating_mul(1024 * 1024),
            RotationSize::GB(gb) => gb.saturating_mul(1024 * 1024 * 1024),
        }
    }
}

impl From<u64> for RotationSize {
    fn from(bytes: u64) -> Self {
        RotationSize::Bytes(bytes)
    }
}

/// Rotation settings of one file sink.
///
/// Created once with the sink and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// Path of the main log file. Backups live next to it as
    /// `<base_path>.<NN>`.
    pub base_path: PathBuf,
    /// Open the main file for append (`true`) or truncate it (`false`).
    pub append_on_open: bool,
    /// Maximum number of numbered backups to keep. `0` disables rotation.
    pub retention_count: u32,
    /// Rotate once the main file holds at least this many bytes. `0` rotates
    /// whenever the main file exists.
    pub size_threshold_bytes: u64,
    /// Number of zero-padded digits in a backup index.
    pub index_width: usize,
}

impl RotationConfig {
    /// Create a configuration with rotation disabled.
    /// # Arguments
    /// * `base_path` - The path of the main log file.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        RotationConfig {
            base_path: base_path.as_ref().to_path_buf(),
            append_on_open: true,
            retention_count: 0,
            size_threshold_bytes: 0,
            index_width: DEFAULT_INDEX_WIDTH,
        }
    }

    /// Set the retention cap and size threshold in one go.
    pub fn with_rotation(self, retention_count: u32, size: RotationSize) -> Self {
        RotationConfig {
            retention_count,
            size_threshold_bytes: size.bytes(),
            ..self
        }
    }

    /// Check the index width and that `retention_count` backups can all be
    /// told apart with it.
    pub fn validate(&self) -> Result<(), RotationError> {
        if self.index_width == 0 || self.index_width > MAX_INDEX_WIDTH {
            return Err(RotationError::InvalidIndexWidth(self.index_width));
        }
        let max = self.max_index();
        if self.retention_count > max {
            return Err(RotationError::RetentionTooLarge {
                retention: self.retention_count,
                width: self.index_width,
                max,
            });
        }
        Ok(())
    }

    /// Whether rotation is switched on at all.
    pub fn rotation_enabled(&self) -> bool {
        self.retention_count > 0
    }

    /// Highest index representable with `index_width` digits.
    pub fn max_index(&self) -> u32 {
        let width = self.index_width.clamp(1, MAX_INDEX_WIDTH) as u32;
        10u32.pow(width) - 1
    }

    /// Path of the backup with the given index, e.g. `app.log.03`.
    pub fn backup_path(&self, index: u32) -> PathBuf {
        PathBuf::from(format!(
            "{}.{:0width$}",
            self.base_path.to_string_lossy(),
            index,
            width = self.index_width
        ))
    }
}
