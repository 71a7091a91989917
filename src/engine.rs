//! Size-triggered rotation of a main log file into numbered backups.
//!
//! Rotation shifts every backup of the contiguous run starting at index 1 one
//! slot up, highest index first, so that no backup is ever overwritten. The
//! main file then becomes backup 1 and the oldest backups beyond the
//! retention cap are deleted. Backups beyond a gap in the run are never
//! shifted, but they still count towards the cap.
//!
//! Every filesystem failure is logged and recorded in the returned
//! [`RotationReport`]; nothing is propagated to the caller.

use {
    crate::{
        config::RotationConfig,
        fs::{FileSystem, RealFileSystem},
        inventory::RotationInventory,
        RotationError,
    },
    std::path::{Path, PathBuf},
};

/// Why a rotation check did or did not rotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Retention count is `0`.
    Disabled,
    /// The configuration failed validation; see the report's failures.
    InvalidConfig,
    /// There is no regular file at the main path.
    NoMainFile,
    /// The main file is smaller than the threshold.
    BelowThreshold { size: u64, threshold: u64 },
    /// The main file is now backup 1.
    Rotated,
    /// Rotation was due but the main file could not be moved to backup 1.
    Incomplete,
}

/// Everything one rotation check did, including what it failed to do.
#[derive(Debug)]
pub struct RotationReport {
    pub outcome: RotationOutcome,
    /// Renames performed, in order.
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Files deleted, in order.
    pub removed: Vec<PathBuf>,
    /// Failures that were swallowed.
    pub failures: Vec<RotationError>,
}

impl RotationReport {
    pub(crate) fn new(outcome: RotationOutcome) -> Self {
        RotationReport {
            outcome,
            renamed: Vec::new(),
            removed: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Whether the main file was moved into the backups.
    pub fn rotated(&self) -> bool {
        self.outcome == RotationOutcome::Rotated
    }

    /// Whether no filesystem operation failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn the first swallowed failure into an error, for callers that want
    /// rotation problems to be fatal.
    pub fn into_result(mut self) -> Result<RotationReport, RotationError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(self.failures.remove(0))
        }
    }
}

/// Decides whether a main log file is due for rotation and performs it.
#[derive(Debug, Clone, Default)]
pub struct RotationEngine<F: FileSystem = RealFileSystem> {
    fs: F,
}

impl<F: FileSystem> RotationEngine<F> {
    pub fn new(fs: F) -> Self {
        RotationEngine { fs }
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    /// Take a fresh inventory of the configured main file and its backups.
    pub fn inventory(&self, config: &RotationConfig) -> RotationInventory {
        RotationInventory::collect(&self.fs, config)
    }

    /// Rotate the main file if it is due.
    ///
    /// Rotation is due when it is enabled, the main file exists and it holds
    /// at least `size_threshold_bytes` bytes (any size when the threshold is
    /// `0`). Runs to completion before returning and never fails; check the
    /// report to find out what happened.
    /// # Arguments
    /// * `config` - The rotation configuration of the sink.
    /// # Returns
    /// The report of this rotation check.
    pub fn maybe_rotate(&self, config: &RotationConfig) -> RotationReport {
        let base_path = config.base_path.display();
        if !config.rotation_enabled() {
            tracing::debug!(path = %base_path, "log rotation disabled");
            return RotationReport::new(RotationOutcome::Disabled);
        }
        if let Err(err) = config.validate() {
            tracing::warn!(path = %base_path, error = %err, "invalid log rotation config");
            let mut report = RotationReport::new(RotationOutcome::InvalidConfig);
            report.failures.push(err);
            return report;
        }

        let inventory = self.inventory(config);
        if !inventory.main_exists {
            tracing::debug!(path = %base_path, "no log file to rotate");
            return RotationReport::new(RotationOutcome::NoMainFile);
        }
        let threshold = config.size_threshold_bytes;
        if threshold > 0 && inventory.main_size_bytes < threshold {
            tracing::debug!(
                path = %base_path,
                size = inventory.main_size_bytes,
                threshold,
                "log file below rotation threshold"
            );
            return RotationReport::new(RotationOutcome::BelowThreshold {
                size: inventory.main_size_bytes,
                threshold,
            });
        }

        let mut report = RotationReport::new(RotationOutcome::Incomplete);
        let first_backup = config.backup_path(1);
        if self.shift_backups(config, &inventory, &mut report) {
            if self.rename(&config.base_path, &first_backup, &mut report) {
                report.outcome = RotationOutcome::Rotated;
            }
        } else {
            tracing::warn!(path = %first_backup.display(), "backup slot still occupied, log file not rotated");
            report.failures.push(RotationError::BackupSlotOccupied(first_backup));
        }
        self.prune(config, &mut report);

        tracing::info!(
            path = %base_path,
            outcome = ?report.outcome,
            renamed = report.renamed.len(),
            removed = report.removed.len(),
            failures = report.failures.len(),
            "log rotation finished"
        );
        report
    }

    /// Delete the highest-indexed backups until at most `retention_count`
    /// remain. Does nothing when rotation is disabled or the cap already
    /// holds.
    pub fn prune(&self, config: &RotationConfig, report: &mut RotationReport) {
        if !config.rotation_enabled() {
            return;
        }
        let mut backups = self.inventory(config).backup_files;
        let cap = config.retention_count as usize;
        while backups.len() > cap {
            if let Some(oldest) = backups.pop() {
                self.remove(&oldest.path, report);
            }
        }
    }

    /// Move backups `1..=n` of the contiguous run to `2..=n+1`, highest
    /// first. Returns whether slot 1 is free afterwards.
    fn shift_backups(&self, config: &RotationConfig, inventory: &RotationInventory, report: &mut RotationReport) -> bool {
        let max_index = config.max_index();
        let mut top = inventory.contiguous_top(max_index);

        // The last representable slot has nowhere to go.
        if top == max_index {
            if !self.remove(&config.backup_path(max_index), report) {
                return false;
            }
            top -= 1;
        }

        for index in (1..=top).rev() {
            if !self.rename(&config.backup_path(index), &config.backup_path(index + 1), report) {
                return false;
            }
        }
        true
    }

    fn rename(&self, from: &Path, to: &Path, report: &mut RotationReport) -> bool {
        match self.fs.rename(from, to) {
            Ok(()) => {
                tracing::debug!(from = %from.display(), to = %to.display(), "renamed log file");
                report.renamed.push((from.to_path_buf(), to.to_path_buf()));
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "log rotation rename failed");
                report.failures.push(err);
                false
            }
        }
    }

    fn remove(&self, path: &Path, report: &mut RotationReport) -> bool {
        match self.fs.remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed old log backup");
                report.removed.push(path.to_path_buf());
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "log rotation remove failed");
                report.failures.push(err);
                false
            }
        }
    }
}
