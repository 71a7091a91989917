//! Snapshot of a main log file and its numbered backups.

use {
    crate::{
        config::RotationConfig,
        fs::{split_path, FileKind, FileSystem, ListFilter},
    },
    glob::Pattern,
    std::path::{Path, PathBuf},
};

/// A backup file found on disk, e.g. `app.log.03` with index 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub index: u32,
    pub path: PathBuf,
}

/// What the filesystem holds for one base path at one moment.
///
/// Never cached: it is collected fresh for every rotation check, used and
/// thrown away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationInventory {
    pub main_exists: bool,
    /// Size of the main file, `0` when it does not exist.
    pub main_size_bytes: u64,
    /// Backups sorted by index, lowest (newest) first.
    pub backup_files: Vec<BackupFile>,
}

impl RotationInventory {
    /// Take inventory of `config.base_path`.
    ///
    /// Backups are the regular files next to the main file named
    /// `<leaf>.` followed by exactly `index_width` digits. Sorting the names
    /// lexicographically sorts the fixed-width indices numerically.
    /// # Arguments
    /// * `fs` - The filesystem to query.
    /// * `config` - The rotation configuration naming the main file.
    /// # Returns
    /// The inventory; with nothing on disk, an empty one.
    pub fn collect<F: FileSystem + ?Sized>(fs: &F, config: &RotationConfig) -> Self {
        let base = config.base_path.to_string_lossy();
        let (directory, leaf) = split_path(&base);

        let main = fs
            .stat(&config.base_path)
            .filter(|info| info.kind == FileKind::Regular);
        let mut names = fs.list_entries(
            Path::new(&directory),
            ListFilter::FILES,
            &backup_mask(&leaf, config.index_width),
        );
        names.sort();

        let backup_files = names
            .iter()
            .filter_map(|name| {
                let suffix = name.get(leaf.len()..)?;
                let index = parse_index(name, config.index_width)?;
                Some(BackupFile {
                    index,
                    path: PathBuf::from(format!("{base}{suffix}")),
                })
            })
            .collect();

        RotationInventory {
            main_exists: main.is_some(),
            main_size_bytes: main.map_or(0, |info| info.len),
            backup_files,
        }
    }

    pub fn backup_count(&self) -> usize {
        self.backup_files.len()
    }

    pub fn lowest_index(&self) -> Option<u32> {
        self.backup_files.first().map(|backup| backup.index)
    }

    pub fn highest_index(&self) -> Option<u32> {
        self.backup_files.last().map(|backup| backup.index)
    }

    /// Whether the backup indices form a run without holes. An empty
    /// inventory is not contiguous.
    pub fn is_contiguous(&self) -> bool {
        match (self.lowest_index(), self.highest_index()) {
            (Some(lowest), Some(highest)) => (highest - lowest + 1) as usize == self.backup_files.len(),
            _ => false,
        }
    }

    pub fn contains_index(&self, index: u32) -> bool {
        self.backup_files
            .binary_search_by_key(&index, |backup| backup.index)
            .is_ok()
    }

    /// Highest index `n` such that every backup `1..=n` exists, capped at
    /// `max_index`. `0` when there is no backup with index 1.
    pub fn contiguous_top(&self, max_index: u32) -> u32 {
        let mut top = 0;
        while top < max_index && self.contains_index(top + 1) {
            top += 1;
        }
        top
    }
}

/// Glob mask matching the backup names of `leaf`, e.g. `app.log.[0-9][0-9]`.
pub fn backup_mask(leaf: &str, index_width: usize) -> String {
    format!("{}.{}", Pattern::escape(leaf), "[0-9]".repeat(index_width))
}

/// Read the index from the last `index_width` characters of a backup name.
fn parse_index(name: &str, index_width: usize) -> Option<u32> {
    let start = name.len().checked_sub(index_width)?;
    name.get(start..)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use {super::*, crate::fs::MemoryFileSystem};

    fn config(base: &str) -> RotationConfig {
        RotationConfig::new(base)
    }

    fn indices(inventory: &RotationInventory) -> Vec<u32> {
        inventory.backup_files.iter().map(|backup| backup.index).collect()
    }

    #[test]
    fn test_empty_inventory() {
        let fs = MemoryFileSystem::new();
        let inventory = RotationInventory::collect(&fs, &config("logs/app.log"));

        assert_eq!(inventory, RotationInventory::default());
        assert!(!inventory.main_exists);
        assert_eq!(inventory.lowest_index(), None);
        assert_eq!(inventory.highest_index(), None);
        assert!(!inventory.is_contiguous());
        assert_eq!(inventory.contiguous_top(99), 0);
    }

    #[test]
    fn test_main_file_and_sorted_backups() {
        let fs = MemoryFileSystem::new();
        fs.add_file("logs/app.log", "0123456789");
        fs.add_file("logs/app.log.03", "c");
        fs.add_file("logs/app.log.01", "a");
        fs.add_file("logs/app.log.02", "b");

        let inventory = RotationInventory::collect(&fs, &config("logs/app.log"));
        assert!(inventory.main_exists);
        assert_eq!(inventory.main_size_bytes, 10);
        assert_eq!(indices(&inventory), vec![1, 2, 3]);
        assert_eq!(inventory.backup_count(), 3);
        assert_eq!(inventory.backup_files[0].path, PathBuf::from("logs/app.log.01"));
        assert_eq!(inventory.lowest_index(), Some(1));
        assert_eq!(inventory.highest_index(), Some(3));
        assert!(inventory.is_contiguous());
        assert_eq!(inventory.contiguous_top(99), 3);
    }

    #[test]
    fn test_gap_is_not_contiguous() {
        let fs = MemoryFileSystem::new();
        fs.add_file("app.log.01", "a");
        fs.add_file("app.log.03", "c");

        let inventory = RotationInventory::collect(&fs, &config("app.log"));
        assert_eq!(indices(&inventory), vec![1, 3]);
        assert_eq!(inventory.backup_files[1].path, PathBuf::from("app.log.03"));
        assert!(!inventory.is_contiguous());
        assert!(inventory.contains_index(3));
        assert!(!inventory.contains_index(2));
        assert_eq!(inventory.contiguous_top(99), 1);
    }

    #[test]
    fn test_run_not_starting_at_one() {
        let fs = MemoryFileSystem::new();
        fs.add_file("app.log.02", "b");
        fs.add_file("app.log.03", "c");

        let inventory = RotationInventory::collect(&fs, &config("app.log"));
        assert!(inventory.is_contiguous());
        assert_eq!(inventory.contiguous_top(99), 0);
    }

    #[test]
    fn test_ignores_foreign_names_and_directories() {
        let fs = MemoryFileSystem::new();
        fs.add_file("logs/app.log.01", "a");
        fs.add_file("logs/app.log.1", "short");
        fs.add_file("logs/app.log.100", "long");
        fs.add_file("logs/app.log.02.gz", "compressed");
        fs.add_file("logs/other.log.02", "other");
        fs.add_dir("logs/app.log.04");

        let inventory = RotationInventory::collect(&fs, &config("logs/app.log"));
        assert!(!inventory.main_exists);
        assert_eq!(indices(&inventory), vec![1]);
    }

    #[test]
    fn test_main_path_that_is_a_directory() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("logs/app.log");

        let inventory = RotationInventory::collect(&fs, &config("logs/app.log"));
        assert!(!inventory.main_exists);
        assert_eq!(inventory.main_size_bytes, 0);
    }

    #[test]
    fn test_wider_index_and_glob_metacharacters() {
        let fs = MemoryFileSystem::new();
        fs.add_file("logs/app[1].log.007", "x");
        fs.add_file("logs/app1.log.008", "decoy");

        let mut config = config("logs/app[1].log");
        config.index_width = 3;
        let inventory = RotationInventory::collect(&fs, &config);
        assert_eq!(indices(&inventory), vec![7]);
        assert_eq!(inventory.backup_files[0].path, PathBuf::from("logs/app[1].log.007"));
    }

    #[test]
    fn test_backup_mask() {
        assert_eq!(backup_mask("app.log", 2), "app.log.[0-9][0-9]");
        assert_eq!(backup_mask("a*b", 1), "a[*]b.[0-9]");
    }
}
