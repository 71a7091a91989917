//! Filesystem queries used by rotation.
//!
//! Everything the engine needs from the disk goes through the [`FileSystem`]
//! trait so it can be swapped for [`MemoryFileSystem`] in tests. Queries never
//! fail: a directory that cannot be read lists as empty and a path that cannot
//! be stat'ed does not exist. Only `rename` and `remove_file` report errors,
//! and the engine records those instead of propagating them.

use {
    crate::RotationError,
    glob::{MatchOptions, Pattern},
    std::{
        collections::{BTreeMap, BTreeSet},
        fs, io,
        ops::BitOr,
        path::{is_separator, Path, PathBuf},
        sync::{Arc, PoisonError, RwLock},
    },
};

#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;

/// Selects which directory entries [`FileSystem::list_entries`] returns.
///
/// Flags combine with `|`, e.g. `ListFilter::FILES | ListFilter::HIDDEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter(u8);

impl ListFilter {
    /// Anything that is not a directory.
    pub const FILES: ListFilter = ListFilter(0x01);
    pub const DIRS: ListFilter = ListFilter(0x02);
    /// Dot-prefixed entries; without this flag they are skipped.
    pub const HIDDEN: ListFilter = ListFilter(0x04);
    pub const NORMAL: ListFilter = ListFilter(0x01 | 0x02);
    pub const ALL: ListFilter = ListFilter(0x01 | 0x02 | 0x04);

    pub fn contains(self, other: ListFilter) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether an entry with the given name and directory-ness passes.
    fn admits(self, name: &str, is_dir: bool) -> bool {
        if name.starts_with('.') && !self.contains(ListFilter::HIDDEN) {
            return false;
        }
        if is_dir {
            self.contains(ListFilter::DIRS)
        } else {
            self.contains(ListFilter::FILES)
        }
    }
}

impl Default for ListFilter {
    fn default() -> Self {
        ListFilter::NORMAL
    }
}

impl BitOr for ListFilter {
    type Output = ListFilter;

    fn bitor(self, rhs: ListFilter) -> ListFilter {
        ListFilter(self.0 | rhs.0)
    }
}

/// Type of an existing filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Other,
}

impl From<fs::FileType> for FileKind {
    fn from(file_type: fs::FileType) -> Self {
        if file_type.is_file() {
            return FileKind::Regular;
        }
        if file_type.is_dir() {
            return FileKind::Directory;
        }
        if file_type.is_symlink() {
            return FileKind::Symlink;
        }
        #[cfg(unix)]
        {
            if file_type.is_char_device() {
                return FileKind::CharDevice;
            }
            if file_type.is_block_device() {
                return FileKind::BlockDevice;
            }
            if file_type.is_fifo() {
                return FileKind::Fifo;
            }
            if file_type.is_socket() {
                return FileKind::Socket;
            }
        }
        FileKind::Other
    }
}

/// What a successful stat reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    pub kind: FileKind,
    /// Size in bytes.
    pub len: u64,
}

/// Filesystem operations needed to take inventory of and rotate log files.
pub trait FileSystem: Send + Sync {
    /// List the names of the immediate entries of `directory` that pass
    /// `filter` and match the glob `mask` (an empty mask matches everything).
    /// An unreadable directory lists as empty.
    fn list_entries(&self, directory: &Path, filter: ListFilter, mask: &str) -> Vec<String>;

    /// Stat a path, following symlinks. `None` if it does not exist or cannot
    /// be stat'ed.
    fn stat(&self, path: &Path) -> Option<PathInfo>;

    /// Rename a file, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), RotationError>;

    fn remove_file(&self, path: &Path) -> Result<(), RotationError>;

    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_some()
    }

    fn is_regular_file(&self, path: &Path) -> bool {
        matches!(self.stat(path), Some(PathInfo { kind: FileKind::Regular, .. }))
    }

    fn is_directory(&self, path: &Path) -> bool {
        matches!(self.stat(path), Some(PathInfo { kind: FileKind::Directory, .. }))
    }
}

/// Split a path into its parent directory and leaf name.
///
/// Trailing separators are ignored. A path without any separator lives in
/// `"."`, a root-level entry lives in `"/"` and a path made only of
/// separators is the root itself.
/// # Examples
/// ```
/// use logcascade::split_path;
///
/// assert_eq!(split_path("logs/app.log"), ("logs".to_string(), "app.log".to_string()));
/// assert_eq!(split_path("app.log"), (".".to_string(), "app.log".to_string()));
/// assert_eq!(split_path("/app.log"), ("/".to_string(), "app.log".to_string()));
/// ```
pub fn split_path(path: &str) -> (String, String) {
    if path.is_empty() {
        return (".".to_string(), ".".to_string());
    }
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        return (".".to_string(), path[..1].to_string());
    }
    match trimmed.rfind(is_separator) {
        None => (".".to_string(), trimmed.to_string()),
        Some(pos) => {
            let parent = trimmed[..pos].trim_end_matches(is_separator);
            let parent = if parent.is_empty() { &trimmed[..1] } else { parent };
            (parent.to_string(), trimmed[pos + 1..].to_string())
        }
    }
}

/// Match a single entry name against a glob mask, `fnmatch` style: `*`, `?`
/// and `[...]` classes, leading dots not special. An empty mask matches
/// everything and an invalid one matches nothing.
pub fn name_matches(mask: &str, name: &str) -> bool {
    if mask.is_empty() {
        return true;
    }
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    Pattern::new(mask)
        .map(|pattern| pattern.matches_with(name, options))
        .unwrap_or(false)
}

/// The operating system's filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn list_entries(&self, directory: &Path, filter: ListFilter, mask: &str) -> Vec<String> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(path = %directory.display(), error = %err, "cannot list directory");
                return Vec::new();
            }
        };

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if filter.admits(&name, file_type.is_dir()) && name_matches(mask, &name) {
                names.push(name);
            }
        }
        names
    }

    fn stat(&self, path: &Path) -> Option<PathInfo> {
        fs::metadata(path).ok().map(|metadata| PathInfo {
            kind: metadata.file_type().into(),
            len: metadata.len(),
        })
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), RotationError> {
        fs::rename(from, to).map_err(|err| RotationError::RenameFileError {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            error: err.to_string(),
        })
    }

    fn remove_file(&self, path: &Path) -> Result<(), RotationError> {
        fs::remove_file(path).map_err(|err| RotationError::RemoveFileError {
            path: path.to_path_buf(),
            error: err.to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    denied: BTreeSet<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Cloning creates a new handle to the same underlying tree. Paths are taken
/// literally: `app.log` and `./app.log` are different files, but both live in
/// the directory `"."`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    tree: Arc<RwLock<MemoryTree>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file, registering its parent directory.
    pub fn add_file<P: AsRef<Path>>(&self, path: P, data: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.dirs.insert(parent_dir(path).to_path_buf());
        tree.files.insert(path.to_path_buf(), data.into());
    }

    pub fn add_dir<P: AsRef<Path>>(&self, path: P) {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.dirs.insert(path.as_ref().to_path_buf());
    }

    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.files.get(path.as_ref()).cloned()
    }

    /// All file paths, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.files.keys().cloned().collect()
    }

    /// Make every rename or remove touching `path` fail with permission
    /// denied.
    pub fn deny<P: AsRef<Path>>(&self, path: P) {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.denied.insert(path.as_ref().to_path_buf());
    }

    pub fn allow<P: AsRef<Path>>(&self, path: P) {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.denied.remove(path.as_ref());
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn leaf_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|name| name.to_str()).map(str::to_owned)
}

fn denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("access to '{}' denied", path.display()),
    )
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("'{}' not found", path.display()))
}

impl FileSystem for MemoryFileSystem {
    fn list_entries(&self, directory: &Path, filter: ListFilter, mask: &str) -> Vec<String> {
        let directory = if directory.as_os_str().is_empty() {
            Path::new(".")
        } else {
            directory
        };
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);

        let files = tree.files.keys().map(|path| (path, false));
        let dirs = tree.dirs.iter().map(|path| (path, true));
        files
            .chain(dirs)
            .filter(|(path, _)| path.as_path() != directory && parent_dir(path) == directory)
            .filter_map(|(path, is_dir)| leaf_name(path).map(|name| (name, is_dir)))
            .filter(|(name, is_dir)| filter.admits(name, *is_dir) && name_matches(mask, name))
            .map(|(name, _)| name)
            .collect()
    }

    fn stat(&self, path: &Path) -> Option<PathInfo> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(data) = tree.files.get(path) {
            return Some(PathInfo {
                kind: FileKind::Regular,
                len: data.len() as u64,
            });
        }
        tree.dirs.contains(path).then_some(PathInfo {
            kind: FileKind::Directory,
            len: 0,
        })
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), RotationError> {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let failure = |err: io::Error| RotationError::RenameFileError {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            error: err.to_string(),
        };
        if tree.denied.contains(from) {
            return Err(failure(denied(from)));
        }
        if tree.denied.contains(to) {
            return Err(failure(denied(to)));
        }
        let data = tree.files.remove(from).ok_or_else(|| failure(not_found(from)))?;
        tree.files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), RotationError> {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let failure = |err: io::Error| RotationError::RemoveFileError {
            path: path.to_path_buf(),
            error: err.to_string(),
        };
        if tree.denied.contains(path) {
            return Err(failure(denied(path)));
        }
        tree.files.remove(path).map(|_| ()).ok_or_else(|| failure(not_found(path)))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn split(path: &str) -> (String, String) {
        split_path(path)
    }

    fn pair(parent: &str, leaf: &str) -> (String, String) {
        (parent.to_string(), leaf.to_string())
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split("logs/app.log"), pair("logs", "app.log"));
        assert_eq!(split("/var/log/app.log"), pair("/var/log", "app.log"));
        assert_eq!(split("app.log"), pair(".", "app.log"));
        assert_eq!(split("logs/app/"), pair("logs", "app"));
        assert_eq!(split("logs//app.log"), pair("logs", "app.log"));
        assert_eq!(split("/app.log"), pair("/", "app.log"));
        assert_eq!(split("///"), pair(".", "/"));
        assert_eq!(split(""), pair(".", "."));
    }

    #[test]
    fn test_name_matches_fixed_width_suffix() {
        let mask = "app.log.[0-9][0-9]";
        assert!(name_matches(mask, "app.log.01"));
        assert!(name_matches(mask, "app.log.99"));
        assert!(!name_matches(mask, "app.log.1"));
        assert!(!name_matches(mask, "app.log.100"));
        assert!(!name_matches(mask, "app.log.01.gz"));
        assert!(!name_matches(mask, "app.log.0a"));
        assert!(!name_matches(mask, "xapp.log.01"));
    }

    #[test]
    fn test_name_matches_empty_and_invalid_masks() {
        assert!(name_matches("", "anything"));
        assert!(name_matches("*", ".hidden"));
        assert!(!name_matches("[", "["));
    }

    #[test]
    fn test_list_filter_flags() {
        assert!(ListFilter::ALL.contains(ListFilter::HIDDEN));
        assert!(ListFilter::NORMAL.contains(ListFilter::FILES | ListFilter::DIRS));
        assert!(!ListFilter::NORMAL.contains(ListFilter::HIDDEN));
        assert_eq!(ListFilter::default(), ListFilter::NORMAL);
    }

    #[test]
    fn test_real_list_entries_filters() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.log"), b"main").unwrap();
        fs::write(dir.path().join("app.log.01"), b"one").unwrap();
        fs::write(dir.path().join("app.log.01x"), b"junk").unwrap();
        fs::write(dir.path().join(".hidden.log"), b"h").unwrap();
        fs::create_dir(dir.path().join("app.log.02")).unwrap();

        let fs = RealFileSystem;
        let mut files = fs.list_entries(dir.path(), ListFilter::FILES, "");
        files.sort();
        assert_eq!(files, vec!["app.log", "app.log.01", "app.log.01x"]);

        let mut all = fs.list_entries(dir.path(), ListFilter::ALL, "");
        all.sort();
        assert_eq!(all, vec![".hidden.log", "app.log", "app.log.01", "app.log.01x", "app.log.02"]);

        let dirs = fs.list_entries(dir.path(), ListFilter::DIRS, "");
        assert_eq!(dirs, vec!["app.log.02"]);

        let backups = fs.list_entries(dir.path(), ListFilter::FILES, "app.log.[0-9][0-9]");
        assert_eq!(backups, vec!["app.log.01"]);
    }

    #[test]
    fn test_real_list_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(RealFileSystem.list_entries(&missing, ListFilter::ALL, "").is_empty());
    }

    #[test]
    fn test_real_stat_and_kinds() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.log");
        fs::write(&file, b"12345").unwrap();

        let fs = RealFileSystem;
        assert_eq!(
            fs.stat(&file),
            Some(PathInfo {
                kind: FileKind::Regular,
                len: 5
            })
        );
        assert!(fs.is_regular_file(&file));
        assert!(!fs.is_directory(&file));
        assert!(fs.is_directory(dir.path()));
        assert!(!fs.exists(&dir.path().join("missing")));
        assert!(!fs.is_regular_file(&dir.path().join("missing")));
    }

    #[test]
    fn test_real_rename_and_remove_report_failures() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        fs::write(&from, b"x").unwrap();

        let fs = RealFileSystem;
        assert!(fs.rename(&from, &to).is_ok());
        assert!(!from.exists());
        assert!(matches!(fs.rename(&from, &to), Err(RotationError::RenameFileError { .. })));
        assert!(fs.remove_file(&to).is_ok());
        assert!(matches!(fs.remove_file(&to), Err(RotationError::RemoveFileError { .. })));
    }

    #[test]
    fn test_memory_list_entries_by_directory() {
        let fs = MemoryFileSystem::new();
        fs.add_file("logs/app.log", "main");
        fs.add_file("logs/app.log.01", "one");
        fs.add_file("logs/nested/app.log.02", "deep");
        fs.add_file("app.log.03", "elsewhere");

        let mut names = fs.list_entries(Path::new("logs"), ListFilter::ALL, "");
        names.sort();
        assert_eq!(names, vec!["app.log", "app.log.01", "nested"]);

        let files = fs.list_entries(Path::new("logs"), ListFilter::FILES, "app.log.[0-9][0-9]");
        assert_eq!(files, vec!["app.log.01"]);

        let cwd = fs.list_entries(Path::new("."), ListFilter::FILES, "");
        assert_eq!(cwd, vec!["app.log.03"]);
    }

    #[test]
    fn test_memory_rename_overwrites_and_deny() {
        let fs = MemoryFileSystem::new();
        fs.add_file("a", "first");
        fs.add_file("b", "second");

        fs.rename(Path::new("a"), Path::new("b")).unwrap();
        assert_eq!(fs.read_file("b"), Some(b"first".to_vec()));
        assert_eq!(fs.read_file("a"), None);

        fs.deny("b");
        assert!(fs.rename(Path::new("b"), Path::new("c")).is_err());
        assert!(fs.remove_file(Path::new("b")).is_err());
        fs.allow("b");
        assert!(fs.remove_file(Path::new("b")).is_ok());
        assert!(fs.files().is_empty());
    }
}
