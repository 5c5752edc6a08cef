//! Module file browser
//!
//! Lists the module files of one directory (non-recursive) and keeps a
//! wrapping cursor for `file_prev` / `file_next` / `file_load`.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extensions recognized as tracker modules (case-insensitive)
pub const MODULE_EXTENSIONS: &[&str] = &[
    "mod", "xm", "s3m", "it", "mptm", "stm", "669", "mtm", "med", "okt", "far", "ult", "umx",
];

pub fn is_module_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MODULE_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct FileList {
    dir: PathBuf,
    files: Vec<PathBuf>,
    selected: usize,
}

impl FileList {
    /// List a directory, or the directory containing a file (which is
    /// then selected)
    pub fn scan(path: &Path) -> Self {
        let (dir, target) = if path.is_dir() {
            (path.to_path_buf(), None)
        } else {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            (dir, Some(path))
        };

        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_module_file(e.path()))
            .map(|e| e.path().to_owned())
            .collect();
        files.sort();
        log::debug!("FileList: {} module files in {:?}", files.len(), dir);

        let selected = target
            .and_then(|t| files.iter().position(|f| f.file_name() == t.file_name()))
            .unwrap_or(0);
        Self { dir, files, selected }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&Path> {
        self.files.get(self.selected).map(PathBuf::as_path)
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.files.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }

    pub fn next(&mut self) -> Option<&Path> {
        if !self.files.is_empty() {
            self.selected = (self.selected + 1) % self.files.len();
        }
        self.selected()
    }

    pub fn prev(&mut self) -> Option<&Path> {
        if !self.files.is_empty() {
            self.selected = (self.selected + self.files.len() - 1) % self.files.len();
        }
        self.selected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.xm");
        touch(dir.path(), "a.MOD");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "a.rgx");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub"), "deep.it");

        let list = FileList::scan(dir.path());
        let names: Vec<_> = list
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MOD", "b.xm"]);
    }

    #[test]
    fn test_cursor_wraps() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "1.mod");
        touch(dir.path(), "2.mod");
        let third = touch(dir.path(), "3.mod");

        let mut list = FileList::scan(&third);
        assert_eq!(list.selected_index(), 2);
        assert!(list.next().unwrap().ends_with("1.mod"));
        assert!(list.prev().unwrap().ends_with("3.mod"));
        assert!(list.select(1));
        assert!(!list.select(3));
    }

    #[test]
    fn test_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut list = FileList::scan(dir.path());
        assert!(list.is_empty());
        assert!(list.next().is_none());
        assert!(list.selected().is_none());
    }
}
