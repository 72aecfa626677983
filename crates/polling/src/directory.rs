// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexFlow.
//
// PlexFlow is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexFlow is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexFlow. If not, see <https://www.gnu.org/licenses/>.

//! Filesystem directory lister.

use crate::{Lister, PollError, PollResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plexflow_backlog::BacklogItem;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header carrying the file name of a delivered [`FileEntry`].
pub const FILE_NAME_HEADER: &str = "file_name";
/// Header carrying the path of a delivered [`FileEntry`] relative to the listed directory.
pub const RELATIVE_PATH_HEADER: &str = "relative_path";

/// A regular file found in a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Full path
    pub path: PathBuf,
    /// Path relative to the listed directory, `/`-separated
    pub relative_path: String,
    /// Final path component
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification, milliseconds since the epoch
    pub modified_millis: i64,
}

impl FileEntry {
    /// Delivery headers for this file.
    pub fn headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (FILE_NAME_HEADER.to_string(), self.file_name.clone()),
            (RELATIVE_PATH_HEADER.to_string(), self.relative_path.clone()),
        ])
    }
}

impl BacklogItem for FileEntry {
    type Key = PathBuf;
    type Freshness = (i64, u64);

    fn key(&self) -> PathBuf {
        self.path.clone()
    }

    fn freshness(&self) -> (i64, u64) {
        (self.modified_millis, self.size)
    }
}

/// Lists the regular files of a directory.
///
/// Files are returned sorted by relative path. A missing directory is
/// created on first listing unless auto-creation is disabled, in which case
/// listing fails.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    directory: PathBuf,
    recursive: bool,
    auto_create_directory: bool,
}

impl DirectoryLister {
    /// Lister over `directory` (non-recursive, auto-creating).
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            recursive: false,
            auto_create_directory: true,
        }
    }

    /// Descend into subdirectories.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Create the directory when it does not exist.
    pub fn auto_create_directory(mut self, auto_create: bool) -> Self {
        self.auto_create_directory = auto_create;
        self
    }

    /// Listed directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn ensure_directory(&self) -> PollResult<bool> {
        match tokio::fs::metadata(&self.directory).await {
            Ok(metadata) if metadata.is_dir() => Ok(true),
            Ok(_) => Err(PollError::Lister(format!(
                "{} is not a directory",
                self.directory.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && self.auto_create_directory => {
                tokio::fs::create_dir_all(&self.directory).await?;
                info!(directory = %self.directory.display(), "Created polled directory");
                Ok(false)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PollError::Lister(format!(
                "directory {} does not exist",
                self.directory.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.directory)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl Lister<FileEntry> for DirectoryLister {
    async fn list_snapshot(&self) -> PollResult<Vec<FileEntry>> {
        if !self.ensure_directory().await? {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut pending = vec![self.directory.clone()];
        while let Some(directory) = pending.pop() {
            let Some(mut entries) =
                skip_vanished(tokio::fs::read_dir(&directory).await, &directory)?
            else {
                continue;
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let Some(metadata) = skip_vanished(entry.metadata().await, &path)? else {
                    continue;
                };
                if metadata.is_dir() {
                    if self.recursive {
                        pending.push(path);
                    }
                    continue;
                }
                if !metadata.is_file() {
                    continue;
                }

                let modified_millis = metadata
                    .modified()
                    .map(|modified| DateTime::<Utc>::from(modified).timestamp_millis())
                    .unwrap_or_default();
                files.push(FileEntry {
                    relative_path: self.relative_path(&path),
                    file_name: entry.file_name().to_string_lossy().into_owned(),
                    size: metadata.len(),
                    modified_millis,
                    path,
                });
            }
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        debug!(directory = %self.directory.display(), files = files.len(), "Directory listed");
        Ok(files)
    }
}

/// Entries removed between listing and inspection are skipped.
fn skip_vanished<T>(result: std::io::Result<T>, path: &Path) -> PollResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Entry vanished during listing, skipped");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(files: &[FileEntry]) -> Vec<&str> {
        files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[tokio::test]
    async fn test_lists_files_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), b"c").unwrap();

        let files = DirectoryLister::new(dir.path()).list_snapshot().await.unwrap();
        assert_eq!(names(&files), vec!["a.txt", "b.txt"]);
        assert_eq!(files[1].size, 2);
        assert_eq!(files[1].file_name, "b.txt");
        assert!(files[1].modified_millis > 0);
    }

    #[test]
    fn test_vanished_entries_are_skipped() {
        let path = Path::new("/data/in/gone.txt");
        let gone: std::io::Result<u64> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(skip_vanished(gone, path).unwrap().is_none());
        assert_eq!(skip_vanished(Ok(7u64), path).unwrap(), Some(7));

        let denied: std::io::Result<u64> =
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        assert!(skip_vanished(denied, path).is_err());
    }

    #[tokio::test]
    async fn test_recursive_listing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir_all(dir.path().join("x").join("y")).unwrap();
        std::fs::write(dir.path().join("x").join("y").join("z.txt"), b"z").unwrap();

        let files = DirectoryLister::new(dir.path())
            .recursive(true)
            .list_snapshot()
            .await
            .unwrap();
        assert_eq!(names(&files), vec!["a.txt", "x/y/z.txt"]);
        assert_eq!(files[1].file_name, "z.txt");
    }

    #[tokio::test]
    async fn test_missing_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path().join("inbox");

        let files = DirectoryLister::new(&inbox).list_snapshot().await.unwrap();
        assert!(files.is_empty());
        assert!(inbox.is_dir());
    }

    #[tokio::test]
    async fn test_missing_directory_without_auto_create_fails() {
        let dir = TempDir::new().unwrap();
        let lister = DirectoryLister::new(dir.path().join("inbox")).auto_create_directory(false);

        let result = lister.list_snapshot().await;
        assert!(matches!(result, Err(PollError::Lister(_))));
        assert!(!dir.path().join("inbox").exists());
    }

    #[tokio::test]
    async fn test_file_path_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();

        let result = DirectoryLister::new(&file).list_snapshot().await;
        assert!(matches!(result, Err(PollError::Lister(_))));
    }

    #[test]
    fn test_headers_and_freshness() {
        let entry = FileEntry {
            path: PathBuf::from("/data/in/x/report.csv"),
            relative_path: "x/report.csv".to_string(),
            file_name: "report.csv".to_string(),
            size: 10,
            modified_millis: 1_700_000_000_000,
        };
        let headers = entry.headers();
        assert_eq!(headers[FILE_NAME_HEADER], "report.csv");
        assert_eq!(headers[RELATIVE_PATH_HEADER], "x/report.csv");
        assert_eq!(entry.freshness(), (1_700_000_000_000, 10));
    }
}
