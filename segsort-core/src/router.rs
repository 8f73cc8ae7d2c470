//! Filesystem routing for triaged files.
//!
//! Three outcome directories exist: accepted, rejected, and originals. Moves into the
//! accepted/rejected directories replace same-named files; copies into the originals
//! directory never do.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use segsort_utils::config::PathSettings;
use walkdir::WalkDir;

use crate::error::{Result, TriageError};
use crate::session::TriageDecision;

/// Extensions picked up from the input directory.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "webp", "tif", "tiff"];

/// Destination directories for each outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub accepted: PathBuf,
    pub rejected: PathBuf,
    pub originals: PathBuf,
}

impl OutputLayout {
    /// `root/valid`, `root/invalid`, `root/original`.
    pub fn under(root: &Path) -> Self {
        PathSettings {
            output_dir: root.to_path_buf(),
            ..PathSettings::default()
        }
        .into()
    }
}

impl From<PathSettings> for OutputLayout {
    fn from(paths: PathSettings) -> Self {
        (&paths).into()
    }
}

impl From<&PathSettings> for OutputLayout {
    fn from(paths: &PathSettings) -> Self {
        Self {
            accepted: paths.accepted(),
            rejected: paths.rejected(),
            originals: paths.originals(),
        }
    }
}

/// Moves and copies files into the outcome directories.
#[derive(Debug, Clone)]
pub struct FileRouter {
    layout: OutputLayout,
}

impl FileRouter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Create every outcome directory that does not exist yet.
    pub fn ensure_directories(&self) -> Result<()> {
        ensure_directories([
            &self.layout.accepted,
            &self.layout.rejected,
            &self.layout.originals,
        ])
    }

    /// Directory that receives files with the given outcome.
    pub fn destination_dir(&self, decision: TriageDecision) -> &Path {
        match decision {
            TriageDecision::Accept => &self.layout.accepted,
            TriageDecision::Reject => &self.layout.rejected,
        }
    }

    /// Copy `source` unmodified into the originals directory.
    ///
    /// Fails with [`TriageError::CopyConflict`] when a same-named file is already there.
    pub fn preserve_original(&self, source: &Path) -> Result<PathBuf> {
        let target = self.layout.originals.join(file_name(source)?);
        copy_file(source, &target, false)?;
        debug!("Preserved original {} at {}", source.display(), target.display());
        Ok(target)
    }

    /// Write `bytes`, read from `source` before it was modified, into the originals directory
    /// under `source`'s file name.
    ///
    /// Same conflict rule as [`FileRouter::preserve_original`].
    pub fn preserve_original_bytes(&self, source: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.layout.originals.join(file_name(source)?);
        let mut writer = create_exclusive(source, &target)?;
        if let Err(err) = writer.write_all(bytes).and_then(|()| writer.sync_all()) {
            drop(writer);
            let _ = fs::remove_file(&target);
            return Err(TriageError::Copy {
                from: source.to_path_buf(),
                to: target,
                source: err,
            });
        }
        debug!("Preserved original {} at {}", source.display(), target.display());
        Ok(target)
    }

    /// Move `source` into the outcome directory, replacing a same-named file.
    pub fn route(&self, source: &Path, decision: TriageDecision) -> Result<PathBuf> {
        let target = self.destination_dir(decision).join(file_name(source)?);
        move_file(source, &target, true)?;
        debug!("Moved {} to {}", source.display(), target.display());
        Ok(target)
    }
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| TriageError::Directory {
        path: path.to_path_buf(),
        reason: "path has no file name".into(),
    })
}

/// Recursively create each directory; existing directories are fine.
pub fn ensure_directories<I, P>(paths: I) -> Result<()>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    for path in paths {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| TriageError::Directory {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Copy `from` to `to`.
///
/// With `overwrite == false` the destination is created exclusively, so an existing file
/// yields [`TriageError::CopyConflict`] and is left untouched.
pub fn copy_file(from: &Path, to: &Path, overwrite: bool) -> Result<()> {
    let copy_err = |source: io::Error| TriageError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if overwrite {
        fs::copy(from, to).map_err(copy_err)?;
        return Ok(());
    }

    let mut reader = fs::File::open(from).map_err(copy_err)?;
    let mut writer = create_exclusive(from, to)?;
    if let Err(err) = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all()) {
        drop(writer);
        let _ = fs::remove_file(to);
        return Err(copy_err(err));
    }
    Ok(())
}

/// Open `to` for writing only if it does not exist yet.
fn create_exclusive(from: &Path, to: &Path) -> Result<fs::File> {
    match OpenOptions::new().write(true).create_new(true).open(to) {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(TriageError::CopyConflict {
            path: to.to_path_buf(),
        }),
        Err(err) => Err(TriageError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: err,
        }),
    }
}

/// Move `from` to `to` with a rename.
///
/// Across filesystems the file is copied next to the destination, renamed into place, and
/// the source removed.
pub fn move_file(from: &Path, to: &Path, overwrite: bool) -> Result<()> {
    let move_err = |source: io::Error| TriageError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if !overwrite && to.exists() {
        return Err(move_err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination exists",
        )));
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                "{} and {} are on different filesystems; copying instead of renaming",
                from.display(),
                to.display()
            );
            let staging = to.with_file_name(format!(
                ".{}.segsort-partial",
                to.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            ));
            let result = fs::copy(from, &staging)
                .and_then(|_| fs::rename(&staging, to))
                .and_then(|_| fs::remove_file(from));
            if result.is_err() {
                let _ = fs::remove_file(&staging);
            }
            result.map_err(move_err)
        }
        Err(err) => Err(move_err(err)),
    }
}

/// List image files directly inside `dir`, sorted by file name.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TriageError::Directory {
            path: dir.to_path_buf(),
            reason: "input directory does not exist".into(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| TriageError::Directory {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_image = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image {
            files.push(entry.into_path());
        } else {
            debug!("Skipping non-image file {}", entry.path().display());
        }
    }
    Ok(files)
}
