//! Capability-based filesystem helpers for flag output directories.
//!
//! Paths are UTF-8 (`camino`); all IO goes through a `cap_std::fs_utf8::Dir`
//! opened once from ambient authority, so writers never escape the directory
//! they were handed.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::{Component, MAIN_SEPARATOR};

/// Staging directory, relative to an output root, for uncommitted files.
pub const STAGING_DIR: &str = "_temp";

/// Open a UTF-8 file path for reading using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Open an existing directory using ambient authority.
pub fn open_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    fs_utf8::Dir::open_ambient_dir(path, ambient_authority())
}

/// Whether `path` names a directory. Missing paths surface as `NotFound`.
pub fn is_dir(path: &Utf8Path) -> io::Result<bool> {
    if path.file_name().is_none() {
        return open_dir(path).map(|_| true);
    }
    let (dir, file_name) = open_dir_and_file(path)?;
    Ok(dir.metadata(&file_name)?.is_dir())
}

/// Open the parent directory of `path` and return it with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} has no file name")))?
        .to_owned();
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Split `path` into an ambient root directory and the path below it.
///
/// Absolute paths resolve from the filesystem root (or drive prefix);
/// relative paths resolve from the working directory.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let base = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(format!("{prefix}{MAIN_SEPARATOR}"))
        }
        Some(Component::RootDir) => Utf8PathBuf::from(MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if base == "." {
        path.to_path_buf()
    } else {
        path.strip_prefix(&base)
            .map_err(|_| io::Error::other(format!("cannot strip {base} from {path}")))?
            .to_path_buf()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

/// Create `path` and its ancestors, returning a handle to it.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let (base, relative) = base_dir_and_relative(path)?;
    if relative.as_str().is_empty() {
        return Ok(base);
    }
    base.create_dir_all(&relative)?;
    base.open_dir(&relative)
}

/// Write `bytes` to `name` under `dir` so readers never see a partial file.
///
/// The content is written to [`STAGING_DIR`]`/<name>` and then renamed into
/// place; an existing file of the same name is replaced.
pub fn write_committed(dir: &fs_utf8::Dir, name: &str, bytes: &[u8]) -> io::Result<()> {
    dir.create_dir_all(STAGING_DIR)?;
    let staged = Utf8Path::new(STAGING_DIR).join(name);
    dir.write(&staged, bytes)?;
    dir.rename(&staged, dir, name)
}

/// Regular files under `dir` with the given extension, sorted by name.
pub fn list_files(dir: &fs_utf8::Dir, extension: &str) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in dir.entries()? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name()?;
        if Utf8Path::new(&name).extension() == Some(extension) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
