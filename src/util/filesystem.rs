//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::error::Error;
use ignore::WalkBuilder;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Recursively collects the files under `root` as sorted relative paths using
/// forward slashes.
///
/// Hidden files and ignored files are skipped. Any subdirectory holding a file
/// named `boundary` belongs to another ip and is not entered.
pub fn gather_current_files(root: &Path, boundary: &str) -> Vec<String> {
    let top = root.to_path_buf();
    let boundary = boundary.to_string();
    let walker = WalkBuilder::new(root)
        .filter_entry(move |e| {
            let is_nested = e.path() != top
                && e.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && e.path().join(&boundary).exists();
            is_nested == false
        })
        .build();

    let mut files: Vec<String> = walker
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?;
            Some(into_std_str(rel))
        })
        .collect();
    files.sort();
    files
}

/// Renders a path with forward slashes regardless of platform.
pub fn into_std_str(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Lexically resolves `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => (),
            Component::ParentDir => {
                if result.pop() == false {
                    result.push("..");
                }
            }
            _ => result.push(comp.as_os_str()),
        }
    }
    result
}

/// Expresses `path` relative to the directory `base`.
///
/// Both paths are normalized first. Returns `None` when no relative path
/// exists, such as when the two paths sit on different prefixes.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = normalize(path);
    let base = normalize(base);
    if path.is_absolute() != base.is_absolute() {
        return None;
    }
    let mut ita = path.components().peekable();
    let mut itb = base.components().peekable();
    // skip the shared prefix
    while let (Some(a), Some(b)) = (ita.peek(), itb.peek()) {
        if a != b {
            break;
        }
        ita.next();
        itb.next();
    }
    let mut result = PathBuf::new();
    for comp in itb {
        match comp {
            Component::Normal(_) => result.push(".."),
            _ => return None,
        }
    }
    for comp in ita {
        result.push(comp.as_os_str());
    }
    Some(result)
}

/// Replaces the file at `path` with `contents`.
///
/// The bytes are first written to a temporary file in the same directory and
/// then renamed over the destination, so readers never observe a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(p) if p.as_os_str().is_empty() == false => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| Error::io(&dir, e))?;
    temp.write_all(contents).map_err(|e| Error::io(path, e))?;
    temp.flush().map_err(|e| Error::io(path, e))?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Removes everything inside the directory `dir`, keeping the directory itself.
///
/// Does nothing if the directory does not exist.
pub fn clean_dir(dir: &Path) -> Result<(), Error> {
    if dir.is_dir() == false {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let result = match entry.file_type().map_err(|e| Error::io(&path, e))?.is_dir() {
            true => std::fs::remove_dir_all(&path),
            false => std::fs::remove_file(&path),
        };
        result.map_err(|e| Error::io(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalize_path() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("/root/ip/build/..")), PathBuf::from("/root/ip"));
    }

    #[test]
    fn relative_path() {
        assert_eq!(
            relative_to(Path::new("/work/adder"), Path::new("/work/alu")),
            Some(PathBuf::from("../adder"))
        );
        assert_eq!(
            relative_to(Path::new("/work/alu/deps/x"), Path::new("/work/alu")),
            Some(PathBuf::from("deps/x"))
        );
        assert_eq!(
            relative_to(Path::new("/work/alu"), Path::new("/work/alu")),
            Some(PathBuf::new())
        );
        assert_eq!(relative_to(Path::new("a/b"), Path::new("/work")), None);
    }

    #[test]
    fn gather_skips_nested_ips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("rtl")).unwrap();
        std::fs::create_dir_all(root.join("deps/gates")).unwrap();
        std::fs::write(root.join("Orbit.toml"), "").unwrap();
        std::fs::write(root.join("rtl/top.vhd"), "").unwrap();
        std::fs::write(root.join("rtl/alu.vhd"), "").unwrap();
        std::fs::write(root.join(".hidden"), "").unwrap();
        std::fs::write(root.join("deps/gates/Orbit.toml"), "").unwrap();
        std::fs::write(root.join("deps/gates/and.vhd"), "").unwrap();

        assert_eq!(
            gather_current_files(root, "Orbit.toml"),
            vec!["Orbit.toml", "rtl/alu.vhd", "rtl/top.vhd"]
        );
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("build/blueprint.tsv");
        write_atomic(&file, b"first").unwrap();
        write_atomic(&file, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "second");
        // no temporary files are left behind
        assert_eq!(std::fs::read_dir(dir.path().join("build")).unwrap().count(), 1);
    }

    #[test]
    fn clean_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("build");
        std::fs::create_dir_all(build.join("sub")).unwrap();
        std::fs::write(build.join("sub/out.o"), "").unwrap();
        std::fs::write(build.join("blueprint.tsv"), "").unwrap();
        std::fs::write(dir.path().join("keep.vhd"), "").unwrap();

        clean_dir(&build).unwrap();
        assert_eq!(build.exists(), true);
        assert_eq!(std::fs::read_dir(&build).unwrap().count(), 0);
        assert_eq!(dir.path().join("keep.vhd").exists(), true);
        // missing directory is fine
        clean_dir(&dir.path().join("nothing")).unwrap();
    }
}
