/* src/device/path.rs */

use super::error::DeviceError;
use std::path::{Component, Path, PathBuf};

pub const SEPARATOR: char = '/';

/// Base directory every remote resource name is resolved against.
/// Fixed at startup.
#[derive(Debug, Clone)]
pub struct DataRoot(String);

impl DataRoot {
    pub fn new(root: impl Into<String>) -> Result<Self, DeviceError> {
        let root = root.into();
        if root.is_empty() {
            return Err(DeviceError::InvalidInput("data root is empty"));
        }
        Ok(DataRoot(root))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Joins and then refuses anything that climbs above the root.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, DeviceError> {
        let joined = join_remote(&self.0, name)?;
        let remainder = &joined[self.0.len()..];
        if escapes_root(remainder) {
            return Err(DeviceError::OutsideRoot(name.to_string()));
        }
        Ok(PathBuf::from(joined))
    }
}

/// Joins `root` and `name` with exactly one separator between them.
pub fn join_remote(root: &str, name: &str) -> Result<String, DeviceError> {
    if root.is_empty() {
        return Err(DeviceError::InvalidInput("data root is empty"));
    }
    if name.is_empty() {
        return Err(DeviceError::InvalidInput("resource name is empty"));
    }

    let root_sep = root.ends_with(SEPARATOR);
    let name_sep = name.starts_with(SEPARATOR);

    let joined = match (root_sep, name_sep) {
        (false, true) => format!("{}{}", root, name), // /tmp  /some/file
        (true, true) => format!("{}{}", root, &name[1..]), // /tmp/  /some/file
        (true, false) => format!("{}{}", root, name), // /tmp/  some/file
        (false, false) => format!("{}{}{}", root, SEPARATOR, name), // /tmp  some/file
    };
    Ok(joined)
}

/// Splits at the last separator into (directory, base name).
/// Without a separator the directory is empty and the base name is everything.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind(SEPARATOR) {
        Some(n) => (&path[..n], &path[n + 1..]),
        None => ("", path),
    }
}

fn escapes_root(remainder: &str) -> bool {
    let mut depth: usize = 0;
    for component in Path::new(remainder).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            Component::CurDir | Component::RootDir => {}
            Component::Prefix(_) => return true,
        }
    }
    false
}
