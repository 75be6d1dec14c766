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

use colored::Colorize;
use std::{fmt::Display, path::PathBuf};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("no manifest file found at {0:?}")]
    MissingManifest(PathBuf),
    #[error("failed to read manifest {0:?}: {1}")]
    MalformedManifest(PathBuf, LastError),
    #[error("command must be ran from the current working ip: no ip found in current directory or any parent directory")]
    NoWorkingIpFound,
    #[error("checksum mismatch for ip {0}: lockfile records {1} but found {2}{3}")]
    ChecksumMismatch(String, String, String, Hint),
    #[error("cyclic dependency detected: {0}")]
    CyclicDependency(String),
    #[error("ip {0} is requested with conflicting versions: {1} and {2}")]
    VersionConflict(String, String, String),
    #[error("multiple {0} candidates found: {1}{2}")]
    AmbiguousTopLevel(String, String, Hint),
    #[error("no top-level unit found in the current ip{0}")]
    NoTopLevelFound(Hint),
    #[error("invalid fileset {0:?}: {1}")]
    InvalidGlob(String, LastError),
    #[error("fileset {0:?} is defined as {1:?} but plugin defines it as {2:?}{3}")]
    FilesetConflict(String, String, String, Hint),
    #[error("no plugin named {0:?}{1}")]
    PluginNotFound(String, Hint),
    #[error("lockfile {0:?} cannot be used: {1}{2}")]
    StaleLockRejected(PathBuf, LastError, Hint),
    #[error("ip {0} could not be found: {1}")]
    IpNotFound(String, LastError),
    #[error("ip {0} is ambiguous between: {1}")]
    AmbiguousIp(String, String),
    #[error("failed to fetch ip {0}: {1}")]
    FetchFailed(String, LastError),
    #[error("build directory {0:?} must be located inside the current ip")]
    InvalidBuildDir(PathBuf),
    #[error("failed to load configuration {0:?}: {1}")]
    ConfigInvalid(PathBuf, LastError),
    #[error("failed to access {0:?}: {1}")]
    Io(PathBuf, LastError),
}

#[derive(Debug, PartialEq)]
pub struct LastError(pub String);

impl Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Error::lowerize(self.0.to_string()))
    }
}

impl Error {
    /// Creates an [Error::Io] for the `path` from any displayable error.
    pub fn io(path: &std::path::Path, e: impl Display) -> Self {
        Self::Io(path.to_path_buf(), LastError(e.to_string()))
    }

    pub fn lowerize(s: String) -> String {
        // get the first word
        let first_word = match s.split_whitespace().next() {
            Some(w) => w,
            None => return s,
        };
        // retain punctuation if the first word is all-caps and longer than 1 character
        if first_word.len() > 1
            && first_word
                .chars()
                .find(|c| c.is_ascii_lowercase() == true)
                .is_none()
        {
            s.to_string()
        } else {
            s.char_indices()
                .map(|(i, c)| if i == 0 { c.to_ascii_lowercase() } else { c })
                .collect()
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Hint {
    None,
    ForceLock,
    ForcePlugin,
    RemoteChanged,
    PluginsList,
    TopFlag,
    BenchFlag,
}

impl Display for Hint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::None => return Ok(()),
            Self::ForceLock => "use \"--force\" to discard the lockfile and resolve again",
            Self::ForcePlugin => "use \"--force\" to let the plugin's pattern take precedence",
            Self::RemoteChanged => {
                "the ip's contents changed since it was locked; if the change is expected, remove its entry from the lockfile"
            }
            Self::PluginsList => "use `orbit-plan --list` to see the list of defined plugins",
            Self::TopFlag => "use \"--top\" to select the top-level unit",
            Self::BenchFlag => "use \"--bench\" to select the testbench",
        };
        write!(
            f,
            "\n\n{}: {}",
            "hint".green(),
            Error::lowerize(message.to_string())
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowerize_first_letter() {
        assert_eq!(
            Error::lowerize(String::from("No such file")),
            "no such file"
        );
        assert_eq!(
            Error::lowerize(String::from("TOML parse error")),
            "TOML parse error"
        );
        assert_eq!(Error::lowerize(String::new()), "");
    }

    #[test]
    fn hint_none_is_silent() {
        let err = Error::NoTopLevelFound(Hint::None);
        assert_eq!(err.to_string(), "no top-level unit found in the current ip");
    }
}
