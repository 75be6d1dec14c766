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

use crate::error::{Error, Hint, LastError};
use colored::Colorize;
use glob::{MatchOptions, Pattern, PatternError};
use std::fmt::Display;
use std::str::FromStr;

const MATCH_OPTS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A glob-style pattern matched anywhere within an ip's file tree.
#[derive(Debug, Clone)]
pub struct Style {
    text: String,
    pattern: Pattern,
}

impl PartialEq for Style {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl FromStr for Style {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            text: s.to_string(),
            pattern: Pattern::new(&("**/".to_owned() + s))?,
        })
    }
}

impl Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Style {
    pub fn matches(&self, file: &str) -> bool {
        self.pattern.matches_with(file, MATCH_OPTS)
    }
}

/// Where a fileset was declared.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Origin {
    BuiltIn,
    User,
    Plugin,
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuiltIn => write!(f, "built-in"),
            Self::User => write!(f, "command-line"),
            Self::Plugin => write!(f, "plugin"),
        }
    }
}

#[derive(Debug)]
pub enum FilesetError {
    MissingSeparator(char),
    EmptyPattern,
    EmptyName,
    PatternError(String, PatternError),
}

impl std::error::Error for FilesetError {}

impl Display for FilesetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::EmptyPattern => write!(f, "empty pattern"),
            Self::EmptyName => write!(f, "empty name"),
            Self::MissingSeparator(c) => write!(f, "missing separator '{}'", c),
            Self::PatternError(p, e) => write!(f, "'{}' {}", p, e.to_string().to_lowercase()),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Fileset {
    name: String,
    patterns: Vec<Style>,
    origin: Origin,
}

impl FromStr for Fileset {
    type Err = FilesetError;

    /// Parses a `key=glob` pair given on the command-line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, pattern) = s
            .split_once('=')
            .ok_or(FilesetError::MissingSeparator('='))?;
        Self::new(name, &[pattern], Origin::User)
    }
}

impl Fileset {
    /// Creates a fileset named `name` matching any of `patterns`.
    pub fn new(name: &str, patterns: &[&str], origin: Origin) -> Result<Self, FilesetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FilesetError::EmptyName);
        }
        let mut styles = Vec::with_capacity(patterns.len());
        for p in patterns {
            if p.trim().is_empty() {
                return Err(FilesetError::EmptyPattern);
            }
            styles.push(
                Style::from_str(p).map_err(|e| FilesetError::PatternError(p.to_string(), e))?,
            );
        }
        Ok(Self {
            name: Self::standardize_name(name),
            patterns: styles,
            origin: origin,
        })
    }

    /// The filesets every ip contributes its HDL sources through.
    pub fn built_ins() -> Vec<Self> {
        [
            (VHDL_FILESET, &["*.vhd", "*.vhdl"]),
            (VLOG_FILESET, &["*.v", "*.vh"]),
            (SYSV_FILESET, &["*.sv", "*.svh"]),
        ]
        .into_iter()
        .map(|(name, patterns)| Self {
            name: name.to_string(),
            patterns: patterns
                .iter()
                .filter_map(|p| Style::from_str(p).ok())
                .collect(),
            origin: Origin::BuiltIn,
        })
        .collect()
    }

    /// Standardizes the name to be UPPER-AND-HYPHENS.
    fn standardize_name(s: &str) -> String {
        s.to_uppercase().replace('_', "-")
    }

    /// Returns the files from `files` that match at least one pattern.
    pub fn collect_files<'a>(&self, files: &'a [String]) -> Vec<&'a String> {
        files
            .iter()
            .filter(|f| self.patterns.iter().any(|p| p.matches(f)))
            .collect()
    }

    /// Replaces the `{{orbit.top}}` and `{{orbit.bench}}` placeholders in every pattern.
    pub fn substitute(&self, top: Option<&str>, bench: Option<&str>) -> Result<Self, Error> {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for p in &self.patterns {
            let text = p
                .text
                .replace("{{orbit.top}}", top.unwrap_or_default())
                .replace("{{orbit.bench}}", bench.unwrap_or_default());
            patterns.push(Style::from_str(&text).map_err(|e| {
                Error::InvalidGlob(format!("{}={}", self.name, text), LastError(e.to_string()))
            })?);
        }
        Ok(Self {
            name: self.name.clone(),
            patterns: patterns,
            origin: self.origin,
        })
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_origin(&self) -> Origin {
        self.origin
    }

    fn pattern_text(&self) -> String {
        self.patterns
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<&str>>()
            .join(", ")
    }
}

/// Converts a `key=glob` argument into a [Fileset] or an [Error::InvalidGlob].
pub fn parse_user_fileset(s: &str) -> Result<Fileset, Error> {
    Fileset::from_str(s).map_err(|e| Error::InvalidGlob(s.to_string(), LastError(e.to_string())))
}

/// Combines the built-in, user, and plugin filesets into one ordered list.
///
/// A user fileset replaces any earlier fileset of the same name. A plugin
/// fileset may not replace a built-in one with a different pattern unless
/// `force` is set, and never replaces a user fileset.
pub fn merge(
    built_in: Vec<Fileset>,
    user: Vec<Fileset>,
    plugin: Vec<Fileset>,
    force: bool,
) -> Result<Vec<Fileset>, Error> {
    let mut result = built_in;
    for fset in user.into_iter().chain(plugin.into_iter()) {
        let existing = match result.iter_mut().find(|f| f.name == fset.name) {
            Some(e) => e,
            None => {
                result.push(fset);
                continue;
            }
        };
        if existing.patterns == fset.patterns {
            continue;
        }
        match (existing.origin, fset.origin) {
            (_, Origin::User) => {
                println!(
                    "{}: fileset {} uses command-line pattern \"{}\" instead of {} pattern \"{}\"",
                    "warning".yellow(),
                    fset.name,
                    fset.pattern_text(),
                    existing.origin,
                    existing.pattern_text()
                );
                *existing = fset;
            }
            (Origin::User, Origin::Plugin) => (),
            (_, Origin::Plugin) => match force {
                true => {
                    println!(
                        "{}: fileset {} uses plugin pattern \"{}\" instead of {} pattern \"{}\"",
                        "warning".yellow(),
                        fset.name,
                        fset.pattern_text(),
                        existing.origin,
                        existing.pattern_text()
                    );
                    *existing = fset;
                }
                false => {
                    return Err(Error::FilesetConflict(
                        fset.name.clone(),
                        existing.pattern_text(),
                        fset.pattern_text(),
                        Hint::ForcePlugin,
                    ))
                }
            },
            (_, Origin::BuiltIn) => (),
        }
    }
    Ok(result)
}

pub const VHDL_FILESET: &str = "VHDL";
pub const VLOG_FILESET: &str = "VLOG";
pub const SYSV_FILESET: &str = "SYSV";
