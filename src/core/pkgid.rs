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

//! A `pkgid` is a unique string following VLNV format that allows reference
//! to a particular ip.

use serde::de::{self, Deserialize};
use std::error::Error;
use std::fmt::{self, Display};
use std::hash::Hash;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct PkgPart(String);

impl PkgPart {
    /// Returns the part in a form where case and `-`/`_` no longer matter.
    fn normalized(&self) -> String {
        self.0.replace('-', "_").to_lowercase()
    }

    /// Transforms the part into a valid HDL library identifier.
    pub fn to_hdl_identifier(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl FromStr for PkgPart {
    type Err = PkgIdError;

    /// Verifies a part follows the `PkgId` specification.
    ///
    /// First character must be `alphabetic`. Remaining characters must be
    /// `ascii alphanumeric`, `-`, or `_`.
    fn from_str(s: &str) -> Result<Self, PkgIdError> {
        use PkgIdError::*;

        match s.chars().next() {
            Some(c) => {
                if c.is_ascii_alphabetic() == false {
                    return Err(NotAlphabeticFirst(s.to_owned()));
                }
            }
            None => return Err(Empty),
        }
        // find first char in pkgid part not following the naming rules
        let result = s
            .chars()
            .find(|&c| !c.is_ascii_alphanumeric() && !(c == '_') && !(c == '-'));
        match result {
            Some(r) => Err(InvalidChar(s.to_owned(), r)),
            None => Ok(PkgPart(s.to_owned())),
        }
    }
}

impl PartialEq for PkgPart {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for PkgPart {}

impl Hash for PkgPart {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl Ord for PkgPart {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.normalized().cmp(&other.normalized())
    }
}

impl PartialOrd for PkgPart {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for PkgPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for PkgPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct PartVisitor;

        impl<'de> de::Visitor<'de> for PartVisitor {
            type Value = PkgPart;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an identifier")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                PkgPart::from_str(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(PartVisitor)
    }
}

/// The complete identity of an ip: vendor, library, and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PkgId {
    vendor: PkgPart,
    library: PkgPart,
    name: PkgPart,
}

impl PkgId {
    pub fn new(vendor: PkgPart, library: PkgPart, name: PkgPart) -> Self {
        Self {
            vendor: vendor,
            library: library,
            name: name,
        }
    }

    pub fn get_name(&self) -> &PkgPart {
        &self.name
    }

    pub fn get_library(&self) -> &PkgPart {
        &self.library
    }

    pub fn get_vendor(&self) -> &PkgPart {
        &self.vendor
    }
}

impl Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.vendor, self.library, self.name)
    }
}

impl FromStr for PkgId {
    type Err = PkgIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let partial = PartialPkgId::from_str(s)?;
        match (partial.vendor, partial.library) {
            (Some(v), Some(l)) => Ok(Self::new(v, l, partial.name)),
            (None, Some(_)) => Err(PkgIdError::MissingVendor),
            _ => Err(PkgIdError::MissingLibrary),
        }
    }
}

/// A reference to an ip where the vendor and library may be left out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialPkgId {
    vendor: Option<PkgPart>,
    library: Option<PkgPart>,
    name: PkgPart,
}

impl PartialPkgId {
    pub fn get_name(&self) -> &PkgPart {
        &self.name
    }

    /// Checks if every part specified in `self` agrees with the identity `id`.
    pub fn matches(&self, id: &PkgId) -> bool {
        self.name == id.name
            && self.library.as_ref().map_or(true, |l| l == &id.library)
            && self.vendor.as_ref().map_or(true, |v| v == &id.vendor)
    }
}

impl Display for PartialPkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = &self.vendor {
            write!(f, "{}.", v)?;
        }
        if let Some(l) = &self.library {
            write!(f, "{}.", l)?;
        }
        write!(f, "{}", self.name)
    }
}

impl From<&PkgId> for PartialPkgId {
    fn from(value: &PkgId) -> Self {
        Self {
            vendor: Some(value.vendor.clone()),
            library: Some(value.library.clone()),
            name: value.name.clone(),
        }
    }
}

impl FromStr for PartialPkgId {
    type Err = PkgIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chunks: Vec<&str> = s.trim().rsplit('.').collect();
        if chunks.len() > 3 {
            return Err(PkgIdError::BadLen(s.to_owned(), chunks.len()));
        }
        Ok(Self {
            name: PkgPart::from_str(chunks[0])?,
            library: match chunks.get(1) {
                Some(l) => Some(PkgPart::from_str(l)?),
                None => None,
            },
            vendor: match chunks.get(2) {
                Some(v) => Some(PkgPart::from_str(v)?),
                None => None,
            },
        })
    }
}

#[derive(Debug, PartialEq)]
pub enum PkgIdError {
    NotAlphabeticFirst(String),
    BadLen(String, usize),
    Empty,
    InvalidChar(String, char),
    MissingVendor,
    MissingLibrary,
}

impl Error for PkgIdError {}

impl Display for PkgIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PkgIdError::*;
        match self {
            NotAlphabeticFirst(part) => write!(
                f,
                "pkgid part '{}' must begin with alphabetic character",
                part
            ),
            BadLen(id, len) => write!(
                f,
                "bad length for pkgid '{}'; expecting at most 3 parts but found {}",
                id, len
            ),
            InvalidChar(part, ch) => write!(f, "invalid character {} in pkgid part '{}'; can only contain alphanumeric characters, dashes, or underscores", ch, part),
            Empty => write!(f, "empty pkgid part"),
            MissingLibrary => write!(f, "missing library part"),
            MissingVendor => write!(f, "missing vendor part"),
        }
    }
}
