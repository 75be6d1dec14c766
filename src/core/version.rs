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

//! A `version` contains numeric values at 3 levels for informing about
//! varying degrees of changes within an ip's lifetime.

use serde::de::{self, Deserialize};
use std::error::Error;
use std::fmt::{self, Display};
use std::num::ParseIntError;
use std::str::FromStr;

type VerNum = u16;

/// Checks if a partial version `pv` umbrellas the full version `ver`.
pub fn is_compatible(pv: &PartialVersion, ver: &Version) -> bool {
    if pv.major != ver.major {
        return false;
    }
    match pv.minor {
        Some(m) => {
            m == ver.minor
                && match pv.patch {
                    Some(p) => p == ver.patch,
                    None => true,
                }
        }
        None => true,
    }
}

#[derive(Debug, PartialEq, PartialOrd, Clone, Eq, Ord, Hash)]
pub struct PartialVersion {
    major: VerNum,
    minor: Option<VerNum>,
    patch: Option<VerNum>,
}

impl PartialVersion {
    pub fn new() -> Self {
        PartialVersion {
            major: 0,
            minor: None,
            patch: None,
        }
    }

    pub fn major(mut self, m: VerNum) -> Self {
        self.major = m;
        self
    }

    pub fn minor(mut self, m: VerNum) -> Self {
        self.minor = Some(m);
        self
    }

    pub fn patch(mut self, m: VerNum) -> Self {
        self.patch = Some(m);
        self
    }

    /// Returns the highest compatible version from the list of versions.
    ///
    /// Returns `None` if the list is empty or there are zero that meet the
    /// criteria.
    pub fn find_highest<'a, I>(&self, vers: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        vers.into_iter()
            .filter(|v| is_compatible(self, v) == true)
            .max()
    }
}

impl Display for PartialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(m) = self.minor {
            write!(f, ".{}", m)?;
            if let Some(p) = self.patch {
                write!(f, ".{}", p)?;
            }
        }
        Ok(())
    }
}

impl FromStr for PartialVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::EmptyVersion);
        }
        let levels: Vec<&str> = s.split('.').collect();
        if levels.len() > 3 {
            return Err(VersionError::ExtraLevels(levels.len()));
        }
        Ok(PartialVersion {
            major: levels[0].parse::<VerNum>()?,
            minor: match levels.get(1) {
                Some(v) => Some(v.parse::<VerNum>()?),
                None => None,
            },
            patch: match levels.get(2) {
                Some(v) => Some(v.parse::<VerNum>()?),
                None => None,
            },
        })
    }
}

#[derive(Debug, PartialEq, PartialOrd, Clone, Ord, Eq, Hash)]
pub struct Version {
    major: VerNum,
    minor: VerNum,
    patch: VerNum,
}

impl Version {
    pub fn new() -> Self {
        Version {
            major: 0,
            minor: 0,
            patch: 0,
        }
    }

    pub fn major(mut self, m: VerNum) -> Self {
        self.major = m;
        self
    }

    pub fn minor(mut self, m: VerNum) -> Self {
        self.minor = m;
        self
    }

    pub fn patch(mut self, p: VerNum) -> Self {
        self.patch = p;
        self
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pv = PartialVersion::from_str(s)?;
        Ok(Version {
            major: pv.major,
            minor: pv.minor.ok_or(VersionError::MissingMinor)?,
            patch: pv.patch.ok_or(VersionError::MissingPatch)?,
        })
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Implements [Deserialize] for a type parsed from a single string.
macro_rules! deserialize_from_str {
    ($ty:ty, $expecting:literal) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<$ty, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                struct LayerVisitor;

                impl<'de> de::Visitor<'de> for LayerVisitor {
                    type Value = $ty;

                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                    where
                        E: de::Error,
                    {
                        <$ty>::from_str(v).map_err(de::Error::custom)
                    }
                }

                deserializer.deserialize_str(LayerVisitor)
            }
        }
    };
}

deserialize_from_str!(Version, "a semantic version");
deserialize_from_str!(PartialVersion, "a partial semantic version");

#[derive(Debug, PartialEq)]
pub enum VersionError {
    EmptyVersion,
    MissingMinor,
    MissingPatch,
    ExtraLevels(usize),
    InvalidDigit(ParseIntError),
}

impl Error for VersionError {}

impl Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VersionError::*;
        match self {
            EmptyVersion => write!(f, "empty version"),
            MissingMinor => write!(f, "missing minor number"),
            MissingPatch => write!(f, "missing patch number"),
            ExtraLevels(l) => write!(
                f,
                "too many version positions; found {} expected 3",
                l
            ),
            InvalidDigit(_) => write!(f, "invalid digit in version"),
        }
    }
}

impl From<ParseIntError> for VersionError {
    fn from(e: ParseIntError) -> Self {
        VersionError::InvalidDigit(e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    mod partial_ver {
        use super::*;

        #[test]
        fn is_compat() {
            let pv = PartialVersion::new().major(1);
            assert_eq!(is_compatible(&pv, &Version::new().major(1).minor(2).patch(3)), true);
            assert_eq!(is_compatible(&pv, &Version::new().major(2).minor(1).patch(3)), false);

            let pv = PartialVersion::new().major(2).minor(1);
            assert_eq!(is_compatible(&pv, &Version::new().major(2).minor(2).patch(3)), false);
            assert_eq!(is_compatible(&pv, &Version::new().major(2).minor(1).patch(3)), true);

            let pv = PartialVersion::new().major(2).minor(1).patch(3);
            assert_eq!(is_compatible(&pv, &Version::new().major(2).minor(1).patch(3)), true);
            assert_eq!(is_compatible(&pv, &Version::new().major(2).minor(1).patch(4)), false);
        }

        #[test]
        fn display() {
            assert_eq!(PartialVersion::new().major(1).to_string(), "1");
            assert_eq!(PartialVersion::new().major(1).minor(2).to_string(), "1.2");
            assert_eq!(
                PartialVersion::new().major(1).minor(2).patch(3).to_string(),
                "1.2.3"
            );
        }

        #[test]
        fn find_highest() {
            let versions = vec![
                Version::new().major(2).minor(1).patch(1),
                Version::new().major(4).minor(2).patch(5),
                Version::new().major(1).minor(2).patch(5),
                Version::new().major(1).minor(3).patch(4),
                Version::new().major(1).minor(0).patch(0),
            ];
            let pv = PartialVersion::new().major(1);
            assert_eq!(
                pv.find_highest(&versions),
                Some(&Version::new().major(1).minor(3).patch(4))
            );
            let pv = PartialVersion::new().major(4).minor(3);
            assert_eq!(pv.find_highest(&versions), None);
        }

        #[test]
        fn from_str() {
            assert_eq!(
                PartialVersion::from_str("1.2.3"),
                Ok(PartialVersion::new().major(1).minor(2).patch(3))
            );
            assert_eq!(
                PartialVersion::from_str("19.4"),
                Ok(PartialVersion::new().major(19).minor(4))
            );
            assert_eq!(
                PartialVersion::from_str("1.2.3.4"),
                Err(VersionError::ExtraLevels(4))
            );
            assert_eq!(PartialVersion::from_str(" "), Err(VersionError::EmptyVersion));
            assert!(PartialVersion::from_str("1.x").is_err());
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Version::from_str("0.21.3"),
            Ok(Version::new().minor(21).patch(3))
        );
        assert_eq!(Version::from_str("1.2"), Err(VersionError::MissingPatch));
        assert_eq!(Version::from_str("1"), Err(VersionError::MissingMinor));
    }

    #[test]
    fn ordering() {
        let v1 = Version::from_str("1.10.0").unwrap();
        let v2 = Version::from_str("1.9.12").unwrap();
        assert!(v1 > v2);
    }
}
