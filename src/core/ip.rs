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

use crate::core::manifest::{Manifest, IP_MANIFEST_FILE};
use crate::core::pkgid::{PkgId, PkgIdError};
use crate::core::version::{Version, VersionError};
use crate::error::Error;
use crate::util::checksum::{self, Sha256Hash};
use crate::util::filesystem;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// An ip identity pinned to a single version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpSpec {
    id: PkgId,
    version: Version,
}

impl IpSpec {
    pub fn new(id: PkgId, version: Version) -> Self {
        Self {
            id: id,
            version: version,
        }
    }

    pub fn get_id(&self) -> &PkgId {
        &self.id
    }

    pub fn get_version(&self) -> &Version {
        &self.version
    }
}

impl Display for IpSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.id, self.version)
    }
}

#[derive(Debug, PartialEq)]
pub enum IpSpecError {
    MissingVersion,
    Id(PkgIdError),
    Version(VersionError),
}

impl std::error::Error for IpSpecError {}

impl Display for IpSpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVersion => write!(f, "missing ':' followed by a version"),
            Self::Id(e) => write!(f, "{}", e),
            Self::Version(e) => write!(f, "{}", e),
        }
    }
}

impl FromStr for IpSpec {
    type Err = IpSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, version) = s.rsplit_once(':').ok_or(IpSpecError::MissingVersion)?;
        Ok(Self {
            id: PkgId::from_str(id).map_err(IpSpecError::Id)?,
            version: Version::from_str(version).map_err(IpSpecError::Version)?,
        })
    }
}

/// An [IpSpec] along with the fingerprint of the manifest it was read from.
///
/// Two `IpVersion`s are interchangeable only if all three pieces agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpVersion {
    spec: IpSpec,
    fingerprint: Sha256Hash,
}

impl IpVersion {
    pub fn new(spec: IpSpec, fingerprint: Sha256Hash) -> Self {
        Self {
            spec: spec,
            fingerprint: fingerprint,
        }
    }

    pub fn get_spec(&self) -> &IpSpec {
        &self.spec
    }

    pub fn get_fingerprint(&self) -> &Sha256Hash {
        &self.fingerprint
    }
}

/// An ip located on the filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct Ip {
    root: PathBuf,
    man: Manifest,
    identity: PkgId,
    fingerprint: Sha256Hash,
}

impl Ip {
    /// Loads the ip whose manifest lives directly inside `root`.
    pub fn load(root: PathBuf) -> Result<Self, Error> {
        let man = Manifest::from_file(&root.join(IP_MANIFEST_FILE))?;
        Ok(Self {
            identity: man.get_identity(),
            fingerprint: man.fingerprint(),
            root: root,
            man: man,
        })
    }

    /// Finds the working ip by checking `start` and then each of its parent directories.
    pub fn find_working(start: &Path) -> Result<Self, Error> {
        let mut dir = Some(start);
        while let Some(d) = dir {
            if d.join(IP_MANIFEST_FILE).is_file() == true {
                return Self::load(d.to_path_buf());
            }
            dir = d.parent();
        }
        Err(Error::NoWorkingIpFound)
    }

    pub fn get_root(&self) -> &PathBuf {
        &self.root
    }

    pub fn get_man(&self) -> &Manifest {
        &self.man
    }

    pub fn get_identity(&self) -> &PkgId {
        &self.identity
    }

    pub fn get_version(&self) -> &Version {
        self.man.get_ip().get_version()
    }

    pub fn get_fingerprint(&self) -> &Sha256Hash {
        &self.fingerprint
    }

    /// Returns the HDL library name that the ip's design units are compiled into.
    pub fn get_hdl_library(&self) -> String {
        self.identity.get_library().to_hdl_identifier()
    }

    pub fn to_ip_spec(&self) -> IpSpec {
        IpSpec::new(self.identity.clone(), self.get_version().clone())
    }

    pub fn to_ip_version(&self) -> IpVersion {
        IpVersion::new(self.to_ip_spec(), self.fingerprint.clone())
    }

    /// Lists the files belonging to this ip, relative to its root.
    pub fn gather_files(&self) -> Vec<String> {
        filesystem::gather_current_files(&self.root, IP_MANIFEST_FILE)
    }

    /// Computes the checksum over the ip's files.
    pub fn compute_checksum(&self) -> Result<Sha256Hash, Error> {
        checksum::checksum(&self.gather_files(), &self.root)
    }
}
