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

use crate::core::pkgid::{PartialPkgId, PkgId, PkgPart};
use crate::core::version::{PartialVersion, Version};
use crate::error::{Error, LastError};
use crate::util::anyerror::AnyError;
use crate::util::checksum::Sha256Hash;
use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const IP_MANIFEST_FILE: &str = "Orbit.toml";

#[derive(Deserialize, Debug)]
struct RawManifest {
    ip: Package,
    dependencies: Option<toml::Table>,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct Package {
    name: PkgPart,
    library: PkgPart,
    vendor: PkgPart,
    version: Version,
    source: Option<String>,
}

impl Package {
    pub fn get_name(&self) -> &PkgPart {
        &self.name
    }

    pub fn get_version(&self) -> &Version {
        &self.version
    }

    pub fn get_source(&self) -> Option<&String> {
        self.source.as_ref()
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct DetailedDependency {
    version: PartialVersion,
    path: Option<PathBuf>,
    source: Option<String>,
}

/// A single entry under the `[dependencies]` table.
#[derive(Debug, PartialEq, Clone)]
pub struct Dependency {
    id: PartialPkgId,
    version: PartialVersion,
    path: Option<PathBuf>,
    source: Option<String>,
}

impl Dependency {
    pub fn new(id: PartialPkgId, version: PartialVersion) -> Self {
        Self {
            id: id,
            version: version,
            path: None,
            source: None,
        }
    }

    pub fn path(mut self, p: PathBuf) -> Self {
        self.path = Some(p);
        self
    }

    pub fn source(mut self, s: &str) -> Self {
        self.source = Some(s.to_string());
        self
    }

    pub fn get_id(&self) -> &PartialPkgId {
        &self.id
    }

    pub fn get_version(&self) -> &PartialVersion {
        &self.version
    }

    pub fn get_path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn get_source(&self) -> Option<&String> {
        self.source.as_ref()
    }

    fn from_toml(key: &str, value: toml::Value) -> Result<Self, AnyError> {
        let id = PartialPkgId::from_str(key)
            .map_err(|e| AnyError(format!("dependency {:?}: {}", key, e)))?;
        match value {
            toml::Value::String(s) => {
                let version = PartialVersion::from_str(&s)
                    .map_err(|e| AnyError(format!("dependency {:?}: {}", key, e)))?;
                Ok(Self::new(id, version))
            }
            toml::Value::Table(_) => {
                let detail: DetailedDependency = value
                    .try_into()
                    .map_err(|e| AnyError(format!("dependency {:?}: {}", key, e)))?;
                Ok(Self {
                    id: id,
                    version: detail.version,
                    path: detail.path,
                    source: detail.source,
                })
            }
            _ => Err(AnyError(format!(
                "dependency {:?} must be a version string or a table",
                key
            ))),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Manifest {
    ip: Package,
    dependencies: Vec<Dependency>,
}

impl FromStr for Manifest {
    type Err = AnyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawManifest = toml::from_str(s).map_err(|e| AnyError(e.to_string()))?;
        let mut dependencies = Vec::new();
        for (key, value) in raw.dependencies.unwrap_or_default() {
            dependencies.push(Dependency::from_toml(&key, value)?);
        }
        Ok(Self {
            ip: raw.ip,
            dependencies: dependencies,
        })
    }
}

impl Manifest {
    /// Reads the manifest file living at `path`.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        if path.is_file() == false {
            return Err(Error::MissingManifest(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_str(&contents)
            .map_err(|e| Error::MalformedManifest(path.to_path_buf(), LastError(e.to_string())))
    }

    pub fn get_ip(&self) -> &Package {
        &self.ip
    }

    /// Returns the dependencies in their order of declaration.
    pub fn get_deps(&self) -> &Vec<Dependency> {
        &self.dependencies
    }

    pub fn get_identity(&self) -> PkgId {
        PkgId::new(
            self.ip.vendor.clone(),
            self.ip.library.clone(),
            self.ip.name.clone(),
        )
    }

    /// Computes a digest over everything that affects dependency resolution.
    ///
    /// Formatting and comments in the file do not change the fingerprint.
    pub fn fingerprint(&self) -> Sha256Hash {
        let mut canon = format!("ip={}\nversion={}\n", self.get_identity(), self.ip.version);
        for dep in &self.dependencies {
            canon.push_str(&format!(
                "dependency={};{};{};{}\n",
                dep.id,
                dep.version,
                dep.path
                    .as_ref()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default(),
                dep.source.as_deref().unwrap_or_default()
            ));
        }
        Sha256Hash::compute(canon.as_bytes())
    }
}

/// Finds the directories below `path` that hold a manifest.
///
/// A directory that holds a manifest is not searched any deeper.
pub fn find_ip_roots(path: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut result = Vec::new();
    let mut to_process = vec![path.to_path_buf()];
    while let Some(dir) = to_process.pop() {
        if dir.join(IP_MANIFEST_FILE).is_file() == true {
            result.push(dir);
            continue;
        }
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) == true {
                to_process.push(entry.path());
            }
        }
    }
    result.sort();
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;

    const M_1: &str = r#"
[ip]
name = "alu"
library = "rtl"
vendor = "ks-tech"
version = "1.0.0"

[dependencies]
gates = "1.0"
"ks-tech.common.adder" = { version = "2.1.0", path = "../adder" }
mux = { version = "0", source = "https://example.com/mux.zip" }
"#;

    #[test]
    fn from_str() {
        let man = Manifest::from_str(M_1).unwrap();
        assert_eq!(man.get_identity().to_string(), "ks-tech.rtl.alu");
        assert_eq!(man.get_ip().get_version().to_string(), "1.0.0");

        // declaration order is kept
        let deps: Vec<String> = man.get_deps().iter().map(|d| d.get_id().to_string()).collect();
        assert_eq!(deps, vec!["gates", "ks-tech.common.adder", "mux"]);

        let adder = &man.get_deps()[1];
        assert_eq!(adder.get_version().to_string(), "2.1.0");
        assert_eq!(adder.get_path(), Some(&PathBuf::from("../adder")));
        let mux = &man.get_deps()[2];
        assert_eq!(mux.get_source().unwrap(), "https://example.com/mux.zip");
    }

    #[test]
    fn missing_fields_are_rejected() {
        let missing_vendor = "[ip]\nname = \"alu\"\nlibrary = \"rtl\"\nversion = \"1.0.0\"\n";
        assert!(Manifest::from_str(missing_vendor).is_err());

        let bad_version = "[ip]\nname = \"alu\"\nlibrary = \"rtl\"\nvendor = \"v\"\nversion = \"1.0\"\n";
        assert!(Manifest::from_str(bad_version).is_err());

        let bad_dep = format!("{}\n[dependencies]\ngates = 1\n", &M_1[..M_1.find("[dependencies]").unwrap()]);
        assert!(Manifest::from_str(&bad_dep).is_err());
    }

    #[test]
    fn from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(IP_MANIFEST_FILE);
        assert_eq!(
            Manifest::from_file(&path),
            Err(Error::MissingManifest(path.clone()))
        );
        std::fs::write(&path, "[ip\n").unwrap();
        assert!(matches!(
            Manifest::from_file(&path),
            Err(Error::MalformedManifest(_, _))
        ));
    }

    #[test]
    fn fingerprint_ignores_formatting() {
        let man = Manifest::from_str(M_1).unwrap();
        let reformatted = M_1.replace("[dependencies]", "# deps\n[dependencies]\n");
        assert_eq!(
            Manifest::from_str(&reformatted).unwrap().fingerprint(),
            man.fingerprint()
        );
        let changed = M_1.replace("gates = \"1.0\"", "gates = \"1.1\"");
        assert_ne!(Manifest::from_str(&changed).unwrap().fingerprint(), man.fingerprint());
    }

    #[test]
    fn find_roots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/inner")).unwrap();
        std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
        std::fs::write(dir.path().join("a/Orbit.toml"), "").unwrap();
        std::fs::write(dir.path().join("a/inner/Orbit.toml"), "").unwrap();
        std::fs::write(dir.path().join("b/c/Orbit.toml"), "").unwrap();
        assert_eq!(
            find_ip_roots(dir.path()).unwrap(),
            vec![dir.path().join("a"), dir.path().join("b/c")]
        );
    }
}
