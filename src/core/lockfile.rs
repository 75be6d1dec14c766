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

use crate::core::ip::{IpSpec, IpVersion};
use crate::core::pkgid::PkgId;
use crate::core::version::Version;
use crate::error::{Error, Hint, LastError};
use crate::util::anyerror::AnyError;
use crate::util::checksum::Sha256Hash;
use crate::util::filesystem;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use toml_edit::{Array, ArrayOfTables, Document, Item, Table};

pub const IP_LOCK_FILE: &str = "Orbit.lock";

const LOCK_VERSION: i64 = 1;

const LOCK_HEADER: &str = "\
# This file is automatically generated by orbit-plan.
# It is not intended for manual editing.
";

/// Where a locked ip was materialized from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A directory on the local filesystem, relative to the working ip when possible.
    Local(PathBuf),
    /// A remote archive reference.
    Remote(String),
}

impl Source {
    pub fn is_local(&self) -> bool {
        match self {
            Self::Local(_) => true,
            Self::Remote(_) => false,
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(p) => write!(f, "{}", filesystem::into_std_str(p)),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

fn get_str<'a>(table: &'a Table, key: &str) -> Result<&'a str, AnyError> {
    table
        .get(key)
        .and_then(|i| i.as_str())
        .ok_or(AnyError(format!("missing string field {:?}", key)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockEntry {
    ip: IpVersion,
    source: Option<Source>,
    sum: Option<Sha256Hash>,
    dependencies: Vec<IpSpec>,
}

impl LockEntry {
    pub fn new(
        ip: IpVersion,
        source: Option<Source>,
        sum: Option<Sha256Hash>,
        dependencies: Vec<IpSpec>,
    ) -> Self {
        Self {
            ip: ip,
            source: source,
            sum: sum,
            dependencies: dependencies,
        }
    }

    pub fn get_ip(&self) -> &IpVersion {
        &self.ip
    }

    pub fn get_spec(&self) -> &IpSpec {
        self.ip.get_spec()
    }

    pub fn get_source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn get_sum(&self) -> Option<&Sha256Hash> {
        self.sum.as_ref()
    }

    /// Returns the direct dependencies in their order of declaration.
    pub fn get_deps(&self) -> &Vec<IpSpec> {
        &self.dependencies
    }

    fn to_toml(&self, table: &mut Table) {
        let id = self.get_spec().get_id();
        table["name"] = toml_edit::value(id.get_name().to_string());
        table["library"] = toml_edit::value(id.get_library().to_string());
        table["vendor"] = toml_edit::value(id.get_vendor().to_string());
        table["version"] = toml_edit::value(self.get_spec().get_version().to_string());
        table["fingerprint"] = toml_edit::value(self.ip.get_fingerprint().to_string());
        if let Some(sum) = &self.sum {
            table["sum"] = toml_edit::value(sum.to_string());
        }
        match &self.source {
            Some(Source::Local(p)) => table["path"] = toml_edit::value(filesystem::into_std_str(p)),
            Some(Source::Remote(url)) => table["source"] = toml_edit::value(url),
            None => (),
        }
        let mut deps = Array::new();
        for dep in &self.dependencies {
            let mut value = toml_edit::Value::from(dep.to_string());
            value.decor_mut().set_prefix("\n    ");
            deps.push_formatted(value);
        }
        if deps.is_empty() == false {
            deps.set_trailing_comma(true);
            deps.set_trailing("\n");
        }
        table["dependencies"] = toml_edit::value(deps);
    }

    fn from_toml(table: &Table) -> Result<Self, AnyError> {
        let id = PkgId::from_str(&format!(
            "{}.{}.{}",
            get_str(table, "vendor")?,
            get_str(table, "library")?,
            get_str(table, "name")?
        ))
        .map_err(|e| AnyError(e.to_string()))?;
        let version = Version::from_str(get_str(table, "version")?)
            .map_err(|e| AnyError(format!("bad version for {}: {}", id, e)))?;
        let fingerprint = Sha256Hash::from_str(get_str(table, "fingerprint")?)
            .map_err(|e| AnyError(format!("bad fingerprint for {}: {}", id, e)))?;
        let sum = match table.get("sum") {
            Some(_) => Some(
                Sha256Hash::from_str(get_str(table, "sum")?)
                    .map_err(|e| AnyError(format!("bad checksum for {}: {}", id, e)))?,
            ),
            None => None,
        };
        let source = match (table.get("path"), table.get("source")) {
            (Some(_), Some(_)) => {
                return Err(AnyError(format!(
                    "entry {} cannot have both a path and a source",
                    id
                )))
            }
            (Some(_), None) => Some(Source::Local(PathBuf::from(get_str(table, "path")?))),
            (None, Some(_)) => Some(Source::Remote(get_str(table, "source")?.to_string())),
            (None, None) => None,
        };
        let mut dependencies = Vec::new();
        if let Some(item) = table.get("dependencies") {
            let arr = item
                .as_array()
                .ok_or(AnyError(format!("dependencies of {} must be an array", id)))?;
            for dep in arr.iter() {
                let text = dep
                    .as_str()
                    .ok_or(AnyError(format!("dependencies of {} must be strings", id)))?;
                dependencies.push(
                    IpSpec::from_str(text)
                        .map_err(|e| AnyError(format!("dependency {:?}: {}", text, e)))?,
                );
            }
        }
        Ok(Self {
            ip: IpVersion::new(IpSpec::new(id, version), fingerprint),
            source: source,
            sum: sum,
            dependencies: dependencies,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockFile {
    fingerprint: Sha256Hash,
    entries: Vec<LockEntry>,
}

impl LockFile {
    /// Creates a lockfile for a working ip whose manifest has `fingerprint`.
    ///
    /// Entries are kept sorted by identity and then version.
    pub fn new(fingerprint: Sha256Hash, mut entries: Vec<LockEntry>) -> Self {
        entries.sort_by(|x, y| x.get_spec().cmp(y.get_spec()));
        Self {
            fingerprint: fingerprint,
            entries: entries,
        }
    }

    pub fn get_fingerprint(&self) -> &Sha256Hash {
        &self.fingerprint
    }

    pub fn get(&self, spec: &IpSpec) -> Option<&LockEntry> {
        self.entries.iter().find(|e| e.get_spec() == spec)
    }

    pub fn inner(&self) -> &Vec<LockEntry> {
        &self.entries
    }

    /// Reads the lockfile living at `root`.
    ///
    /// Returns `None` when there is no lockfile.
    pub fn from_path(root: &Path) -> Result<Option<Self>, Error> {
        let path = root.join(IP_LOCK_FILE);
        if path.exists() == false {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        match Self::from_str(&contents) {
            Ok(lf) => Ok(Some(lf)),
            Err(e) => Err(Error::StaleLockRejected(path, LastError(e.to_string()), Hint::ForceLock)),
        }
    }

    /// Atomically replaces the lockfile at `root`.
    pub fn write(&self, root: &Path) -> Result<(), Error> {
        filesystem::write_atomic(&root.join(IP_LOCK_FILE), self.to_string().as_bytes())
    }
}

impl FromStr for LockFile {
    type Err = AnyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let doc = s.parse::<Document>().map_err(|e| AnyError(e.to_string()))?;
        match doc.get("version").and_then(|v| v.as_integer()) {
            Some(LOCK_VERSION) => (),
            Some(v) => return Err(AnyError(format!("unsupported lockfile version {}", v))),
            None => return Err(AnyError(format!("missing lockfile version"))),
        }
        let fingerprint = doc
            .get("fingerprint")
            .and_then(|f| f.as_str())
            .ok_or(AnyError(format!("missing manifest fingerprint")))?;
        let fingerprint =
            Sha256Hash::from_str(fingerprint).map_err(|e| AnyError(e.to_string()))?;

        let mut entries: Vec<LockEntry> = Vec::new();
        if let Some(item) = doc.get("ip") {
            let arr = item
                .as_array_of_tables()
                .ok_or(AnyError(format!("expects 'ip' to be an array of tables")))?;
            for tbl in arr.iter() {
                let entry = LockEntry::from_toml(tbl)?;
                if entries.iter().any(|e| e.get_spec() == entry.get_spec()) {
                    return Err(AnyError(format!("duplicate entry {}", entry.get_spec())));
                }
                entries.push(entry);
            }
        }
        Ok(Self::new(fingerprint, entries))
    }
}

impl Display for LockFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut doc = Document::new();
        doc["version"] = toml_edit::value(LOCK_VERSION);
        doc["fingerprint"] = toml_edit::value(self.fingerprint.to_string());
        let mut tables = ArrayOfTables::new();
        for entry in &self.entries {
            let mut table = Table::new();
            entry.to_toml(&mut table);
            tables.push(table);
        }
        if tables.is_empty() == false {
            doc["ip"] = Item::ArrayOfTables(tables);
        }
        write!(f, "{}\n{}", LOCK_HEADER, doc.to_string())
    }
}

/// Why a lockfile cannot be reused as-is.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StaleReason {
    Forced,
    Absent,
    ManifestChanged,
}

impl Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forced => write!(f, "forced"),
            Self::Absent => write!(f, "absent"),
            Self::ManifestChanged => write!(f, "manifest changed"),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum LockStatus {
    /// The lockfile matches the manifest and the recorded resolution can be used.
    Reusable(LockFile),
    /// A full resolution is needed; any previous lockfile is kept for its checksums.
    Stale(StaleReason, Option<LockFile>),
}

/// Decides whether the lockfile at `root` still reflects the manifest whose
/// fingerprint is `current`.
///
/// An unreadable lockfile is rejected unless `force` is set.
pub fn load_or_invalidate(root: &Path, current: &Sha256Hash, force: bool) -> Result<LockStatus, Error> {
    let previous = match LockFile::from_path(root) {
        Ok(lf) => lf,
        Err(e) => match force {
            true => None,
            false => return Err(e),
        },
    };
    if force == true {
        return Ok(LockStatus::Stale(StaleReason::Forced, previous));
    }
    match previous {
        None => Ok(LockStatus::Stale(StaleReason::Absent, None)),
        Some(lf) => match lf.get_fingerprint() == current {
            true => Ok(LockStatus::Reusable(lf)),
            false => Ok(LockStatus::Stale(StaleReason::ManifestChanged, Some(lf))),
        },
    }
}
