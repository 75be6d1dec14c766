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

use crate::core::ip::Ip;
use crate::error::Error;
use crate::util::filesystem;
use std::collections::btree_set::{BTreeSet, Iter};
use std::hash::Hash;
use std::path::Path;

#[derive(Eq)]
pub struct EnvVar {
    key: String,
    value: String,
}

impl PartialEq for EnvVar {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Ord for EnvVar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl PartialOrd for EnvVar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for EnvVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // only hash by the key name
        self.key.hash(state);
    }
}

impl EnvVar {
    pub fn with(key: &str, value: &str) -> Self {
        Self::new().key(key).value(value)
    }

    pub fn new() -> Self {
        Self {
            key: String::new(),
            value: String::new(),
        }
    }

    /// Sets the environment key.
    pub fn key(mut self, s: &str) -> Self {
        // normalize the key name upon entry
        self.key = s.trim().to_ascii_uppercase().replace('-', "_");
        self
    }

    /// Sets the environment value.
    pub fn value(mut self, s: &str) -> Self {
        self.value = s.to_owned();
        self
    }

    pub fn get_key(&self) -> &str {
        &self.key
    }

    pub fn get_value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=\"{}\"", self.key, self.value)
    }
}

impl std::fmt::Display for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

pub struct Environment(BTreeSet<EnvVar>);

impl Environment {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Inserts `var`, replacing any variable with the same key.
    pub fn insert(&mut self, var: EnvVar) {
        self.0.replace(var);
    }

    pub fn add(mut self, var: EnvVar) -> Self {
        self.insert(var);
        self
    }

    pub fn iter(&self) -> Iter<'_, EnvVar> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&EnvVar> {
        self.0.get(&EnvVar::new().key(key))
    }

    /// Reads the variables stored in a '.env' file living at `dir`.
    ///
    /// Silently skips text lines that do not have proper delimiter `=` between key and value.
    /// The returned environment is empty if the file does not exist.
    pub fn from_env_file(dir: &Path) -> Result<Self, Error> {
        let mut env = Self::new();
        let env_file = dir.join(DOT_ENV_FILE);
        if env_file.exists() == true {
            let contents =
                std::fs::read_to_string(&env_file).map_err(|e| Error::io(&env_file, e))?;
            for line in contents.lines() {
                if let Some((name, value)) = line.split_once('=') {
                    env.insert(EnvVar::with(name, value));
                }
            }
        }
        Ok(env)
    }

    /// Loads the informational variables describing the [Ip].
    pub fn from_ip(mut self, ip: &Ip) -> Self {
        self.insert(EnvVar::with(ORBIT_IP_NAME, &ip.get_identity().get_name().to_string()));
        self.insert(EnvVar::with(ORBIT_IP_VERSION, &ip.get_version().to_string()));
        self.insert(EnvVar::with(ORBIT_IP_LIBRARY, &ip.get_hdl_library()));
        self
    }
}

/// Stores the list of `EnvVar` in a file named ".env" in the directory `dir`.
pub fn save_environment(env: &Environment, dir: &Path) -> Result<(), Error> {
    let contents = env
        .iter()
        .fold(String::new(), |x, y| x + &y.to_string() + "\n");
    filesystem::write_atomic(&dir.join(DOT_ENV_FILE), contents.as_bytes())
}

pub const DOT_ENV_FILE: &str = ".env";

pub const ORBIT_HOME: &str = "ORBIT_HOME";
pub const ORBIT_BUILD_DIR: &str = "ORBIT_BUILD_DIR";
pub const NO_COLOR: &str = "NO_COLOR";

pub const ORBIT_IP_NAME: &str = "ORBIT_IP_NAME";
pub const ORBIT_IP_VERSION: &str = "ORBIT_IP_VERSION";
pub const ORBIT_IP_LIBRARY: &str = "ORBIT_IP_LIBRARY";

pub const ORBIT_TOP: &str = "ORBIT_TOP";
pub const ORBIT_BENCH: &str = "ORBIT_BENCH";
pub const ORBIT_PLUGIN: &str = "ORBIT_PLUGIN";
pub const ORBIT_BLUEPRINT: &str = "ORBIT_BLUEPRINT";

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keys_are_normalized() {
        let var = EnvVar::with("orbit-top", "alu");
        assert_eq!(var.get_key(), "ORBIT_TOP");
        assert_eq!(var.to_string(), "ORBIT_TOP=alu");
    }

    #[test]
    fn insert_overwrites() {
        let mut env = Environment::new()
            .add(EnvVar::with(ORBIT_TOP, "alu"))
            .add(EnvVar::with(ORBIT_BENCH, ""));
        env.insert(EnvVar::with(ORBIT_TOP, "cpu"));
        assert_eq!(env.get(ORBIT_TOP).unwrap().get_value(), "cpu");
        assert_eq!(env.iter().count(), 2);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new()
            .add(EnvVar::with(ORBIT_TOP, "alu"))
            .add(EnvVar::with(ORBIT_BENCH, ""))
            .add(EnvVar::with(ORBIT_PLUGIN, "ghdl"));
        save_environment(&env, dir.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join(DOT_ENV_FILE)).unwrap(),
            "ORBIT_BENCH=\nORBIT_PLUGIN=ghdl\nORBIT_TOP=alu\n"
        );
        let loaded = Environment::from_env_file(dir.path()).unwrap();
        assert_eq!(loaded.get(ORBIT_TOP).unwrap().get_value(), "alu");
        assert_eq!(loaded.get(ORBIT_BENCH).unwrap().get_value(), "");
    }
}
