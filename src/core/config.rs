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

use crate::core::plugin::Plugin;
use crate::error::{Error, LastError};
use serde_derive::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_BUILD_DIR: &str = "build";

const DEFAULT_RETRIES: usize = 3;

#[derive(PartialEq, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct General {
    #[serde(rename = "build-dir")]
    build_dir: Option<String>,
    jobs: Option<usize>,
    retries: Option<usize>,
}

impl General {
    pub fn get_build_dir(&self) -> Option<&String> {
        self.build_dir.as_ref()
    }

    pub fn get_jobs(&self) -> Option<usize> {
        self.jobs
    }

    pub fn get_retries(&self) -> Option<usize> {
        self.retries
    }
}

#[derive(PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    general: Option<General>,
    plugin: Option<Vec<Plugin>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration file at `path`.
    ///
    /// A missing file is an empty configuration.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        if path.exists() == false {
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut cfg = Self::from_str(&contents)
            .map_err(|e| Error::ConfigInvalid(path.to_path_buf(), LastError(e.to_string())))?;
        // remember where each plugin was defined
        if let Some(root) = path.parent() {
            cfg.plugin
                .iter_mut()
                .flatten()
                .for_each(|p| p.set_root(root.to_path_buf()));
        }
        Ok(cfg)
    }

    pub fn get_general(&self) -> Option<&General> {
        self.general.as_ref()
    }

    /// Returns the configured build directory, if any.
    pub fn get_build_dir(&self) -> Option<&String> {
        self.general.as_ref().and_then(|g| g.get_build_dir())
    }

    /// Returns the number of fetch workers, defaulting to the available parallelism.
    pub fn get_jobs(&self) -> usize {
        match self.general.as_ref().and_then(|g| g.get_jobs()) {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn get_retries(&self) -> usize {
        self.general
            .as_ref()
            .and_then(|g| g.get_retries())
            .unwrap_or(DEFAULT_RETRIES)
    }

    pub fn get_plugins(&self) -> Vec<Plugin> {
        self.plugin.clone().unwrap_or_default()
    }
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CFG_1: &str = r#"
[general]
build-dir = "target"
jobs = 2
retries = 5

[[plugin]]
alias = "ghdl"
command = "python"
args = ["ghdl.py"]
summary = "Simulate VHDL with GHDL"
fileset.py-model = "{{orbit.bench}}.py"

[[plugin]]
alias = "yosys"
command = "yosys"
"#;

    #[test]
    fn from_str() {
        let cfg = Config::from_str(CFG_1).unwrap();
        assert_eq!(cfg.get_build_dir(), Some(&String::from("target")));
        assert_eq!(cfg.get_jobs(), 2);
        assert_eq!(cfg.get_retries(), 5);
        let plugs = cfg.get_plugins();
        assert_eq!(plugs.len(), 2);
        assert_eq!(plugs[0].get_alias(), "ghdl");
    }

    #[test]
    fn defaults() {
        let cfg = Config::from_str("").unwrap();
        assert_eq!(cfg.get_build_dir(), None);
        assert_eq!(cfg.get_retries(), DEFAULT_RETRIES);
        assert!(cfg.get_jobs() >= 1);
        assert!(cfg.get_plugins().is_empty());
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(Config::from_file(&path), Ok(Config::new()));

        std::fs::write(&path, CFG_1).unwrap();
        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(
            cfg.get_plugins()[1].get_root(),
            Some(&dir.path().to_path_buf())
        );

        std::fs::write(&path, "[general]\nbuild_dir = 1\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(Error::ConfigInvalid(_, _))
        ));
    }
}
