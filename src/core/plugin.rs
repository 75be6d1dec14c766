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

//! A plugin is a user-defined backend workflow that consumes the files
//! collected in the blueprint. Only its declared filesets matter here.

use crate::core::fileset::{Fileset, Origin};
use crate::error::{Error, Hint, LastError};
use serde_derive::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use toml::Value;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plugin {
    alias: String,
    command: String,
    args: Option<Vec<String>>,
    fileset: Option<toml::Table>,
    summary: Option<String>,
    details: Option<String>,
    #[serde(skip_serializing, skip_deserializing)]
    root: Option<PathBuf>,
}

impl Plugin {
    pub fn get_alias(&self) -> &str {
        &self.alias
    }

    pub fn get_command(&self) -> &str {
        &self.command
    }

    pub fn get_args(&self) -> Vec<&String> {
        match &self.args {
            Some(a) => a.iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn get_summary(&self) -> Option<&String> {
        self.summary.as_ref()
    }

    /// Sets the directory of the configuration file that defined this plugin.
    pub fn set_root(&mut self, root: PathBuf) {
        self.root = Some(root);
    }

    pub fn get_root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    /// Converts the declared `fileset` table into filesets, in declaration order.
    ///
    /// Each value is either a single pattern or an array of patterns.
    pub fn get_filesets(&self) -> Result<Vec<Fileset>, Error> {
        let table = match &self.fileset {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };
        let mut result = Vec::with_capacity(table.len());
        for (key, value) in table {
            let invalid = |msg: String| {
                Error::InvalidGlob(format!("{}.fileset.{}", self.alias, key), LastError(msg))
            };
            let patterns: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(arr) => arr
                    .iter()
                    .map(|v| v.as_str().ok_or(invalid(format!("patterns must be strings"))))
                    .collect::<Result<Vec<&str>, Error>>()?,
                _ => return Err(invalid(format!("expects a string or an array of strings"))),
            };
            result.push(
                Fileset::new(key, &patterns, Origin::Plugin)
                    .map_err(|e| invalid(e.to_string()))?,
            );
        }
        Ok(result)
    }
}

impl FromStr for Plugin {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl Display for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<16}{}",
            self.alias,
            self.summary.as_ref().unwrap_or(&String::new())
        )
    }
}

/// The set of plugins known by alias.
#[derive(Debug, PartialEq, Default)]
pub struct Registry(Vec<Plugin>);

impl Registry {
    /// Builds a registry where the first plugin defined for an alias wins.
    pub fn new(plugins: Vec<Plugin>) -> Self {
        let mut inner: Vec<Plugin> = Vec::with_capacity(plugins.len());
        for plug in plugins {
            if inner.iter().any(|p| p.alias == plug.alias) == false {
                inner.push(plug);
            }
        }
        Self(inner)
    }

    pub fn get(&self, alias: &str) -> Result<&Plugin, Error> {
        self.0
            .iter()
            .find(|p| p.alias == alias)
            .ok_or(Error::PluginNotFound(alias.to_string(), Hint::PluginsList))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lists the plugins sorted by alias, one per line.
    pub fn to_list(&self) -> String {
        let mut plugs: Vec<&Plugin> = self.0.iter().collect();
        plugs.sort_by(|a, b| a.alias.cmp(&b.alias));
        plugs.iter().fold(String::new(), |mut acc, p| {
            acc.push_str(&p.to_string());
            acc.push('\n');
            acc
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const P_1: &str = r#"
alias = "ghdl"
summary = "Simulate VHDL with GHDL"
command = "python"
args = ["./scripts/ghdl.py"]
fileset.py-model = "{{orbit.bench}}.py"
fileset.text = ["*.txt", "*.dat"]
"#;

    const P_2: &str = r#"
alias = "ffi"
command = "bash"
"#;

    #[test]
    fn from_toml_string() {
        let plug = Plugin::from_str(P_1).unwrap();
        assert_eq!(plug.get_alias(), "ghdl");
        assert_eq!(plug.get_command(), "python");
        assert_eq!(plug.get_args(), vec!["./scripts/ghdl.py"]);

        let fsets = plug.get_filesets().unwrap();
        let names: Vec<&String> = fsets.iter().map(|f| f.get_name()).collect();
        // declaration order is kept
        assert_eq!(names, vec!["PY-MODEL", "TEXT"]);
        assert!(fsets.iter().all(|f| f.get_origin() == Origin::Plugin));

        let plug = Plugin::from_str(P_2).unwrap();
        assert_eq!(plug.get_filesets().unwrap(), vec![]);
        assert_eq!(plug.get_summary(), None);
    }

    #[test]
    fn bad_fileset_value() {
        let plug = Plugin::from_str("alias = \"a\"\ncommand = \"b\"\nfileset.x = 3\n").unwrap();
        assert!(matches!(plug.get_filesets(), Err(Error::InvalidGlob(_, _))));
        let plug = Plugin::from_str("alias = \"a\"\ncommand = \"b\"\nfileset.x = \"[\"\n").unwrap();
        assert!(matches!(plug.get_filesets(), Err(Error::InvalidGlob(_, _))));
    }

    #[test]
    fn registry_lookup() {
        let reg = Registry::new(vec![
            Plugin::from_str(P_1).unwrap(),
            Plugin::from_str(P_2).unwrap(),
            Plugin::from_str("alias = \"ghdl\"\ncommand = \"other\"\n").unwrap(),
        ]);
        assert_eq!(reg.get("ghdl").unwrap().get_command(), "python");
        assert_eq!(
            reg.get("vivado"),
            Err(Error::PluginNotFound(String::from("vivado"), Hint::PluginsList))
        );
        let list = reg.to_list();
        let aliases: Vec<&str> = list
            .lines()
            .map(|l| l.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(aliases, vec!["ffi", "ghdl"]);
    }
}
