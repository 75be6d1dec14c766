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

pub mod lexer;
pub mod verilog;
pub mod vhdl;

use crate::core::fileset::{SYSV_FILESET, VHDL_FILESET, VLOG_FILESET};
use crate::error::Error;
use std::fmt::Display;
use std::path::Path;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Lang {
    Vhdl,
    Verilog,
    SystemVerilog,
}

impl Lang {
    /// Determines the language of the files collected by the built-in fileset `name`.
    pub fn from_fileset(name: &str) -> Option<Self> {
        match name {
            VHDL_FILESET => Some(Self::Vhdl),
            VLOG_FILESET => Some(Self::Verilog),
            SYSV_FILESET => Some(Self::SystemVerilog),
            _ => None,
        }
    }
}

impl Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Vhdl => "vhdl",
                Self::Verilog => "verilog",
                Self::SystemVerilog => "systemverilog",
            }
        )
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnitKind {
    Entity,
    Module,
    Package,
    Interface,
}

impl Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Entity => "entity",
                Self::Module => "module",
                Self::Package => "package",
                Self::Interface => "interface",
            }
        )
    }
}

/// A primary design unit declared in a source file.
#[derive(Debug, PartialEq, Clone)]
pub struct DesignUnit {
    name: String,
    kind: UnitKind,
    ports: bool,
    file: String,
}

impl DesignUnit {
    pub fn new(name: &str, kind: UnitKind) -> Self {
        Self {
            name: name.to_string(),
            kind: kind,
            ports: false,
            file: String::new(),
        }
    }

    pub fn ports(mut self, ports: bool) -> Self {
        self.ports = ports;
        self
    }

    pub fn file(mut self, file: &str) -> Self {
        self.file = file.to_string();
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Returns the name used to match references, which ignores case.
    pub fn get_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn get_kind(&self) -> UnitKind {
        self.kind
    }

    pub fn has_ports(&self) -> bool {
        self.ports
    }

    pub fn get_file(&self) -> &str {
        &self.file
    }

    /// Entities and modules can be instantiated; packages and interfaces cannot.
    pub fn is_component(&self) -> bool {
        match self.kind {
            UnitKind::Entity | UnitKind::Module => true,
            UnitKind::Package | UnitKind::Interface => false,
        }
    }

    /// A testbench is a component without ports or one named like `tb_*` or `*_tb`.
    pub fn is_testbench(&self) -> bool {
        let key = self.get_key();
        self.is_component() == true
            && (self.ports == false || key.starts_with("tb_") || key.ends_with("_tb"))
    }
}

/// A use of some unit by name from within a source file.
#[derive(Debug, PartialEq, Clone)]
pub struct Reference {
    owner: Option<String>,
    target: String,
}

impl Reference {
    /// Creates a reference to `target` made inside the unit `owner`, if known.
    pub fn new(owner: Option<&str>, target: &str) -> Self {
        Self {
            owner: owner.map(|o| o.to_lowercase()),
            target: target.to_lowercase(),
        }
    }

    pub fn get_owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn get_target(&self) -> &str {
        &self.target
    }
}

/// The design units declared and referenced by one HDL file.
#[derive(Debug, PartialEq)]
pub struct SourceFile {
    path: String,
    lang: Lang,
    units: Vec<DesignUnit>,
    refs: Vec<Reference>,
}

impl SourceFile {
    pub fn scan(path: &str, lang: Lang, text: &str) -> Self {
        let (units, refs) = match lang {
            Lang::Vhdl => vhdl::scan(text),
            Lang::Verilog | Lang::SystemVerilog => verilog::scan(text),
        };
        Self {
            path: path.to_string(),
            lang: lang,
            units: units.into_iter().map(|u| u.file(path)).collect(),
            refs: refs,
        }
    }

    /// Reads and scans the file `path` relative to `root` as `lang` source code.
    pub fn read(root: &Path, path: &str, lang: Lang) -> Result<Self, Error> {
        let full = root.join(path);
        let bytes = std::fs::read(&full).map_err(|e| Error::io(&full, e))?;
        Ok(Self::scan(path, lang, &String::from_utf8_lossy(&bytes)))
    }

    pub fn get_path(&self) -> &str {
        &self.path
    }

    pub fn get_lang(&self) -> Lang {
        self.lang
    }

    pub fn get_units(&self) -> &Vec<DesignUnit> {
        &self.units
    }

    pub fn get_refs(&self) -> &Vec<Reference> {
        &self.refs
    }

    /// Checks if this file declares a unit with the matching `key`.
    pub fn declares(&self, key: &str) -> bool {
        self.units.iter().any(|u| u.get_key() == key)
    }
}
