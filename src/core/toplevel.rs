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

use crate::core::lang::{DesignUnit, SourceFile};
use crate::error::{Error, Hint};
use colored::Colorize;
use std::collections::HashMap;
use std::fmt::Display;

/// How a top-level role was decided.
#[derive(Debug, PartialEq, Clone)]
pub enum Selection {
    /// Given by the user and taken as-is.
    Explicit(String),
    /// Found by examining the ip's design hierarchy.
    Inferred(String),
}

impl Selection {
    pub fn get_name(&self) -> &str {
        match self {
            Self::Explicit(s) => s,
            Self::Inferred(s) => s,
        }
    }

    pub fn is_explicit(&self) -> bool {
        match self {
            Self::Explicit(_) => true,
            Self::Inferred(_) => false,
        }
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

/// The design units of an ip and which components each one instantiates.
#[derive(Debug, PartialEq)]
pub struct Hierarchy {
    units: Vec<DesignUnit>,
    instances: HashMap<String, Vec<String>>,
}

impl Hierarchy {
    pub fn new(sources: &[&SourceFile]) -> Self {
        let mut units: Vec<DesignUnit> = Vec::new();
        for unit in sources.iter().flat_map(|s| s.get_units()) {
            // the first declaration of a name wins
            if units.iter().any(|u| u.get_key() == unit.get_key()) == false {
                units.push(unit.clone());
            }
        }
        let mut instances: HashMap<String, Vec<String>> = HashMap::new();
        for r in sources.iter().flat_map(|s| s.get_refs()) {
            let owner = match r.get_owner() {
                Some(o) => o,
                None => continue,
            };
            let is_component = units
                .iter()
                .any(|u| u.get_key() == r.get_target() && u.is_component());
            if is_component == false || owner == r.get_target() {
                continue;
            }
            let list = instances.entry(owner.to_string()).or_default();
            if list.iter().any(|t| t == r.get_target()) == false {
                list.push(r.get_target().to_string());
            }
        }
        Self {
            units: units,
            instances: instances,
        }
    }

    pub fn get_units(&self) -> &Vec<DesignUnit> {
        &self.units
    }

    pub fn get(&self, name: &str) -> Option<&DesignUnit> {
        let key = name.to_lowercase();
        self.units.iter().find(|u| u.get_key() == key)
    }

    /// Returns the components directly instantiated within the unit `name`.
    pub fn instances_of(&self, name: &str) -> Vec<&DesignUnit> {
        match self.instances.get(&name.to_lowercase()) {
            Some(list) => list.iter().filter_map(|t| self.get(t)).collect(),
            None => Vec::new(),
        }
    }

    /// Checks if the unit `name` is instantiated by any unit satisfying `by`.
    fn is_instantiated<F>(&self, name: &str, by: F) -> bool
    where
        F: Fn(&DesignUnit) -> bool,
    {
        let key = name.to_lowercase();
        self.units.iter().filter(|u| by(*u)).any(|u| {
            self.instances
                .get(&u.get_key())
                .map_or(false, |list| list.contains(&key))
        })
    }
}

/// The decided top-level and testbench units; either may remain unset.
#[derive(Debug, PartialEq)]
pub struct TopLevel {
    top: Option<Selection>,
    bench: Option<Selection>,
}

impl TopLevel {
    pub fn get_top(&self) -> Option<&Selection> {
        self.top.as_ref()
    }

    pub fn get_bench(&self) -> Option<&Selection> {
        self.bench.as_ref()
    }
}

fn list_names(units: &[&DesignUnit]) -> String {
    units
        .iter()
        .map(|u| u.get_name())
        .collect::<Vec<&str>>()
        .join(", ")
}

/// Picks the single candidate, or reports why there is not exactly one.
fn choose(role: &str, candidates: Vec<&DesignUnit>, hint: Hint) -> Result<Option<Selection>, Error> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(Some(Selection::Inferred(candidates[0].get_name().to_string()))),
        _ => Err(Error::AmbiguousTopLevel(
            role.to_string(),
            list_names(&candidates),
            hint,
        )),
    }
}

/// Downgrades a detection error to a warning when `all` is set.
///
/// With every HDL file included there is no hierarchy left to prune, so the
/// run can go on without the role.
fn relax(result: Result<Option<Selection>, Error>, all: bool) -> Result<Option<Selection>, Error> {
    match result {
        Err(e) if all == true => {
            println!("{}: {}", "warning".yellow(), e);
            Ok(None)
        }
        other => other,
    }
}

/// Decides the testbench and top-level units of an ip.
///
/// Explicit values are used without checking them against the hierarchy.
pub fn detect(hier: &Hierarchy, top: Option<&str>, bench: Option<&str>, all: bool) -> Result<TopLevel, Error> {
    let bench = match (bench, top) {
        (Some(b), _) => Some(Selection::Explicit(b.to_string())),
        (None, Some(t)) => {
            let key = t.to_lowercase();
            let candidates: Vec<&DesignUnit> = hier
                .units
                .iter()
                .filter(|u| u.is_testbench())
                .filter(|u| hier.instances_of(u.get_name()).iter().any(|i| i.get_key() == key))
                .collect();
            relax(choose("testbench", candidates, Hint::BenchFlag), all)?
        }
        (None, None) => {
            let candidates: Vec<&DesignUnit> = hier
                .units
                .iter()
                .filter(|u| u.is_testbench())
                .filter(|u| hier.is_instantiated(u.get_name(), |by| by.is_component()) == false)
                .collect();
            relax(choose("testbench", candidates, Hint::BenchFlag), all)?
        }
    };

    let top = match top {
        Some(t) => Some(Selection::Explicit(t.to_string())),
        None => relax(infer_top(hier, bench.as_ref()), all)?,
    };

    Ok(TopLevel {
        top: top,
        bench: bench,
    })
}

fn infer_top(hier: &Hierarchy, bench: Option<&Selection>) -> Result<Option<Selection>, Error> {
    if let Some(b) = bench {
        let candidates: Vec<&DesignUnit> = hier
            .instances_of(b.get_name())
            .into_iter()
            .filter(|u| u.is_testbench() == false)
            .collect();
        if let Some(sel) = choose("top-level", candidates, Hint::TopFlag)? {
            return Ok(Some(sel));
        }
    }
    let candidates: Vec<&DesignUnit> = hier
        .units
        .iter()
        .filter(|u| u.is_component() && u.is_testbench() == false)
        .filter(|u| {
            hier.is_instantiated(u.get_name(), |by| by.is_component() && by.is_testbench() == false)
                == false
        })
        .collect();
    match choose("top-level", candidates, Hint::TopFlag)? {
        Some(sel) => Ok(Some(sel)),
        None => Err(Error::NoTopLevelFound(Hint::TopFlag)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::lang::Lang;

    fn hierarchy(files: &[(&str, &str)]) -> Hierarchy {
        let sources: Vec<SourceFile> = files
            .iter()
            .map(|(path, text)| {
                let lang = match path.ends_with(".vhd") {
                    true => Lang::Vhdl,
                    false => Lang::Verilog,
                };
                SourceFile::scan(path, lang, text)
            })
            .collect();
        Hierarchy::new(&sources.iter().collect::<Vec<&SourceFile>>())
    }

    const ALU: &str = "entity alu is port (a : in bit); end;\narchitecture rtl of alu is begin\n u0 : entity work.adder port map (a); end;";
    const ADDER: &str = "entity adder is port (a : in bit); end;";
    const ALU_TB: &str = "entity alu_tb is end;\narchitecture sim of alu_tb is begin\n dut : entity work.alu port map (a); end;";

    #[test]
    fn infer_both_roles() {
        let h = hierarchy(&[("alu.vhd", ALU), ("adder.vhd", ADDER), ("alu_tb.vhd", ALU_TB)]);
        let tl = detect(&h, None, None, false).unwrap();
        assert_eq!(tl.get_bench(), Some(&Selection::Inferred(String::from("alu_tb"))));
        assert_eq!(tl.get_top(), Some(&Selection::Inferred(String::from("alu"))));
    }

    #[test]
    fn infer_without_bench() {
        let h = hierarchy(&[("alu.vhd", ALU), ("adder.vhd", ADDER)]);
        let tl = detect(&h, None, None, false).unwrap();
        assert_eq!(tl.get_bench(), None);
        assert_eq!(tl.get_top(), Some(&Selection::Inferred(String::from("alu"))));
    }

    #[test]
    fn explicit_is_never_checked() {
        let h = hierarchy(&[("alu.vhd", ALU)]);
        let tl = detect(&h, Some("does_not_exist"), Some("nope_tb"), false).unwrap();
        assert_eq!(tl.get_top(), Some(&Selection::Explicit(String::from("does_not_exist"))));
        assert_eq!(tl.get_bench(), Some(&Selection::Explicit(String::from("nope_tb"))));
    }

    #[test]
    fn bench_from_explicit_top() {
        let other_tb = "module adder_tb; adder dut (.a(a)); endmodule";
        let h = hierarchy(&[
            ("alu.vhd", ALU),
            ("adder.vhd", ADDER),
            ("alu_tb.vhd", ALU_TB),
            ("adder_tb.sv", other_tb),
        ]);
        let tl = detect(&h, Some("ADDER"), None, false).unwrap();
        assert_eq!(tl.get_bench(), Some(&Selection::Inferred(String::from("adder_tb"))));
        // two root testbenches without a hint
        assert_eq!(
            detect(&h, None, None, false),
            Err(Error::AmbiguousTopLevel(
                String::from("testbench"),
                String::from("alu_tb, adder_tb"),
                Hint::BenchFlag
            ))
        );
        // the top follows from an explicit bench
        let tl = detect(&h, None, Some("adder_tb"), false).unwrap();
        assert_eq!(tl.get_top(), Some(&Selection::Inferred(String::from("adder"))));
    }

    #[test]
    fn ambiguous_and_missing_tops() {
        let h = hierarchy(&[
            ("a.v", "module a(input x); endmodule"),
            ("b.v", "module b(input x); endmodule"),
        ]);
        assert_eq!(
            detect(&h, None, None, false),
            Err(Error::AmbiguousTopLevel(
                String::from("top-level"),
                String::from("a, b"),
                Hint::TopFlag
            ))
        );
        let tl = detect(&h, None, None, true).unwrap();
        assert_eq!(tl.get_top(), None);

        let h = hierarchy(&[("pkg.vhd", "package p is end package;")]);
        assert_eq!(
            detect(&h, None, None, false),
            Err(Error::NoTopLevelFound(Hint::TopFlag))
        );
    }
}
