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

use crate::core::fileset::Fileset;
use crate::core::lang::{Lang, SourceFile};
use crate::error::Error;
use crate::util::anyerror::AnyError;
use crate::util::filesystem;
use crate::util::graph::Graph;
use colored::Colorize;
use serde_derive::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum Scheme {
    #[default]
    Tsv,
    Json,
}

impl FromStr for Scheme {
    type Err = AnyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tsv" => Ok(Self::Tsv),
            "json" => Ok(Self::Json),
            _ => Err(AnyError(format!(
                "unknown blueprint scheme \"{}\"; expecting \"tsv\" or \"json\"",
                s
            ))),
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tsv => write!(f, "tsv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// One line of the blueprint: a file to hand to the backend tool.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Instruction {
    fileset: String,
    library: String,
    filepath: String,
}

impl Instruction {
    pub fn new(fileset: &str, library: &str, filepath: &str) -> Self {
        Self {
            fileset: fileset.to_string(),
            library: library.to_string(),
            filepath: filepath.to_string(),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.fileset, self.library, self.filepath)
    }
}

/// An HDL file scanned under the built-in fileset that collected it.
#[derive(Debug, PartialEq)]
pub struct HdlFile {
    fileset: String,
    source: SourceFile,
}

impl HdlFile {
    pub fn get_fileset(&self) -> &str {
        &self.fileset
    }

    pub fn get_source(&self) -> &SourceFile {
        &self.source
    }
}

/// Reads and scans every file of `files` collected by an HDL fileset among `filesets`.
///
/// A file belongs to the first HDL fileset that matches it. Filesets that do
/// not name an HDL language are ignored.
pub fn scan_hdl(root: &Path, files: &[String], filesets: &[Fileset]) -> Result<Vec<HdlFile>, Error> {
    let hdl: Vec<(&Fileset, Lang)> = filesets
        .iter()
        .filter_map(|f| Lang::from_fileset(f.get_name()).map(|l| (f, l)))
        .collect();
    let mut result = Vec::new();
    for file in files {
        let found = hdl
            .iter()
            .find(|(fset, _)| fset.collect_files(std::slice::from_ref(file)).is_empty() == false);
        if let Some((fset, lang)) = found {
            result.push(HdlFile {
                fileset: fset.get_name().clone(),
                source: SourceFile::read(root, file, *lang)?,
            });
        }
    }
    Ok(result)
}

/// Arranges the files so that every file comes after the files declaring
/// the units it references.
///
/// Ties are broken by path. Files caught in a reference cycle are appended
/// in path order.
pub fn order_files(files: &[HdlFile]) -> Vec<&HdlFile> {
    let mut sorted: Vec<&HdlFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.source.get_path().cmp(b.source.get_path()));

    let mut declared: HashMap<String, usize> = HashMap::new();
    let mut graph: Graph<usize, ()> = Graph::new();
    for (i, f) in sorted.iter().enumerate() {
        graph.add_node(i);
        for unit in f.source.get_units() {
            declared.entry(unit.get_key()).or_insert(i);
        }
    }
    for (i, f) in sorted.iter().enumerate() {
        for r in f.source.get_refs() {
            if let Some(j) = declared.get(r.get_target()) {
                // self references and repeats are rejected by the graph
                graph.add_edge(*j, i, ());
            }
        }
    }

    let mut order = graph.topological_sort();
    if order.len() < sorted.len() {
        let stuck: Vec<usize> = (0..sorted.len()).filter(|i| order.contains(i) == false).collect();
        println!(
            "{}: cyclic references between files {}",
            "warning".yellow(),
            stuck
                .iter()
                .map(|i| format!("\"{}\"", sorted[*i].source.get_path()))
                .collect::<Vec<String>>()
                .join(", ")
        );
        order.extend(stuck);
    }
    order.into_iter().map(|i| sorted[i]).collect()
}

/// Keeps only the files needed to elaborate the unit `highest`.
///
/// A file is needed when it declares `highest` or a unit referenced from a
/// needed file, searching across every group. Groups and the files within
/// them keep their order. When no file declares `highest`, every file is kept.
pub fn keep_hierarchy(groups: Vec<Vec<HdlFile>>, highest: &str) -> Vec<Vec<HdlFile>> {
    let mut declared: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
    for (g, files) in groups.iter().enumerate() {
        for (i, f) in files.iter().enumerate() {
            for unit in f.source.get_units() {
                declared.entry(unit.get_key()).or_default().push((g, i));
            }
        }
    }
    let start = highest.to_lowercase();
    if declared.contains_key(&start) == false {
        println!(
            "{}: no HDL file declares unit {}; keeping every file",
            "warning".yellow(),
            highest
        );
        return groups;
    }

    let mut needed: HashSet<(usize, usize)> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack = vec![start];
    while let Some(key) = stack.pop() {
        if visited.insert(key.clone()) == false {
            continue;
        }
        for (g, i) in declared.get(&key).into_iter().flatten() {
            if needed.insert((*g, *i)) == true {
                for r in groups[*g][*i].source.get_refs() {
                    stack.push(r.get_target().to_string());
                }
            }
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(g, files)| {
            files
                .into_iter()
                .enumerate()
                .filter(|(i, _)| needed.contains(&(g, *i)))
                .map(|(_, f)| f)
                .collect()
        })
        .collect()
}

/// Resolves the build directory `build_dir` against the ip's `root`.
///
/// The directory must land strictly inside of the ip.
pub fn locate_build_dir(root: &Path, build_dir: &str) -> Result<PathBuf, Error> {
    let dir = filesystem::normalize(&root.join(build_dir));
    let inside = match filesystem::relative_to(&dir, root) {
        Some(rel) => {
            rel.as_os_str().is_empty() == false
                && rel.components().all(|c| matches!(c, Component::Normal(_)))
        }
        None => false,
    };
    match inside {
        true => Ok(dir),
        false => Err(Error::InvalidBuildDir(dir)),
    }
}

/// Prepares the directory where the planning outputs are written.
///
/// When `clean` is set, any previous contents are removed.
pub fn prepare_build_dir(root: &Path, build_dir: &str, clean: bool) -> Result<PathBuf, Error> {
    let dir = locate_build_dir(root, build_dir)?;
    if clean == true {
        filesystem::clean_dir(&dir)?;
    }
    std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
    Ok(dir)
}

#[derive(Debug, PartialEq, Default)]
pub struct Blueprint {
    scheme: Scheme,
    steps: Vec<Instruction>,
}

impl Blueprint {
    pub fn new(scheme: Scheme) -> Self {
        Self {
            scheme: scheme,
            steps: Vec::new(),
        }
    }

    /// Add the next instruction `instr` to the blueprint.
    pub fn add(&mut self, instr: Instruction) {
        self.steps.push(instr);
    }

    /// Adds the HDL files of one ip in compile order.
    pub fn add_hdl(&mut self, library: &str, root: &Path, files: &[HdlFile]) {
        for f in order_files(files) {
            self.add(Instruction::new(
                f.get_fileset(),
                library,
                &absolute(root, f.source.get_path()),
            ));
        }
    }

    /// Adds the files of `files` matched by the auxiliary fileset `fset`, sorted by path.
    pub fn add_auxiliary(&mut self, library: &str, root: &Path, fset: &Fileset, files: &[String]) {
        let mut matches = fset.collect_files(files);
        matches.sort();
        for f in matches {
            self.add(Instruction::new(fset.get_name(), library, &absolute(root, f)));
        }
    }

    pub fn get_filename(&self) -> &'static str {
        match self.scheme {
            Scheme::Tsv => "blueprint.tsv",
            Scheme::Json => "blueprint.json",
        }
    }

    /// Renders the blueprint in its scheme.
    pub fn render(&self) -> Result<String, Error> {
        match self.scheme {
            Scheme::Tsv => Ok(self
                .steps
                .iter()
                .map(|s| format!("{}\n", s))
                .collect::<String>()),
            Scheme::Json => serde_json::to_string_pretty(&self.steps)
                .map(|s| s + "\n")
                .map_err(|e| Error::io(Path::new(self.get_filename()), e)),
        }
    }

    /// Writes the blueprint into the directory `dir`, returning the file's path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, Error> {
        let path = dir.join(self.get_filename());
        filesystem::write_atomic(&path, self.render()?.as_bytes())?;
        Ok(path)
    }
}

fn absolute(root: &Path, file: &str) -> String {
    filesystem::into_std_str(&root.join(file))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::fileset::Origin;

    fn write(root: &Path, file: &str, text: &str) {
        let path = root.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn scheme_from_str() {
        assert_eq!(Scheme::from_str("tsv").unwrap(), Scheme::Tsv);
        assert_eq!(Scheme::from_str("json").unwrap(), Scheme::Json);
        assert!(Scheme::from_str("csv").is_err());
    }

    #[test]
    fn compile_order_follows_references() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a_top.vhd", "entity top is port (a : in bit); end;\narchitecture rtl of top is begin\n u0 : entity work.mid port map (a); end;");
        write(root, "b_mid.vhd", "use work.pkg.all;\nentity mid is port (a : in bit); end;");
        write(root, "c_pkg.vhd", "package pkg is end package;");
        write(root, "d_leaf.v", "module leaf(input a); endmodule");
        write(root, "README.md", "# notes");
        let files: Vec<String> = vec!["README.md", "a_top.vhd", "b_mid.vhd", "c_pkg.vhd", "d_leaf.v"]
            .into_iter()
            .map(String::from)
            .collect();

        let hdl = scan_hdl(root, &files, &Fileset::built_ins()).unwrap();
        assert_eq!(hdl.len(), 4);
        let order: Vec<&str> = order_files(&hdl).iter().map(|f| f.get_source().get_path()).collect();
        assert_eq!(order, vec!["c_pkg.vhd", "b_mid.vhd", "a_top.vhd", "d_leaf.v"]);
        assert_eq!(hdl[3].get_fileset(), "VLOG");
    }

    #[test]
    fn cyclic_files_keep_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "x.v", "module x(input a); y u0 (.a(a)); endmodule");
        write(root, "y.v", "module y(input a); x u0 (.a(a)); endmodule");
        let files = vec![String::from("y.v"), String::from("x.v")];
        let hdl = scan_hdl(root, &files, &Fileset::built_ins()).unwrap();
        let order: Vec<&str> = order_files(&hdl).iter().map(|f| f.get_source().get_path()).collect();
        assert_eq!(order, vec!["x.v", "y.v"]);
    }

    #[test]
    fn hierarchy_spans_groups() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "dep/gate.v", "module gate(input a); endmodule");
        write(root, "dep/spare.v", "module spare(input a); endmodule");
        write(root, "top.vhd", "use work.pkg.all;\nentity top is port (a : in bit); end;\narchitecture rtl of top is begin\n u0 : gate port map (a); end;");
        write(root, "pkg.vhd", "package pkg is end package;");
        write(root, "other.vhd", "entity other is port (a : in bit); end;");
        let dep = vec![String::from("dep/gate.v"), String::from("dep/spare.v")];
        let local = vec![String::from("other.vhd"), String::from("pkg.vhd"), String::from("top.vhd")];
        let groups = vec![
            scan_hdl(root, &dep, &Fileset::built_ins()).unwrap(),
            scan_hdl(root, &local, &Fileset::built_ins()).unwrap(),
        ];

        let paths = |groups: &Vec<Vec<HdlFile>>| -> Vec<Vec<String>> {
            groups
                .iter()
                .map(|g| g.iter().map(|f| f.get_source().get_path().to_string()).collect())
                .collect()
        };
        let kept = keep_hierarchy(groups, "TOP");
        assert_eq!(
            paths(&kept),
            vec![vec!["dep/gate.v"], vec!["pkg.vhd", "top.vhd"]]
        );

        // an undeclared unit keeps everything
        let kept = keep_hierarchy(kept, "missing");
        assert_eq!(paths(&kept)[1].len(), 2);
    }

    #[test]
    fn write_both_schemes() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::new("/ip");
        let fset = Fileset::new("py-model", &["*.py"], Origin::User).unwrap();
        let files = vec![String::from("sim/b.py"), String::from("a.py"), String::from("c.txt")];

        let mut bp = Blueprint::new(Scheme::Tsv);
        bp.add(Instruction::new("VHDL", "work", "/ip/alu.vhd"));
        bp.add_auxiliary("work", root, &fset, &files);
        let path = bp.write(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("blueprint.tsv"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "VHDL\twork\t/ip/alu.vhd\nPY-MODEL\twork\t/ip/a.py\nPY-MODEL\twork\t/ip/sim/b.py\n"
        );

        let mut bp = Blueprint::new(Scheme::Json);
        bp.add(Instruction::new("VHDL", "work", "/ip/alu.vhd"));
        let path = bp.write(dir.path()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{"fileset": "VHDL", "library": "work", "filepath": "/ip/alu.vhd"}])
        );
    }

    #[test]
    fn build_dir_must_be_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        assert!(matches!(
            prepare_build_dir(root, "../out", false),
            Err(Error::InvalidBuildDir(_))
        ));
        assert!(matches!(
            prepare_build_dir(root, ".", false),
            Err(Error::InvalidBuildDir(_))
        ));

        let out = prepare_build_dir(root, "build", false).unwrap();
        std::fs::write(out.join("stale.txt"), "old").unwrap();
        let out = prepare_build_dir(root, "build/../build", true).unwrap();
        assert!(out.is_dir());
        assert_eq!(out.join("stale.txt").exists(), false);
    }
}
