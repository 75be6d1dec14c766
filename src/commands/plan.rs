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

use crate::commands::helps::plan;
use crate::core::blueprint::{self, Blueprint, Scheme};
use crate::core::catalog::Catalog;
use crate::core::context::Context;
use crate::core::fetch::{CurlFetcher, Fetch};
use crate::core::fileset::{self, Fileset};
use crate::core::ip::Ip;
use crate::core::lang::{Lang, SourceFile};
use crate::core::lockfile::{self, LockFile, LockStatus};
use crate::core::plugin::Registry;
use crate::core::resolver::{IpGraph, Resolver};
use crate::core::toplevel::{self, Hierarchy, TopLevel};
use crate::error::Error;
use crate::util::environment::{self, EnvVar, Environment};
use crate::util::filesystem;
use cliproc::{cli, proc, stage::*};
use cliproc::{Arg, Cli, Command, Help};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq, Default)]
pub struct Plan {
    top: Option<String>,
    bench: Option<String>,
    plugin: Option<String>,
    build_dir: Option<String>,
    filesets: Vec<String>,
    scheme: Option<Scheme>,
    jobs: Option<usize>,
    clean: bool,
    list: bool,
    all: bool,
    only_lock: bool,
    force: bool,
}

impl Command for Plan {
    fn interpret<'c>(cli: &'c mut Cli<Memory>) -> cli::Result<Self> {
        cli.help(Help::with(plan::HELP))?;
        Ok(Plan {
            // Flags
            clean: cli.check(Arg::flag("clean"))?,
            list: cli.check(Arg::flag("list"))?,
            all: cli.check(Arg::flag("all"))?,
            only_lock: cli.check(Arg::flag("lock-only"))?,
            force: cli.check(Arg::flag("force"))?,
            // Options
            top: cli.get(Arg::option("top").value("unit"))?,
            bench: cli.get(Arg::option("bench").value("unit"))?,
            plugin: cli.get(Arg::option("plugin").value("alias"))?,
            build_dir: cli.get(Arg::option("build-dir").value("dir"))?,
            scheme: cli.get(Arg::option("plan").value("format"))?,
            jobs: cli.get(Arg::option("jobs").value("n"))?,
            filesets: cli
                .get_all(Arg::option("fileset").value("key=glob"))?
                .unwrap_or_default(),
        })
    }

    fn execute(self) -> proc::Result {
        let c = Context::load()?;
        let registry = Registry::new(c.get_config().get_plugins());

        // display plugins list and exit
        if self.list == true {
            match registry.is_empty() {
                true => println!("info: no plugins are configured"),
                false => print!("{}", registry.to_list()),
            }
            return Ok(());
        }

        let cwd = std::env::current_dir().map_err(|e| Error::io(Path::new("."), e))?;
        let working_ip = Ip::find_working(&cwd)?;
        self.run(&c, &working_ip, &registry, &CurlFetcher)?;
        Ok(())
    }
}

/// What a planning run produced.
#[derive(Debug, PartialEq)]
pub struct Report {
    lock_written: bool,
    blueprint: Option<PathBuf>,
    top_level: Option<TopLevel>,
}

impl Report {
    pub fn is_lock_written(&self) -> bool {
        self.lock_written
    }

    pub fn get_blueprint(&self) -> Option<&PathBuf> {
        self.blueprint.as_ref()
    }

    pub fn get_top_level(&self) -> Option<&TopLevel> {
        self.top_level.as_ref()
    }
}

impl Plan {
    /// Performs the backend logic for planning the `working_ip`.
    ///
    /// Nothing is written to the build directory unless every step before it succeeds.
    pub fn run(
        &self,
        c: &Context,
        working_ip: &Ip,
        registry: &Registry,
        fetcher: &dyn Fetch,
    ) -> Result<Report, Error> {
        let root = working_ip.get_root();

        // verify the command-line and plugin filesets before doing any work
        let plugin = match &self.plugin {
            Some(alias) => Some(registry.get(alias)?),
            None => None,
        };
        let user_filesets = self
            .filesets
            .iter()
            .map(|s| fileset::parse_user_fileset(s))
            .collect::<Result<Vec<Fileset>, Error>>()?;
        let plugin_filesets = match plugin {
            Some(p) => p.get_filesets()?,
            None => Vec::new(),
        };

        // assemble the catalog
        let catalog = Catalog::new()
            .installations(c.get_cache_path())?
            .downloads(c.get_downloads_path())?;

        let status = lockfile::load_or_invalidate(root, working_ip.get_fingerprint(), self.force)?;
        let (ip_graph, lock_written) = match &status {
            LockStatus::Reusable(lf) => {
                match self.resolver(c, working_ip, &catalog, fetcher, Some(lf)).from_lock(lf)? {
                    Some(g) => {
                        println!("info: lockfile is up to date");
                        (g, false)
                    }
                    None => {
                        println!("info: a dependency changed since it was locked; resolving again");
                        let g = self.resolver(c, working_ip, &catalog, fetcher, Some(lf)).resolve()?;
                        (g, true)
                    }
                }
            }
            LockStatus::Stale(reason, previous) => {
                println!("info: resolving dependencies (lockfile {})", reason);
                let g = self
                    .resolver(c, working_ip, &catalog, fetcher, previous.as_ref())
                    .resolve()?;
                (g, true)
            }
        };
        if lock_written == true {
            ip_graph.to_lockfile().write(root)?;
            println!(
                "info: lockfile written to: {:?}",
                filesystem::into_std_str(&root.join(lockfile::IP_LOCK_FILE))
            );
        }

        // only write lockfile and exit if flag is raised
        if self.only_lock == true {
            return Ok(Report {
                lock_written: lock_written,
                blueprint: None,
                top_level: None,
            });
        }

        let build_dir = match &self.build_dir {
            Some(d) => d.clone(),
            None => c.get_build_dir().clone(),
        };
        let build_path = blueprint::locate_build_dir(root, &build_dir)?;
        let build_prefix = match filesystem::relative_to(&build_path, root) {
            Some(rel) => filesystem::into_std_str(&rel) + "/",
            None => return Err(Error::InvalidBuildDir(build_path)),
        };

        let filesets = fileset::merge(Fileset::built_ins(), user_filesets, plugin_filesets, self.force)?;
        let files: Vec<String> = working_ip
            .gather_files()
            .into_iter()
            .filter(|f| f.starts_with(&build_prefix) == false)
            .collect();
        let hdl_files = blueprint::scan_hdl(root, &files, &filesets)?;

        // determine the toplevel and testbench
        let hierarchy = Hierarchy::new(
            &hdl_files
                .iter()
                .map(|f| f.get_source())
                .collect::<Vec<&SourceFile>>(),
        );
        let top_level = toplevel::detect(
            &hierarchy,
            self.top.as_deref(),
            self.bench.as_deref(),
            self.all,
        )?;
        let top_name = top_level.get_top().map(|s| s.get_name());
        let bench_name = top_level.get_bench().map(|s| s.get_name());
        match top_name {
            Some(t) => println!("info: top-level set to {}", t.blue()),
            None => println!("{}: no top-level set", "warning".yellow()),
        }
        match bench_name {
            Some(b) => println!("info: testbench set to {}", b.blue()),
            None => println!("info: no testbench set"),
        }

        let filesets = filesets
            .iter()
            .map(|f| f.substitute(top_name, bench_name))
            .collect::<Result<Vec<Fileset>, Error>>()?;

        // the testbench sits above the top-level when both are set
        let highest = bench_name.or(top_name);
        let blueprint = self.assemble(&ip_graph, working_ip, &files, hdl_files, &filesets, highest)?;

        // write the outputs
        let build_path = blueprint::prepare_build_dir(root, &build_dir, self.clean)?;
        let blueprint_path = blueprint.write(&build_path)?;

        let env = Environment::new()
            .add(EnvVar::with(environment::ORBIT_TOP, top_name.unwrap_or_default()))
            .add(EnvVar::with(environment::ORBIT_BENCH, bench_name.unwrap_or_default()))
            .add(EnvVar::with(
                environment::ORBIT_PLUGIN,
                self.plugin.as_deref().unwrap_or_default(),
            ))
            .add(EnvVar::with(
                environment::ORBIT_BLUEPRINT,
                blueprint.get_filename(),
            ))
            .from_ip(working_ip);
        environment::save_environment(&env, &build_path)?;

        println!(
            "info: blueprint created at: {:?}",
            filesystem::into_std_str(&blueprint_path)
        );
        Ok(Report {
            lock_written: lock_written,
            blueprint: Some(blueprint_path),
            top_level: Some(top_level),
        })
    }

    fn resolver<'a>(
        &self,
        c: &'a Context,
        working_ip: &'a Ip,
        catalog: &'a Catalog,
        fetcher: &'a dyn Fetch,
        previous: Option<&'a LockFile>,
    ) -> Resolver<'a> {
        Resolver::new(working_ip, catalog, c.get_downloads_path(), fetcher)
            .jobs(self.jobs.unwrap_or(c.get_jobs()))
            .policy(c.get_retry_policy())
            .previous(previous)
    }

    /// Collects every ip's files into a blueprint.
    ///
    /// Dependencies come first in topological order and only contribute their
    /// HDL files. The working ip's HDL files follow, then its remaining filesets.
    /// Unless `--all` is set, HDL files outside the hierarchy of `highest` are left out.
    fn assemble(
        &self,
        ip_graph: &IpGraph,
        working_ip: &Ip,
        files: &[String],
        hdl_files: Vec<blueprint::HdlFile>,
        filesets: &[Fileset],
        highest: Option<&str>,
    ) -> Result<Blueprint, Error> {
        let built_ins = Fileset::built_ins();
        let mut ips: Vec<&Ip> = Vec::new();
        let mut groups = Vec::new();
        for node in ip_graph.topological_order() {
            let ip = node.get_ip();
            if ip.get_identity() == ip_graph.get_root() {
                continue;
            }
            groups.push(blueprint::scan_hdl(ip.get_root(), &ip.gather_files(), &built_ins)?);
            ips.push(ip);
        }
        groups.push(hdl_files);
        ips.push(working_ip);

        let groups = match (self.all, highest) {
            (false, Some(unit)) => blueprint::keep_hierarchy(groups, unit),
            _ => groups,
        };

        let mut blueprint = Blueprint::new(self.scheme.unwrap_or_default());
        for (ip, hdl) in ips.iter().zip(&groups) {
            blueprint.add_hdl(&ip.get_hdl_library(), ip.get_root(), hdl);
        }
        let library = working_ip.get_hdl_library();
        for fset in filesets
            .iter()
            .filter(|f| Lang::from_fileset(f.get_name()).is_none())
        {
            blueprint.add_auxiliary(&library, working_ip.get_root(), fset, files);
        }
        Ok(blueprint)
    }
}
