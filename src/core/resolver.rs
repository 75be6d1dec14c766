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

//! Builds the graph of ips required by the working ip.
//!
//! Edges point from a dependency to its dependent, so the working ip is the
//! single node without outgoing edges.

use crate::core::catalog::Catalog;
use crate::core::fetch::{self, Fetch, RetryPolicy};
use crate::core::ip::{Ip, IpSpec};
use crate::core::lockfile::{LockEntry, LockFile, Source, IP_LOCK_FILE};
use crate::core::manifest::{Dependency, IP_MANIFEST_FILE};
use crate::core::pkgid::PkgId;
use crate::core::version::{self, PartialVersion, Version};
use crate::error::{Error, Hint, LastError};
use crate::util::checksum::Sha256Hash;
use crate::util::filesystem;
use crate::util::graph::EdgeStatus;
use crate::util::graphmap::GraphMap;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// An ip within the resolved graph.
#[derive(Debug, PartialEq)]
pub struct IpNode {
    ip: Ip,
    source: Option<Source>,
    sum: Option<Sha256Hash>,
    deps: Vec<PkgId>,
}

impl IpNode {
    fn new(ip: Ip, source: Option<Source>, sum: Option<Sha256Hash>) -> Self {
        Self {
            ip: ip,
            source: source,
            sum: sum,
            deps: Vec::new(),
        }
    }

    pub fn get_ip(&self) -> &Ip {
        &self.ip
    }

    pub fn get_source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn get_sum(&self) -> Option<&Sha256Hash> {
        self.sum.as_ref()
    }

    /// Direct dependencies in their order of declaration.
    pub fn get_deps(&self) -> &Vec<PkgId> {
        &self.deps
    }

    fn add_dep(&mut self, id: &PkgId) {
        if self.deps.contains(id) == false {
            self.deps.push(id.clone());
        }
    }
}

pub struct IpGraph {
    graph: GraphMap<PkgId, IpNode, ()>,
    root: PkgId,
}

impl IpGraph {
    pub fn get(&self, id: &PkgId) -> Option<&IpNode> {
        self.graph.get_node_by_key(id).map(|n| n.as_ref())
    }

    pub fn get_root(&self) -> &PkgId {
        &self.root
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.get_graph().edge_count()
    }

    /// Orders the ips so every dependency comes before its dependents.
    ///
    /// This is a depth-first post-order from the working ip that visits
    /// dependencies in declaration order, so the working ip is always last.
    pub fn topological_order(&self) -> Vec<&IpNode> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.node_count());
        self.post_order(&self.root, &mut visited, &mut order);
        order
    }

    fn post_order<'a>(
        &'a self,
        id: &PkgId,
        visited: &mut HashSet<PkgId>,
        order: &mut Vec<&'a IpNode>,
    ) {
        if visited.insert(id.clone()) == false {
            return;
        }
        if let Some(node) = self.get(id) {
            for dep in &node.deps {
                self.post_order(dep, visited, order);
            }
            order.push(node);
        }
    }

    /// Records the graph as lock entries keyed to the working ip's manifest.
    pub fn to_lockfile(&self) -> LockFile {
        let entries = self
            .topological_order()
            .into_iter()
            .map(|node| {
                LockEntry::new(
                    node.ip.to_ip_version(),
                    node.source.clone(),
                    node.sum.clone(),
                    node.deps
                        .iter()
                        .filter_map(|d| self.get(d))
                        .map(|d| d.ip.to_ip_spec())
                        .collect(),
                )
            })
            .collect();
        let fingerprint = match self.get(&self.root) {
            Some(n) => n.ip.get_fingerprint().clone(),
            None => Sha256Hash::compute(b""),
        };
        LockFile::new(fingerprint, entries)
    }
}

/// An ip found on the filesystem for some request.
struct Located {
    ip: Ip,
    source: Option<Source>,
    sum: Option<Sha256Hash>,
}

/// The first resolution path to request an identity.
struct Request {
    constraint: PartialVersion,
    version: Version,
    fingerprint: Sha256Hash,
    root: PathBuf,
    path: String,
}

impl Request {
    /// Displays the request along with where its ip was found.
    fn to_located_string(&self) -> String {
        format!("{} at {:?}", self, self.root)
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\" ({}) from {}",
            self.constraint, self.version, self.path
        )
    }
}

pub struct Resolver<'a> {
    root: &'a Ip,
    catalog: &'a Catalog,
    downloads: &'a Path,
    fetcher: &'a dyn Fetch,
    policy: RetryPolicy,
    jobs: usize,
    previous: Option<&'a LockFile>,
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a Ip, catalog: &'a Catalog, downloads: &'a Path, fetcher: &'a dyn Fetch) -> Self {
        Self {
            root: root,
            catalog: catalog,
            downloads: downloads,
            fetcher: fetcher,
            policy: RetryPolicy::default(),
            jobs: 1,
            previous: None,
        }
    }

    /// Sets the number of workers that materialize ips at the same time.
    pub fn jobs(mut self, n: usize) -> Self {
        self.jobs = n.max(1);
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the lockfile whose recorded checksums new resolutions must agree with.
    pub fn previous(mut self, lock: Option<&'a LockFile>) -> Self {
        self.previous = lock;
        self
    }

    fn build_pool(&self) -> Option<ThreadPool> {
        ThreadPoolBuilder::new().num_threads(self.jobs).build().ok()
    }

    fn stale_lock(&self, reason: String) -> Error {
        Error::StaleLockRejected(
            self.root.get_root().join(IP_LOCK_FILE),
            LastError(reason),
            Hint::ForceLock,
        )
    }

    /// Expresses a local ip's location relative to the working ip when possible.
    fn to_local(&self, path: &Path) -> PathBuf {
        match filesystem::relative_to(path, self.root.get_root()) {
            Some(p) => p,
            None => path.to_path_buf(),
        }
    }

    /// Resolves every dependency from the manifests, starting at the working ip.
    pub fn resolve(&self) -> Result<IpGraph, Error> {
        let pool = self.build_pool();
        let root_id = self.root.get_identity().clone();
        let mut graph = GraphMap::new();
        graph.add_node(root_id.clone(), IpNode::new(self.root.clone(), None, None));
        let mut requests = HashMap::new();
        let mut chain = vec![root_id.clone()];
        self.visit(&pool, &mut graph, &mut requests, self.root, &mut chain)?;
        Ok(IpGraph {
            graph: graph,
            root: root_id,
        })
    }

    fn visit(
        &self,
        pool: &Option<ThreadPool>,
        graph: &mut GraphMap<PkgId, IpNode, ()>,
        requests: &mut HashMap<PkgId, Request>,
        ip: &Ip,
        chain: &mut Vec<PkgId>,
    ) -> Result<(), Error> {
        let deps = ip.get_man().get_deps();
        let located: Vec<Result<Located, Error>> = match pool {
            Some(p) => p.install(|| {
                deps.par_iter()
                    .map(|d| self.locate(d, ip.get_root()))
                    .collect()
            }),
            None => deps.iter().map(|d| self.locate(d, ip.get_root())).collect(),
        };

        let parent = ip.get_identity();
        for (dep, result) in deps.iter().zip(located) {
            let found = result?;
            let id = found.ip.get_identity().clone();

            if let Some(i) = chain.iter().position(|c| c == &id) {
                let cycle: Vec<String> = chain[i..]
                    .iter()
                    .chain(std::iter::once(&id))
                    .map(|c| c.to_string())
                    .collect();
                return Err(Error::CyclicDependency(cycle.join(" -> ")));
            }

            let request = Request {
                constraint: dep.get_version().clone(),
                version: found.ip.get_version().clone(),
                fingerprint: found.ip.get_fingerprint().clone(),
                root: found.ip.get_root().clone(),
                path: chain
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<String>>()
                    .join(" -> "),
            };
            match requests.get(&id) {
                Some(first) => {
                    if first.version != request.version || first.constraint != request.constraint {
                        return Err(Error::VersionConflict(
                            id.to_string(),
                            first.to_string(),
                            request.to_string(),
                        ));
                    }
                    // same version but a different manifest behind it
                    if first.fingerprint != request.fingerprint {
                        return Err(Error::VersionConflict(
                            id.to_string(),
                            first.to_located_string(),
                            request.to_located_string(),
                        ));
                    }
                }
                None => {
                    self.verify(&found)?;
                    requests.insert(id.clone(), request);
                    let child = found.ip.clone();
                    graph.add_node(id.clone(), IpNode::new(found.ip, found.source, found.sum));
                    chain.push(id.clone());
                    self.visit(pool, graph, requests, &child, chain)?;
                    chain.pop();
                }
            }
            graph.add_edge_by_key(&id, parent, ());
            if let Some(node) = graph.get_node_by_key_mut(parent) {
                node.as_ref_mut().add_dep(&id);
            }
        }
        Ok(())
    }

    /// Compares a newly located ip against the checksum it was previously locked with.
    fn verify(&self, found: &Located) -> Result<(), Error> {
        if found.source.as_ref().map_or(true, |s| s.is_local()) == true {
            return Ok(());
        }
        let spec = found.ip.to_ip_spec();
        let expected = match self.previous.and_then(|lf| lf.get(&spec)).and_then(|e| e.get_sum()) {
            Some(s) => s,
            None => return Ok(()),
        };
        match found.sum.as_ref() {
            Some(sum) if sum != expected => Err(Error::ChecksumMismatch(
                spec.to_string(),
                expected.to_string(),
                sum.to_string(),
                Hint::RemoteChanged,
            )),
            _ => Ok(()),
        }
    }

    /// Finds the ip satisfying `dep`, declared by the ip living at `parent`.
    fn locate(&self, dep: &Dependency, parent: &Path) -> Result<Located, Error> {
        let name = format!("{} \"{}\"", dep.get_id(), dep.get_version());
        let not_found = |reason: String| Error::IpNotFound(name.clone(), LastError(reason));

        let (ip, source) = if let Some(p) = dep.get_path() {
            let dir = filesystem::normalize(&parent.join(p));
            if dir.join(IP_MANIFEST_FILE).is_file() == false {
                return Err(not_found(format!("no manifest found at path {:?}", dir)));
            }
            let ip = Ip::load(dir)?;
            let source = Source::Local(self.to_local(ip.get_root()));
            (ip, source)
        } else if let Some(ip) = self.catalog.find(dep.get_id(), dep.get_version())? {
            let source = match dep.get_source().or(ip.get_man().get_ip().get_source()) {
                Some(url) => Source::Remote(url.clone()),
                None => Source::Local(ip.get_root().clone()),
            };
            (ip.clone(), source)
        } else if let Some(url) = dep.get_source() {
            let root = fetch::materialize(self.fetcher, &self.policy, url, self.downloads)?;
            (Ip::load(root)?, Source::Remote(url.clone()))
        } else {
            return Err(not_found(format!(
                "no local path, installed version, or remote source satisfies the request"
            )));
        };

        if dep.get_id().matches(ip.get_identity()) == false
            || version::is_compatible(dep.get_version(), ip.get_version()) == false
        {
            return Err(not_found(format!(
                "found {} at {:?} instead",
                ip.to_ip_spec(),
                ip.get_root()
            )));
        }
        let sum = ip.compute_checksum()?;
        Ok(Located {
            ip: ip,
            source: Some(source),
            sum: Some(sum),
        })
    }

    /// Rebuilds the graph from the entries recorded in `lock`.
    ///
    /// Returns `None` when a locked dependency's manifest has changed since it
    /// was recorded, in which case a full resolution is needed.
    pub fn from_lock(&self, lock: &LockFile) -> Result<Option<IpGraph>, Error> {
        let root_spec = self.root.to_ip_spec();
        let root_entry = lock
            .get(&root_spec)
            .ok_or_else(|| self.stale_lock(format!("missing entry for the working ip {}", root_spec)))?;

        // collect every entry reachable from the working ip
        let mut entries: Vec<&LockEntry> = Vec::new();
        let mut seen: Vec<&IpSpec> = vec![&root_spec];
        let mut stack: Vec<(&IpSpec, &IpSpec)> = root_entry
            .get_deps()
            .iter()
            .rev()
            .map(|d| (d, &root_spec))
            .collect();
        while let Some((spec, parent)) = stack.pop() {
            if seen.contains(&spec) == true {
                continue;
            }
            if let Some(other) = seen.iter().find(|s| s.get_id() == spec.get_id()) {
                return Err(self.stale_lock(format!("{} is locked as both {} and {}", spec.get_id(), other, spec)));
            }
            let entry = lock
                .get(spec)
                .ok_or_else(|| self.stale_lock(format!("{} depends on unknown entry {}", parent, spec)))?;
            seen.push(spec);
            entries.push(entry);
            for d in entry.get_deps().iter().rev() {
                stack.push((d, entry.get_spec()));
            }
        }

        let pool = self.build_pool();
        let located: Vec<Result<Option<Located>, Error>> = match &pool {
            Some(p) => p.install(|| entries.par_iter().map(|e| self.locate_locked(e)).collect()),
            None => entries.iter().map(|e| self.locate_locked(e)).collect(),
        };

        let root_id = self.root.get_identity().clone();
        let mut graph = GraphMap::new();
        graph.add_node(root_id.clone(), IpNode::new(self.root.clone(), None, None));
        for (entry, result) in entries.iter().zip(located) {
            match result? {
                Some(found) => {
                    graph.add_node(
                        entry.get_spec().get_id().clone(),
                        IpNode::new(found.ip, found.source, found.sum),
                    );
                }
                None => {
                    println!(
                        "info: manifest of {} changed since it was locked; resolving again ...",
                        entry.get_spec()
                    );
                    return Ok(None);
                }
            }
        }

        for entry in std::iter::once(root_entry).chain(entries.iter().copied()) {
            let id = entry.get_spec().get_id();
            for dep in entry.get_deps() {
                match graph.add_edge_by_key(dep.get_id(), id, ()) {
                    EdgeStatus::SelfLoop => {
                        return Err(self.stale_lock(format!("{} depends on itself", entry.get_spec())))
                    }
                    _ => (),
                }
                if let Some(node) = graph.get_node_by_key_mut(id) {
                    node.as_ref_mut().add_dep(dep.get_id());
                }
            }
        }
        if graph.get_graph().is_cyclic() == true {
            return Err(self.stale_lock(format!("recorded dependencies form a cycle")));
        }
        Ok(Some(IpGraph {
            graph: graph,
            root: root_id,
        }))
    }

    /// Finds the ip recorded by a lock entry, fetching it if it is remote and
    /// missing.
    fn locate_locked(&self, entry: &LockEntry) -> Result<Option<Located>, Error> {
        let spec = entry.get_spec();
        let ip = match entry.get_source() {
            Some(Source::Local(p)) => {
                let dir = filesystem::normalize(&self.root.get_root().join(p));
                if dir.join(IP_MANIFEST_FILE).is_file() == false {
                    return Err(self.stale_lock(format!("no ip found for {} at {:?}", spec, dir)));
                }
                Ip::load(dir)?
            }
            Some(Source::Remote(url)) => {
                if let Some(root) = fetch::find_downloaded(self.downloads, url)? {
                    Ip::load(root)?
                } else if let Some(ip) = self.catalog.get_exact(spec) {
                    ip.clone()
                } else {
                    let root = fetch::materialize(self.fetcher, &self.policy, url, self.downloads)?;
                    let ip = Ip::load(root)?;
                    let sum = ip.compute_checksum()?;
                    if let Some(expected) = entry.get_sum() {
                        if expected != &sum {
                            return Err(Error::ChecksumMismatch(
                                spec.to_string(),
                                expected.to_string(),
                                sum.to_string(),
                                Hint::RemoteChanged,
                            ));
                        }
                    }
                    ip
                }
            }
            None => match self.catalog.get_exact(spec) {
                Some(ip) => ip.clone(),
                None => return Err(self.stale_lock(format!("no source recorded for {}", spec))),
            },
        };
        if &ip.to_ip_spec() != spec {
            return Err(self.stale_lock(format!(
                "expected {} but found {} at {:?}",
                spec,
                ip.to_ip_spec(),
                ip.get_root()
            )));
        }
        if ip.get_fingerprint() != entry.get_ip().get_fingerprint() {
            return Ok(None);
        }
        Ok(Some(Located {
            ip: ip,
            source: entry.get_source().cloned(),
            sum: entry.get_sum().cloned(),
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::fetch::test::DirFetcher;
    use crate::core::ip::test::write_ip;
    use std::str::FromStr;
    use std::time::Duration;

    fn order(g: &IpGraph) -> Vec<String> {
        g.topological_order()
            .iter()
            .map(|n| n.get_ip().to_ip_spec().to_string())
            .collect()
    }

    /// alu depends on gates and adder; adder also depends on gates.
    fn workspace(dir: &Path) -> Ip {
        write_ip(&dir.join("gates"), "ks-tech.rtl.gates", "1.0.4", &[]);
        write_ip(
            &dir.join("adder"),
            "ks-tech.common.adder",
            "2.1.0",
            &["gates = { version = \"1.0\", path = \"../gates\" }"],
        );
        write_ip(
            &dir.join("alu"),
            "ks-tech.rtl.alu",
            "1.0.0",
            &[
                "gates = { version = \"1.0\", path = \"../gates\" }",
                "\"ks-tech.common.adder\" = { version = \"2.1.0\", path = \"../adder\" }",
            ],
        );
        Ip::load(dir.join("alu")).unwrap()
    }

    #[test]
    fn resolve_local_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = workspace(dir.path());
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");

        let g = Resolver::new(&root, &catalog, &downloads, &fetcher)
            .jobs(4)
            .resolve()
            .unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(
            order(&g),
            vec![
                "ks-tech.rtl.gates:1.0.4",
                "ks-tech.common.adder:2.1.0",
                "ks-tech.rtl.alu:1.0.0"
            ]
        );
        let gates = g.get(&PkgId::from_str("ks-tech.rtl.gates").unwrap()).unwrap();
        assert_eq!(gates.get_source(), Some(&Source::Local(PathBuf::from("../gates"))));
        assert!(gates.get_sum().is_some());
    }

    #[test]
    fn lockfile_rebuilds_same_graph() {
        let dir = tempfile::tempdir().unwrap();
        let root = workspace(dir.path());
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");
        let resolver = Resolver::new(&root, &catalog, &downloads, &fetcher);

        let g = resolver.resolve().unwrap();
        let lock = g.to_lockfile();
        assert_eq!(lock.get_fingerprint(), root.get_fingerprint());
        lock.write(root.get_root()).unwrap();

        let lock = LockFile::from_path(root.get_root()).unwrap().unwrap();
        let h = resolver.from_lock(&lock).unwrap().unwrap();
        assert_eq!(order(&g), order(&h));
        assert_eq!(g.edge_count(), h.edge_count());
        assert_eq!(h.to_lockfile(), lock);
    }

    #[test]
    fn changed_dependency_abandons_lock() {
        let dir = tempfile::tempdir().unwrap();
        let root = workspace(dir.path());
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");
        let resolver = Resolver::new(&root, &catalog, &downloads, &fetcher);
        let lock = resolver.resolve().unwrap().to_lockfile();

        // adder stops depending on gates
        write_ip(&dir.path().join("adder"), "ks-tech.common.adder", "2.1.0", &[]);
        assert!(resolver.from_lock(&lock).unwrap().is_none());
    }

    #[test]
    fn lock_with_unknown_reference() {
        let dir = tempfile::tempdir().unwrap();
        let root = workspace(dir.path());
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");
        let resolver = Resolver::new(&root, &catalog, &downloads, &fetcher);
        let lock = resolver.resolve().unwrap().to_lockfile();

        let text = lock
            .to_string()
            .replace("ks-tech.common.adder:2.1.0\"", "ks-tech.common.adder:2.1.1\"");
        let lock = LockFile::from_str(&text).unwrap();
        assert!(matches!(
            resolver.from_lock(&lock),
            Err(Error::StaleLockRejected(_, _, Hint::ForceLock))
        ));
    }

    #[test]
    fn cycle_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        write_ip(
            &dir.path().join("a"),
            "ks-tech.rtl.a",
            "1.0.0",
            &["b = { version = \"1\", path = \"../b\" }"],
        );
        write_ip(
            &dir.path().join("b"),
            "ks-tech.rtl.b",
            "1.0.0",
            &["a = { version = \"1\", path = \"../a\" }"],
        );
        let root = Ip::load(dir.path().join("a")).unwrap();
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");
        assert_eq!(
            Resolver::new(&root, &catalog, &downloads, &fetcher)
                .resolve()
                .err(),
            Some(Error::CyclicDependency(String::from(
                "ks-tech.rtl.a -> ks-tech.rtl.b -> ks-tech.rtl.a"
            )))
        );
    }

    #[test]
    fn conflicting_versions() {
        let dir = tempfile::tempdir().unwrap();
        write_ip(&dir.path().join("gates-1.0"), "ks-tech.rtl.gates", "1.0.0", &[]);
        write_ip(&dir.path().join("gates-1.1"), "ks-tech.rtl.gates", "1.1.0", &[]);
        write_ip(
            &dir.path().join("b"),
            "ks-tech.rtl.b",
            "1.0.0",
            &["gates = { version = \"1\", path = \"../gates-1.0\" }"],
        );
        write_ip(
            &dir.path().join("c"),
            "ks-tech.rtl.c",
            "1.0.0",
            &["gates = { version = \"1\", path = \"../gates-1.1\" }"],
        );
        write_ip(
            &dir.path().join("top"),
            "ks-tech.rtl.top",
            "1.0.0",
            &[
                "b = { version = \"1\", path = \"../b\" }",
                "c = { version = \"1\", path = \"../c\" }",
            ],
        );
        let root = Ip::load(dir.path().join("top")).unwrap();
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");
        match Resolver::new(&root, &catalog, &downloads, &fetcher).resolve() {
            Err(Error::VersionConflict(id, first, second)) => {
                assert_eq!(id, "ks-tech.rtl.gates");
                assert!(first.contains("ks-tech.rtl.top -> ks-tech.rtl.b"));
                assert!(second.contains("ks-tech.rtl.top -> ks-tech.rtl.c"));
            }
            _ => panic!("expected a version conflict"),
        }
    }

    #[test]
    fn same_version_different_manifest_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        write_ip(&dir.path().join("extra"), "ks-tech.rtl.extra", "1.0.0", &[]);
        write_ip(&dir.path().join("gates-a"), "ks-tech.rtl.gates", "1.0.0", &[]);
        write_ip(
            &dir.path().join("gates-b"),
            "ks-tech.rtl.gates",
            "1.0.0",
            &["extra = { version = \"1\", path = \"../extra\" }"],
        );
        write_ip(
            &dir.path().join("b"),
            "ks-tech.rtl.b",
            "1.0.0",
            &["gates = { version = \"1\", path = \"../gates-a\" }"],
        );
        write_ip(
            &dir.path().join("c"),
            "ks-tech.rtl.c",
            "1.0.0",
            &["gates = { version = \"1\", path = \"../gates-b\" }"],
        );
        write_ip(
            &dir.path().join("top"),
            "ks-tech.rtl.top",
            "1.0.0",
            &[
                "b = { version = \"1\", path = \"../b\" }",
                "c = { version = \"1\", path = \"../c\" }",
            ],
        );
        let root = Ip::load(dir.path().join("top")).unwrap();
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");
        match Resolver::new(&root, &catalog, &downloads, &fetcher).resolve() {
            Err(Error::VersionConflict(id, first, second)) => {
                assert_eq!(id, "ks-tech.rtl.gates");
                assert!(first.contains("ks-tech.rtl.top -> ks-tech.rtl.b"));
                assert!(first.contains("gates-a"));
                assert!(second.contains("ks-tech.rtl.top -> ks-tech.rtl.c"));
                assert!(second.contains("gates-b"));
            }
            _ => panic!("expected a version conflict"),
        }
    }

    #[test]
    fn missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write_ip(&dir.path().join("top"), "ks-tech.rtl.top", "1.0.0", &["gates = \"1\""]);
        let root = Ip::load(dir.path().join("top")).unwrap();
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new();
        let downloads = dir.path().join("downloads");
        assert!(matches!(
            Resolver::new(&root, &catalog, &downloads, &fetcher).resolve(),
            Err(Error::IpNotFound(_, _))
        ));
    }

    #[test]
    fn remote_contents_must_match_lock() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("site");
        write_ip(&site, "ks-tech.rtl.mux", "0.3.0", &[]);
        std::fs::write(site.join("mux.vhd"), "entity mux is end entity;\n").unwrap();
        let url = "https://example.com/mux.zip";
        write_ip(
            &dir.path().join("top"),
            "ks-tech.rtl.top",
            "1.0.0",
            &["mux = { version = \"0.3\", source = \"https://example.com/mux.zip\" }"],
        );
        let root = Ip::load(dir.path().join("top")).unwrap();
        let catalog = Catalog::new();
        let fetcher = DirFetcher::new().serve(url, &site);
        let policy = RetryPolicy::new(1).backoff(Duration::ZERO);

        let downloads = dir.path().join("downloads-1");
        let g = Resolver::new(&root, &catalog, &downloads, &fetcher)
            .policy(policy.clone())
            .resolve()
            .unwrap();
        let lock = g.to_lockfile();
        let mux = g.get(&PkgId::from_str("ks-tech.rtl.mux").unwrap()).unwrap();
        assert_eq!(mux.get_source(), Some(&Source::Remote(String::from(url))));

        // the remote archive changes without a new version
        std::fs::write(site.join("mux.vhd"), "entity mux2 is end entity;\n").unwrap();
        let downloads = dir.path().join("downloads-2");
        let resolver = Resolver::new(&root, &catalog, &downloads, &fetcher)
            .policy(policy.clone())
            .previous(Some(&lock));
        assert!(matches!(
            resolver.resolve(),
            Err(Error::ChecksumMismatch(_, _, _, Hint::RemoteChanged))
        ));
        let downloads = dir.path().join("downloads-3");
        let resolver = Resolver::new(&root, &catalog, &downloads, &fetcher).policy(policy);
        assert!(matches!(
            resolver.from_lock(&lock),
            Err(Error::ChecksumMismatch(_, _, _, Hint::RemoteChanged))
        ));
    }
}
