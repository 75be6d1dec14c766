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

use crate::core::ip::{Ip, IpSpec};
use crate::core::manifest;
use crate::core::pkgid::{PartialPkgId, PkgId};
use crate::core::version::PartialVersion;
use crate::error::Error;
use colored::Colorize;
use std::path::Path;

/// The ips already available on this machine.
#[derive(Debug, Default)]
pub struct Catalog {
    ips: Vec<Ip>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches the `path` for ips installed in the cache.
    pub fn installations(self, path: &Path) -> Result<Self, Error> {
        self.detect(path)
    }

    /// Searches the `path` for ips previously downloaded from a remote source.
    pub fn downloads(self, path: &Path) -> Result<Self, Error> {
        self.detect(path)
    }

    fn detect(mut self, path: &Path) -> Result<Self, Error> {
        if path.is_dir() == false {
            return Ok(self);
        }
        for root in manifest::find_ip_roots(path)? {
            match Ip::load(root) {
                Ok(ip) => self.ips.push(ip),
                Err(e) => println!("{}: skipping invalid ip: {}", "warning".yellow(), e),
            }
        }
        Ok(self)
    }

    pub fn inner(&self) -> &Vec<Ip> {
        &self.ips
    }

    /// Finds the highest version of the ip identified by `id` that satisfies `version`.
    ///
    /// Errors if `id` could refer to more than one distinct identity.
    pub fn find(&self, id: &PartialPkgId, version: &PartialVersion) -> Result<Option<&Ip>, Error> {
        let matches: Vec<&Ip> = self
            .ips
            .iter()
            .filter(|ip| id.matches(ip.get_identity()))
            .collect();

        let mut identities: Vec<&PkgId> = matches.iter().map(|ip| ip.get_identity()).collect();
        identities.sort();
        identities.dedup();
        if identities.len() > 1 {
            return Err(Error::AmbiguousIp(
                id.to_string(),
                identities
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<String>>()
                    .join(", "),
            ));
        }

        let highest = match version.find_highest(matches.iter().map(|ip| ip.get_version())) {
            Some(v) => v,
            None => return Ok(None),
        };
        // earlier scanned locations take priority
        Ok(matches.into_iter().find(|ip| ip.get_version() == highest))
    }

    /// Finds the ip exactly matching `spec`.
    pub fn get_exact(&self, spec: &IpSpec) -> Option<&Ip> {
        self.ips
            .iter()
            .find(|ip| ip.get_identity() == spec.get_id() && ip.get_version() == spec.get_version())
    }
}
