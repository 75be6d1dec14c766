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

use crate::core::config::{Config, CONFIG_FILE, DEFAULT_BUILD_DIR};
use crate::core::fetch::RetryPolicy;
use crate::error::{Error, LastError};
use std::env;
use std::path::{Path, PathBuf};

const CACHE_DIR: &str = "cache";
const DOWNLOADS_DIR: &str = "downloads";

/// The user-level state surrounding a run: where ips are stored and how the
/// tool is configured.
#[derive(Debug, PartialEq)]
pub struct Context {
    home_path: PathBuf,
    cache_path: PathBuf,
    downloads_path: PathBuf,
    build_dir: String,
    config: Config,
}

impl Context {
    /// Creates a context rooted at `home` with an empty configuration.
    pub fn with_home(home: &Path) -> Self {
        Self {
            cache_path: home.join(CACHE_DIR),
            downloads_path: home.join(DOWNLOADS_DIR),
            home_path: home.to_path_buf(),
            build_dir: String::from(DEFAULT_BUILD_DIR),
            config: Config::new(),
        }
    }

    /// Sets the home directory from the environment variable `key`, else to
    /// `$HOME/.orbit`.
    pub fn home(key: &str) -> Result<Self, Error> {
        let home = match env::var_os(key) {
            Some(s) if s.is_empty() == false => PathBuf::from(s),
            _ => match home::home_dir() {
                Some(p) => p.join(".orbit"),
                None => {
                    return Err(Error::ConfigInvalid(
                        PathBuf::from("~"),
                        LastError(format!(
                            "failed to detect user's home directory; please set the {} environment variable",
                            key
                        )),
                    ))
                }
            },
        };
        Ok(Self::with_home(&home))
    }

    /// Loads the configuration file `file` found directly under the home directory.
    pub fn settings(mut self, file: &str) -> Result<Self, Error> {
        self.config = Config::from_file(&self.home_path.join(file))?;
        if let Some(dir) = self.config.get_build_dir() {
            self.build_dir = dir.clone();
        }
        Ok(self)
    }

    /// Lets the environment variable `key` take precedence over the configured
    /// build directory.
    pub fn build_dir(mut self, key: &str) -> Self {
        if let Ok(s) = env::var(key) {
            if s.is_empty() == false {
                self.build_dir = s;
            }
        }
        self
    }

    /// Loads the default context from the environment.
    pub fn load() -> Result<Self, Error> {
        use crate::util::environment::{ORBIT_BUILD_DIR, ORBIT_HOME};
        Ok(Self::home(ORBIT_HOME)?
            .settings(CONFIG_FILE)?
            .build_dir(ORBIT_BUILD_DIR))
    }

    pub fn get_home_path(&self) -> &PathBuf {
        &self.home_path
    }

    pub fn get_cache_path(&self) -> &PathBuf {
        &self.cache_path
    }

    pub fn get_downloads_path(&self) -> &PathBuf {
        &self.downloads_path
    }

    pub fn get_build_dir(&self) -> &String {
        &self.build_dir
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_jobs(&self) -> usize {
        self.config.get_jobs()
    }

    pub fn get_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.get_retries())
    }
}
