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

use crate::core::manifest;
use crate::error::{Error, LastError};
use crate::util::checksum::Sha256Hash;
use colored::Colorize;
use curl::easy::Easy;
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zip::ZipArchive;

const RESPONSE_OKAY: u32 = 200;

#[derive(Debug, PartialEq)]
pub enum FetchError {
    /// The request may succeed if attempted again (connection problems, server errors).
    Transient(String),
    /// The request will not succeed by retrying.
    Fatal(String),
}

impl std::error::Error for FetchError {}

impl Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(s) => write!(f, "{}", s),
            Self::Fatal(s) => write!(f, "{}", s),
        }
    }
}

/// Retrieves the contents of a remote ip reference into a local directory.
pub trait Fetch: Sync {
    /// Places the contents referenced by `url` inside the existing directory `dst`.
    fn fetch(&self, url: &str, dst: &Path) -> Result<(), FetchError>;
}

/// Bounds how many times a transient failure is attempted again.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    attempts: usize,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: usize) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff: Duration::from_millis(500),
        }
    }

    pub fn backoff(mut self, d: Duration) -> Self {
        self.backoff = d;
        self
    }

    /// Calls `f` until it succeeds, fails fatally, or runs out of attempts.
    ///
    /// The wait between attempts grows linearly with the attempt number.
    pub fn run<T, F>(&self, mut f: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Result<T, FetchError>,
    {
        let mut attempt = 1;
        loop {
            match f() {
                Err(FetchError::Transient(e)) if attempt < self.attempts => {
                    println!(
                        "{}: attempt {} of {} failed: {}",
                        "warning".yellow(),
                        attempt,
                        self.attempts,
                        e
                    );
                    std::thread::sleep(self.backoff * attempt as u32);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Downloads zip archives with curl.
pub struct CurlFetcher;

impl CurlFetcher {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut body_bytes = Vec::new();
        let mut easy = Easy::new();
        easy.url(url).map_err(|e| FetchError::Fatal(e.to_string()))?;
        easy.follow_location(true)
            .map_err(|e| FetchError::Fatal(e.to_string()))?;
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body_bytes.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(|e| FetchError::Fatal(e.to_string()))?;
            transfer.perform().map_err(|e| {
                let transient = e.is_couldnt_connect()
                    || e.is_couldnt_resolve_host()
                    || e.is_operation_timedout()
                    || e.is_recv_error()
                    || e.is_send_error()
                    || e.is_partial_file();
                match transient {
                    true => FetchError::Transient(e.to_string()),
                    false => FetchError::Fatal(e.to_string()),
                }
            })?;
        }
        let rc = easy
            .response_code()
            .map_err(|e| FetchError::Fatal(e.to_string()))?;
        // local `file://` transfers report no response code
        match rc {
            0 | RESPONSE_OKAY => Ok(body_bytes),
            500..=599 => Err(FetchError::Transient(format!("server responded with code {}", rc))),
            _ => Err(FetchError::Fatal(format!("server responded with code {}", rc))),
        }
    }
}

impl Fetch for CurlFetcher {
    fn fetch(&self, url: &str, dst: &Path) -> Result<(), FetchError> {
        let body_bytes = self.download(url)?;
        let mut temp_file = tempfile::tempfile().map_err(|e| FetchError::Fatal(e.to_string()))?;
        temp_file
            .write_all(&body_bytes)
            .map_err(|e| FetchError::Fatal(e.to_string()))?;
        let mut zip_archive =
            ZipArchive::new(temp_file).map_err(|e| FetchError::Fatal(e.to_string()))?;
        zip_archive
            .extract(dst)
            .map_err(|e| FetchError::Fatal(e.to_string()))
    }
}

/// Returns the directory within `downloads` reserved for the contents of `url`.
pub fn download_slot(downloads: &Path, url: &str) -> PathBuf {
    let sum = Sha256Hash::compute(url.as_bytes()).to_string();
    downloads.join(&sum[..16])
}

/// Returns the root of the ip already downloaded from `url`, if any.
pub fn find_downloaded(downloads: &Path, url: &str) -> Result<Option<PathBuf>, Error> {
    let slot = download_slot(downloads, url);
    if slot.is_dir() == false {
        return Ok(None);
    }
    Ok(manifest::find_ip_roots(&slot)?.into_iter().next())
}

/// Makes the ip referenced by `url` available under `downloads`, returning its root.
///
/// The archive is unpacked into a temporary directory that is renamed into the
/// download slot only once complete.
pub fn materialize(
    fetcher: &dyn Fetch,
    policy: &RetryPolicy,
    url: &str,
    downloads: &Path,
) -> Result<PathBuf, Error> {
    if let Some(root) = find_downloaded(downloads, url)? {
        return Ok(root);
    }
    let failed = |e: &dyn Display| Error::FetchFailed(url.to_string(), LastError(e.to_string()));

    std::fs::create_dir_all(downloads).map_err(|e| Error::io(downloads, e))?;
    let temp = tempfile::tempdir_in(downloads).map_err(|e| Error::io(downloads, e))?;
    println!("info: fetching {} ...", url);
    policy
        .run(|| fetcher.fetch(url, temp.path()))
        .map_err(|e| failed(&e))?;

    if manifest::find_ip_roots(temp.path())?.is_empty() == true {
        return Err(failed(&"archive does not contain an ip"));
    }
    let slot = download_slot(downloads, url);
    if let Err(e) = std::fs::rename(temp.path(), &slot) {
        // another fetch may have completed the slot first
        if find_downloaded(downloads, url)?.is_none() {
            return Err(Error::io(&slot, e));
        }
    }
    match find_downloaded(downloads, url)? {
        Some(root) => Ok(root),
        None => Err(failed(&"archive does not contain an ip")),
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves directories from the local filesystem as if they were remote archives.
    pub struct DirFetcher {
        sites: HashMap<String, PathBuf>,
        failures: Mutex<usize>,
        pub calls: AtomicUsize,
    }

    impl DirFetcher {
        pub fn new() -> Self {
            Self {
                sites: HashMap::new(),
                failures: Mutex::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn serve(mut self, url: &str, dir: &Path) -> Self {
            self.sites.insert(url.to_string(), dir.to_path_buf());
            self
        }

        /// Fails the next `n` requests with a transient error.
        pub fn flaky(self, n: usize) -> Self {
            *self.failures.lock().unwrap() = n;
            self
        }
    }

    fn copy_dir(src: &Path, dst: &Path) {
        std::fs::create_dir_all(dst).unwrap();
        for entry in std::fs::read_dir(src).unwrap() {
            let entry = entry.unwrap();
            let to = dst.join(entry.file_name());
            if entry.file_type().unwrap().is_dir() {
                copy_dir(&entry.path(), &to);
            } else {
                std::fs::copy(entry.path(), to).unwrap();
            }
        }
    }

    impl Fetch for DirFetcher {
        fn fetch(&self, url: &str, dst: &Path) -> Result<(), FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(FetchError::Transient(String::from("connection reset")));
                }
            }
            match self.sites.get(url) {
                Some(dir) => {
                    copy_dir(dir, &dst.join("archive"));
                    Ok(())
                }
                None => Err(FetchError::Fatal(String::from("not found"))),
            }
        }
    }

    #[test]
    fn retry_transient_only() {
        let policy = RetryPolicy::new(3).backoff(Duration::ZERO);
        let mut calls = 0;
        let result: Result<(), FetchError> = policy.run(|| {
            calls += 1;
            Err(FetchError::Transient(String::from("timeout")))
        });
        assert_eq!(result, Err(FetchError::Transient(String::from("timeout"))));
        assert_eq!(calls, 3);

        let mut calls = 0;
        let result: Result<(), FetchError> = policy.run(|| {
            calls += 1;
            Err(FetchError::Fatal(String::from("404")))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn materialize_into_slot() {
        let site = tempfile::tempdir().unwrap();
        crate::core::ip::test::write_ip(site.path(), "ks-tech.rtl.mux", "0.3.0", &[]);
        let downloads = tempfile::tempdir().unwrap();
        let url = "https://example.com/mux.zip";

        let fetcher = DirFetcher::new().serve(url, site.path()).flaky(1);
        let policy = RetryPolicy::new(2).backoff(Duration::ZERO);
        let root = materialize(&fetcher, &policy, url, downloads.path()).unwrap();
        assert_eq!(root, download_slot(downloads.path(), url).join("archive"));
        assert!(root.join(manifest::IP_MANIFEST_FILE).exists());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        // already downloaded
        materialize(&fetcher, &policy, url, downloads.path()).unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        // only the slot remains
        assert_eq!(std::fs::read_dir(downloads.path()).unwrap().count(), 1);
    }

    #[test]
    fn materialize_fatal() {
        let downloads = tempfile::tempdir().unwrap();
        let fetcher = DirFetcher::new();
        let policy = RetryPolicy::new(5).backoff(Duration::ZERO);
        let url = "https://example.com/missing.zip";
        assert!(matches!(
            materialize(&fetcher, &policy, url, downloads.path()),
            Err(Error::FetchFailed(_, _))
        ));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_dir(downloads.path()).unwrap().count(), 0);
    }
}
