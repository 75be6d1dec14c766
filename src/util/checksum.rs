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

use crate::error::Error;
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct Sha256Hash([u8; 32]);

impl Sha256Hash {
    /// Hashes the bytes `s` in a single pass.
    pub fn compute(s: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(s));
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[derive(Debug, PartialEq)]
pub enum Sha256Error {
    BadLen(usize),
    BadDigit(usize),
}

impl std::error::Error for Sha256Error {}

impl Display for Sha256Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadLen(l) => write!(f, "expected 64 hexadecimal characters but found {}", l),
            Self::BadDigit(i) => write!(f, "invalid hexadecimal digit at position {}", i),
        }
    }
}

impl FromStr for Sha256Hash {
    type Err = Sha256Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 || s.is_ascii() == false {
            return Err(Sha256Error::BadLen(s.len()));
        }
        let mut digest = [0u8; 32];
        for (i, byte) in digest.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
                .map_err(|_| Sha256Error::BadDigit(2 * i))?;
        }
        Ok(Self(digest))
    }
}

impl Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?
        }
        Ok(())
    }
}

/// Computes a single hash over the contents and names of `files` (relative to `root`).
///
/// Carriage returns are dropped from text files so the same sources checked
/// out on different platforms produce the same sum. Binary files are hashed
/// as-is.
pub fn checksum(files: &[String], root: &Path) -> Result<Sha256Hash, Error> {
    let mut total_bytes = Vec::<u8>::with_capacity((files.len() + 1) * 32);
    let mut filename_bytes = Vec::<u8>::new();

    for file in files {
        let path = root.join(file);
        let bytes = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
        // binary-encoded files (.pdf, .jpg, etc.) are detected by a NUL char
        let sum = match bytes.contains(&0x00) {
            true => Sha256Hash::compute(&bytes),
            false => {
                let text: Vec<u8> = bytes.into_iter().filter(|f| f != &0x0d).collect();
                Sha256Hash::compute(&text)
            }
        };
        total_bytes.extend_from_slice(sum.as_bytes());
        // names are NUL-terminated so neighboring names cannot run together
        filename_bytes.extend_from_slice(file.as_bytes());
        filename_bytes.push(0x00);
    }
    total_bytes.extend_from_slice(Sha256Hash::compute(&filename_bytes).as_bytes());

    Ok(Sha256Hash::compute(&total_bytes))
}
