//! The package catalog: a TOML table of descriptors and the name-keyed
//! registry built from it.
//!
//! ```toml
//! [[package]]
//! name = "xerces-c"
//! url = "http://mirror.reverse.net/pub/apache//xerces/c/3/sources/xerces-c-3.1.2.tar.gz"
//! commands = ["sh ./configure --prefix=%(PREFIX)s", "make", "make install"]
//!
//! [package.settings]
//! PREFIX = "/usr/local"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{BootstrapError, Result};
use crate::package::{Package, PackageDescriptor};

/// The catalog compiled into the binary.
pub const BUNDLED_CATALOG: &str = include_str!("../data/catalog.toml");

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default, rename = "package")]
    packages: Vec<PackageDescriptor>,
}

pub fn parse_catalog(text: &str) -> Result<Vec<PackageDescriptor>> {
    let file: CatalogFile = toml::from_str(text)?;
    Ok(file.packages)
}

pub fn load_catalog(path: &Path) -> Result<Vec<PackageDescriptor>> {
    debug!("Loading catalog from {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| {
        BootstrapError::config(format!("cannot read catalog {}: {}", path.display(), e))
    })?;
    parse_catalog(&text)
}

/// Packages by name, in catalog order. Built once; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    packages: Vec<Package>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Fails on the first duplicate name.
    pub fn new<I: IntoIterator<Item = Package>>(packages: I) -> Result<Self> {
        let mut registry = Registry::default();
        for package in packages {
            if registry.index.contains_key(package.name()) {
                return Err(BootstrapError::config(format!(
                    "duplicate package name {:?} in catalog",
                    package.name()
                )));
            }
            registry
                .index
                .insert(package.name().to_string(), registry.packages.len());
            registry.packages.push(package);
        }
        Ok(registry)
    }

    pub fn from_descriptors<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = PackageDescriptor>,
    {
        let packages = descriptors
            .into_iter()
            .map(Package::from_descriptor)
            .collect::<Result<Vec<_>>>()?;
        Self::new(packages)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Self::from_descriptors(parse_catalog(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_descriptors(load_catalog(path)?)
    }

    pub fn bundled() -> Result<Self> {
        Self::from_toml(BUNDLED_CATALOG)
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.index.get(name).map(|&i| &self.packages[i])
    }

    /// [`Registry::get`], with a missing name as [`BootstrapError::UnknownPackage`].
    pub fn lookup(&self, name: &str) -> Result<&Package> {
        self.get(name)
            .ok_or_else(|| BootstrapError::UnknownPackage(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(Package::name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
