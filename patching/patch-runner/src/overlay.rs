//! In-tree patching engine working on whole archive entries
//!
//! Code units are the top-level `classes*.dex` entries. Everything else is a
//! resource. Edits are kept in memory and only written out by `save`; each
//! patch runs against a snapshot so a failure rolls back its edits.

use crate::EngineError;
use crate::engine::{EngineFactory, EngineOutput, PatchingEngine};
use apk_zip::{CodeUnit, ZipArchive, ZipWriter};
use patch_bundle::{LoadedPatch, OptionValues, PatchContext, PatchError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Magic of a bare dex file
const DEX_MAGIC: &[u8; 4] = b"dex\n";

/// Whether an entry name is a code unit
pub fn is_code_unit(name: &str) -> bool {
    !name.contains('/') && name.starts_with("classes") && name.ends_with(".dex")
}

/// Creates [`OverlayEngine`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayEngineFactory;

impl EngineFactory for OverlayEngineFactory {
    fn create(
        &self,
        base: &Path,
        cache_dir: &Path,
    ) -> Result<Box<dyn PatchingEngine>, EngineError> {
        Ok(Box::new(OverlayEngine::open(base, cache_dir)?))
    }
}

#[derive(Debug, Clone, Default)]
struct Overlay {
    code_units: Vec<CodeUnit>,
    // `None` marks a removed resource
    edits: BTreeMap<String, Option<Vec<u8>>>,
}

/// Engine that records edits over a base archive
#[derive(Debug)]
pub struct OverlayEngine {
    base_path: PathBuf,
    base: RefCell<ZipArchive<BufReader<File>>>,
    base_resources: Vec<String>,
    cache_dir: PathBuf,
    overlay: Overlay,
}

impl OverlayEngine {
    /// Open `base`, reading its code units into memory
    pub fn open(base: &Path, cache_dir: &Path) -> Result<Self, EngineError> {
        let mut archive = ZipArchive::open(base)?;
        let mut code_units = Vec::new();
        let mut base_resources = Vec::new();

        for entry in archive.entries().to_vec() {
            if entry.is_dir() {
                continue;
            }
            if is_code_unit(&entry.name) {
                let data = archive.read_entry(&entry)?;
                code_units.push(CodeUnit::new(entry.name.clone(), data));
            } else {
                base_resources.push(entry.name.clone());
            }
        }
        log::debug!(
            "Opened {}: {} code units, {} resources",
            base.display(),
            code_units.len(),
            base_resources.len()
        );

        Ok(Self {
            base_path: base.to_path_buf(),
            base: RefCell::new(archive),
            base_resources,
            cache_dir: cache_dir.to_path_buf(),
            overlay: Overlay {
                code_units,
                edits: BTreeMap::new(),
            },
        })
    }

    /// First `classesN.dex` name not in use
    fn next_code_unit_name(&self) -> String {
        let taken = |name: &str| self.overlay.code_units.iter().any(|u| u.name == name);
        if !taken("classes.dex") {
            return "classes.dex".to_string();
        }
        (2..)
            .map(|n| format!("classes{}.dex", n))
            .find(|name| !taken(name))
            .unwrap_or_default()
    }

    fn add_code_unit(&mut self, data: Vec<u8>) -> String {
        let name = self.next_code_unit_name();
        self.overlay.code_units.push(CodeUnit::new(name.clone(), data));
        name
    }

    fn write_resource_archive(&self) -> Result<PathBuf, EngineError> {
        let extension = self
            .base_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("apk");
        let path = self.cache_dir.join(format!("resources.{}", extension));
        fs::create_dir_all(&self.cache_dir)?;

        let mut base = self.base.borrow_mut();
        let mut writer = ZipWriter::new(BufWriter::new(File::create(&path)?));

        for entry in base.entries().to_vec() {
            match self.overlay.edits.get(&entry.name) {
                Some(Some(data)) => writer.add_deflated(&entry.name, data)?,
                Some(None) => log::trace!("Dropping removed resource {}", entry.name),
                None => writer.copy_raw(&mut *base, &entry, None)?,
            }
        }
        for (name, data) in &self.overlay.edits {
            if let Some(data) = data {
                if base.entry(name).is_none() {
                    writer.add_deflated(name, data)?;
                }
            }
        }

        let comment = base.comment().to_vec();
        writer.finish(&comment)?.flush()?;
        log::debug!(
            "Wrote {} resource edits to {}",
            self.overlay.edits.len(),
            path.display()
        );
        Ok(path)
    }
}

impl PatchingEngine for OverlayEngine {
    fn merge_integrations(&mut self, archive: &Path) -> Result<usize, EngineError> {
        let bytes = fs::read(archive)?;
        if bytes.starts_with(DEX_MAGIC) {
            let name = self.add_code_unit(bytes);
            log::debug!("Merged {} as {}", archive.display(), name);
            return Ok(1);
        }

        let mut integrations = ZipArchive::open(archive)?;
        let mut merged = 0;
        for entry in integrations.entries().to_vec() {
            if !is_code_unit(&entry.name) {
                continue;
            }
            let data = integrations.read_entry(&entry)?;
            let name = self.add_code_unit(data);
            log::debug!("Merged {}:{} as {}", archive.display(), entry.name, name);
            merged += 1;
        }
        if merged == 0 {
            return Err(EngineError::other(format!(
                "{} contains no code units",
                archive.display()
            )));
        }
        Ok(merged)
    }

    fn apply(&mut self, patch: &LoadedPatch, options: &OptionValues) -> Result<(), PatchError> {
        let snapshot = self.overlay.clone();
        let implementation = patch.implementation.clone();
        match implementation.apply(self, options) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("Rolling back edits of {}", patch.descriptor.id);
                self.overlay = snapshot;
                Err(e)
            }
        }
    }

    fn save(self: Box<Self>) -> Result<EngineOutput, EngineError> {
        let resource_archive = if self.overlay.edits.is_empty() {
            self.base_path.clone()
        } else {
            self.write_resource_archive()?
        };
        Ok(EngineOutput {
            code_units: self.overlay.code_units,
            resource_archive,
        })
    }
}

impl PatchContext for OverlayEngine {
    fn code_unit_names(&self) -> Vec<String> {
        self.overlay
            .code_units
            .iter()
            .map(|u| u.name.clone())
            .collect()
    }

    fn code_unit(&self, name: &str) -> Option<&[u8]> {
        self.overlay
            .code_units
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.data.as_slice())
    }

    fn put_code_unit(&mut self, name: &str, data: Vec<u8>) {
        match self.overlay.code_units.iter_mut().find(|u| u.name == name) {
            Some(unit) => unit.data = data,
            None => self.overlay.code_units.push(CodeUnit::new(name, data)),
        }
    }

    fn resource_names(&self) -> Vec<String> {
        let edits = &self.overlay.edits;
        let mut names: Vec<String> = self
            .base_resources
            .iter()
            .filter(|name| !matches!(edits.get(*name), Some(None)))
            .cloned()
            .collect();
        for (name, data) in edits {
            if data.is_some() && !self.base_resources.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn resource(&self, name: &str) -> Result<Option<Vec<u8>>, PatchError> {
        if let Some(edit) = self.overlay.edits.get(name) {
            return Ok(edit.clone());
        }
        if !self.base_resources.iter().any(|r| r == name) {
            return Ok(None);
        }
        self.base
            .borrow_mut()
            .read_by_name(name)
            .map(Some)
            .map_err(|e| PatchError::Engine(format!("cannot read {}: {}", name, e)))
    }

    fn put_resource(&mut self, name: &str, data: Vec<u8>) {
        self.overlay.edits.insert(name.to_string(), Some(data));
    }

    fn remove_resource(&mut self, name: &str) -> bool {
        let existed = match self.overlay.edits.get(name) {
            Some(edit) => edit.is_some(),
            None => self.base_resources.iter().any(|r| r == name),
        };
        if existed {
            self.overlay.edits.insert(name.to_string(), None);
        }
        existed
    }
}
