//! Turns source paths into analysis units.
//!
//! A source is either a directory (walked recursively, archives inside it are
//! opened too), an archive container, or a single class file. Containers are
//! classified by suffix first and by their leading magic bytes otherwise.
//!
//! Zip-family containers are memory-mapped and read through the central
//! directory. Tar-family suffixes are recognized but rejected with
//! `ReadError::UnsupportedFormat`.

use ignore::WalkBuilder;
use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Component, Path};
use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::ReadError;
use crate::unit::{CLASS_MAGIC, CLASS_SUFFIX, Provenance, Unit, entry_name_to_logical_name};

const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// Largest archive member accepted as a unit, declared or actual.
pub const MAX_UNIT_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Jar,
    Zip,
    Tar,
    TarGz,
    TarBz2,
}

impl ContainerKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".jar") {
            Some(Self::Jar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// The capability still missing for this container, if it cannot be read.
    pub fn missing_capability(self) -> Option<&'static str> {
        match self {
            Self::Jar | Self::Zip => None,
            Self::Tar => Some("tar decompression"),
            Self::TarGz => Some("gzip/tar decompression"),
            Self::TarBz2 => Some("bzip2/tar decompression"),
        }
    }
}

pub fn is_archive(path: &Path) -> bool {
    ContainerKind::from_path(path).is_some()
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSource {
    pub path: String,
    pub reason: String,
}

/// Units read from one or more sources plus everything that had to be skipped.
#[derive(Debug, Default)]
pub struct ReadReport {
    pub units: Vec<Unit>,
    pub skipped: Vec<SkippedSource>,
}

impl ReadReport {
    fn skip(&mut self, path: impl Into<String>, reason: impl ToString) {
        let path = path.into();
        let reason = reason.to_string();
        warn!(path = %path, reason = %reason, "skipping unreadable source");
        self.skipped.push(SkippedSource { path, reason });
    }

    fn extend(&mut self, other: ReadReport) {
        self.units.extend(other.units);
        self.skipped.extend(other.skipped);
    }
}

/// Reads one source. Directories never fail as a whole once they exist; a
/// bad member is recorded in `skipped` instead.
pub fn read_path(path: &Path) -> Result<ReadReport, ReadError> {
    if !path.exists() {
        return Err(ReadError::NotFound(path.to_path_buf()));
    }

    if path.is_dir() {
        return Ok(read_directory(path));
    }

    if let Some(kind) = ContainerKind::from_path(path) {
        return read_archive(path, kind);
    }

    if has_class_suffix(path) {
        let unit = read_class_file(path, single_file_logical_name(path), Provenance::File)?;
        return Ok(ReadReport {
            units: vec![unit],
            skipped: Vec::new(),
        });
    }

    match probe_magic(path)? {
        Some(m) if m == ZIP_MAGIC => read_archive(path, ContainerKind::Zip),
        Some(m) if m == CLASS_MAGIC => {
            let unit = read_class_file(path, single_file_logical_name(path), Provenance::File)?;
            Ok(ReadReport {
                units: vec![unit],
                skipped: Vec::new(),
            })
        }
        _ => Err(ReadError::Unrecognized(path.to_path_buf())),
    }
}

/// Reads several sources. A failing source is recorded and the remaining
/// ones are still read.
pub fn read_paths<P: AsRef<Path>>(paths: &[P]) -> ReadReport {
    let mut report = ReadReport::default();
    for path in paths {
        let path = path.as_ref();
        match read_path(path) {
            Ok(read) => report.extend(read),
            Err(e) => report.skip(path.display().to_string(), e),
        }
    }
    report
}

pub fn read_archive(archive_path: &Path, kind: ContainerKind) -> Result<ReadReport, ReadError> {
    if let Some(capability) = kind.missing_capability() {
        return Err(ReadError::UnsupportedFormat {
            path: archive_path.to_path_buf(),
            capability: capability.to_string(),
        });
    }

    let file = File::open(archive_path).map_err(|e| ReadError::io(archive_path, e))?;
    // SAFETY: The file is opened read-only and outlives the mapping, which is
    // dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ReadError::io(archive_path, e))?;
    let mut archive =
        ZipArchive::new(Cursor::new(&mmap[..])).map_err(|source| ReadError::Archive {
            path: archive_path.to_path_buf(),
            source,
        })?;

    let archive_key = archive_path.display().to_string();
    let mut report = ReadReport::default();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(ZipError::UnsupportedArchive(what)) => {
                return Err(ReadError::UnsupportedFormat {
                    path: archive_path.to_path_buf(),
                    capability: format!("entry decompression ({})", what.to_ascii_lowercase()),
                });
            }
            Err(e) => {
                report.skip(format!("{archive_key}!/#{i}"), e);
                continue;
            }
        };
        if entry.is_dir() || !entry.name().ends_with(CLASS_SUFFIX) {
            continue;
        }

        let entry_name = entry.name().to_string();
        let declared = entry.size();
        if declared > MAX_UNIT_BYTES {
            report.skip(
                format!("{archive_key}!/{entry_name}"),
                format!("entry declares {declared} bytes, limit is {MAX_UNIT_BYTES}"),
            );
            continue;
        }
        let mut content = Vec::new();
        if let Err(e) = (&mut entry).take(MAX_UNIT_BYTES + 1).read_to_end(&mut content) {
            report.skip(format!("{archive_key}!/{entry_name}"), e);
            continue;
        }
        if content.len() as u64 > MAX_UNIT_BYTES {
            report.skip(
                format!("{archive_key}!/{entry_name}"),
                format!("entry exceeds {MAX_UNIT_BYTES} bytes"),
            );
            continue;
        }
        report.units.push(Unit::new(
            entry_name_to_logical_name(&entry_name),
            content,
            Provenance::ArchiveMember,
            format!("{archive_key}!/{entry_name}"),
        ));
    }

    debug!(archive = %archive_key, units = report.units.len(), "archive read");
    Ok(report)
}

pub fn read_directory(root: &Path) -> ReadReport {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut report = ReadReport::default();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.skip(root.display().to_string(), e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        if let Some(kind) = ContainerKind::from_path(path) {
            match read_archive(path, kind) {
                Ok(read) => report.extend(read),
                Err(e) => report.skip(path.display().to_string(), e),
            }
        } else if has_class_suffix(path) {
            let relative = path.strip_prefix(root).unwrap_or(path);
            let name = entry_name_to_logical_name(&relative.to_string_lossy());
            match read_class_file(path, name, Provenance::DirectoryMember) {
                Ok(unit) => report.units.push(unit),
                Err(e) => report.skip(path.display().to_string(), e),
            }
        }
    }

    debug!(
        root = %root.display(),
        units = report.units.len(),
        skipped = report.skipped.len(),
        "directory read"
    );
    report
}

fn read_class_file(
    path: &Path,
    logical_name: String,
    provenance: Provenance,
) -> Result<Unit, ReadError> {
    let content = std::fs::read(path).map_err(|e| ReadError::io(path, e))?;
    Ok(Unit::new(
        logical_name,
        content,
        provenance,
        path.display().to_string(),
    ))
}

fn has_class_suffix(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "class")
}

fn probe_magic(path: &Path) -> Result<Option<[u8; 4]>, ReadError> {
    let mut file = File::open(path).map_err(|e| ReadError::io(path, e))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(Some(magic)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(ReadError::io(path, e)),
    }
}

/// A loose class file keeps the package path found below a `classes` or
/// `build` directory; otherwise only its file stem is known.
pub fn single_file_logical_name(path: &Path) -> String {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    let start = components
        .iter()
        .rposition(|c| *c == "classes" || *c == "build")
        .map(|i| i + 1);

    match start {
        Some(i) if i < components.len() => {
            entry_name_to_logical_name(&components[i..].join("/"))
        }
        _ => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}
