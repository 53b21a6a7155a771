use crate::error::UnpackError;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{info, warn};

const ARCHIVE_SUFFIX: &str = ".tar.gz";

#[derive(Debug)]
pub enum UnpackOutcome {
    Extracted { archive: PathBuf, scene_dir: PathBuf },
    Skipped { archive: PathBuf, reason: String },
}

impl UnpackOutcome {
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }
}

/// Unpack every `*.tar.gz` in `source` into `target/{tile}/{scene}`.
///
/// Each archive is handled on its own: a failure is reported as
/// `UnpackOutcome::Skipped` and the archive is left in place. Archives are
/// deleted only once their metadata file is found in the scene directory.
pub fn unpack_scenes(source: &Path, target: &Path) -> Result<Vec<UnpackOutcome>> {
    let archives = list_archives(source)?;
    info!("Found {} archive(s) in {}", archives.len(), source.display());

    let mut outcomes = vec![];
    for archive in archives {
        let outcome = match unpack_archive(&archive, target) {
            Ok(scene_dir) => {
                info!("Scene {} complete", scene_dir.display());
                UnpackOutcome::Extracted { archive, scene_dir }
            }
            Err(e) => {
                warn!("Skipping {}: {e}", archive.display());
                UnpackOutcome::Skipped {
                    archive,
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn list_archives(source: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = fs::read_dir(source)
        .with_context(|| format!("Unable to read source folder {}", source.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(ARCHIVE_SUFFIX))
        })
        .collect::<Vec<_>>();
    archives.sort();
    Ok(archives)
}

fn open(archive: &Path) -> Result<Archive<GzDecoder<File>>, UnpackError> {
    let file = File::open(archive).map_err(UnpackError::Read)?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Path of the first member ending in `xml`.
fn metadata_member(archive: &Path) -> Result<PathBuf, UnpackError> {
    let mut tar = open(archive)?;
    for entry in tar.entries().map_err(UnpackError::Read)? {
        let entry = entry.map_err(UnpackError::Read)?;
        let path = entry.path().map_err(UnpackError::Read)?;
        if path.to_string_lossy().ends_with("xml") {
            return Ok(path.into_owned());
        }
    }
    Err(UnpackError::NoMetadata)
}

/// Tile key and scene name from a metadata file name such as
/// `LC08_L1TP_091084_20170101_20170218_01_T1.xml`.
fn scene_location(metadata: &Path) -> Result<(String, String), UnpackError> {
    let name = metadata
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let tile = name
        .get(10..16)
        .ok_or_else(|| UnpackError::BadMetadataName(name.to_string()))?;
    let scene = name.split('.').next().unwrap_or_default();
    Ok((tile.to_string(), scene.to_string()))
}

fn unpack_archive(archive: &Path, target: &Path) -> Result<PathBuf, UnpackError> {
    let metadata = metadata_member(archive)?;
    let (tile, scene) = scene_location(&metadata)?;

    let scene_dir = target.join(tile).join(scene);
    if scene_dir.exists() {
        return Err(UnpackError::SceneExists(scene_dir.display().to_string()));
    }
    fs::create_dir_all(&scene_dir).map_err(UnpackError::CreateDir)?;

    let extracted = open(archive).and_then(|mut tar| tar.unpack(&scene_dir).map_err(UnpackError::Extract));
    let verified = extracted.and_then(|_| {
        let expected = scene_dir.join(&metadata);
        if expected.is_file() {
            Ok(())
        } else {
            Err(UnpackError::Unverified(expected.display().to_string()))
        }
    });
    if let Err(e) = verified {
        // Leave no half-filled scene behind so the archive can be retried
        if let Err(cleanup) = fs::remove_dir_all(&scene_dir) {
            warn!(
                "Could not remove {} after failed extraction, later runs will skip it: {cleanup}",
                scene_dir.display()
            );
        }
        return Err(e);
    }

    if let Err(e) = fs::remove_file(archive) {
        warn!("Extracted {} but could not delete it: {e}", archive.display());
    }
    Ok(scene_dir)
}
