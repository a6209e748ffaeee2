//! On-disk face sample store.
//!
//! Layout: one directory per identity under the store root, holding that
//! identity's samples as 8-bit grayscale PNGs named `{identity}_{index}.png`.
//! The index is a dense write-order sequence used only for naming.

use image::GrayImage;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::identity::Identity;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid identity name {name:?}: {reason}")]
    InvalidIdentity { name: String, reason: &'static str },
    #[error("no samples stored for identity {0:?}")]
    UnknownIdentity(String),
    #[error("sample image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("sample store I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Face sample store rooted at a single directory.
///
/// The store does not validate image content; any grayscale buffer is
/// accepted. Dimension policy is the enrollment caller's job.
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    /// Open (and create if needed) a sample store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append one sample under the identity's namespace, auto-assigning the
    /// next sequence index. Returns the assigned index.
    ///
    /// Creates the identity's directory on first write.
    pub fn add_sample(&self, identity: &Identity, image: &GrayImage) -> Result<u32, StoreError> {
        let dir = self.identity_dir(identity);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let index = self.next_index(identity)?;
        let path = dir.join(format!("{identity}_{index}.png"));
        image.save(&path).map_err(|e| StoreError::Image {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(identity = %identity, index, path = %path.display(), "sample stored");
        Ok(index)
    }

    /// All identities with a sample directory, sorted by name.
    ///
    /// The sorted order is what makes label assignment repeatable for an
    /// unchanged store. Entries that are not valid identity names are
    /// skipped with a warning rather than failing the enumeration.
    pub fn list_identities(&self) -> Result<Vec<Identity>, StoreError> {
        let mut identities = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let file_type = entry.file_type().map_err(|e| StoreError::io(entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match Identity::new(name.to_string_lossy()) {
                Ok(identity) => identities.push(identity),
                Err(_) => {
                    tracing::warn!(entry = %entry.path().display(), "skipping foreign directory in sample store");
                }
            }
        }

        identities.sort();
        Ok(identities)
    }

    /// Lazy, restartable sequence of the identity's stored samples in index
    /// order. Each image is decoded on demand; decode failures surface
    /// per item.
    pub fn samples_of(&self, identity: &Identity) -> Result<SampleIter, StoreError> {
        Ok(SampleIter {
            paths: self.sample_paths(identity)?.into_iter(),
        })
    }

    /// Number of samples stored for the identity (0 if never enrolled).
    pub fn sample_count(&self, identity: &Identity) -> Result<usize, StoreError> {
        if !self.identity_dir(identity).is_dir() {
            return Ok(0);
        }
        Ok(self.sample_paths(identity)?.len())
    }

    /// Delete an identity's whole sample set. Returns false if the identity
    /// had no samples to begin with.
    pub fn remove_identity(&self, identity: &Identity) -> Result<bool, StoreError> {
        let dir = self.identity_dir(identity);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tracing::info!(identity = %identity, "removed sample set");
        Ok(true)
    }

    fn identity_dir(&self, identity: &Identity) -> PathBuf {
        self.root.join(identity.as_str())
    }

    /// Sample file paths for the identity, sorted by sequence index.
    fn sample_paths(&self, identity: &Identity) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.identity_dir(identity);
        if !dir.is_dir() {
            return Err(StoreError::UnknownIdentity(identity.as_str().to_string()));
        }

        let mut indexed = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            if let Some(index) = parse_sample_index(&path) {
                indexed.push((index, path));
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, path)| path).collect())
    }

    fn next_index(&self, identity: &Identity) -> Result<u32, StoreError> {
        let dir = self.identity_dir(identity);
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut max: Option<u32> = None;
        let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            if let Some(index) = parse_sample_index(&entry.path()) {
                max = Some(max.map_or(index, |m| m.max(index)));
            }
        }
        Ok(max.map_or(0, |m| m + 1))
    }
}

/// Extract the sequence index from a `{identity}_{index}.png` path.
///
/// Identity names may themselves contain underscores, so the index is
/// whatever follows the last one.
fn parse_sample_index(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (_, index) = stem.rsplit_once('_')?;
    index.parse().ok()
}

/// Lazy iterator over an identity's stored samples.
pub struct SampleIter {
    paths: std::vec::IntoIter<PathBuf>,
}

impl SampleIter {
    /// Number of samples remaining.
    pub fn len(&self) -> usize {
        self.paths.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for SampleIter {
    type Item = Result<GrayImage, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        let result = image::open(&path)
            .map(|img| img.into_luma8())
            .map_err(|e| StoreError::Image {
                path: path.clone(),
                source: e,
            });
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn flat_image(width: u32, height: u32, level: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, image::Luma([level]))
    }

    #[test]
    fn add_sample_assigns_dense_indices() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let alice = Identity::new("alice").unwrap();

        for expected in 0..3 {
            let index = store.add_sample(&alice, &flat_image(10, 10, 128)).unwrap();
            assert_eq!(index, expected);
        }

        assert_eq!(store.sample_count(&alice).unwrap(), 3);
        assert!(dir.path().join("alice/alice_2.png").is_file());
    }

    #[test]
    fn index_continues_after_reopen() {
        let dir = TempDir::new().unwrap();
        let alice = Identity::new("alice").unwrap();
        {
            let store = SampleStore::open(dir.path()).unwrap();
            store.add_sample(&alice, &flat_image(10, 10, 10)).unwrap();
            store.add_sample(&alice, &flat_image(10, 10, 20)).unwrap();
        }
        let store = SampleStore::open(dir.path()).unwrap();
        assert_eq!(store.add_sample(&alice, &flat_image(10, 10, 30)).unwrap(), 2);
    }

    #[test]
    fn identities_listed_sorted() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        for name in ["carol", "alice", "bob"] {
            let id = Identity::new(name).unwrap();
            store.add_sample(&id, &flat_image(8, 8, 0)).unwrap();
        }

        let names: Vec<_> = store
            .list_identities()
            .unwrap()
            .into_iter()
            .map(|i| i.as_str().to_string())
            .collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn samples_iterate_in_index_order() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let bob = Identity::new("bob").unwrap();
        for level in [11u8, 22, 33] {
            store.add_sample(&bob, &flat_image(6, 6, level)).unwrap();
        }

        let iter = store.samples_of(&bob).unwrap();
        assert_eq!(iter.len(), 3);
        let levels: Vec<u8> = iter
            .map(|img| img.unwrap().get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(levels, [11, 22, 33]);

        // Restartable: a fresh call walks the same sequence again.
        let again: Vec<u8> = store
            .samples_of(&bob)
            .unwrap()
            .map(|img| img.unwrap().get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(again, levels);
    }

    #[test]
    fn underscored_identity_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let id = Identity::new("mary_jane").unwrap();
        store.add_sample(&id, &flat_image(5, 5, 7)).unwrap();
        store.add_sample(&id, &flat_image(5, 5, 9)).unwrap();

        assert_eq!(store.sample_count(&id).unwrap(), 2);
        assert!(dir.path().join("mary_jane/mary_jane_1.png").is_file());
    }

    #[test]
    fn samples_of_unknown_identity_errors() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let ghost = Identity::new("ghost").unwrap();
        assert!(matches!(
            store.samples_of(&ghost),
            Err(StoreError::UnknownIdentity(_))
        ));
        assert_eq!(store.sample_count(&ghost).unwrap(), 0);
    }

    #[test]
    fn remove_identity_deletes_sample_set() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let alice = Identity::new("alice").unwrap();
        store.add_sample(&alice, &flat_image(4, 4, 1)).unwrap();

        assert!(store.remove_identity(&alice).unwrap());
        assert!(!store.remove_identity(&alice).unwrap());
        assert!(store.list_identities().unwrap().is_empty());
    }

    #[test]
    fn foreign_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let alice = Identity::new("alice").unwrap();
        store.add_sample(&alice, &flat_image(4, 4, 1)).unwrap();
        fs::create_dir(dir.path().join(".stale")).unwrap();

        let names: Vec<_> = store.list_identities().unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].as_str(), "alice");
    }
}
