//! Upload staging and artifact publication on the local filesystem.
//!
//! Layout:
//!
//! ```text
//! <upload_dir>/<name>.XXXXXX             raw upload, removed once decoded
//! <static_dir>/<name>/<filename>        published original
//! <static_dir>/<name>/depth_map.png     published depth map
//! ```
//!
//! `<name>` is the upload's file stem. Same-named uploads share a directory and
//! the last writer wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Fixed filename of the published depth map.
pub const DEPTH_MAP_FILENAME: &str = "depth_map.png";

/// URL prefix the static directory is served under.
pub const STATIC_URL_PREFIX: &str = "/static";

/// Bytes escaped in a URL path segment: everything but RFC 3986 unreserved.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Validated upload filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    filename: String,
    stem: String,
}

impl UploadName {
    /// Validate a client-supplied filename.
    ///
    /// Only the final path component is kept, so `../../etc/passwd` becomes
    /// `passwd`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyFilename`] for an empty name and
    /// [`Error::InvalidFilename`] if nothing usable remains or the name would
    /// collide with the depth map output.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::EmptyFilename);
        }

        let invalid = |reason: &str| Error::InvalidFilename {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        // Browsers on Windows may send the full client path
        let filename = raw
            .rsplit(['/', '\\'])
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .ok_or_else(|| invalid("no file name component"))?;

        if filename.chars().any(char::is_control) {
            return Err(invalid("contains control characters"));
        }
        if filename == DEPTH_MAP_FILENAME {
            return Err(invalid("reserved for the generated depth map"));
        }

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(filename);

        // "...png" has the stem "..", which must not become a directory
        if stem == "." || stem == ".." {
            return Err(invalid("no usable name before the extension"));
        }

        Ok(Self {
            filename: filename.to_string(),
            stem: stem.to_string(),
        })
    }

    /// Sanitized filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Directory name the request's artifacts are published under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.stem
    }
}

/// Writable upload and static directories.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    static_dir: PathBuf,
}

impl Storage {
    /// Create both directories if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a directory cannot be created.
    pub fn bootstrap(upload_dir: impl Into<PathBuf>, static_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage = Self {
            upload_dir: upload_dir.into(),
            static_dir: static_dir.into(),
        };

        for dir in [&storage.upload_dir, &storage.static_dir] {
            fs::create_dir_all(dir).map_err(|source| Error::storage(dir, source))?;
        }

        tracing::debug!(
            upload_dir = %storage.upload_dir.display(),
            static_dir = %storage.static_dir.display(),
            "Storage ready"
        );
        Ok(storage)
    }

    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    #[must_use]
    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Write the raw upload where the decoder reads it from.
    ///
    /// Every call gets its own file, removed when the returned handle drops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be written.
    pub fn stage_upload(&self, name: &UploadName, bytes: &[u8]) -> Result<StagedUpload> {
        let file = write_temp(&self.upload_dir, &format!("{}.", name.namespace()), bytes)?;
        Ok(StagedUpload { file })
    }

    /// Publish the original upload and its depth map under the request's
    /// namespace.
    ///
    /// Both files are fully written before either is moved into place. If the
    /// depth map cannot be moved, the new original is withdrawn again so it
    /// never sits next to an older depth map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if either file cannot be written.
    pub fn publish(&self, name: &UploadName, original: &[u8], depth_png: &[u8]) -> Result<Published> {
        let dir = self.namespace_dir(name)?;
        let published = Published {
            original: dir.join(name.filename()),
            depth_map: dir.join(DEPTH_MAP_FILENAME),
        };

        let pending_original = write_temp(&dir, ".original.", original)?;
        let pending_depth_map = write_temp(&dir, ".depth_map.", depth_png)?;

        persist(pending_original, &published.original)?;
        if let Err(err) = persist(pending_depth_map, &published.depth_map) {
            let _ = fs::remove_file(&published.original);
            return Err(err);
        }

        Ok(published)
    }

    fn namespace_dir(&self, name: &UploadName) -> Result<PathBuf> {
        let dir = self.static_dir.join(name.namespace());
        fs::create_dir_all(&dir).map_err(|source| Error::storage(&dir, source))?;
        Ok(dir)
    }
}

/// Raw upload staged for decoding. The file is deleted on drop.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Locations of one request's published files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub original: PathBuf,
    pub depth_map: PathBuf,
}

/// Public URL of the published original.
#[must_use]
pub fn original_url(name: &UploadName) -> String {
    format!(
        "{STATIC_URL_PREFIX}/{}/{}",
        utf8_percent_encode(name.namespace(), PATH_SEGMENT),
        utf8_percent_encode(name.filename(), PATH_SEGMENT)
    )
}

/// Public URL of the published depth map.
#[must_use]
pub fn depth_map_url(name: &UploadName) -> String {
    format!(
        "{STATIC_URL_PREFIX}/{}/{DEPTH_MAP_FILENAME}",
        utf8_percent_encode(name.namespace(), PATH_SEGMENT)
    )
}

/// Write `bytes` to a fresh uniquely named file in `dir`.
///
/// Concurrent writers never share a temporary file.
fn write_temp(dir: &Path, prefix: &str, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| Error::storage(dir, source))?;
    if let Err(source) = file.write_all(bytes).and_then(|()| file.flush()) {
        return Err(Error::storage(file.path(), source));
    }
    Ok(file)
}

/// Rename a finished temporary file over `path`.
///
/// Readers see either the previous file or the complete new one. The
/// temporary file is removed if the rename fails.
fn persist(file: NamedTempFile, path: &Path) -> Result<()> {
    file.persist(path)
        .map(drop)
        .map_err(|err| Error::storage(path, err.error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_name() {
        let name = UploadName::parse("photo.jpg").unwrap();
        assert_eq!(name.filename(), "photo.jpg");
        assert_eq!(name.namespace(), "photo");
    }

    #[test]
    fn test_parse_strips_directories() {
        assert_eq!(
            UploadName::parse("../../etc/passwd").unwrap().filename(),
            "passwd"
        );
        assert_eq!(
            UploadName::parse(r"C:\Users\me\cat.png").unwrap().filename(),
            "cat.png"
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(UploadName::parse(""), Err(Error::EmptyFilename)));
    }

    #[test]
    fn test_parse_rejects_unusable_names() {
        for raw in ["..", "dir/", " ", "depth_map.png", "a\nb.png"] {
            assert!(
                matches!(UploadName::parse(raw), Err(Error::InvalidFilename { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_dotfile_namespace() {
        let name = UploadName::parse(".hidden").unwrap();
        assert_eq!(name.namespace(), ".hidden");
    }

    #[test]
    fn test_parse_rejects_dot_stems() {
        for raw in ["...png", "..png", "uploads/...jpg"] {
            assert!(
                matches!(UploadName::parse(raw), Err(Error::InvalidFilename { .. })),
                "{raw:?} should be rejected"
            );
        }
        assert_eq!(UploadName::parse("....png").unwrap().namespace(), "...");
    }

    #[test]
    fn test_urls() {
        let name = UploadName::parse("room.png").unwrap();
        assert_eq!(original_url(&name), "/static/room/room.png");
        assert_eq!(depth_map_url(&name), "/static/room/depth_map.png");
    }

    #[test]
    fn test_urls_escape_reserved_characters() {
        let name = UploadName::parse("my photo#1?.png").unwrap();
        assert_eq!(original_url(&name), "/static/my%20photo%231%3F/my%20photo%231%3F.png");
        assert_eq!(depth_map_url(&name), "/static/my%20photo%231%3F/depth_map.png");

        let name = UploadName::parse("100%.jpg").unwrap();
        assert_eq!(original_url(&name), "/static/100%25/100%25.jpg");
    }

    fn storage(dir: &Path) -> Storage {
        Storage::bootstrap(dir.join("uploads"), dir.join("static")).unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_publish_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let name = UploadName::parse("a.png").unwrap();

        storage.publish(&name, b"first", b"depth 1").unwrap();
        let published = storage.publish(&name, b"second", b"depth 2").unwrap();

        let namespace = dir.path().join("static").join("a");
        assert_eq!(published.original, namespace.join("a.png"));
        assert_eq!(published.depth_map, namespace.join("depth_map.png"));
        assert_eq!(fs::read(&published.original).unwrap(), b"second");
        assert_eq!(fs::read(&published.depth_map).unwrap(), b"depth 2");
        assert_eq!(entries(&namespace), ["a.png", "depth_map.png"]);
    }

    #[test]
    fn test_publish_stays_inside_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        for raw in ["....png", ".hidden", "../x.png"] {
            let name = UploadName::parse(raw).unwrap();
            let published = storage.publish(&name, b"orig", b"depth").unwrap();
            for path in [&published.original, &published.depth_map] {
                let parent = path.parent().unwrap().canonicalize().unwrap();
                assert!(
                    parent.starts_with(storage.static_dir().canonicalize().unwrap()),
                    "{raw:?} published to {}",
                    path.display()
                );
                assert_ne!(parent, storage.static_dir().canonicalize().unwrap());
            }
        }
        assert!(!dir.path().join("depth_map.png").exists());
    }

    #[test]
    fn test_publish_withdraws_original_when_depth_map_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let name = UploadName::parse("c.png").unwrap();

        // A directory in the depth map's place makes the final rename fail
        let namespace = dir.path().join("static").join("c");
        fs::create_dir_all(namespace.join(DEPTH_MAP_FILENAME).join("blocker")).unwrap();

        let err = storage.publish(&name, b"orig", b"depth").unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        assert!(!namespace.join("c.png").exists());
        assert_eq!(entries(&namespace), [DEPTH_MAP_FILENAME]);
    }

    #[test]
    fn test_concurrent_publish_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let name = UploadName::parse("same.png").unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let (storage, name) = (&storage, &name);
                    scope.spawn(move || {
                        for _ in 0..50 {
                            storage.publish(name, &[i; 64], &[i; 32]).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });

        let namespace = storage.static_dir().join("same");
        assert_eq!(entries(&namespace), ["depth_map.png", "same.png"]);
        let original = fs::read(namespace.join("same.png")).unwrap();
        assert_eq!(original.len(), 64);
        assert!(original.iter().all(|&b| b == original[0]));
    }

    #[test]
    fn test_stage_upload_is_private_and_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let name = UploadName::parse("b.jpg").unwrap();

        let first = storage.stage_upload(&name, b"raw 1").unwrap();
        let second = storage.stage_upload(&name, b"raw 2").unwrap();

        assert!(first.path().starts_with(storage.upload_dir()));
        assert_ne!(first.path(), second.path());
        assert_eq!(fs::read(first.path()).unwrap(), b"raw 1");
        assert_eq!(fs::read(second.path()).unwrap(), b"raw 2");
        assert!(!storage.static_dir().join("b").exists());

        drop(first);
        drop(second);
        assert!(entries(storage.upload_dir()).is_empty());
    }
}
