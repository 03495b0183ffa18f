//! ZIP extraction.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::trace;
use zip::ZipArchive;

use crate::domain::error::{BuildError, Result};

/// Extract `archive` into `target`, keeping only entries whose name starts
/// with `prefix` when one is given. Returns the number of files written.
///
/// Entries whose names would escape `target` are rejected.
pub fn extract_zip(archive: &Path, target: &Path, prefix: Option<&str>) -> Result<usize> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;
    fs::create_dir_all(target)?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();

        if let Some(prefix) = prefix {
            if !name.starts_with(prefix) {
                continue;
            }
        }

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| BuildError::Archive(format!("unsafe entry name: {name}")))?
            .to_path_buf();
        let out_path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
        trace!(path = %out_path.display(), "Extracted");
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn make_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_all() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        make_zip(
            &archive,
            &[("apache-maven/", ""), ("apache-maven/bin/mvn", "#!/bin/sh\n")],
        );

        let out = dir.path().join("out");
        assert_eq!(extract_zip(&archive, &out, None).unwrap(), 1);
        assert_eq!(
            fs::read_to_string(out.join("apache-maven/bin/mvn")).unwrap(),
            "#!/bin/sh\n"
        );
    }

    #[test]
    fn test_extract_with_prefix_filter() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("server.jar");
        make_zip(
            &archive,
            &[
                ("net/minecraft/server/Foo.class", "foo"),
                ("com/google/gson/Gson.class", "gson"),
                ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ],
        );

        let out = dir.path().join("classes");
        let written = extract_zip(&archive, &out, Some("net/minecraft/server")).unwrap();
        assert_eq!(written, 1);
        assert!(out.join("net/minecraft/server/Foo.class").exists());
        assert!(!out.join("com").exists());
        assert!(!out.join("META-INF").exists());
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();
        let err = extract_zip(&archive, &dir.path().join("out"), None).unwrap_err();
        assert!(matches!(err, BuildError::Archive(_)));
    }
}
