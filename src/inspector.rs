//! Signature classification of downloaded jar/aar archives.
//!
//! A jar is considered signed when its manifest carries at least one
//! per-entry section and the archive contains a signature file
//! (`META-INF/*.SF`). Anything that can't be parsed as a zip archive is
//! `Unreadable` — corrupt or truncated downloads must never crash the run.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const LOG_TARGET: &str = " inspector";

const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Outcome of inspecting one locally stored archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Manifest has per-entry sections and a `META-INF/*.SF` signature file exists.
    Signed,

    /// A valid archive without signature markers.
    Unsigned,

    /// The file could not be parsed as a zip archive.
    Unreadable,
}

/// Classify the archive at `local_path`.
#[must_use]
pub fn classify(local_path: &Path) -> Classification {
    let file = match File::open(local_path) {
        Ok(file) => file,
        Err(e) => {
            log::debug!(target: LOG_TARGET, "could not open '{}': {e}", local_path.display());
            return Classification::Unreadable;
        }
    };

    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            log::debug!(target: LOG_TARGET, "'{}' is not a readable archive: {e}", local_path.display());
            return Classification::Unreadable;
        }
    };

    let has_signature_file = archive
        .file_names()
        .any(|name| name.starts_with("META-INF/") && name.ends_with(".SF"));

    if has_signature_file && manifest_has_entries(&mut archive) {
        Classification::Signed
    } else {
        Classification::Unsigned
    }
}

/// Whether the archive's manifest exists and names at least one entry.
fn manifest_has_entries(archive: &mut ZipArchive<File>) -> bool {
    let Ok(mut manifest) = archive.by_name(MANIFEST_NAME) else {
        return false;
    };

    let mut text = String::new();
    if manifest.read_to_string(&mut text).is_err() {
        return false;
    }

    // Per-entry sections each open with a Name attribute at line start.
    text.lines().any(|line| line.starts_with("Name:"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    const ENTRY_MANIFEST: &str = "Manifest-Version: 1.0\r\n\r\nName: com/example/Widget.class\r\nSHA-256-Digest: 2jmj7l5rSw0yVb/vlWAYkK/YBwk=\r\n\r\n";
    const PLAIN_MANIFEST: &str = "Manifest-Version: 1.0\r\nCreated-By: test\r\n\r\n";

    fn build_jar(path: &Path, manifest: Option<&str>, extra_entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        if let Some(manifest) = manifest {
            writer.start_file(MANIFEST_NAME, options).unwrap();
            writer.write_all(manifest.as_bytes()).unwrap();
        }

        for (name, bytes) in extra_entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }

        writer.finish().unwrap();
    }

    #[test]
    fn signed_jar_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let jar = tmp.path().join("signed.jar");
        build_jar(
            &jar,
            Some(ENTRY_MANIFEST),
            &[
                ("META-INF/CERT.SF", b"Signature-Version: 1.0\r\n"),
                ("com/example/Widget.class", b"\xca\xfe\xba\xbe"),
            ],
        );

        assert_eq!(classify(&jar), Classification::Signed);
    }

    #[test]
    fn jar_without_signature_file_is_unsigned() {
        let tmp = tempfile::tempdir().unwrap();
        let jar = tmp.path().join("plain.jar");
        build_jar(&jar, Some(ENTRY_MANIFEST), &[("com/example/Widget.class", b"\xca\xfe\xba\xbe")]);

        assert_eq!(classify(&jar), Classification::Unsigned);
    }

    #[test]
    fn signature_file_without_manifest_entries_is_unsigned() {
        let tmp = tempfile::tempdir().unwrap();
        let jar = tmp.path().join("odd.jar");
        build_jar(&jar, Some(PLAIN_MANIFEST), &[("META-INF/CERT.SF", b"Signature-Version: 1.0\r\n")]);

        assert_eq!(classify(&jar), Classification::Unsigned);
    }

    #[test]
    fn jar_without_manifest_is_unsigned() {
        let tmp = tempfile::tempdir().unwrap();
        let jar = tmp.path().join("bare.jar");
        build_jar(&jar, None, &[("META-INF/CERT.SF", b""), ("data.bin", b"123")]);

        assert_eq!(classify(&jar), Classification::Unsigned);
    }

    #[test]
    fn corrupt_archive_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let jar = tmp.path().join("corrupt.jar");
        std::fs::write(&jar, b"this is not a zip archive").unwrap();

        assert_eq!(classify(&jar), Classification::Unreadable);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(classify(&tmp.path().join("nope.jar")), Classification::Unreadable);
    }
}
