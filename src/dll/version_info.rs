//! File-version extraction from Windows PE version resources.
//!
//! The version lives in a `VS_VERSION_INFO` resource: the UTF-16LE key string
//! followed (not necessarily adjacently) by a `VS_FIXEDFILEINFO` struct whose
//! signature is `0xFEEF04BD`. Scanning the raw bytes for those two markers is
//! sufficient for every DLL family this crate tracks, and sidesteps parsing
//! PE section tables.

use std::path::Path;

use tracing::debug;

/// VS_FIXEDFILEINFO.dwSignature, little-endian on disk.
const FIXED_FILE_INFO_SIGNATURE: [u8; 4] = [0xBD, 0x04, 0xEF, 0xFE];

/// Read `path` and extract its embedded file version, if any.
///
/// Returns `None` for files without a version resource, unreadable files, and
/// non-PE content; the caller treats all of these as "version unknown".
pub fn extract_file_version(path: &Path) -> Option<String> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            debug!("could not read {:?} for version info: {}", path, e);
            return None;
        }
    };
    extract_from_bytes(&data)
}

/// Scan a byte buffer for the version resource markers.
pub fn extract_from_bytes(data: &[u8]) -> Option<String> {
    let key = utf16le_bytes("VS_VERSION_INFO");
    let key_at = find(data, &key)?;

    let sig_at = key_at + find(&data[key_at..], &FIXED_FILE_INFO_SIGNATURE)?;

    // VS_FIXEDFILEINFO layout: signature (4), strucversion (4),
    // file-version MS (4), file-version LS (4).
    let version_at = sig_at + 8;
    if version_at + 8 > data.len() {
        return None;
    }

    let ms = u32::from_le_bytes(data[version_at..version_at + 4].try_into().ok()?);
    let ls = u32::from_le_bytes(data[version_at + 4..version_at + 8].try_into().ok()?);

    let major = (ms >> 16) as u16;
    let minor = (ms & 0xFFFF) as u16;
    let build = (ls >> 16) as u16;
    let revision = (ls & 0xFFFF) as u16;

    if major == 0 && minor == 0 {
        return None;
    }

    Some(format_version(major, minor, build, revision))
}

fn format_version(major: u16, minor: u16, build: u16, revision: u16) -> String {
    if revision == 0 {
        if build == 0 {
            format!("{major}.{minor}")
        } else {
            format!("{major}.{minor}.{build}")
        }
    } else {
        format!("{major}.{minor}.{build}.{revision}")
    }
}

fn utf16le_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::utf16le_bytes;

    /// Build a blob shaped like a PE version resource, for fixture DLLs.
    pub fn version_resource(major: u16, minor: u16, build: u16, revision: u16) -> Vec<u8> {
        let mut data = vec![0u8; 64];
        data.extend_from_slice(&utf16le_bytes("VS_VERSION_INFO"));
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&super::FIXED_FILE_INFO_SIGNATURE);
        data.extend_from_slice(&0x0001_0000u32.to_le_bytes()); // dwStrucVersion
        let ms = ((major as u32) << 16) | minor as u32;
        let ls = ((build as u32) << 16) | revision as u32;
        data.extend_from_slice(&ms.to_le_bytes());
        data.extend_from_slice(&ls.to_le_bytes());
        data.extend_from_slice(&[0u8; 32]);
        data
    }
}
