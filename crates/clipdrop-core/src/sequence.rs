// crates/clipdrop-core/src/sequence.rs
//
// Numbered asset names: `{n}.{ext}` where n is one past the largest numeric
// stem already in the folder. Not safe against two sessions writing to the
// same folder at once; only one paste session runs per invocation.

use std::fs;
use std::io;
use std::path::Path;

/// Next free sequence number for `dir`. A missing or empty folder yields 1.
/// Entries whose stem (text before the first '.') is not a number are ignored.
pub fn next_sequence(dir: &Path) -> io::Result<u64> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(e),
    };

    let mut max = 0u64;
    for entry in entries {
        let name = entry?.file_name();
        if let Some(n) = numeric_stem(&name.to_string_lossy()) {
            max = max.max(n);
        }
    }
    Ok(max.saturating_add(1))
}

fn numeric_stem(name: &str) -> Option<u64> {
    let stem = name.split('.').next().unwrap_or_default();
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_max_plus_one() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["3.png", "7.png", "x.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        assert_eq!(next_sequence(dir.path()).unwrap(), 8);
    }

    #[test]
    fn empty_and_missing_folders_start_at_one() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_sequence(dir.path()).unwrap(), 1);
        assert_eq!(next_sequence(&dir.path().join("nope")).unwrap(), 1);
    }

    #[test]
    fn gaps_are_not_filled() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("12.mp4"), b"").unwrap();
        fs::write(dir.path().join("2.png"), b"").unwrap();
        assert_eq!(next_sequence(dir.path()).unwrap(), 13);
    }

    #[test]
    fn stem_is_text_before_first_dot() {
        assert_eq!(numeric_stem("4.rm.png"), Some(4));
        assert_eq!(numeric_stem("4-rm.png"), None);
        assert_eq!(numeric_stem(".hidden"), None);
        assert_eq!(numeric_stem("-3.png"), None);
        assert_eq!(numeric_stem("10"), Some(10));
    }
}
