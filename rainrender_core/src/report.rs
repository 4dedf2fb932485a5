use std::fs;
use std::io;
use std::path::Path;

/// A file found in the output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputEntry {
    pub name: String,
    pub size: u64,
}

/// List the regular files in `dir`, sorted by name.
pub fn list_outputs(dir: &Path) -> io::Result<Vec<OutputEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        entries.push(OutputEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_files_sorted_with_sizes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rain_room.mp3"), b"room").unwrap();
        fs::write(dir.path().join("rain_clean.mp3"), b"clean!").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let entries = list_outputs(dir.path()).unwrap();
        assert_eq!(
            entries,
            [
                OutputEntry {
                    name: String::from("rain_clean.mp3"),
                    size: 6
                },
                OutputEntry {
                    name: String::from("rain_room.mp3"),
                    size: 4
                },
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_outputs(&dir.path().join("absent")).is_err());
    }
}
