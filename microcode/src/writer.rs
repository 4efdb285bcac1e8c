use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use clap::ValueEnum;

use crate::{ds::RomPlane, error::RomError};

/// Data bytes per Intel HEX record
const RECORD_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Intel HEX records, as read by EEPROM programmers
    Ihex,
    /// One hex byte per line
    Hex,
    /// Raw bytes
    Binary,
}

impl OutputFormat {
    pub(crate) const fn extension(self) -> &'static str {
        match self {
            OutputFormat::Ihex | OutputFormat::Hex => "hex",
            OutputFormat::Binary => "bin",
        }
    }
}

/// File name of ROM chip `index`: `{prefix}{index}.{ext}`
pub(crate) fn output_path(prefix: &str, index: usize, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("{}{}.{}", prefix, index, format.extension()))
}

/// Serializes one ROM plane in the requested format.
pub(crate) fn render(plane: &RomPlane, format: OutputFormat) -> Result<Vec<u8>, RomError> {
    match format {
        OutputFormat::Ihex => {
            let mut records: Vec<ihex::Record> = plane
                .bytes
                .chunks(RECORD_LEN)
                .enumerate()
                .map(|(i, chunk)| ihex::Record::Data {
                    offset: (i * RECORD_LEN) as u16,
                    value: chunk.to_vec(),
                })
                .collect();
            records.push(ihex::Record::EndOfFile);
            let mut text = ihex::create_object_file_representation(&records).map_err(|e| {
                RomError::Serialize {
                    plane: plane.index,
                    message: format!("{:?}", e),
                }
            })?;
            if !text.ends_with('\n') {
                text.push('\n');
            }
            Ok(text.into_bytes())
        }
        OutputFormat::Hex => Ok(plane
            .bytes
            .iter()
            .flat_map(|byte| format!("{:02X}\n", byte).into_bytes())
            .collect()),
        OutputFormat::Binary => Ok(plane.bytes.to_vec()),
    }
}

/// Writes one file per ROM plane, all or nothing.
///
/// Every image is rendered before the first file is touched. The images are
/// staged next to their destination and only renamed into place once all of
/// them were written. If a rename fails, the planes already moved are taken
/// back out and any files they replaced are restored.
pub(crate) fn write_planes(
    planes: &[RomPlane],
    prefix: &str,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, RomError> {
    let images = planes
        .iter()
        .map(|plane| -> Result<_, RomError> {
            Ok((output_path(prefix, plane.index, format), render(plane, format)?))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some((path, _)) = images.iter().find(|(path, _)| path.is_dir()) {
        return Err(RomError::NotAFile { path: path.clone() });
    }

    let staged = stage(&images)?;
    let paths: Vec<PathBuf> = images.into_iter().map(|(path, _)| path).collect();
    commit(&staged, &paths)?;
    Ok(paths)
}

/// Writes every image to a `.tmp` sibling of its destination.
fn stage(images: &[(PathBuf, Vec<u8>)]) -> Result<Vec<PathBuf>, RomError> {
    let mut staged = Vec::with_capacity(images.len());
    for (path, image) in images {
        let staging = sibling(path, "tmp");
        if let Err(source) = fs::write(&staging, image) {
            discard(&staged);
            return Err(RomError::Io {
                path: staging,
                source,
            });
        }
        staged.push(staging);
    }
    Ok(staged)
}

/// A destination renamed into place, with the backup of the file it replaced
struct Committed<'a> {
    path: &'a Path,
    backup: Option<PathBuf>,
}

/// Renames staged files onto their destinations, undoing every rename if one fails.
fn commit(staged: &[PathBuf], paths: &[PathBuf]) -> Result<(), RomError> {
    let mut committed: Vec<Committed<'_>> = Vec::with_capacity(paths.len());
    for (i, (staging, path)) in staged.iter().zip(paths).enumerate() {
        match replace(staging, path) {
            Ok(backup) => {
                tracing::info!("Wrote ROM plane {} to '{}'", i, path.display());
                committed.push(Committed {
                    path: path.as_path(),
                    backup,
                });
            }
            Err(source) => {
                discard(&staged[i..]);
                roll_back(&committed);
                return Err(RomError::Io {
                    path: path.clone(),
                    source,
                });
            }
        }
    }

    let backups: Vec<PathBuf> = committed.into_iter().filter_map(|c| c.backup).collect();
    discard(&backups);
    Ok(())
}

/// Moves `staging` onto `path`, keeping an existing file at `path` as a backup.
fn replace(staging: &Path, path: &Path) -> io::Result<Option<PathBuf>> {
    let backup = if path.is_file() {
        let backup = sibling(path, "bak");
        fs::rename(path, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging, path) {
        if let Some(backup) = &backup {
            restore(backup, path);
        }
        return Err(e);
    }
    Ok(backup)
}

fn roll_back(committed: &[Committed<'_>]) {
    for entry in committed.iter().rev() {
        tracing::warn!("Removing '{}'", entry.path.display());
        discard(&[entry.path.to_path_buf()]);
        if let Some(backup) = &entry.backup {
            restore(backup, entry.path);
        }
    }
}

fn restore(backup: &Path, path: &Path) {
    if let Err(e) = fs::rename(backup, path) {
        tracing::warn!(
            "Could not restore '{}' from '{}': {}",
            path.display(),
            backup.display(),
            e
        );
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Could not remove '{}': {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::ADDRESS_SPACE;
    use pretty_assertions::assert_eq;

    fn plane(index: usize, f: impl Fn(usize) -> u8) -> RomPlane {
        RomPlane {
            index,
            bytes: std::array::from_fn(f),
        }
    }

    fn checksum(record: &str) -> u8 {
        let bytes: Vec<u8> = (1..record.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&record[i..i + 2], 16).unwrap())
            .collect();
        bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
    }

    #[test]
    fn test_output_paths() {
        assert_eq!(
            output_path("uCode", 2, OutputFormat::Ihex),
            PathBuf::from("uCode2.hex")
        );
        assert_eq!(
            output_path("out/rom_", 0, OutputFormat::Binary),
            PathBuf::from("out/rom_0.bin")
        );
    }

    #[test]
    fn test_render_ihex() {
        let image = render(&plane(0, |_| 0), OutputFormat::Ihex).unwrap();
        let text = String::from_utf8(image).unwrap().to_uppercase();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), ADDRESS_SPACE / RECORD_LEN + 1);
        assert_eq!(lines[0], format!(":10000000{}F0", "0".repeat(32)));
        assert_eq!(lines[1], format!(":10001000{}E0", "0".repeat(32)));
        assert_eq!(lines[16], ":00000001FF");
    }

    #[test]
    fn test_render_ihex_records_checksum() {
        let image = render(&plane(1, |i| (i * 7) as u8), OutputFormat::Ihex).unwrap();
        let text = String::from_utf8(image).unwrap();
        for (i, line) in text.lines().enumerate() {
            assert!(line.starts_with(':'));
            assert_eq!(checksum(line), 0, "record {i}: {line}");
        }
        let first = text.lines().next().unwrap().to_uppercase();
        assert_eq!(&first[9..15], "00070E");
    }

    #[test]
    fn test_render_hex_lines() {
        let image = render(&plane(0, |i| i as u8), OutputFormat::Hex).unwrap();
        let text = String::from_utf8(image).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), ADDRESS_SPACE);
        assert_eq!(lines[0], "00");
        assert_eq!(lines[0xAB], "AB");
    }

    #[test]
    fn test_render_binary() {
        let image = render(&plane(3, |i| !(i as u8)), OutputFormat::Binary).unwrap();
        assert_eq!(image.len(), ADDRESS_SPACE);
        assert_eq!(image[0], 0xFF);
        assert_eq!(image[255], 0x00);
    }

    #[test]
    fn test_write_planes() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("uCode");
        let planes: Vec<RomPlane> = (0..4).map(|i| plane(i, move |_| i as u8)).collect();
        let written = write_planes(&planes, prefix.to_str().unwrap(), OutputFormat::Binary).unwrap();

        assert_eq!(written.len(), 4);
        for (i, path) in written.iter().enumerate() {
            assert_eq!(path, &dir.path().join(format!("uCode{i}.bin")));
            assert_eq!(fs::read(path).unwrap(), vec![i as u8; ADDRESS_SPACE]);
        }
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    fn planes() -> Vec<RomPlane> {
        (0..4).map(|i| plane(i, move |_| i as u8)).collect()
    }

    #[test]
    fn test_write_planes_replaces_existing_images() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("uCode");
        fs::write(dir.path().join("uCode1.bin"), b"old").unwrap();

        write_planes(&planes(), prefix.to_str().unwrap(), OutputFormat::Binary).unwrap();
        assert_eq!(
            fs::read(dir.path().join("uCode1.bin")).unwrap(),
            vec![1; ADDRESS_SPACE]
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_error_directory_in_place_of_image() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("uCode");
        fs::create_dir(dir.path().join("uCode3.bin")).unwrap();

        let err = write_planes(&planes(), prefix.to_str().unwrap(), OutputFormat::Binary)
            .unwrap_err();
        assert!(matches!(err, RomError::NotAFile { ref path } if path.ends_with("uCode3.bin")));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_rename_rolls_back_earlier_planes() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| dir.path().join(format!("uCode{i}.bin")))
            .collect();
        fs::write(&paths[0], b"old").unwrap();
        let images: Vec<(PathBuf, Vec<u8>)> = paths
            .iter()
            .map(|path| (path.clone(), vec![0xAA; ADDRESS_SPACE]))
            .collect();

        let staged = stage(&images).unwrap();
        fs::remove_file(&staged[2]).unwrap();
        let err = commit(&staged, &paths).unwrap_err();

        assert!(matches!(err, RomError::Io { ref path, .. } if path == &paths[2]));
        assert_eq!(fs::read(&paths[0]).unwrap(), b"old");
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["uCode0.bin"]);
    }

    #[test]
    fn test_write_planes_into_missing_directory_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing").join("uCode");
        let planes = vec![plane(0, |_| 0)];
        let err = write_planes(&planes, prefix.to_str().unwrap(), OutputFormat::Ihex).unwrap_err();
        assert!(matches!(err, RomError::Io { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
