use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

/// Files at least this large are memory-mapped. rockyou.txt is well above it.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024;

/// Raw line bytes, without the trailing `\n` / `\r\n`. Wordlists are not
/// guaranteed to be valid UTF-8 so nothing here decodes.
pub type LineIter = Box<dyn Iterator<Item = io::Result<Vec<u8>>> + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InputError {
    pub fn read(path: &Path, source: io::Error) -> Self {
        InputError::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Failure writing a result file (hash export, summary JSON).
#[derive(Debug, thiserror::Error)]
#[error("unable to write {}: {source}", path.display())]
pub struct OutputError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl OutputError {
    pub fn new(path: &Path, source: io::Error) -> Self {
        OutputError {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Decide whether to use mmap based on file size and threshold.
pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

/// Line iterator over a buffered reader.
pub fn iter_lines_bufread(path: &Path) -> Result<LineIter, InputError> {
    let file = File::open(path).map_err(|e| InputError::read(path, e))?;
    let reader = BufReader::new(file);
    Ok(Box::new(reader.split(b'\n').map(|line| line.map(trim_cr))))
}

/// Line iterator over a memory map; each line is copied out.
pub fn iter_lines_mmap(path: &Path) -> Result<LineIter, InputError> {
    let file = File::open(path).map_err(|e| InputError::read(path, e))?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| InputError::read(path, e))?;
    Ok(Box::new(MmapLines { mmap, pos: 0 }))
}

struct MmapLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MmapLines {
    type Item = io::Result<Vec<u8>>;
    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        if let Some(off) = memchr::memchr(b'\n', &data[self.pos..]) {
            let end = self.pos + off;
            self.pos = end + 1;
            Some(Ok(trim_cr(data[start..end].to_vec())))
        } else {
            // Last line without trailing newline
            self.pos = data.len();
            Some(Ok(trim_cr(data[start..].to_vec())))
        }
    }
}

fn trim_cr(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    bytes
}

/// Lossy UTF-8 view of a line, for text formats (potfiles, status logs) and
/// for storing plaintexts.
pub fn line_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Open `path` for line iteration, choosing mmap or bufread by size.
/// A path that is not a regular file is reported as [`InputError::NotFound`].
pub fn open_lines(path: &Path, threshold_bytes: u64) -> Result<LineIter, InputError> {
    if !path.is_file() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    let meta = std::fs::metadata(path).map_err(|e| InputError::read(path, e))?;
    if meta.len() > 0 && should_use_mmap(meta.len(), threshold_bytes) {
        iter_lines_mmap(path)
    } else {
        iter_lines_bufread(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn collect(iter: LineIter) -> Vec<Vec<u8>> {
        iter.map(|l| l.unwrap()).collect()
    }

    #[test]
    fn bufread_and_mmap_agree() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("words.txt");
        std::fs::write(&p, b"alpha\r\nbeta\n\n\xffgamma").unwrap();
        let small = collect(open_lines(&p, u64::MAX).unwrap());
        let mapped = collect(open_lines(&p, 1).unwrap());
        assert_eq!(small, mapped);
        assert_eq!(
            small,
            vec![
                b"alpha".to_vec(),
                b"beta".to_vec(),
                Vec::new(),
                b"\xffgamma".to_vec()
            ]
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = open_lines(&dir.path().join("nope"), 0).err().unwrap();
        assert!(matches!(err, InputError::NotFound(_)));
    }

    #[test]
    fn lossy_text_replaces_invalid_bytes() {
        assert_eq!(line_text(b"ok\xff"), "ok\u{fffd}");
    }
}
