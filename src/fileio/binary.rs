//! Generic binary container: magic number, header length, header text,
//! then the payload. All integers are little-endian.
//!
//! Payload offsets given to `seek`/`tell` are logical: 0 is the first byte
//! after the header, whatever its length.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{IndexError, Result, FORMAT_MAGIC};

/// Magic number plus header length.
const PREFIX_LEN: u64 = 8;

/// Outcome of [`BinaryInputFile::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    NoError,
    CouldNotOpen,
    InvalidMagic,
    InvalidHeader,
}

/// Writer for the container format.
///
/// The payload is buffered and the file is written by [`finish`], or when
/// the writer is dropped, so the header may be set after the payload.
///
/// [`finish`]: BinaryOutputFile::finish
#[derive(Debug)]
pub struct BinaryOutputFile {
    path: PathBuf,
    file: Option<File>,
    header: String,
    payload: Vec<u8>,
    pos: usize,
}

impl BinaryOutputFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path).map_err(|source| IndexError::Open {
            path: path.clone(),
            source,
        })?;
        // Placeholder prefix: an empty header.
        file.write_all(&FORMAT_MAGIC.to_le_bytes())?;
        file.write_all(&1u32.to_le_bytes())?;
        file.write_all(&[0])?;
        Ok(BinaryOutputFile {
            path,
            file: Some(file),
            header: String::new(),
            payload: Vec::new(),
            pos: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the header text. A NUL terminator is added on disk.
    pub fn write_header(&mut self, header: &str) {
        self.header = header.to_owned();
    }

    /// Moves the write position to logical payload offset `pos`. Seeking
    /// past the end zero-fills on the next write.
    pub fn seek(&mut self, pos: u64) {
        self.pos = pos as usize;
    }

    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    /// Writes the file and closes it.
    pub fn finish(mut self) -> Result<()> {
        self.flush_file()
    }

    fn flush_file(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let header_len = u32::try_from(self.header.len() + 1)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "header too long"))?;
        let mut out = BufWriter::new(file);
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&FORMAT_MAGIC.to_le_bytes())?;
        out.write_all(&header_len.to_le_bytes())?;
        out.write_all(self.header.as_bytes())?;
        out.write_all(&[0])?;
        out.write_all(&self.payload)?;
        let file = out.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.set_len(PREFIX_LEN + header_len as u64 + self.payload.len() as u64)?;
        file.sync_all()?;
        Ok(())
    }
}

impl Write for BinaryOutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.pos + buf.len();
        if self.payload.len() < end {
            self.payload.resize(end, 0);
        }
        self.payload[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BinaryOutputFile {
    fn drop(&mut self) {
        if let Err(err) = self.flush_file() {
            warn!(path = %self.path.display(), error = %err, "failed to write binary file");
        }
    }
}

/// Reader for the container format.
#[derive(Debug)]
pub struct BinaryInputFile {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    header: String,
    payload_start: u64,
    payload_len: u64,
    status: FileStatus,
}

impl BinaryInputFile {
    /// Opens `path`, checks the magic number and reads the header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| IndexError::Open {
            path: path.clone(),
            source,
        })?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut word = [0u8; 4];
        if reader.read_exact(&mut word).is_err() {
            return Err(IndexError::InvalidMagic { path, found: 0 });
        }
        let magic = u32::from_le_bytes(word);
        if magic != FORMAT_MAGIC {
            return Err(IndexError::InvalidMagic { path, found: magic });
        }

        let truncated = |expected: u64| IndexError::Truncated {
            path: path.clone(),
            expected,
            found: file_len,
        };
        reader
            .read_exact(&mut word)
            .map_err(|_| truncated(PREFIX_LEN))?;
        let header_len = u32::from_le_bytes(word) as u64;
        if file_len < PREFIX_LEN + header_len {
            return Err(truncated(PREFIX_LEN + header_len));
        }
        let mut text = vec![0u8; header_len as usize];
        reader.read_exact(&mut text)?;
        if text.last() == Some(&0) {
            text.pop();
        }
        let header = String::from_utf8(text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(BinaryInputFile {
            payload_start: PREFIX_LEN + header_len,
            payload_len: file_len - PREFIX_LEN - header_len,
            path,
            reader: Some(reader),
            header,
            status: FileStatus::NoError,
        })
    }

    /// Like [`open`](Self::open), but never fails: problems are reported by
    /// [`status`](Self::status) and every read on an invalid file errors.
    pub fn probe(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::open(path).unwrap_or_else(|err| {
            let status = match err {
                IndexError::Open { .. } => FileStatus::CouldNotOpen,
                IndexError::InvalidMagic { .. } => FileStatus::InvalidMagic,
                _ => FileStatus::InvalidHeader,
            };
            BinaryInputFile {
                path: path.to_path_buf(),
                reader: None,
                header: String::new(),
                payload_start: PREFIX_LEN,
                payload_len: 0,
                status,
            }
        })
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == FileStatus::NoError
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header text without its NUL terminator.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Payload size in bytes.
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.reader()?.read(buf)?)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        Ok(self.reader()?.read_exact(buf)?)
    }

    /// Moves to logical payload offset `pos`.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let start = self.payload_start;
        self.reader()?.seek(SeekFrom::Start(start + pos))?;
        Ok(())
    }

    pub fn tell(&mut self) -> Result<u64> {
        let start = self.payload_start;
        Ok(self.reader()?.stream_position()? - start)
    }

    fn reader(&mut self) -> Result<&mut BufReader<File>> {
        self.reader.as_mut().ok_or_else(|| {
            IndexError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is not open", self.path.display()),
            ))
        })
    }
}
