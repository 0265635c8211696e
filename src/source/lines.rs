//! Line splitting for tailed byte sources
//!
//! A tailed file can be observed mid-write, so the last line of a read may be torn.
//! `LineBuffer` holds that fragment back until its terminator arrives.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Accumulates raw bytes and yields complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every completed line (terminator included).
    ///
    /// Splitting happens on bytes, so a multi-byte character cut across two
    /// reads is reassembled before decoding.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset + 1;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end;
        }
        self.pending.drain(..start);
        lines
    }

    /// Bytes of the torn trailing line, if any
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Flush an unterminated final line (end of input).
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Incremental reader over a growing file.
#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    file: File,
    position: u64,
    buffer: LineBuffer,
}

impl FileTail {
    /// Open `path`, positioned at the start or at the current end of the file.
    pub async fn open(path: &Path, from_start: bool) -> std::io::Result<Self> {
        let mut file = File::open(path).await?;
        let position = if from_start {
            0
        } else {
            file.seek(SeekFrom::End(0)).await?
        };
        Ok(FileTail {
            path: path.to_path_buf(),
            file,
            position,
            buffer: LineBuffer::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset up to which the file has been consumed
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read whatever was appended since the last call and return complete lines.
    ///
    /// A file that shrank below the read position was truncated or replaced; reading
    /// restarts from its beginning.
    pub async fn read_lines(&mut self) -> std::io::Result<Vec<String>> {
        let len = self.file.metadata().await?.len();
        if len < self.position {
            tracing::debug!("{} truncated, rewinding", self.path.display());
            self.file.seek(SeekFrom::Start(0)).await?;
            self.position = 0;
            self.buffer.clear();
        }
        if len == self.position {
            return Ok(Vec::new());
        }

        let mut chunk = Vec::with_capacity((len - self.position) as usize);
        let read = self.file.read_to_end(&mut chunk).await?;
        self.position += read as u64;
        Ok(self.buffer.push(&chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_torn_line_held_back() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"{\"type\":\"turn").is_empty());
        assert_eq!(buf.pending(), b"{\"type\":\"turn");

        let lines = buf.push(b".started\"}\n{\"a\":1}\n{\"b\"");
        assert_eq!(lines, vec!["{\"type\":\"turn.started\"}\n", "{\"a\":1}\n"]);
        assert_eq!(buf.take_remainder().as_deref(), Some("{\"b\""));
        assert!(buf.take_remainder().is_none());
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut buf = LineBuffer::new();
        let bytes = "héllo\n".as_bytes();
        assert!(buf.push(&bytes[..2]).is_empty());
        assert_eq!(buf.push(&bytes[2..]), vec!["héllo\n"]);
    }

    #[test]
    fn test_crlf_kept_for_parsers() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"a\r\nb\r\n"), vec!["a\r\n", "b\r\n"]);
    }

    #[tokio::test]
    async fn test_file_tail_follows_appends() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "old line").unwrap();
        file.flush().unwrap();

        let mut tail = FileTail::open(file.path(), false).await.unwrap();
        assert!(tail.read_lines().await.unwrap().is_empty());

        write!(file, "new ").unwrap();
        file.flush().unwrap();
        assert!(tail.read_lines().await.unwrap().is_empty());

        writeln!(file, "line").unwrap();
        file.flush().unwrap();
        assert_eq!(tail.read_lines().await.unwrap(), vec!["new line\n"]);
        assert_eq!(tail.position(), "old line\nnew line\n".len() as u64);
    }

    #[tokio::test]
    async fn test_file_tail_from_start_and_truncation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "one").unwrap();
        writeln!(file, "two").unwrap();
        file.flush().unwrap();

        let mut tail = FileTail::open(file.path(), true).await.unwrap();
        assert_eq!(tail.read_lines().await.unwrap(), vec!["one\n", "two\n"]);

        file.as_file().set_len(0).unwrap();
        let mut handle = std::fs::OpenOptions::new()
            .append(true)
            .open(file.path())
            .unwrap();
        writeln!(handle, "3").unwrap();
        assert_eq!(tail.read_lines().await.unwrap(), vec!["3\n"]);
    }
}
