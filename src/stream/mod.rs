//! Seekable/readable/writable byte streams.
//!
//! A [`ByteStream`] wraps exactly one underlying [`Resource`]: an in-memory
//! buffer, a file, or a one-way reader/writer. Capabilities are derived once
//! from the fopen-style [`OpenMode`] and the resource kind. Once a stream is
//! detached or closed every read, write and seek fails.
//!
//! Cloning a `ByteStream` shares the same resource and cursor. Messages rely
//! on this: a body survives header changes without being copied.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

mod mode;

pub use mode::OpenMode;

/// Upper bound on the buffer allocated by a single [`ByteStream::read`].
pub const MAX_READ_CHUNK: usize = 64 * 1024;

/// The byte source behind a [`ByteStream`].
///
/// Returned to the caller by [`ByteStream::detach`].
pub enum Resource {
    /// Growable in-memory buffer.
    Memory(Cursor<Vec<u8>>),
    /// File on disk. `path` is known when the stream opened the file itself.
    File { file: File, path: Option<PathBuf> },
    /// Non-seekable, read-only source such as a pipe or socket half.
    Reader(Box<dyn Read + Send>),
    /// Non-seekable, write-only sink.
    Writer(Box<dyn Write + Send>),
}

impl Resource {
    fn as_read(&mut self) -> Option<&mut dyn Read> {
        match self {
            Resource::Memory(cursor) => Some(cursor),
            Resource::File { file, .. } => Some(file),
            Resource::Reader(reader) => Some(reader),
            Resource::Writer(_) => None,
        }
    }

    fn as_write(&mut self) -> Option<&mut dyn Write> {
        match self {
            Resource::Memory(cursor) => Some(cursor),
            Resource::File { file, .. } => Some(file),
            Resource::Reader(_) => None,
            Resource::Writer(writer) => Some(writer),
        }
    }

    fn as_seek(&mut self) -> Option<&mut dyn Seek> {
        match self {
            Resource::Memory(cursor) => Some(cursor),
            Resource::File { file, .. } => Some(file),
            Resource::Reader(_) | Resource::Writer(_) => None,
        }
    }

    fn can_read(&self) -> bool {
        !matches!(self, Resource::Writer(_))
    }

    fn can_write(&self) -> bool {
        !matches!(self, Resource::Reader(_))
    }

    fn is_seekable(&self) -> bool {
        matches!(self, Resource::Memory(_) | Resource::File { .. })
    }

    fn probe_size(&self) -> Option<u64> {
        match self {
            Resource::Memory(cursor) => Some(cursor.get_ref().len() as u64),
            Resource::File { file, .. } => file.metadata().ok().map(|m| m.len()),
            Resource::Reader(_) | Resource::Writer(_) => None,
        }
    }

    fn kind(&self) -> (&'static str, &'static str) {
        match self {
            Resource::Memory(_) => ("memory", "MEMORY"),
            Resource::File { .. } => ("plainfile", "STDIO"),
            Resource::Reader(_) => ("reader", "PIPE"),
            Resource::Writer(_) => ("writer", "PIPE"),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Memory(cursor) => f
                .debug_struct("Memory")
                .field("len", &cursor.get_ref().len())
                .field("position", &cursor.position())
                .finish(),
            Resource::File { file, path } => f
                .debug_struct("File")
                .field("file", file)
                .field("path", path)
                .finish(),
            Resource::Reader(_) => f.write_str("Reader(..)"),
            Resource::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Descriptive metadata of an open stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamMetadata {
    pub wrapper_type: &'static str,
    pub stream_type: &'static str,
    pub mode: String,
    pub seekable: bool,
    pub uri: Option<String>,
}

struct StreamState {
    resource: Option<Resource>,
    mode: String,
    readable: bool,
    writable: bool,
    seekable: bool,
    // `None` until probed; `Some(None)` when the size is indeterminate.
    size: Option<Option<u64>>,
    metadata: Option<StreamMetadata>,
    eof: bool,
}

impl StreamState {
    fn new(resource: Resource, mode: &OpenMode) -> Self {
        let seekable = resource.is_seekable();
        let readable = mode.is_readable() && resource.can_read();
        let writable = mode.is_writable() && resource.can_write();
        Self {
            resource: Some(resource),
            mode: mode.as_str().to_owned(),
            readable,
            writable,
            seekable,
            size: None,
            metadata: None,
            eof: false,
        }
    }

    fn read(&mut self, len: usize) -> Result<Bytes> {
        if !self.readable {
            return Err(self.unreadable());
        }
        let reader = self
            .resource
            .as_mut()
            .and_then(Resource::as_read)
            .ok_or(Error::Unreadable { reason: "stream is detached" })?;

        let mut buf = vec![0; len.min(MAX_READ_CHUNK)];
        let n = reader.read(&mut buf).map_err(Error::ReadFailure)?;
        if n == 0 && len > 0 {
            self.eof = true;
        }
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    fn contents(&mut self) -> Result<Bytes> {
        if !self.readable {
            return Err(self.unreadable());
        }
        let reader = self
            .resource
            .as_mut()
            .and_then(Resource::as_read)
            .ok_or(Error::Unreadable { reason: "stream is detached" })?;

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(Error::ReadFailure)?;
        self.eof = true;
        Ok(Bytes::from(buf))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.resource.is_none() {
            return Err(Error::Unwritable {
                reason: "stream is detached".to_owned(),
            });
        }
        if !self.writable {
            return Err(Error::Unwritable {
                reason: format!("mode {:?} does not allow writing", self.mode),
            });
        }
        let writer = self
            .resource
            .as_mut()
            .and_then(Resource::as_write)
            .ok_or_else(|| Error::Unwritable {
                reason: "resource is read-only".to_owned(),
            })?;

        writer.write_all(data).map_err(|e| Error::Unwritable {
            reason: e.to_string(),
        })?;
        self.size = None;
        Ok(data.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.resource.is_none() {
            return Err(Error::NotSeekable {
                reason: "stream is detached".to_owned(),
            });
        }
        if !self.seekable {
            return Err(Error::NotSeekable {
                reason: "resource does not support seeking".to_owned(),
            });
        }
        let seeker = self
            .resource
            .as_mut()
            .and_then(Resource::as_seek)
            .ok_or_else(|| Error::NotSeekable {
                reason: "resource does not support seeking".to_owned(),
            })?;

        let position = seeker.seek(pos).map_err(|e| Error::NotSeekable {
            reason: format!("unable to seek to {pos:?}: {e}"),
        })?;
        self.eof = false;
        Ok(position)
    }

    fn tell(&mut self) -> Result<u64> {
        match self.resource.as_mut() {
            Some(Resource::Memory(cursor)) => Ok(cursor.position()),
            Some(Resource::File { file, .. }) => {
                file.stream_position().map_err(|_| Error::PositionUnknown)
            }
            _ => Err(Error::PositionUnknown),
        }
    }

    fn size(&mut self) -> Option<u64> {
        let resource = self.resource.as_ref()?;
        *self.size.get_or_insert_with(|| resource.probe_size())
    }

    fn metadata(&mut self) -> Option<StreamMetadata> {
        let resource = self.resource.as_ref()?;
        let seekable = self.seekable;
        let mode = &self.mode;
        let metadata = self.metadata.get_or_insert_with(|| {
            let (wrapper_type, stream_type) = resource.kind();
            let uri = match resource {
                Resource::Memory(_) => Some("memory".to_owned()),
                Resource::File { path, .. } => {
                    path.as_ref().map(|p| p.to_string_lossy().into_owned())
                }
                Resource::Reader(_) | Resource::Writer(_) => None,
            };
            StreamMetadata {
                wrapper_type,
                stream_type,
                mode: mode.clone(),
                seekable,
                uri,
            }
        });
        Some(metadata.clone())
    }

    fn detach(&mut self) -> Option<Resource> {
        let resource = self.resource.take()?;
        self.readable = false;
        self.writable = false;
        self.seekable = false;
        self.size = None;
        self.metadata = None;
        self.eof = true;
        Some(resource)
    }

    fn close(&mut self) {
        if let Some(mut resource) = self.detach() {
            if let Some(writer) = resource.as_write() {
                if let Err(e) = writer.flush() {
                    warn!(error = %e, "failed to flush stream on close");
                }
            }
            debug!(resource = ?resource, "stream closed");
        }
    }

    fn unreadable(&self) -> Error {
        if self.resource.is_none() {
            Error::Unreadable { reason: "stream is detached" }
        } else {
            Error::Unreadable { reason: "mode does not allow reading" }
        }
    }
}

impl Drop for StreamState {
    fn drop(&mut self) {
        if self.resource.is_some() {
            trace!("releasing unreachable stream");
            self.close();
        }
    }
}

/// A shared handle to a byte resource.
///
/// # Examples
///
/// ```
/// use rttp_message::ByteStream;
///
/// let stream = ByteStream::memory();
/// stream.write(b"hello world").unwrap();
/// stream.rewind().unwrap();
///
/// assert_eq!(&stream.read(5).unwrap()[..], b"hello");
/// assert_eq!(stream.tell().unwrap(), 5);
/// assert_eq!(&stream.contents().unwrap()[..], b" world");
/// assert_eq!(stream.size(), Some(11));
/// assert_eq!(stream.to_string(), "hello world");
/// ```
#[derive(Clone)]
pub struct ByteStream {
    inner: Arc<Mutex<StreamState>>,
}

impl ByteStream {
    /// Wraps `resource`, deriving capabilities from `mode`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `mode` is not a valid open mode.
    pub fn new(resource: Resource, mode: &str) -> Result<Self> {
        let mode = OpenMode::parse(mode)?;
        Ok(Self::from_state(StreamState::new(resource, &mode)))
    }

    /// Creates an empty, read-write, in-memory stream.
    pub fn memory() -> Self {
        Self::memory_with(Vec::new())
    }

    /// Creates a read-write, in-memory stream holding `data`, positioned at
    /// the start.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::memory_with(data.into())
    }

    /// Opens the file at `path` with an fopen-style `mode`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an invalid mode, [`Error::Open`] if the
    /// file cannot be opened.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let path = path.as_ref();
        let open_mode = OpenMode::parse(mode)?;
        let file = open_mode
            .open_options()
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_owned(),
                source,
            })?;

        let resource = Resource::File {
            file,
            path: Some(path.to_owned()),
        };
        Ok(Self::from_state(StreamState::new(resource, &open_mode)))
    }

    /// Wraps an already open file. `mode` must describe how it was opened.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `mode` is not a valid open mode.
    pub fn from_file(file: File, mode: &str) -> Result<Self> {
        Self::new(Resource::File { file, path: None }, mode)
    }

    /// Wraps a non-seekable, read-only source.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        let resource = Resource::Reader(Box::new(reader));
        Self::from_state(StreamState::new(resource, &OpenMode::read_only()))
    }

    /// Wraps a non-seekable, write-only sink.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        let resource = Resource::Writer(Box::new(writer));
        Self::from_state(StreamState::new(resource, &OpenMode::write_only()))
    }

    fn memory_with(data: Vec<u8>) -> Self {
        let resource = Resource::Memory(Cursor::new(data));
        Self::from_state(StreamState::new(resource, &OpenMode::read_write()))
    }

    fn from_state(state: StreamState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, StreamState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if both handles share the same underlying stream.
    pub fn ptr_eq(&self, other: &ByteStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reads up to `len` bytes from the current position, and never more than
    /// [`MAX_READ_CHUNK`] in one call.
    ///
    /// # Errors
    ///
    /// [`Error::Unreadable`] if the stream is detached or its mode forbids
    /// reading; [`Error::ReadFailure`] if the underlying read fails.
    pub fn read(&self, len: usize) -> Result<Bytes> {
        self.state().read(len)
    }

    /// Writes all of `data` at the current position and returns its length.
    ///
    /// # Errors
    ///
    /// [`Error::Unwritable`] if the stream is detached, its mode forbids
    /// writing, or the underlying write fails.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.state().write(data)
    }

    /// Moves the cursor and returns the new absolute position.
    ///
    /// # Errors
    ///
    /// [`Error::NotSeekable`] if the stream is detached, not seekable, or the
    /// seek fails (for example a negative absolute position).
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        self.state().seek(pos)
    }

    /// Seeks to the start of the stream.
    ///
    /// # Errors
    ///
    /// Same as [`seek`](Self::seek).
    pub fn rewind(&self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Returns the current cursor position.
    ///
    /// # Errors
    ///
    /// [`Error::PositionUnknown`] if the resource cannot report a position.
    pub fn tell(&self) -> Result<u64> {
        self.state().tell()
    }

    /// Returns `true` once a read has reached the end, or if detached.
    pub fn eof(&self) -> bool {
        self.state().eof
    }

    /// Reads everything from the current position to the end.
    ///
    /// # Errors
    ///
    /// [`Error::Unreadable`] if reading is not allowed; [`Error::ReadFailure`]
    /// if the underlying read fails.
    pub fn contents(&self) -> Result<Bytes> {
        self.state().contents()
    }

    /// Returns the whole stream, rewinding first when seekable. Never fails:
    /// any error yields an empty buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut state = self.state();
        if state.seekable {
            if let Err(e) = state.seek(SeekFrom::Start(0)) {
                warn!(error = %e, "unable to rewind stream for stringification");
                return Bytes::new();
            }
        }
        state.contents().unwrap_or_else(|e| {
            warn!(error = %e, "unable to read stream for stringification");
            Bytes::new()
        })
    }

    /// Returns the size in bytes, or `None` when it cannot be determined.
    pub fn size(&self) -> Option<u64> {
        self.state().size()
    }

    pub fn is_readable(&self) -> bool {
        self.state().readable
    }

    pub fn is_writable(&self) -> bool {
        self.state().writable
    }

    pub fn is_seekable(&self) -> bool {
        self.state().seekable
    }

    /// Returns the stream metadata, or `None` once detached.
    pub fn metadata(&self) -> Option<StreamMetadata> {
        self.state().metadata()
    }

    /// Returns a single metadata entry (`"mode"`, `"seekable"`, `"uri"`, ...).
    pub fn metadata_value(&self, key: &str) -> Option<serde_json::Value> {
        let metadata = self.metadata()?;
        match serde_json::to_value(metadata) {
            Ok(serde_json::Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    /// Separates the resource from the stream and hands it to the caller.
    /// The stream becomes unusable. Returns `None` if already detached.
    pub fn detach(&self) -> Option<Resource> {
        let resource = self.state().detach();
        if resource.is_some() {
            debug!("stream detached");
        }
        resource
    }

    /// Releases the resource. Safe to call any number of times.
    pub fn close(&self) {
        self.state().close();
    }

    pub(crate) fn file_path(&self) -> Option<PathBuf> {
        match self.state().resource.as_ref() {
            Some(Resource::File { path, .. }) => path.clone(),
            _ => None,
        }
    }
}

impl Default for ByteStream {
    fn default() -> Self {
        Self::memory()
    }
}

impl PartialEq for ByteStream {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ByteStream {}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("ByteStream")
            .field("resource", &state.resource)
            .field("mode", &state.mode)
            .field("readable", &state.readable)
            .field("writable", &state.writable)
            .field("seekable", &state.seekable)
            .finish()
    }
}

impl fmt::Display for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}
