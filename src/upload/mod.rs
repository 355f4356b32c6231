//! Uploaded files.
//!
//! An [`UploadedFile`] pairs the client-reported upload outcome with the
//! stream holding the received bytes. It can be moved to its final location
//! exactly once.
//!
//! The relocation itself is a [`MoveStrategy`]. [`FilesystemMove`] renames
//! file-backed uploads and copies everything else; a transport that needs a
//! privileged "accept upload" step injects its own strategy with
//! [`UploadedFile::with_move_strategy`].

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::stream::ByteStream;

/// Chunk size used when copying a stream to disk.
const COPY_CHUNK_SIZE: usize = 8192;

/// Outcome of an upload as reported by the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum UploadErrorCode {
    /// The file was received successfully.
    Ok = 0,
    /// The file exceeds the server-wide size limit.
    IniSize = 1,
    /// The file exceeds the limit declared by the form.
    FormSize = 2,
    /// Only part of the file was received.
    Partial = 3,
    /// No file was sent.
    NoFile = 4,
    /// No temporary directory was available.
    NoTmpDir = 6,
    /// The file could not be written to disk.
    CantWrite = 7,
    /// An extension stopped the upload.
    Extension = 8,
}

impl UploadErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Returns a human-readable description of the outcome.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "There is no error, the file uploaded with success",
            Self::IniSize => "The uploaded file exceeds the server's maximum upload size",
            Self::FormSize => "The uploaded file exceeds the maximum size specified in the form",
            Self::Partial => "The uploaded file was only partially uploaded",
            Self::NoFile => "No file was uploaded",
            Self::NoTmpDir => "Missing a temporary folder",
            Self::CantWrite => "Failed to write file to disk",
            Self::Extension => "A server extension stopped the file upload",
        }
    }
}

impl TryFrom<i32> for UploadErrorCode {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        Ok(match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            other => {
                return Err(Error::invalid(format!(
                    "{other} is not a valid upload error code"
                )));
            }
        })
    }
}

/// Relocates the bytes of an upload to a target path.
pub trait MoveStrategy: fmt::Debug + Send + Sync {
    fn relocate(&self, stream: &ByteStream, target: &Path) -> io::Result<()>;
}

/// Default strategy: rename file-backed streams, copy everything else.
///
/// A failed rename (for example across filesystems) falls back to copy and
/// remove.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemMove;

impl MoveStrategy for FilesystemMove {
    fn relocate(&self, stream: &ByteStream, target: &Path) -> io::Result<()> {
        let Some(source) = stream.file_path() else {
            return copy_stream(stream, target);
        };

        match fs::rename(&source, target) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(
                    source = %source.display(),
                    target = %target.display(),
                    error = %e,
                    "rename failed, copying instead"
                );
                fs::copy(&source, target)?;
                fs::remove_file(&source)
            }
        }
    }
}

// Writes the whole stream to a freshly created file at `target`.
fn copy_stream(stream: &ByteStream, target: &Path) -> io::Result<()> {
    if stream.is_seekable() {
        stream.rewind().map_err(io::Error::other)?;
    }

    let mut file = File::create(target)?;
    loop {
        let chunk = stream.read(COPY_CHUNK_SIZE).map_err(io::Error::other)?;
        if chunk.is_empty() {
            break;
        }
        file.write_all(&chunk)?;
    }
    file.flush()
}

/// A file received as part of a request.
///
/// Clones share the moved flag and the stream, so moving through any clone
/// is observed by all of them.
///
/// # Examples
///
/// ```
/// use rttp_message::{ByteStream, Error, UploadedFile};
///
/// let dir = std::env::temp_dir().join(format!("rttp-doc-{}", std::process::id()));
/// std::fs::create_dir_all(&dir).unwrap();
/// let target = dir.join("avatar.png");
///
/// let upload = UploadedFile::new(
///     Some(ByteStream::from_bytes("png bytes")),
///     None,
///     0,
///     Some("avatar.png".into()),
///     Some("image/png".into()),
/// )
/// .unwrap();
/// assert_eq!(upload.size(), Some(9));
///
/// upload.move_to(&target).unwrap();
/// assert!(matches!(upload.move_to(&target), Err(Error::AlreadyMoved)));
/// # std::fs::remove_dir_all(&dir).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct UploadedFile {
    stream: Option<ByteStream>,
    size: Option<u64>,
    error: UploadErrorCode,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    moved: Arc<AtomicBool>,
    strategy: Arc<dyn MoveStrategy>,
}

impl UploadedFile {
    /// Creates an uploaded file.
    ///
    /// `error` is the raw upload error code. The stream is only attached when
    /// it is `0` (OK); `size` then defaults to the stream size. Client file
    /// name and media type are stored verbatim and must not be trusted.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown error code, or for an OK
    /// upload without a stream.
    pub fn new(
        stream: Option<ByteStream>,
        size: Option<u64>,
        error: i32,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Result<Self> {
        let error = UploadErrorCode::try_from(error)?;

        let (stream, size) = if error.is_ok() {
            let stream = stream
                .ok_or_else(|| Error::invalid("a successful upload requires a stream"))?;
            let size = size.or_else(|| stream.size());
            (Some(stream), size)
        } else {
            (None, size)
        };

        Ok(Self {
            stream,
            size,
            error,
            client_filename,
            client_media_type,
            moved: Arc::new(AtomicBool::new(false)),
            strategy: Arc::new(FilesystemMove),
        })
    }

    /// Replaces the strategy used by [`move_to`](Self::move_to).
    #[must_use]
    pub fn with_move_strategy(mut self, strategy: Arc<dyn MoveStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Returns the stream holding the uploaded bytes.
    ///
    /// # Errors
    ///
    /// [`Error::UploadInactive`] if the upload failed; [`Error::AlreadyMoved`]
    /// once the file has been moved.
    pub fn stream(&self) -> Result<ByteStream> {
        let stream = self.active_stream()?;
        if self.is_moved() {
            return Err(Error::AlreadyMoved);
        }
        Ok(stream.clone())
    }

    /// Moves the upload to `target`, then closes the source stream.
    ///
    /// # Errors
    ///
    /// - [`Error::UploadInactive`] if the upload failed.
    /// - [`Error::InvalidArgument`] for an empty target path.
    /// - [`Error::AlreadyMoved`] on any call after a successful move.
    /// - [`Error::MoveFailed`] if the strategy fails; the file stays movable.
    pub fn move_to(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        let stream = self.active_stream()?;

        if target.as_os_str().is_empty() {
            return Err(Error::invalid("upload target path must not be empty"));
        }
        if self.moved.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyMoved);
        }

        if let Err(source) = self.strategy.relocate(stream, target) {
            self.moved.store(false, Ordering::SeqCst);
            warn!(target = %target.display(), error = %source, "failed to move uploaded file");
            return Err(Error::MoveFailed {
                target: PathBuf::from(target),
                source,
            });
        }

        stream.close();
        debug!(
            target = %target.display(),
            filename = ?self.client_filename,
            "uploaded file moved"
        );
        Ok(())
    }

    /// Returns the size in bytes, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    /// Returns the file name sent by the client. Untrusted.
    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    /// Returns the media type sent by the client. Untrusted.
    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    pub fn is_moved(&self) -> bool {
        self.moved.load(Ordering::SeqCst)
    }

    fn active_stream(&self) -> Result<&ByteStream> {
        match (&self.stream, self.error) {
            (Some(stream), UploadErrorCode::Ok) => Ok(stream),
            (_, error) => Err(Error::UploadInactive(error)),
        }
    }
}

impl PartialEq for UploadedFile {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.moved, &other.moved)
    }
}
