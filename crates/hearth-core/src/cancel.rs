//! Cooperative cancellation for streaming loops.
//!
//! Every loop that moves archive or content bytes calls [`checkpoint`]
//! between chunks. Cancellation surfaces as [`CoreError::Interrupted`],
//! never as a corruption error.

use std::io::{self, Read, Write};

use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};

/// Bytes moved between two cancellation checks.
pub const CHUNK_SIZE: usize = 64 * 1024;

pub(crate) const CANCELLED_MESSAGE: &str = "hearth operation cancelled";

/// Fail with [`CoreError::Interrupted`] if `cancel` has fired.
pub fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(CoreError::Interrupted)
    } else {
        Ok(())
    }
}

/// An `io::Error` carrying the interruption marker, for code that must
/// return `io::Result` (e.g. `Write` impls) while being cancelled.
///
/// Uses `ErrorKind::Other` because `write_all` retries `Interrupted`.
pub fn interrupted_io_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, CANCELLED_MESSAGE)
}

/// Whether `error` was produced by [`interrupted_io_error`].
pub fn is_interrupted_io_error(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::Other
        && error
            .get_ref()
            .map(|inner| inner.to_string() == CANCELLED_MESSAGE)
            .unwrap_or(false)
}

/// Copy `reader` into `writer` in chunks, checking `cancel` between chunks.
pub fn copy<R, W>(reader: &mut R, writer: &mut W, cancel: &CancellationToken) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        checkpoint(cancel)?;
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    Ok(total)
}

/// Read `reader` to its end, discarding the bytes. Used to validate entries.
pub fn drain<R: Read + ?Sized>(reader: &mut R, cancel: &CancellationToken) -> Result<u64> {
    copy(reader, &mut io::sink(), cancel)
}
