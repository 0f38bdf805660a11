//! Undoing processing steps while bytes stream into a sink.

use std::io::{self, Write};

use flate2::write::GzDecoder;
use quarry_utils::cancel::CancellationToken;
use zstd::stream::raw::{Decoder, InBuffer, Operation, OutBuffer};

use crate::artifact::ProcessingStep;

/// A writer that applies the inverse of a chain of processing steps.
///
/// Bytes written to the chain are the stored bytes; the innermost writer
/// receives the canonical bytes. [`finish`](DecodeChain::finish) must be
/// called to flush trailing output and detect truncated streams.
pub enum DecodeChain<'a> {
    Identity(&'a mut dyn Write),
    Zstd(ZstdDecoder<Box<DecodeChain<'a>>>),
    Gzip(GzDecoder<Box<DecodeChain<'a>>>),
}

impl<'a> DecodeChain<'a> {
    /// `steps` are in the order they were applied to the canonical bytes.
    pub fn new(out: &'a mut dyn Write, steps: &[ProcessingStep]) -> io::Result<Self> {
        let mut chain = DecodeChain::Identity(out);
        for step in steps {
            chain = match step {
                ProcessingStep::Zstd => DecodeChain::Zstd(ZstdDecoder::new(Box::new(chain))?),
                ProcessingStep::Gzip => DecodeChain::Gzip(GzDecoder::new(Box::new(chain))),
            };
        }
        Ok(chain)
    }

    pub fn finish(self) -> io::Result<()> {
        match self {
            DecodeChain::Identity(out) => out.flush(),
            DecodeChain::Zstd(decoder) => decoder.finish()?.finish(),
            DecodeChain::Gzip(decoder) => decoder.finish()?.finish(),
        }
    }
}

impl Write for DecodeChain<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            DecodeChain::Identity(out) => out.write(buf),
            DecodeChain::Zstd(decoder) => decoder.write(buf),
            DecodeChain::Gzip(decoder) => decoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DecodeChain::Identity(out) => out.flush(),
            DecodeChain::Zstd(decoder) => decoder.flush(),
            DecodeChain::Gzip(decoder) => decoder.flush(),
        }
    }
}

const OUT_BUFFER_SIZE: usize = 128 * 1024;

/// Streaming zstd decoder that remembers whether the last frame ended.
///
/// A stream cut off mid-frame decodes without error up to the cut, so
/// completion has to be checked when the input runs out.
pub struct ZstdDecoder<W: Write> {
    inner: W,
    decoder: Decoder<'static>,
    buffer: Vec<u8>,
    frame_done: bool,
}

impl<W: Write> ZstdDecoder<W> {
    pub fn new(inner: W) -> io::Result<Self> {
        Ok(Self {
            inner,
            decoder: Decoder::new()?,
            buffer: vec![0; OUT_BUFFER_SIZE],
            frame_done: false,
        })
    }

    /// Runs the decoder over `input` once, forwarding its output. Returns
    /// whether the output buffer was filled and more may be pending.
    fn step(&mut self, input: &mut InBuffer<'_>) -> io::Result<bool> {
        let mut out = OutBuffer::around(&mut self.buffer[..]);
        let hint = self.decoder.run(input, &mut out)?;
        let written = out.pos();
        self.inner.write_all(&self.buffer[..written])?;
        if written > 0 || input.pos > 0 {
            self.frame_done = hint == 0;
        }
        Ok(written == self.buffer.len())
    }

    /// Drains pending output and fails with `UnexpectedEof` when the stream
    /// stopped inside a frame.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush()?;
        if !self.frame_done {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated zstd stream",
            ));
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for ZstdDecoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut input = InBuffer::around(buf);
        loop {
            let full = self.step(&mut input)?;
            if input.pos == buf.len() && !full {
                break;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        loop {
            let mut input = InBuffer::around(&[]);
            if !self.step(&mut input)? {
                break;
            }
        }
        self.inner.flush()
    }
}

/// Fails every write once the token is cancelled.
pub struct CancellableWriter<'a, W: Write + ?Sized> {
    inner: &'a mut W,
    cancel: &'a CancellationToken,
}

impl<'a, W: Write + ?Sized> CancellableWriter<'a, W> {
    pub fn new(inner: &'a mut W, cancel: &'a CancellationToken) -> Self {
        Self {
            inner,
            cancel,
        }
    }
}

impl<W: Write + ?Sized> Write for CancellableWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("transfer cancelled"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use flate2::{write::GzEncoder, Compression};

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn decode(stored: &[u8], steps: &[ProcessingStep]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut chain = DecodeChain::new(&mut out, steps)?;
        chain.write_all(stored)?;
        chain.finish()?;
        Ok(out)
    }

    #[test]
    fn test_identity() {
        assert_eq!(decode(b"plain", &[]).unwrap(), b"plain");
    }

    #[test]
    fn test_single_steps() {
        let canonical = b"canonical artifact bytes".repeat(64);

        let zstd = zstd::encode_all(&canonical[..], 3).unwrap();
        assert_eq!(decode(&zstd, &[ProcessingStep::Zstd]).unwrap(), canonical);

        let gz = gzip(&canonical);
        assert_eq!(decode(&gz, &[ProcessingStep::Gzip]).unwrap(), canonical);
    }

    #[test]
    fn test_steps_are_undone_in_reverse() {
        let canonical = b"layered".repeat(100);
        let stored = gzip(&zstd::encode_all(&canonical[..], 3).unwrap());

        let decoded = decode(&stored, &[ProcessingStep::Zstd, ProcessingStep::Gzip]).unwrap();
        assert_eq!(decoded, canonical);
    }

    #[test]
    fn test_corrupt_gzip_fails() {
        let mut stored = gzip(b"some bytes that will be truncated");
        stored.truncate(stored.len() / 2);
        assert!(decode(&stored, &[ProcessingStep::Gzip]).is_err());
    }

    #[test]
    fn test_truncated_zstd_fails() {
        let canonical = b"frame that never ends".repeat(64);
        let mut stored = zstd::encode_all(&canonical[..], 3).unwrap();
        stored.truncate(stored.len() / 2);

        let err = decode(&stored, &[ProcessingStep::Zstd]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        assert!(decode(&[], &[ProcessingStep::Zstd]).is_err());
    }

    #[test]
    fn test_concatenated_zstd_frames() {
        let mut stored = zstd::encode_all(&b"first "[..], 3).unwrap();
        stored.extend(zstd::encode_all(&b"second"[..], 3).unwrap());
        assert_eq!(decode(&stored, &[ProcessingStep::Zstd]).unwrap(), b"first second");
    }

    #[test]
    fn test_cancellable_writer() {
        let cancel = CancellationToken::new();
        let mut out = Vec::new();
        let mut writer = CancellableWriter::new(&mut out, &cancel);

        writer.write_all(b"before").unwrap();
        cancel.cancel();
        assert!(writer.write_all(b"after").is_err());
        assert_eq!(out, b"before");
    }
}
