use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::compression::{closed_error, Compressor, Decompressor, INPUT_BUFFER_SIZE};
use crate::error::Result;

/// Gzip codec, write side.
pub struct GzipCompressor {
    encoder: Option<GzEncoder<File>>,
}

impl GzipCompressor {
    pub fn new(file: File) -> Self {
        Self {
            encoder: Some(GzEncoder::new(file, Compression::default())),
        }
    }
}

impl Compressor for GzipCompressor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let encoder = self.encoder.as_mut().ok_or_else(closed_error)?;
        encoder.write_all(data)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let mut file = encoder.finish()?;
            file.flush()?;
        }
        Ok(())
    }
}

/// Gzip codec, read side.
pub struct GzipDecompressor<R: Read + Send> {
    decoder: GzDecoder<R>,
}

impl GzipDecompressor<BufReader<File>> {
    pub fn from_file(file: File) -> Self {
        Self {
            decoder: GzDecoder::new(BufReader::new(file)),
        }
    }
}

impl GzipDecompressor<Cursor<Vec<u8>>> {
    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        Self {
            decoder: GzDecoder::new(Cursor::new(buffer)),
        }
    }
}

impl<R: Read + Send> Decompressor for GzipDecompressor<R> {
    fn read(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; INPUT_BUFFER_SIZE];
        let nread = self.decoder.read(&mut chunk)?;
        chunk.truncate(nread);
        Ok(chunk)
    }
}
