use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::sync::RwLock;

use log::debug;
use once_cell::sync::Lazy;

use super::gzip;
use crate::error::{Error, Result};

/// Granularity of decompressed chunks handed to the parser.
pub const INPUT_BUFFER_SIZE: usize = 256 * 1024;

/// Streaming write side of a codec. Owns its file handle and releases it
/// on `close` or drop.
pub trait Compressor: Send {
    fn write(&mut self, data: &[u8]) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Streaming read side of a codec. Yields chunks of decompressed bytes;
/// an empty chunk signals end of stream and is repeated on every
/// subsequent call.
pub trait Decompressor: Send {
    fn read(&mut self) -> Result<Vec<u8>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<dyn Decompressor>")
    }
}

pub type CompressorFactory = Box<dyn Fn(File) -> Box<dyn Compressor> + Send + Sync>;
pub type FileDecompressorFactory = Box<dyn Fn(File) -> Box<dyn Decompressor> + Send + Sync>;
pub type BufferDecompressorFactory = Box<dyn Fn(Vec<u8>) -> Box<dyn Decompressor> + Send + Sync>;

struct CodecEntry {
    compressor: CompressorFactory,
    decompressor_file: FileDecompressorFactory,
    decompressor_buffer: BufferDecompressorFactory,
}

static REGISTRY: Lazy<RwLock<HashMap<String, CodecEntry>>> = Lazy::new(|| {
    let mut codecs: HashMap<String, CodecEntry> = HashMap::new();
    codecs.insert(
        "none".to_owned(),
        CodecEntry {
            compressor: Box::new(|file| Box::new(NoCompressor::new(file))),
            decompressor_file: Box::new(|file| Box::new(NoDecompressor::from_file(file))),
            decompressor_buffer: Box::new(|buffer| Box::new(NoDecompressor::from_buffer(buffer))),
        },
    );
    codecs.insert(
        "gzip".to_owned(),
        CodecEntry {
            compressor: Box::new(|file| Box::new(gzip::GzipCompressor::new(file))),
            decompressor_file: Box::new(|file| Box::new(gzip::GzipDecompressor::from_file(file))),
            decompressor_buffer: Box::new(|buffer| {
                Box::new(gzip::GzipDecompressor::from_buffer(buffer))
            }),
        },
    );
    RwLock::new(codecs)
});

fn read_registry() -> std::sync::RwLockReadGuard<'static, HashMap<String, CodecEntry>> {
    REGISTRY.read().unwrap_or_else(|e| e.into_inner())
}

/// Registers a codec under `identifier`. Returns false if the identifier
/// is already taken; existing entries are never replaced.
pub fn register_compression(
    identifier: &str,
    compressor: CompressorFactory,
    decompressor_file: FileDecompressorFactory,
    decompressor_buffer: BufferDecompressorFactory,
) -> bool {
    let mut codecs = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    if codecs.contains_key(identifier) {
        return false;
    }
    debug!("registered compression codec '{}'", identifier);
    codecs.insert(
        identifier.to_owned(),
        CodecEntry {
            compressor,
            decompressor_file,
            decompressor_buffer,
        },
    );
    true
}

pub fn create_compressor(identifier: &str, file: File) -> Result<Box<dyn Compressor>> {
    let codecs = read_registry();
    let entry = codecs
        .get(identifier)
        .ok_or_else(|| Error::UnsupportedCompression(identifier.to_owned()))?;
    Ok((entry.compressor)(file))
}

pub fn create_decompressor(identifier: &str, file: File) -> Result<Box<dyn Decompressor>> {
    let codecs = read_registry();
    let entry = codecs
        .get(identifier)
        .ok_or_else(|| Error::UnsupportedCompression(identifier.to_owned()))?;
    Ok((entry.decompressor_file)(file))
}

pub fn create_buffer_decompressor(identifier: &str, buffer: Vec<u8>) -> Result<Box<dyn Decompressor>> {
    let codecs = read_registry();
    let entry = codecs
        .get(identifier)
        .ok_or_else(|| Error::UnsupportedCompression(identifier.to_owned()))?;
    Ok((entry.decompressor_buffer)(buffer))
}

pub(crate) fn closed_error() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "codec already closed",
    ))
}

/// Identity codec, write side.
pub struct NoCompressor {
    file: Option<File>,
}

impl NoCompressor {
    pub fn new(file: File) -> Self {
        Self { file: Some(file) }
    }
}

impl Compressor for NoCompressor {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        file.write_all(data)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Identity codec, read side. The in-memory variant yields the whole
/// buffer as a single chunk.
pub struct NoDecompressor {
    file: Option<File>,
    buffer: Option<Vec<u8>>,
}

impl NoDecompressor {
    pub fn from_file(file: File) -> Self {
        Self {
            file: Some(file),
            buffer: None,
        }
    }

    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        Self {
            file: None,
            buffer: Some(buffer),
        }
    }
}

impl Decompressor for NoDecompressor {
    fn read(&mut self) -> Result<Vec<u8>> {
        if let Some(buffer) = self.buffer.take() {
            return Ok(buffer);
        }
        if let Some(file) = &mut self.file {
            let mut chunk = vec![0u8; INPUT_BUFFER_SIZE];
            let nread = file.read(&mut chunk)?;
            chunk.truncate(nread);
            return Ok(chunk);
        }
        Ok(Vec::new())
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }
}
