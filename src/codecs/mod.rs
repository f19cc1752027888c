mod compression;
mod gzip;

pub use compression::{
    create_buffer_decompressor, create_compressor, create_decompressor, register_compression,
    BufferDecompressorFactory, Compressor, CompressorFactory, Decompressor,
    FileDecompressorFactory, NoCompressor, NoDecompressor, INPUT_BUFFER_SIZE,
};
pub use gzip::{GzipCompressor, GzipDecompressor};
