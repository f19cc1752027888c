//! This crate provides functionality for reading and processing OSM XML data.
//!
//! It parses full snapshots (`osm` documents) as well as change documents
//! (`osmChange` with its `create`/`modify`/`delete` sections) into typed
//! elements. Parsing runs on a dedicated thread behind bounded queues, so a
//! consumer drains ready-made batches while the parser is still working on
//! the rest of the document.
//!
//! # Modules
//!
//! * `models` - Contains data structures used in OSM processing.
//! * `readers` - Provides the streaming XML reader and its batch pipeline.
//! * `codecs` - Compression codecs framing the raw byte source.
//!
//! # Example
//!
//! Read OSM XML data from a file:
//!
//! ```no_run
//! use xml_craft::models::ReadTypes;
//! use xml_craft::readers::XmlReader;
//!
//! let mut reader = XmlReader::from_path("path/to/map.osm", ReadTypes::ALL).unwrap();
//! let header = reader.header();
//! println!("generator: {:?}", header.generator());
//! reader.read(|element| {
//!     // Process element
//! }).unwrap();
//! ```
//!
//! Iterate over elements:
//!
//! ```no_run
//! use xml_craft::models::ReadTypes;
//! use xml_craft::readers::IterableReader;
//!
//! let reader = IterableReader::from_path("path/to/map.osm", ReadTypes::ALL).unwrap();
//! for element in reader {
//!     let element = element.unwrap();
//!     // Process element
//! }
//! ```

pub mod codecs;
pub mod models;
pub mod readers;

mod error;

pub use error::{Error, Result};
