use std::fs::File;
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;

use log::{debug, warn};

use super::batch::{Batch, OutputItem};
use super::header::{Header, HeaderFuture};
use super::xml_parser::{ParseOptions, XmlParser};
use crate::codecs::{self, Decompressor, NoDecompressor};
use crate::error::{Error, Result};
use crate::models::{Element, ReadTypes};

const INPUT_QUEUE_SIZE: usize = 16;
const OUTPUT_QUEUE_SIZE: usize = 8;

/// A streaming reader for OSM XML and OSM change files.
///
/// The `XmlReader` struct decodes `osm` and `osmChange` documents into
/// typed elements. Decompression and parsing run on their own threads
/// behind bounded queues, so construction returns immediately and the
/// consumer drains batches of elements while parsing continues. Dropping
/// the reader stops both threads.
///
/// # Example
///
/// ```
/// use xml_craft::models::{Element, ReadTypes};
/// use xml_craft::readers::XmlReader;
///
/// let xml = br#"<osm version="0.6"><node id="1" lat="1.5" lon="2.5"/></osm>"#;
/// let mut reader = XmlReader::from_buffer(xml.to_vec(), ReadTypes::ALL);
/// reader.read(|element| {
///     if let Element::Node(node) = element {
///         println!("node {}", node.id);
///     }
/// }).unwrap();
/// ```
pub struct XmlReader {
    output: Receiver<OutputItem>,
    header: HeaderFuture,
    finished: bool,
}

impl XmlReader {
    /// Creates a new `XmlReader` over a byte source, materialising only
    /// the element kinds selected by `read_types`.
    pub fn new(decompressor: Box<dyn Decompressor>, read_types: ReadTypes) -> Self {
        Self::with_options(decompressor, read_types, ParseOptions::default())
    }

    pub fn with_options(
        mut decompressor: Box<dyn Decompressor>,
        read_types: ReadTypes,
        options: ParseOptions,
    ) -> Self {
        let (input_tx, input_rx) = sync_channel::<std::io::Result<Vec<u8>>>(INPUT_QUEUE_SIZE);
        let (output_tx, output_rx) = sync_channel::<OutputItem>(OUTPUT_QUEUE_SIZE);
        let header = HeaderFuture::new();

        thread::spawn(move || {
            loop {
                match decompressor.read() {
                    Ok(chunk) => {
                        let last = chunk.is_empty();
                        if input_tx.send(Ok(chunk)).is_err() {
                            break;
                        }
                        if last {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = input_tx.send(Err(into_io_error(err)));
                        break;
                    }
                }
            }
            if let Err(err) = decompressor.close() {
                warn!("closing decompressor failed: {}", err);
            }
        });

        let header_future = header.clone();
        thread::spawn(move || {
            debug!("xml parser thread started");
            let mut parser = XmlParser::new(read_types, options, header_future, output_tx.clone());
            let result = parser.run(input_rx);
            // publish and flush in every outcome: consumers waiting on the
            // header must not block forever, and the committed prefix is
            // delivered even when an error follows
            parser.publish_header();
            parser.flush_remaining();
            match result {
                Ok(()) => {
                    let _ = output_tx.send(OutputItem::Done);
                    debug!("xml parser thread finished");
                }
                Err(err) => {
                    debug!("xml parser thread failed: {}", err);
                    let _ = output_tx.send(OutputItem::Error(err));
                }
            }
        });

        Self {
            output: output_rx,
            header,
            finished: false,
        }
    }

    /// Creates a new `XmlReader` reading an uncompressed file.
    pub fn from_path<P: AsRef<Path>>(path: P, read_types: ReadTypes) -> Result<Self> {
        let file = File::open(path)?;
        let decompressor = codecs::create_decompressor("none", file)?;
        Ok(Self::new(decompressor, read_types))
    }

    /// Creates a new `XmlReader` reading a file framed by the codec
    /// registered under `compression`.
    pub fn from_file(file: File, compression: &str, read_types: ReadTypes) -> Result<Self> {
        let decompressor = codecs::create_decompressor(compression, file)?;
        Ok(Self::new(decompressor, read_types))
    }

    /// Creates a new `XmlReader` over an in-memory document.
    pub fn from_buffer(buffer: Vec<u8>, read_types: ReadTypes) -> Self {
        Self::new(Box::new(NoDecompressor::from_buffer(buffer)), read_types)
    }

    /// Waits for the document header. It is available as soon as the
    /// parser reaches the first element, or the end of the document for
    /// element-free files; elements do not have to be consumed first.
    pub fn header(&self) -> Header {
        self.header.wait()
    }

    /// Returns the next batch of elements, an error that ended parsing,
    /// or `None` once the stream is exhausted.
    pub fn next_batch(&mut self) -> Option<Result<Batch>> {
        if self.finished {
            return None;
        }
        match self.output.recv() {
            Ok(OutputItem::Batch(batch)) => Some(Ok(batch)),
            Ok(OutputItem::Error(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            Ok(OutputItem::Done) | Err(_) => {
                self.finished = true;
                None
            }
        }
    }

    /// Reads all elements, invoking the callback for each one in
    /// document order.
    pub fn read<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(Element),
    {
        while let Some(batch) = self.next_batch() {
            for element in batch? {
                callback(element);
            }
        }
        Ok(())
    }
}

/// A reader that provides an iterable interface over the elements of an
/// OSM XML document.
///
/// # Example
///
/// ```
/// use xml_craft::models::ReadTypes;
/// use xml_craft::readers::IterableReader;
/// use xml_craft::readers::XmlReader;
///
/// let xml = br#"<osm version="0.6"><node id="1"/><node id="2"/></osm>"#;
/// let reader = IterableReader::new(XmlReader::from_buffer(xml.to_vec(), ReadTypes::ALL));
/// let ids: Vec<i64> = reader
///     .map(|element| element.unwrap().get_meta().1)
///     .collect();
/// assert_eq!(ids, vec![1, 2]);
/// ```
pub struct IterableReader {
    xml_reader: XmlReader,
    current_batch: Option<std::vec::IntoIter<Element>>,
}

impl IterableReader {
    /// Creates a new `IterableReader` from a raw XML reader.
    pub fn new(xml_reader: XmlReader) -> Self {
        Self {
            xml_reader,
            current_batch: None,
        }
    }

    /// Creates a new `IterableReader` from a file path.
    pub fn from_path<P: AsRef<Path>>(path: P, read_types: ReadTypes) -> Result<Self> {
        Ok(Self::new(XmlReader::from_path(path, read_types)?))
    }

    pub fn header(&self) -> Header {
        self.xml_reader.header()
    }
}

impl Iterator for IterableReader {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(iter) = &mut self.current_batch {
                if let Some(element) = iter.next() {
                    return Some(Ok(element));
                }
                self.current_batch = None;
            }
            match self.xml_reader.next_batch()? {
                Ok(batch) => self.current_batch = Some(batch.into_iter()),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn into_io_error(err: Error) -> std::io::Error {
    match err {
        Error::Io(io_err) => io_err,
        other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::GzipDecompressor;
    use crate::models::{ElementType, Location};

    fn read_all(xml: &str, read_types: ReadTypes) -> Result<Vec<Element>> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut reader = XmlReader::from_buffer(xml.as_bytes().to_vec(), read_types);
        let mut elements = Vec::new();
        reader.read(|element| elements.push(element))?;
        Ok(elements)
    }

    #[test]
    fn test_single_node() {
        let elements = read_all(
            r#"<osm version="0.6"><node id="1" lat="10.0000001" lon="20.0000002"/></osm>"#,
            ReadTypes::NODE,
        )
        .unwrap();

        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Node(node) => {
                assert_eq!(node.id, 1);
                assert_eq!(node.location.y(), 100000001);
                assert_eq!(node.location.x(), 200000002);
                assert!(node.visible);
                assert!(node.tags.is_empty());
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_section_marks_invisible() {
        let xml = r#"<osmChange version="0.6"><delete><node id="7" version="3"/></delete></osmChange>"#;
        let mut reader = XmlReader::from_buffer(xml.as_bytes().to_vec(), ReadTypes::NODE);
        let mut elements = Vec::new();
        reader.read(|element| elements.push(element)).unwrap();

        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Node(node) => {
                assert_eq!(node.id, 7);
                assert_eq!(node.version, 3);
                assert!(!node.visible);
            }
            other => panic!("expected node, got {:?}", other),
        }
        assert!(reader.header().has_multiple_object_versions());
    }

    #[test]
    fn test_visible_attribute_overrides_delete_section() {
        let xml = r#"<osmChange version="0.6">
            <create><node id="1"/></create>
            <modify><node id="2"/></modify>
            <delete><node id="3"/><node id="4" visible="true"/></delete>
            <node id="5"/>
        </osmChange>"#;
        let elements = read_all(xml, ReadTypes::NODE).unwrap();

        let visibility: Vec<bool> = elements
            .iter()
            .map(|e| match e {
                Element::Node(n) => n.visible,
                other => panic!("expected node, got {:?}", other),
            })
            .collect();
        assert_eq!(visibility, vec![true, true, false, true, true]);
    }

    #[test]
    fn test_way_with_nodes_and_tags() {
        let xml = r#"<osm version="0.6"><way id="5"><nd ref="1"/><nd ref="2"/><tag k="highway" v="residential"/></way></osm>"#;
        let elements = read_all(xml, ReadTypes::WAY).unwrap();

        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Way(way) => {
                assert_eq!(way.id, 5);
                let ids: Vec<i64> = way.node_refs.iter().map(|r| r.id).collect();
                assert_eq!(ids, vec![1, 2]);
                assert!(way.node_refs.iter().all(|r| !r.location.is_defined()));
                assert_eq!(way.tags.len(), 1);
                assert_eq!(way.tags[0].key, "highway");
                assert_eq!(way.tags[0].value, "residential");
            }
            other => panic!("expected way, got {:?}", other),
        }
    }

    #[test]
    fn test_relation_members() {
        let xml = r#"<osm version="0.6"><relation id="9"><member type="n" ref="1" role="via"/><member type="w" ref="2" role=""/></relation></osm>"#;
        let elements = read_all(xml, ReadTypes::RELATION).unwrap();

        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Relation(relation) => {
                assert_eq!(relation.id, 9);
                assert_eq!(relation.members.len(), 2);
                assert_eq!(relation.members[0].member_type, ElementType::Node);
                assert_eq!(relation.members[0].member_id, 1);
                assert_eq!(relation.members[0].role, "via");
                assert_eq!(relation.members[1].member_type, ElementType::Way);
                assert_eq!(relation.members[1].member_id, 2);
                assert_eq!(relation.members[1].role, "");
            }
            other => panic!("expected relation, got {:?}", other),
        }
    }

    #[test]
    fn test_bounds_in_header() {
        let xml = r#"<osm version="0.6"><bounds minlon="-1" minlat="-2" maxlon="3" maxlat="4"/><node id="1"/></osm>"#;
        let mut reader = XmlReader::from_buffer(xml.as_bytes().to_vec(), ReadTypes::NODE);

        // the header can be awaited without consuming any elements
        let header = reader.header();
        assert_eq!(header.version(), Some("0.6"));
        assert_eq!(header.boxes().len(), 1);
        assert_eq!(header.boxes()[0].min, Location::new(-1.0, -2.0));
        assert_eq!(header.boxes()[0].max, Location::new(3.0, 4.0));
        assert!(!header.has_multiple_object_versions());

        let mut count = 0;
        reader.read(|_| count += 1).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_header_snapshot_excludes_later_bounds() {
        let xml = r#"<osm version="0.6">
            <bounds minlon="0" minlat="0" maxlon="1" maxlat="1"/>
            <node id="1"/>
            <bounds minlon="5" minlat="5" maxlon="6" maxlat="6"/>
            <node id="2"/>
        </osm>"#;
        let mut reader = XmlReader::from_buffer(xml.as_bytes().to_vec(), ReadTypes::NODE);
        let mut count = 0;
        reader.read(|_| count += 1).unwrap();

        assert_eq!(count, 2);
        assert_eq!(reader.header().boxes().len(), 1);
    }

    #[test]
    fn test_unsupported_version() {
        let err = read_all(
            r#"<osm version="0.7"><node id="1"/></osm>"#,
            ReadTypes::NODE,
        )
        .unwrap_err();
        match err {
            Error::UnsupportedFormatVersion { version } => assert_eq!(version, "0.7"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_version() {
        let err = read_all(r#"<osm><node id="1"/></osm>"#, ReadTypes::NODE).unwrap_err();
        assert!(matches!(err, Error::MissingFormatVersion));
    }

    #[test]
    fn test_unknown_root_element() {
        let err = read_all(r#"<gpx version="0.6"/>"#, ReadTypes::ALL).unwrap_err();
        match err {
            Error::Xml { message, .. } => assert!(message.contains("gpx")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_read_mask_filters() {
        let xml = r#"<osm version="0.6"><node id="1"/><way id="2"/><relation id="3"/></osm>"#;
        let elements = read_all(xml, ReadTypes::WAY).unwrap();

        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].get_meta(), (ElementType::Way, 2));
    }

    #[test]
    fn test_nothing_mask_publishes_header() {
        let xml = r#"<osm version="0.6" generator="test-gen"><bounds minlon="0" minlat="0" maxlon="1" maxlat="1"/><node id="1"/><node id="2"/></osm>"#;
        let mut reader = XmlReader::from_buffer(xml.as_bytes().to_vec(), ReadTypes::NOTHING);

        let header = reader.header();
        assert_eq!(header.generator(), Some("test-gen"));
        assert_eq!(header.boxes().len(), 1);

        let mut count = 0;
        reader.read(|_| count += 1).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_empty_document() {
        let mut reader =
            XmlReader::from_buffer(br#"<osm version="0.6"/>"#.to_vec(), ReadTypes::ALL);
        let mut count = 0;
        reader.read(|_| count += 1).unwrap();
        assert_eq!(count, 0);
        assert_eq!(reader.header().version(), Some("0.6"));
    }

    #[test]
    fn test_element_attributes() {
        let xml = r#"<osm version="0.6"><node id="42" version="2" changeset="77" timestamp="2012-01-01T00:00:00Z" uid="9" user="mapper"/></osm>"#;
        let elements = read_all(xml, ReadTypes::NODE).unwrap();

        match &elements[0] {
            Element::Node(node) => {
                assert_eq!(node.id, 42);
                assert_eq!(node.version, 2);
                assert_eq!(node.changeset_id, 77);
                assert_eq!(
                    node.timestamp.unwrap().to_rfc3339(),
                    "2012-01-01T00:00:00+00:00"
                );
                let user = node.user.as_ref().unwrap();
                assert_eq!(user.id, 9);
                assert_eq!(user.name, "mapper");
                assert!(!node.location.is_defined());
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_changeset_with_discussion() {
        let xml = r#"<osm version="0.6">
            <changeset id="21" created_at="2014-02-01T10:00:00Z" closed_at="2014-02-01T11:00:00Z" open="false" comments_count="2" min_lon="1" min_lat="2" max_lon="3" max_lat="4" uid="5" user="mapper">
                <tag k="comment" v="small fixes"/>
                <discussion>
                    <comment date="2014-02-02T09:00:00Z" uid="6" user="alice">
                        <text>looks good</text>
                    </comment>
                    <comment date="2014-02-03T09:00:00Z" uid="7" user="bob">
                        <text>thanks</text>
                    </comment>
                </discussion>
            </changeset>
        </osm>"#;
        let elements = read_all(xml, ReadTypes::CHANGESET).unwrap();

        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Changeset(changeset) => {
                assert_eq!(changeset.id, 21);
                assert!(!changeset.open);
                assert_eq!(changeset.comments_count, 2);
                assert_eq!(changeset.bounds.min, Location::new(1.0, 2.0));
                assert_eq!(changeset.bounds.max, Location::new(3.0, 4.0));
                assert_eq!(changeset.user.as_ref().unwrap().name, "mapper");
                assert_eq!(changeset.tags.len(), 1);
                assert_eq!(changeset.tags[0].value, "small fixes");
                assert_eq!(changeset.discussion.len(), 2);
                assert_eq!(changeset.discussion[0].user, "alice");
                assert_eq!(changeset.discussion[0].text, "looks good");
                assert_eq!(changeset.discussion[1].uid, 7);
                assert_eq!(changeset.discussion[1].text, "thanks");
            }
            other => panic!("expected changeset, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_text_skips_nested_markup() {
        let xml = r#"<osm version="0.6">
            <changeset id="8">
                <discussion>
                    <comment uid="1" user="alice">
                        <text>hello<b>world</b>more</text>
                    </comment>
                </discussion>
            </changeset>
        </osm>"#;
        let elements = read_all(xml, ReadTypes::CHANGESET).unwrap();

        match &elements[0] {
            Element::Changeset(changeset) => {
                assert_eq!(changeset.discussion.len(), 1);
                // text inside the nested element is excluded
                assert_eq!(changeset.discussion[0].text, "hellomore");
            }
            other => panic!("expected changeset, got {:?}", other),
        }
    }

    #[test]
    fn test_changeset_without_edits_has_empty_bounds() {
        let xml = r#"<osm version="0.6"><changeset id="3" open="true"/></osm>"#;
        let elements = read_all(xml, ReadTypes::CHANGESET).unwrap();

        match &elements[0] {
            Element::Changeset(changeset) => {
                assert!(changeset.open);
                assert!(changeset.bounds.is_empty());
                assert!(changeset.discussion.is_empty());
            }
            other => panic!("expected changeset, got {:?}", other),
        }
    }

    #[test]
    fn test_member_missing_ref_after_good_element() {
        let xml = r#"<osm version="0.6"><node id="1"/><relation id="2"><member type="n" role=""/></relation></osm>"#;
        let mut reader = IterableReader::new(XmlReader::from_buffer(
            xml.as_bytes().to_vec(),
            ReadTypes::ALL,
        ));

        // the committed prefix is still delivered
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.get_meta(), (ElementType::Node, 1));

        let err = reader.next().unwrap().unwrap_err();
        match err {
            Error::Structure(message) => {
                assert_eq!(message, "Missing ref on relation member")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_member_unknown_type() {
        let err = read_all(
            r#"<osm version="0.6"><relation id="2"><member type="x" ref="1"/></relation></osm>"#,
            ReadTypes::ALL,
        )
        .unwrap_err();
        match err {
            Error::Structure(message) => {
                assert_eq!(message, "Unknown type on relation member")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_strict_coordinates_reject_garbage() {
        let err = read_all(
            r#"<osm version="0.6"><node id="1" lat="12.5abc" lon="0"/></osm>"#,
            ReadTypes::NODE,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_lenient_coordinates_accept_garbage() {
        let xml = r#"<osm version="0.6"><node id="1" lat="12.5abc" lon="-3.25xyz"/></osm>"#;
        let mut reader = XmlReader::with_options(
            Box::new(NoDecompressor::from_buffer(xml.as_bytes().to_vec())),
            ReadTypes::NODE,
            ParseOptions {
                lenient_coordinates: true,
            },
        );
        let mut elements = Vec::new();
        reader.read(|element| elements.push(element)).unwrap();

        match &elements[0] {
            Element::Node(node) => {
                assert_eq!(node.location, Location::new(-3.25, 12.5));
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_coordinate_rejected_even_leniently() {
        let xml = r#"<osm version="0.6"><node id="1" lat="" lon="0"/></osm>"#;
        let mut reader = XmlReader::with_options(
            Box::new(NoDecompressor::from_buffer(xml.as_bytes().to_vec())),
            ReadTypes::NODE,
            ParseOptions {
                lenient_coordinates: true,
            },
        );
        let mut elements = Vec::new();
        let err = reader.read(|element| elements.push(element)).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_unknown_elements_and_attributes_ignored() {
        let xml = r#"<osm version="0.6" upload="never">
            <node id="1" garbage="yes">
                <unknown><nested/></unknown>
                <tag k="amenity" v="cafe"/>
            </node>
        </osm>"#;
        let elements = read_all(xml, ReadTypes::NODE).unwrap();

        match &elements[0] {
            Element::Node(node) => {
                assert_eq!(node.tags.len(), 1);
                assert_eq!(node.tags[0].key, "amenity");
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_interleaved_way_children_keep_per_list_order() {
        let xml = r#"<osm version="0.6"><way id="1"><nd ref="1"/><tag k="a" v="1"/><nd ref="2"/><tag k="b" v="2"/></way></osm>"#;
        let elements = read_all(xml, ReadTypes::WAY).unwrap();

        match &elements[0] {
            Element::Way(way) => {
                let ids: Vec<i64> = way.node_refs.iter().map(|r| r.id).collect();
                assert_eq!(ids, vec![1, 2]);
                let keys: Vec<&str> = way.tags.iter().map(|t| t.key.as_str()).collect();
                assert_eq!(keys, vec!["a", "b"]);
            }
            other => panic!("expected way, got {:?}", other),
        }
    }

    #[test]
    fn test_document_order_preserved() {
        let xml = r#"<osm version="0.6"><node id="1"/><node id="2"/><way id="3"/><node id="4"/><relation id="5"/></osm>"#;
        let elements = read_all(xml, ReadTypes::ALL).unwrap();
        let ids: Vec<i64> = elements.iter().map(|e| e.get_meta().1).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_xml_error_carries_position() {
        let xml = "<osm version=\"0.6\">\n<node id=\"1\">\n</way>\n</osm>";
        let err = read_all(xml, ReadTypes::ALL).unwrap_err();
        match err {
            Error::Xml { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_gzip_source() -> anyhow::Result<()> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let xml = br#"<osm version="0.6"><node id="11" lat="1" lon="2"/></osm>"#;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml)?;
        let compressed = encoder.finish()?;

        let mut reader = XmlReader::new(
            Box::new(GzipDecompressor::from_buffer(compressed)),
            ReadTypes::NODE,
        );
        let mut elements = Vec::new();
        reader.read(|element| elements.push(element))?;

        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].get_meta(), (ElementType::Node, 11));
        Ok(())
    }

    #[test]
    fn test_iterable_reader_drains_everything() {
        let xml = r#"<osm version="0.6"><node id="1"/><way id="2"/></osm>"#;
        let reader = IterableReader::new(XmlReader::from_buffer(
            xml.as_bytes().to_vec(),
            ReadTypes::ALL,
        ));
        let ids: Vec<i64> = reader.map(|e| e.unwrap().get_meta().1).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_dropping_reader_stops_pipeline() {
        // enough elements that the parser is likely still running when the
        // reader goes away
        let mut xml = String::from(r#"<osm version="0.6">"#);
        for id in 0..10_000 {
            xml.push_str(&format!(r#"<node id="{}" lat="1" lon="2"/>"#, id));
        }
        xml.push_str("</osm>");

        let reader = XmlReader::from_buffer(xml.into_bytes(), ReadTypes::NODE);
        let _ = reader.header();
        drop(reader);
        // both threads notice the disconnect and exit; nothing to assert
        // beyond not hanging
    }

    #[test]
    fn test_comment_text_outside_discussion_is_dropped() {
        let xml = r#"<osm version="0.6"><node id="1">stray text</node></osm>"#;
        let elements = read_all(xml, ReadTypes::NODE).unwrap();
        assert_eq!(elements.len(), 1);
    }
}
