use std::borrow::Cow;
use std::io::BufReader;
use std::mem;
use std::sync::mpsc::{Receiver, SyncSender};

use chrono::{DateTime, Utc};
use log::{debug, trace};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::batch::{Batch, OutputItem};
use super::builders::{ChangesetBuilder, NodeBuilder, RelationBuilder, WayBuilder};
use super::header::{Header, HeaderFuture};
use super::stream::ChunkSource;
use crate::error::{Error, Result};
use crate::models::{
    Bound, Changeset, ChangesetComment, Element, ElementBase, ElementType, Location, NodeRef,
    OsmUser, ReadTypes, RelationMember, Tag,
};

/// Knobs for the XML parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Accept trailing garbage after `lon`/`lat`-family attribute values,
    /// matching what C readers built on `atof` used to do. Off by default;
    /// the empty string is rejected either way.
    pub lenient_coordinates: bool,
}

/// Where in the document grammar the parser currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Root,
    Top,
    Node,
    Way,
    Relation,
    Changeset,
    Discussion,
    Comment,
    CommentText,
    IgnoredNode,
    IgnoredWay,
    IgnoredRelation,
    IgnoredChangeset,
    InObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Cancelled,
}

pub(crate) struct XmlParser {
    context: Context,
    last_context: Context,
    in_delete_section: bool,
    header: Header,
    header_future: HeaderFuture,
    header_done: bool,
    batch: Batch,
    read_types: ReadTypes,
    options: ParseOptions,
    node_builder: Option<NodeBuilder>,
    way_builder: Option<WayBuilder>,
    relation_builder: Option<RelationBuilder>,
    changeset_builder: Option<ChangesetBuilder>,
    comment_text: String,
    output: SyncSender<OutputItem>,
}

impl XmlParser {
    pub(crate) fn new(
        read_types: ReadTypes,
        options: ParseOptions,
        header_future: HeaderFuture,
        output: SyncSender<OutputItem>,
    ) -> Self {
        Self {
            context: Context::Root,
            last_context: Context::Root,
            in_delete_section: false,
            header: Header::default(),
            header_future,
            header_done: false,
            batch: Batch::new(),
            read_types,
            options,
            node_builder: None,
            way_builder: None,
            relation_builder: None,
            changeset_builder: None,
            comment_text: String::new(),
            output,
        }
    }

    /// Drives the event loop until end of input, cancellation, or the
    /// first fatal error. The committed batch is left in place so the
    /// caller can flush it in every outcome.
    pub(crate) fn run(&mut self, input: Receiver<std::io::Result<Vec<u8>>>) -> Result<()> {
        let source = ChunkSource::new(input);
        let mut reader = Reader::from_reader(BufReader::new(source));
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let flow = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    self.start_element(&e)?;
                    Flow::Continue
                }
                Ok(Event::Empty(e)) => {
                    self.start_element(&e)?;
                    self.end_element(e.name().as_ref())?
                }
                Ok(Event::End(e)) => self.end_element(e.name().as_ref())?,
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|err| xml_error(&reader, err))?;
                    self.characters(&text);
                    Flow::Continue
                }
                Ok(Event::CData(t)) => {
                    self.characters(&String::from_utf8_lossy(&t.into_inner()));
                    Flow::Continue
                }
                Ok(Event::Decl(_))
                | Ok(Event::Comment(_))
                | Ok(Event::PI(_))
                | Ok(Event::DocType(_)) => Flow::Continue,
                Ok(Event::Eof) => break,
                Err(err) => return Err(xml_error(&reader, err)),
            };
            if flow == Flow::Cancelled {
                return Ok(());
            }
            if self.header_done && self.read_types.is_nothing() {
                debug!("nothing to read, stopping after header");
                break;
            }
        }
        Ok(())
    }

    fn start_element(&mut self, e: &BytesStart) -> Result<()> {
        let name = e.name();
        let name = name.as_ref();
        match self.context {
            Context::Root => {
                if name == b"osm" || name == b"osmChange" {
                    if name == b"osmChange" {
                        self.header.set_has_multiple_object_versions(true);
                    }
                    for attr in e.attributes() {
                        let attr = attr.map_err(attr_error)?;
                        let value = attr_value(&attr)?;
                        match attr.key.as_ref() {
                            b"version" => {
                                self.header.set("version", &value);
                                if value.as_ref() != "0.6" {
                                    return Err(Error::UnsupportedFormatVersion {
                                        version: value.into_owned(),
                                    });
                                }
                            }
                            b"generator" => self.header.set("generator", &value),
                            _ => {}
                        }
                    }
                    if self.header.get("version").is_none() {
                        return Err(Error::MissingFormatVersion);
                    }
                    self.context = Context::Top;
                } else {
                    return Err(Error::xml(
                        0,
                        0,
                        format!(
                            "Unknown top-level element: {}",
                            String::from_utf8_lossy(name)
                        ),
                    ));
                }
            }
            Context::Top => match name {
                b"node" => {
                    self.publish_header();
                    if self.read_types.contains(&ElementType::Node) {
                        let (base, location) = self.init_element(e)?;
                        self.node_builder = Some(NodeBuilder::new(base, location));
                        self.context = Context::Node;
                    } else {
                        self.context = Context::IgnoredNode;
                    }
                }
                b"way" => {
                    self.publish_header();
                    if self.read_types.contains(&ElementType::Way) {
                        let (base, _) = self.init_element(e)?;
                        self.way_builder = Some(WayBuilder::new(base));
                        self.context = Context::Way;
                    } else {
                        self.context = Context::IgnoredWay;
                    }
                }
                b"relation" => {
                    self.publish_header();
                    if self.read_types.contains(&ElementType::Relation) {
                        let (base, _) = self.init_element(e)?;
                        self.relation_builder = Some(RelationBuilder::new(base));
                        self.context = Context::Relation;
                    } else {
                        self.context = Context::IgnoredRelation;
                    }
                }
                b"changeset" => {
                    self.publish_header();
                    if self.read_types.contains(&ElementType::Changeset) {
                        let changeset = self.init_changeset(e)?;
                        self.changeset_builder = Some(ChangesetBuilder::new(changeset));
                        self.context = Context::Changeset;
                    } else {
                        self.context = Context::IgnoredChangeset;
                    }
                }
                b"bounds" => {
                    let mut min = Location::undefined();
                    let mut max = Location::undefined();
                    for attr in e.attributes() {
                        let attr = attr.map_err(attr_error)?;
                        let value = attr_value(&attr)?;
                        match attr.key.as_ref() {
                            b"minlon" => min.set_lon(self.parse_coordinate(&value, "minlon")?),
                            b"minlat" => min.set_lat(self.parse_coordinate(&value, "minlat")?),
                            b"maxlon" => max.set_lon(self.parse_coordinate(&value, "maxlon")?),
                            b"maxlat" => max.set_lat(self.parse_coordinate(&value, "maxlat")?),
                            _ => {}
                        }
                    }
                    let mut bound = Bound::default();
                    bound.extend(min);
                    bound.extend(max);
                    self.header.add_box(bound);
                }
                b"delete" => self.in_delete_section = true,
                // create/modify wrappers and unknown children are skipped;
                // their content is still parsed at this level
                _ => {}
            },
            Context::Node => {
                self.last_context = Context::Node;
                self.context = Context::InObject;
                if name == b"tag" {
                    let tag = parse_tag(e)?;
                    if let Some(builder) = &mut self.node_builder {
                        builder.add_tag(tag);
                    }
                }
            }
            Context::Way => {
                self.last_context = Context::Way;
                self.context = Context::InObject;
                match name {
                    b"nd" => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(attr_error)?;
                            if attr.key.as_ref() == b"ref" {
                                let value = attr_value(&attr)?;
                                let id = parse_i64(&value, "ref")?;
                                if let Some(builder) = &mut self.way_builder {
                                    builder.add_node_ref(NodeRef::new(id));
                                }
                            }
                        }
                    }
                    b"tag" => {
                        let tag = parse_tag(e)?;
                        if let Some(builder) = &mut self.way_builder {
                            builder.add_tag(tag);
                        }
                    }
                    _ => {}
                }
            }
            Context::Relation => {
                self.last_context = Context::Relation;
                self.context = Context::InObject;
                match name {
                    b"member" => {
                        let mut member_type: Option<ElementType> = None;
                        let mut member_id: i64 = 0;
                        let mut role = String::new();
                        for attr in e.attributes() {
                            let attr = attr.map_err(attr_error)?;
                            let value = attr_value(&attr)?;
                            match attr.key.as_ref() {
                                b"type" => {
                                    member_type = match value.as_bytes().first() {
                                        Some(b'n') => Some(ElementType::Node),
                                        Some(b'w') => Some(ElementType::Way),
                                        Some(b'r') => Some(ElementType::Relation),
                                        _ => None,
                                    }
                                }
                                b"ref" => member_id = parse_i64(&value, "ref")?,
                                b"role" => role = value.into_owned(),
                                _ => {}
                            }
                        }
                        let member_type = member_type
                            .ok_or_else(|| Error::structure("Unknown type on relation member"))?;
                        if member_id == 0 {
                            return Err(Error::structure("Missing ref on relation member"));
                        }
                        if let Some(builder) = &mut self.relation_builder {
                            builder.add_member(RelationMember {
                                member_id,
                                member_type,
                                role,
                            });
                        }
                    }
                    b"tag" => {
                        let tag = parse_tag(e)?;
                        if let Some(builder) = &mut self.relation_builder {
                            builder.add_tag(tag);
                        }
                    }
                    _ => {}
                }
            }
            Context::Changeset => {
                self.last_context = Context::Changeset;
                match name {
                    b"discussion" => {
                        self.context = Context::Discussion;
                        if let Some(builder) = &mut self.changeset_builder {
                            builder.begin_discussion();
                        }
                    }
                    b"tag" => {
                        self.context = Context::InObject;
                        let tag = parse_tag(e)?;
                        if let Some(builder) = &mut self.changeset_builder {
                            builder.add_tag(tag);
                        }
                    }
                    _ => self.context = Context::InObject,
                }
            }
            Context::Discussion => {
                if name == b"comment" {
                    self.context = Context::Comment;
                    let mut comment = ChangesetComment::default();
                    for attr in e.attributes() {
                        let attr = attr.map_err(attr_error)?;
                        let value = attr_value(&attr)?;
                        match attr.key.as_ref() {
                            b"date" => comment.date = parse_timestamp(&value),
                            b"uid" => comment.uid = parse_i32(&value, "uid")?,
                            b"user" => comment.user = value.into_owned(),
                            _ => {}
                        }
                    }
                    if let Some(builder) = &mut self.changeset_builder {
                        builder.add_comment(comment);
                    }
                }
            }
            Context::Comment => {
                if name == b"text" {
                    self.context = Context::CommentText;
                    self.comment_text.clear();
                }
            }
            // markup nested inside a comment body is skipped; the matching
            // close returns here and accumulation resumes
            Context::CommentText => {
                self.last_context = Context::CommentText;
                self.context = Context::InObject;
            }
            Context::IgnoredNode
            | Context::IgnoredWay
            | Context::IgnoredRelation
            | Context::IgnoredChangeset => {}
            // an element nested deeper than the one-slot return address
            // reaches; it is skipped in place
            Context::InObject => {}
        }
        Ok(())
    }

    fn end_element(&mut self, name: &[u8]) -> Result<Flow> {
        match self.context {
            Context::Root => {}
            Context::Top => {
                if name == b"osm" || name == b"osmChange" {
                    self.publish_header();
                    self.context = Context::Root;
                } else if name == b"delete" {
                    self.in_delete_section = false;
                }
            }
            Context::Node => {
                if name == b"node" {
                    self.context = Context::Top;
                    if let Some(builder) = self.node_builder.take() {
                        return self.commit(Element::Node(builder.finish()));
                    }
                }
            }
            Context::Way => {
                if name == b"way" {
                    self.context = Context::Top;
                    if let Some(builder) = self.way_builder.take() {
                        return self.commit(Element::Way(builder.finish()));
                    }
                }
            }
            Context::Relation => {
                if name == b"relation" {
                    self.context = Context::Top;
                    if let Some(builder) = self.relation_builder.take() {
                        return self.commit(Element::Relation(builder.finish()));
                    }
                }
            }
            Context::Changeset => {
                if name == b"changeset" {
                    self.context = Context::Top;
                    if let Some(builder) = self.changeset_builder.take() {
                        return self.commit(Element::Changeset(builder.finish()));
                    }
                }
            }
            Context::Discussion => {
                if name == b"discussion" {
                    self.context = Context::Changeset;
                }
            }
            Context::Comment => {
                if name == b"comment" {
                    self.context = Context::Discussion;
                }
            }
            Context::CommentText => {
                if name == b"text" {
                    self.context = Context::Comment;
                    let text = mem::take(&mut self.comment_text);
                    if let Some(builder) = &mut self.changeset_builder {
                        builder.set_comment_text(text);
                    }
                }
            }
            Context::InObject => self.context = self.last_context,
            Context::IgnoredNode => {
                if name == b"node" {
                    self.context = Context::Top;
                }
            }
            Context::IgnoredWay => {
                if name == b"way" {
                    self.context = Context::Top;
                }
            }
            Context::IgnoredRelation => {
                if name == b"relation" {
                    self.context = Context::Top;
                }
            }
            Context::IgnoredChangeset => {
                if name == b"changeset" {
                    self.context = Context::Top;
                }
            }
        }
        Ok(Flow::Continue)
    }

    // the comment body is the only text node that matters; everything
    // else goes to the bit bucket. The scratch is reset when a <text>
    // element opens, so skipped nested markup cannot wipe it.
    fn characters(&mut self, text: &str) {
        if self.context == Context::CommentText {
            self.comment_text.push_str(text);
        }
    }

    /// Publishes the header on the first call; later calls are no-ops.
    pub(crate) fn publish_header(&mut self) {
        if !self.header_done {
            self.header_done = true;
            self.header_future.publish(self.header.clone());
            debug!("header published");
        }
    }

    /// Sends whatever has been committed so far. Used at end of input and
    /// before surfacing an error, so consumers always see the well-formed
    /// prefix.
    pub(crate) fn flush_remaining(&mut self) {
        if !self.batch.is_empty() {
            let batch = mem::replace(&mut self.batch, Batch::new());
            let _ = self.output.send(OutputItem::Batch(batch));
        }
    }

    fn commit(&mut self, element: Element) -> Result<Flow> {
        self.batch.commit(element);
        if self.batch.is_full() {
            let full = mem::replace(&mut self.batch, Batch::new());
            trace!(
                "flushing batch with {} elements ({} bytes)",
                full.len(),
                full.committed_bytes()
            );
            if self.output.send(OutputItem::Batch(full)).is_err() {
                // consumer is gone
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Continue)
    }

    fn init_element(&self, e: &BytesStart) -> Result<(ElementBase, Location)> {
        let mut base = ElementBase {
            visible: !self.in_delete_section,
            ..Default::default()
        };
        let mut location = Location::undefined();
        let mut uid: Option<i32> = None;
        let mut user_name: Option<String> = None;
        for attr in e.attributes() {
            let attr = attr.map_err(attr_error)?;
            let value = attr_value(&attr)?;
            match attr.key.as_ref() {
                b"lon" => location.set_lon(self.parse_coordinate(&value, "lon")?),
                b"lat" => location.set_lat(self.parse_coordinate(&value, "lat")?),
                b"id" => base.id = parse_i64(&value, "id")?,
                b"version" => base.version = parse_i32(&value, "version")?,
                b"timestamp" => base.timestamp = parse_timestamp(&value),
                b"changeset" => base.changeset_id = parse_i64(&value, "changeset")?,
                b"uid" => uid = Some(parse_i32(&value, "uid")?),
                b"user" => user_name = Some(value.into_owned()),
                b"visible" => base.visible = parse_bool(&value)?,
                _ => {}
            }
        }
        if uid.is_some() || user_name.is_some() {
            base.user = Some(OsmUser {
                id: uid.unwrap_or(0),
                name: user_name.unwrap_or_default(),
            });
        }
        Ok((base, location))
    }

    fn init_changeset(&self, e: &BytesStart) -> Result<Changeset> {
        let mut changeset = Changeset::default();
        let mut min = Location::undefined();
        let mut max = Location::undefined();
        let mut uid: Option<i32> = None;
        let mut user_name: Option<String> = None;
        for attr in e.attributes() {
            let attr = attr.map_err(attr_error)?;
            let value = attr_value(&attr)?;
            match attr.key.as_ref() {
                b"id" => changeset.id = parse_i64(&value, "id")?,
                b"created_at" => changeset.created_at = parse_timestamp(&value),
                b"closed_at" => changeset.closed_at = parse_timestamp(&value),
                b"open" => changeset.open = parse_bool(&value)?,
                b"num_changes" => changeset.num_changes = parse_i32(&value, "num_changes")?,
                b"comments_count" => {
                    changeset.comments_count = parse_i32(&value, "comments_count")?
                }
                b"min_lon" => min.set_lon(self.parse_coordinate(&value, "min_lon")?),
                b"min_lat" => min.set_lat(self.parse_coordinate(&value, "min_lat")?),
                b"max_lon" => max.set_lon(self.parse_coordinate(&value, "max_lon")?),
                b"max_lat" => max.set_lat(self.parse_coordinate(&value, "max_lat")?),
                b"uid" => uid = Some(parse_i32(&value, "uid")?),
                b"user" => user_name = Some(value.into_owned()),
                _ => {}
            }
        }
        changeset.bounds.extend(min);
        changeset.bounds.extend(max);
        if uid.is_some() || user_name.is_some() {
            changeset.user = Some(OsmUser {
                id: uid.unwrap_or(0),
                name: user_name.unwrap_or_default(),
            });
        }
        Ok(changeset)
    }

    fn parse_coordinate(&self, value: &str, attribute: &str) -> Result<f64> {
        let text = if self.options.lenient_coordinates {
            float_prefix(value)
        } else {
            value
        };
        text.parse::<f64>().map_err(|_| {
            Error::structure(format!(
                "invalid value for attribute {}: '{}'",
                attribute, value
            ))
        })
    }
}

fn xml_error(reader: &Reader<BufReader<ChunkSource>>, err: quick_xml::Error) -> Error {
    match err {
        quick_xml::Error::Io(io_err) => {
            Error::Io(std::io::Error::new(io_err.kind(), io_err.to_string()))
        }
        other => {
            let offset = reader.buffer_position() as u64;
            let (line, column) = reader.get_ref().get_ref().position_at(offset);
            Error::xml(line, column, other.to_string())
        }
    }
}

fn attr_error(err: quick_xml::events::attributes::AttrError) -> Error {
    Error::xml(0, 0, err.to_string())
}

fn attr_value<'a>(attr: &'a Attribute) -> Result<Cow<'a, str>> {
    attr.unescape_value()
        .map_err(|err| Error::xml(0, 0, err.to_string()))
}

fn parse_tag(e: &BytesStart) -> Result<Tag> {
    let mut key = String::new();
    let mut value = String::new();
    for attr in e.attributes() {
        let attr = attr.map_err(attr_error)?;
        let v = attr_value(&attr)?;
        match attr.key.as_ref() {
            b"k" => key = v.into_owned(),
            b"v" => value = v.into_owned(),
            _ => {}
        }
    }
    Ok(Tag { key, value })
}

fn parse_i64(value: &str, attribute: &str) -> Result<i64> {
    value.parse().map_err(|_| {
        Error::structure(format!(
            "invalid value for attribute {}: '{}'",
            attribute, value
        ))
    })
}

fn parse_i32(value: &str, attribute: &str) -> Result<i32> {
    value.parse().map_err(|_| {
        Error::structure(format!(
            "invalid value for attribute {}: '{}'",
            attribute, value
        ))
    })
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::structure(format!(
            "invalid boolean value '{}'",
            value
        ))),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Longest prefix of `value` that looks like a decimal number, the way
/// `atof` would read it. Returns the empty string when there is none.
fn float_prefix(value: &str) -> &str {
    let bytes = value.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        seen_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            seen_digit = true;
        }
    }
    if seen_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        let digits_start = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > digits_start {
            end = exp;
        }
    }
    if seen_digit {
        &value[..end]
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_prefix() {
        assert_eq!(float_prefix("12.5"), "12.5");
        assert_eq!(float_prefix("12.5abc"), "12.5");
        assert_eq!(float_prefix("-7"), "-7");
        assert_eq!(float_prefix("+1.25e3xyz"), "+1.25e3");
        assert_eq!(float_prefix("1e"), "1");
        assert_eq!(float_prefix(""), "");
        assert_eq!(float_prefix("abc"), "");
        assert_eq!(float_prefix("-"), "");
    }

    #[test]
    fn test_parse_bool_rejects_garbage() {
        assert!(parse_bool("true").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(parse_bool("TRUE").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2012-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2012-01-01T00:00:00+00:00");
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn test_strict_integer_parsing() {
        assert_eq!(parse_i64("42", "id").unwrap(), 42);
        assert_eq!(parse_i64("-42", "id").unwrap(), -42);
        assert!(parse_i64("42x", "id").is_err());
        assert!(parse_i64("", "id").is_err());
    }
}
