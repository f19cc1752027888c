use std::fmt;
use std::mem;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fixed-point coordinates are stored as degrees times this factor.
pub const COORDINATE_PRECISION: f64 = 10_000_000.0;

const UNDEFINED_COORDINATE: i32 = i32::MAX;

fn double_to_fix(c: f64) -> i32 {
    (c * COORDINATE_PRECISION).round() as i32
}

fn fix_to_double(c: i32) -> f64 {
    f64::from(c) / COORDINATE_PRECISION
}

fn format_coordinate(value: i32) -> String {
    let formatted = format!("{:.7}", fix_to_double(value));
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_owned()
}

/// A geographic position as a pair of 1e-7 degree fixed-point integers.
///
/// A location where both coordinates equal the sentinel is "undefined" and
/// means the position is unknown. Undefined locations are legal on nodes and
/// way node references.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    x: i32,
    y: i32,
}

impl Location {
    pub const fn undefined() -> Self {
        Self {
            x: UNDEFINED_COORDINATE,
            y: UNDEFINED_COORDINATE,
        }
    }

    pub const fn from_fixed(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            x: double_to_fix(lon),
            y: double_to_fix(lat),
        }
    }

    /// Longitude in fixed-point representation.
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Latitude in fixed-point representation.
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Longitude in degrees. Only meaningful if the location is defined.
    pub fn lon(&self) -> f64 {
        fix_to_double(self.x)
    }

    /// Latitude in degrees. Only meaningful if the location is defined.
    pub fn lat(&self) -> f64 {
        fix_to_double(self.y)
    }

    pub fn set_lon(&mut self, lon: f64) {
        self.x = double_to_fix(lon);
    }

    pub fn set_lat(&mut self, lat: f64) {
        self.y = double_to_fix(lat);
    }

    pub fn is_undefined(&self) -> bool {
        self.x == UNDEFINED_COORDINATE && self.y == UNDEFINED_COORDINATE
    }

    pub fn is_defined(&self) -> bool {
        self.x != UNDEFINED_COORDINATE && self.y != UNDEFINED_COORDINATE
    }

    pub fn is_valid(&self) -> bool {
        self.is_defined()
            && (-1_800_000_000..=1_800_000_000).contains(&self.x)
            && (-900_000_000..=900_000_000).contains(&self.y)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            write!(f, "(undefined)")
        } else {
            write!(
                f,
                "({}, {})",
                format_coordinate(self.x),
                format_coordinate(self.y)
            )
        }
    }
}

/// A reference from a way to a node, with an optionally resolved location.
///
/// Equality and ordering consider the id only; use [`NodeRef::location_eq`]
/// to compare by position instead, for example when deduplicating
/// consecutive points of an extracted geometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: i64,
    pub location: Location,
}

impl NodeRef {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            location: Location::undefined(),
        }
    }

    pub fn with_location(id: i64, location: Location) -> Self {
        Self { id, location }
    }

    pub fn location_eq(&self, other: &NodeRef) -> bool {
        self.location == other.location
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeRef {}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.id, self.location)
    }
}

/// An axis-aligned bounding box built from two corner locations.
///
/// Both corners may be undefined, for example on a changeset without edits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Bound {
    pub min: Location,
    pub max: Location,
}

impl Bound {
    pub fn extend(&mut self, location: Location) -> &mut Self {
        if !location.is_defined() {
            return self;
        }
        if self.is_empty() {
            self.min = location;
            self.max = location;
        } else {
            self.min = Location::from_fixed(
                self.min.x().min(location.x()),
                self.min.y().min(location.y()),
            );
            self.max = Location::from_fixed(
                self.max.x().max(location.x()),
                self.max.y().max(location.y()),
            );
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.min.is_defined() || !self.max.is_defined()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsmUser {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
    Changeset(Changeset),
}

impl Element {
    pub fn get_meta(&self) -> (ElementType, i64) {
        match self {
            Element::Node(e) => (ElementType::Node, e.id),
            Element::Way(e) => (ElementType::Way, e.id),
            Element::Relation(e) => (ElementType::Relation, e.id),
            Element::Changeset(e) => (ElementType::Changeset, e.id),
        }
    }

    /// Approximate memory footprint of this element, counting the struct
    /// itself plus its heap-allocated lists and strings. Used for batch
    /// size accounting.
    pub fn estimated_size(&self) -> usize {
        match self {
            Element::Node(e) => mem::size_of::<Node>() + tags_size(&e.tags) + user_size(&e.user),
            Element::Way(e) => {
                mem::size_of::<Way>()
                    + tags_size(&e.tags)
                    + user_size(&e.user)
                    + e.node_refs.len() * mem::size_of::<NodeRef>()
            }
            Element::Relation(e) => {
                mem::size_of::<Relation>()
                    + tags_size(&e.tags)
                    + user_size(&e.user)
                    + e.members
                        .iter()
                        .map(|m| mem::size_of::<RelationMember>() + m.role.len())
                        .sum::<usize>()
            }
            Element::Changeset(e) => {
                mem::size_of::<Changeset>()
                    + tags_size(&e.tags)
                    + user_size(&e.user)
                    + e.discussion
                        .iter()
                        .map(|c| mem::size_of::<ChangesetComment>() + c.user.len() + c.text.len())
                        .sum::<usize>()
            }
        }
    }
}

fn tags_size(tags: &[Tag]) -> usize {
    tags.iter()
        .map(|t| mem::size_of::<Tag>() + t.key.len() + t.value.len())
        .sum()
}

fn user_size(user: &Option<OsmUser>) -> usize {
    user.as_ref().map_or(0, |u| u.name.len())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Node,
    Way,
    Relation,
    Changeset,
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ElementType::Node),
            "way" => Ok(ElementType::Way),
            "relation" => Ok(ElementType::Relation),
            "changeset" => Ok(ElementType::Changeset),
            _ => Err(Error::structure(format!("Illegal element_type: {}", s))),
        }
    }
}

/// Selects which element kinds a reader materialises. Elements of
/// unselected kinds are parsed and skipped without building anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTypes(u8);

impl ReadTypes {
    pub const NOTHING: ReadTypes = ReadTypes(0);
    pub const NODE: ReadTypes = ReadTypes(0b0001);
    pub const WAY: ReadTypes = ReadTypes(0b0010);
    pub const RELATION: ReadTypes = ReadTypes(0b0100);
    pub const CHANGESET: ReadTypes = ReadTypes(0b1000);
    pub const ALL: ReadTypes = ReadTypes(0b1111);

    pub fn contains(self, element_type: &ElementType) -> bool {
        let bit = match element_type {
            ElementType::Node => ReadTypes::NODE,
            ElementType::Way => ReadTypes::WAY,
            ElementType::Relation => ReadTypes::RELATION,
            ElementType::Changeset => ReadTypes::CHANGESET,
        };
        self.0 & bit.0 != 0
    }

    pub fn is_nothing(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ReadTypes {
    type Output = ReadTypes;

    fn bitor(self, rhs: ReadTypes) -> ReadTypes {
        ReadTypes(self.0 | rhs.0)
    }
}

/// Attributes shared by all element kinds, collected by the parser before
/// it knows the final element shape.
#[derive(Debug, Default)]
pub struct ElementBase {
    pub id: i64,
    pub version: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub user: Option<OsmUser>,
    pub changeset_id: i64,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Node {
    pub id: i64,
    pub version: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub user: Option<OsmUser>,
    pub changeset_id: i64,
    pub location: Location,
    pub visible: bool,
    pub tags: Vec<Tag>,
}

impl From<ElementBase> for Node {
    fn from(el: ElementBase) -> Self {
        Self {
            id: el.id,
            version: el.version,
            timestamp: el.timestamp,
            user: el.user,
            changeset_id: el.changeset_id,
            visible: el.visible,
            location: Location::undefined(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Way {
    pub id: i64,
    pub version: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub user: Option<OsmUser>,
    pub changeset_id: i64,
    pub visible: bool,
    pub tags: Vec<Tag>,
    pub node_refs: Vec<NodeRef>,
}

impl From<ElementBase> for Way {
    fn from(el: ElementBase) -> Self {
        Self {
            id: el.id,
            version: el.version,
            timestamp: el.timestamp,
            user: el.user,
            changeset_id: el.changeset_id,
            visible: el.visible,
            tags: Vec::new(),
            node_refs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Relation {
    pub id: i64,
    pub version: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub user: Option<OsmUser>,
    pub changeset_id: i64,
    pub visible: bool,
    pub tags: Vec<Tag>,
    pub members: Vec<RelationMember>,
}

impl From<ElementBase> for Relation {
    fn from(el: ElementBase) -> Self {
        Self {
            id: el.id,
            version: el.version,
            timestamp: el.timestamp,
            user: el.user,
            changeset_id: el.changeset_id,
            visible: el.visible,
            tags: Vec::new(),
            members: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationMember {
    pub member_id: i64,
    pub member_type: ElementType,
    pub role: String,
}

/// An editing session with optional threaded discussion.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Changeset {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub open: bool,
    pub num_changes: i32,
    pub comments_count: i32,
    pub user: Option<OsmUser>,
    pub bounds: Bound,
    pub tags: Vec<Tag>,
    pub discussion: Vec<ChangesetComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ChangesetComment {
    pub date: Option<DateTime<Utc>>,
    pub uid: i32,
    pub user: String,
    pub text: String,
}

pub trait BasicElement {
    fn get_id(&self) -> i64;
    fn get_version(&self) -> i32;
    fn get_timestamp(&self) -> Option<DateTime<Utc>>;
    fn get_changeset_id(&self) -> i64;
    fn is_visible(&self) -> bool;
    fn get_tags(&self) -> &Vec<Tag>;
    fn get_user(&self) -> Option<&OsmUser>;
}

impl BasicElement for Node {
    fn get_id(&self) -> i64 {
        self.id
    }

    fn get_version(&self) -> i32 {
        self.version
    }

    fn get_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn get_changeset_id(&self) -> i64 {
        self.changeset_id
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn get_tags(&self) -> &Vec<Tag> {
        &self.tags
    }

    fn get_user(&self) -> Option<&OsmUser> {
        self.user.as_ref()
    }
}

impl BasicElement for Way {
    fn get_id(&self) -> i64 {
        self.id
    }

    fn get_version(&self) -> i32 {
        self.version
    }

    fn get_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn get_changeset_id(&self) -> i64 {
        self.changeset_id
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn get_tags(&self) -> &Vec<Tag> {
        &self.tags
    }

    fn get_user(&self) -> Option<&OsmUser> {
        self.user.as_ref()
    }
}

impl BasicElement for Relation {
    fn get_id(&self) -> i64 {
        self.id
    }

    fn get_version(&self) -> i32 {
        self.version
    }

    fn get_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn get_changeset_id(&self) -> i64 {
        self.changeset_id
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn get_tags(&self) -> &Vec<Tag> {
        &self.tags
    }

    fn get_user(&self) -> Option<&OsmUser> {
        self.user.as_ref()
    }
}
