//! Element builders used by the parser.
//!
//! A builder lives exactly for one element's open/close bracket. Ways,
//! relations, and changesets hold a single active sub-list at a time;
//! starting a different kind of child finalises the previous list by
//! moving it into the element, so interleaved runs accumulate per list in
//! document order.

use std::mem;

use crate::models::{
    Changeset, ChangesetComment, ElementBase, Location, Node, NodeRef, Relation, RelationMember,
    Tag, Way,
};

pub(crate) struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub(crate) fn new(base: ElementBase, location: Location) -> Self {
        let mut node = Node::from(base);
        node.location = location;
        Self { node }
    }

    pub(crate) fn add_tag(&mut self, tag: Tag) {
        self.node.tags.push(tag);
    }

    pub(crate) fn finish(self) -> Node {
        self.node
    }
}

enum WayList {
    None,
    Tags(Vec<Tag>),
    NodeRefs(Vec<NodeRef>),
}

pub(crate) struct WayBuilder {
    way: Way,
    current: WayList,
}

impl WayBuilder {
    pub(crate) fn new(base: ElementBase) -> Self {
        Self {
            way: Way::from(base),
            current: WayList::None,
        }
    }

    pub(crate) fn add_tag(&mut self, tag: Tag) {
        if !matches!(self.current, WayList::Tags(_)) {
            self.finalize_current();
            self.current = WayList::Tags(Vec::new());
        }
        if let WayList::Tags(tags) = &mut self.current {
            tags.push(tag);
        }
    }

    pub(crate) fn add_node_ref(&mut self, node_ref: NodeRef) {
        if !matches!(self.current, WayList::NodeRefs(_)) {
            self.finalize_current();
            self.current = WayList::NodeRefs(Vec::new());
        }
        if let WayList::NodeRefs(refs) = &mut self.current {
            refs.push(node_ref);
        }
    }

    fn finalize_current(&mut self) {
        match mem::replace(&mut self.current, WayList::None) {
            WayList::Tags(tags) => self.way.tags.extend(tags),
            WayList::NodeRefs(refs) => self.way.node_refs.extend(refs),
            WayList::None => {}
        }
    }

    pub(crate) fn finish(mut self) -> Way {
        self.finalize_current();
        self.way
    }
}

enum RelationList {
    None,
    Tags(Vec<Tag>),
    Members(Vec<RelationMember>),
}

pub(crate) struct RelationBuilder {
    relation: Relation,
    current: RelationList,
}

impl RelationBuilder {
    pub(crate) fn new(base: ElementBase) -> Self {
        Self {
            relation: Relation::from(base),
            current: RelationList::None,
        }
    }

    pub(crate) fn add_tag(&mut self, tag: Tag) {
        if !matches!(self.current, RelationList::Tags(_)) {
            self.finalize_current();
            self.current = RelationList::Tags(Vec::new());
        }
        if let RelationList::Tags(tags) = &mut self.current {
            tags.push(tag);
        }
    }

    pub(crate) fn add_member(&mut self, member: RelationMember) {
        if !matches!(self.current, RelationList::Members(_)) {
            self.finalize_current();
            self.current = RelationList::Members(Vec::new());
        }
        if let RelationList::Members(members) = &mut self.current {
            members.push(member);
        }
    }

    fn finalize_current(&mut self) {
        match mem::replace(&mut self.current, RelationList::None) {
            RelationList::Tags(tags) => self.relation.tags.extend(tags),
            RelationList::Members(members) => self.relation.members.extend(members),
            RelationList::None => {}
        }
    }

    pub(crate) fn finish(mut self) -> Relation {
        self.finalize_current();
        self.relation
    }
}

pub(crate) struct DiscussionBuilder {
    comments: Vec<ChangesetComment>,
    current: Option<ChangesetComment>,
}

impl DiscussionBuilder {
    fn new() -> Self {
        Self {
            comments: Vec::new(),
            current: None,
        }
    }

    /// Opens a new comment, finalising the previous one.
    fn add_comment(&mut self, comment: ChangesetComment) {
        self.close_comment();
        self.current = Some(comment);
    }

    fn set_comment_text(&mut self, text: String) {
        if let Some(comment) = &mut self.current {
            comment.text = text;
        }
    }

    fn close_comment(&mut self) {
        if let Some(comment) = self.current.take() {
            self.comments.push(comment);
        }
    }

    fn finish(mut self) -> Vec<ChangesetComment> {
        self.close_comment();
        self.comments
    }
}

enum ChangesetList {
    None,
    Tags(Vec<Tag>),
    Discussion(DiscussionBuilder),
}

pub(crate) struct ChangesetBuilder {
    changeset: Changeset,
    current: ChangesetList,
}

impl ChangesetBuilder {
    pub(crate) fn new(changeset: Changeset) -> Self {
        Self {
            changeset,
            current: ChangesetList::None,
        }
    }

    pub(crate) fn add_tag(&mut self, tag: Tag) {
        if !matches!(self.current, ChangesetList::Tags(_)) {
            self.finalize_current();
            self.current = ChangesetList::Tags(Vec::new());
        }
        if let ChangesetList::Tags(tags) = &mut self.current {
            tags.push(tag);
        }
    }

    pub(crate) fn begin_discussion(&mut self) {
        if !matches!(self.current, ChangesetList::Discussion(_)) {
            self.finalize_current();
            self.current = ChangesetList::Discussion(DiscussionBuilder::new());
        }
    }

    pub(crate) fn add_comment(&mut self, comment: ChangesetComment) {
        self.begin_discussion();
        if let ChangesetList::Discussion(discussion) = &mut self.current {
            discussion.add_comment(comment);
        }
    }

    pub(crate) fn set_comment_text(&mut self, text: String) {
        if let ChangesetList::Discussion(discussion) = &mut self.current {
            discussion.set_comment_text(text);
        }
    }

    fn finalize_current(&mut self) {
        match mem::replace(&mut self.current, ChangesetList::None) {
            ChangesetList::Tags(tags) => self.changeset.tags.extend(tags),
            ChangesetList::Discussion(discussion) => {
                self.changeset.discussion.extend(discussion.finish())
            }
            ChangesetList::None => {}
        }
    }

    pub(crate) fn finish(mut self) -> Changeset {
        self.finalize_current();
        self.changeset
    }
}
