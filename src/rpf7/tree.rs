use bstr::{BStr, BString};
use core::iter::successors;
use std::path::{Path, PathBuf};

/// Index of a node within the tree's arena.
///
/// Nodes are never removed, so an id stays valid for the life of the tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[must_use]
    fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) struct Node {
    pub(crate) name: BString,
    #[allow(dead_code)]
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) children_count: u32,
    /// Index of the flat entry record this node maps to.
    pub(crate) entry: Option<usize>,
    /// Full archive path, set on nodes added as entries.
    pub(crate) archive_path: BString,
    /// Host file backing this node's payload.
    pub(crate) source_path: PathBuf,
}

impl Node {
    fn new(name: BString, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            first_child: None,
            next_sibling: None,
            children_count: 0,
            entry: None,
            archive_path: BString::default(),
            source_path: PathBuf::default(),
        }
    }
}

/// An n-ary tree of archive entries with ordered sibling lists, backed by an
/// arena so nodes can hold links without self-referential borrows.
pub(crate) struct EntryTree {
    nodes: Vec<Node>,
}

impl EntryTree {
    pub(crate) const ROOT: NodeId = NodeId(0);

    #[must_use]
    pub(crate) fn new() -> Self {
        // the root directory is anonymous
        Self {
            nodes: vec![Node::new(BString::default(), None)],
        }
    }

    #[must_use]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Walks `parent`'s sibling list for a child with the given name.
    #[must_use]
    pub(crate) fn find(&self, parent: NodeId, name: &BStr) -> Option<NodeId> {
        self.children(parent).find(|&id| self.node(id).name == name)
    }

    /// Appends a new child to the end of `parent`'s sibling list.
    pub(crate) fn add(&mut self, parent: NodeId, name: &BStr) -> NodeId {
        #[allow(clippy::cast_possible_truncation)]
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(name.into(), Some(parent)));

        match self.last_child(parent) {
            Some(last) => self.node_mut(last).next_sibling = Some(id),
            None => self.node_mut(parent).first_child = Some(id),
        }
        self.node_mut(parent).children_count += 1;
        id
    }

    pub(crate) fn children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        successors(self.node(parent).first_child, move |&id| {
            self.node(id).next_sibling
        })
    }

    /// Children reordered lexicographically by name, for serialization.
    #[must_use]
    pub(crate) fn sorted_children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self.children(parent).collect();
        children.sort_by(|&lhs, &rhs| self.node(lhs).name.cmp(&self.node(rhs).name));
        children
    }

    #[must_use]
    fn last_child(&self, parent: NodeId) -> Option<NodeId> {
        self.children(parent).last()
    }

    /// The root plus every descendant, counted in preorder.
    #[must_use]
    pub(crate) fn total_count(&self) -> u64 {
        let mut count = 0u64;
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.children(id));
        }
        count
    }

    /// Walks `archive_path` from the root, creating intermediate nodes, and
    /// records the archive and host paths on the final node.
    pub(crate) fn add_path(&mut self, archive_path: &BStr, source_path: &Path) -> NodeId {
        let mut current = Self::ROOT;
        for component in archive_path.split(|&byte| byte == b'/') {
            if component.is_empty() {
                continue;
            }
            let component = <&BStr>::from(component);
            current = match self.find(current, component) {
                Some(existing) => existing,
                None => self.add(current, component),
            };
        }

        let leaf = self.node_mut(current);
        leaf.archive_path = archive_path.into();
        leaf.source_path = source_path.to_path_buf();
        current
    }
}

#[cfg(test)]
mod tests {
    use super::EntryTree;
    use bstr::{BStr, ByteSlice as _};
    use std::path::Path;

    #[test]
    fn empty_tree_is_just_the_root() {
        let tree = EntryTree::new();
        assert_eq!(tree.total_count(), 1);
        assert!(tree.node(EntryTree::ROOT).name.is_empty());
        assert_eq!(tree.node(EntryTree::ROOT).children_count, 0);
    }

    #[test]
    fn siblings_keep_insertion_order() {
        let mut tree = EntryTree::new();
        let b = tree.add(EntryTree::ROOT, b"b".as_bstr());
        let a = tree.add(EntryTree::ROOT, b"a".as_bstr());
        let c = tree.add(EntryTree::ROOT, b"c".as_bstr());

        let order: Vec<_> = tree.children(EntryTree::ROOT).collect();
        assert_eq!(order, [b, a, c]);
        assert_eq!(tree.sorted_children(EntryTree::ROOT), [a, b, c]);
        assert_eq!(tree.node(EntryTree::ROOT).children_count, 3);

        assert_eq!(tree.find(EntryTree::ROOT, b"a".as_bstr()), Some(a));
        assert_eq!(tree.find(EntryTree::ROOT, b"missing".as_bstr()), None);
    }

    #[test]
    fn add_path_creates_intermediate_directories() {
        let mut tree = EntryTree::new();
        let leaf = tree.add_path(
            b"/common/data/levels.meta".as_bstr(),
            Path::new("host/levels.meta"),
        );

        let common = tree.find(EntryTree::ROOT, b"common".as_bstr()).unwrap();
        let data = tree.find(common, b"data".as_bstr()).unwrap();
        assert_eq!(tree.find(data, b"levels.meta".as_bstr()), Some(leaf));

        assert_eq!(
            tree.node(leaf).archive_path,
            <&BStr>::from(b"/common/data/levels.meta".as_slice())
        );
        assert_eq!(tree.node(leaf).source_path, Path::new("host/levels.meta"));
        assert!(tree.node(common).archive_path.is_empty());
    }

    #[test]
    fn add_path_reuses_existing_directories() {
        let mut tree = EntryTree::new();
        tree.add_path(b"/data/a.txt".as_bstr(), Path::new("a"));
        tree.add_path(b"/data/b.txt".as_bstr(), Path::new("b"));

        let data = tree.find(EntryTree::ROOT, b"data".as_bstr()).unwrap();
        assert_eq!(tree.node(EntryTree::ROOT).children_count, 1);
        assert_eq!(tree.node(data).children_count, 2);
        assert_eq!(tree.total_count(), 4);
    }

    #[test]
    fn deep_chains_are_fully_counted() {
        // every level of a deep tree contributes to the total
        let mut tree = EntryTree::new();
        tree.add_path(b"/a/b/c/d/e.txt".as_bstr(), Path::new("e"));
        assert_eq!(tree.total_count(), 6);

        tree.add_path(b"/a/b/x/y/z.txt".as_bstr(), Path::new("z"));
        assert_eq!(tree.total_count(), 9);
    }
}
