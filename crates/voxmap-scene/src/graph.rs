//! Scene graph interface and the in-memory scene tree.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;
use voxmap_tile::{Tile, TileAddress};

use crate::{ClickEvent, Clickable, Propagation};

/// Handle to a node in a scene graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// The scene operations the tile manager depends on.
///
/// Implementations must only be touched from the thread that owns the
/// manager.
pub trait SceneGraph {
    /// Attach a tile's geometry and return the node holding it.
    fn attach(&mut self, tile: &Arc<Tile>) -> NodeId;

    /// Detach a node previously returned by [`attach`](Self::attach).
    /// Returns `false` if the node was not attached.
    fn detach(&mut self, node: NodeId) -> bool;
}

/// What a scene node holds.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Group(String),
    Tile(Arc<Tile>),
}

/// A node in a [`SceneTree`].
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

/// In-memory scene tree used for headless runs and tests.
///
/// Tiles are attached under a dedicated `tiles` group below the root. Click
/// handlers live beside the nodes rather than on them, and clicks bubble up
/// the parent chain.
pub struct SceneTree {
    nodes: FxHashMap<NodeId, SceneNode>,
    handlers: FxHashMap<NodeId, Box<dyn Clickable>>,
    root: NodeId,
    tiles_group: NodeId,
    next_id: u64,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    /// Create a tree with a root and an empty `tiles` group.
    pub fn new() -> Self {
        let root = NodeId(0);
        let tiles_group = NodeId(1);
        let mut nodes = FxHashMap::default();
        nodes.insert(
            root,
            SceneNode {
                parent: None,
                children: vec![tiles_group],
                kind: NodeKind::Group("root".to_string()),
            },
        );
        nodes.insert(
            tiles_group,
            SceneNode {
                parent: Some(root),
                children: Vec::new(),
                kind: NodeKind::Group("tiles".to_string()),
            },
        );
        Self {
            nodes,
            handlers: FxHashMap::default(),
            root,
            tiles_group,
            next_id: 2,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Group that attached tiles are parented to.
    pub fn tiles_group(&self) -> NodeId {
        self.tiles_group
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Parent of `id`, `None` for the root or an unknown node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Tile held by `id`, if it is a tile node.
    pub fn tile(&self, id: NodeId) -> Option<&Arc<Tile>> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Tile(tile) => Some(tile),
            NodeKind::Group(_) => None,
        }
    }

    /// Add an empty group below `parent`. Returns `None` if `parent` is unknown.
    pub fn add_group(&mut self, parent: NodeId, name: impl Into<String>) -> Option<NodeId> {
        self.insert(parent, NodeKind::Group(name.into()))
    }

    /// Remove `id` and its subtree, dropping their click handlers.
    /// The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(node) = self.nodes.remove(&id) else {
            return false;
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|&c| c != id);
        }
        self.handlers.remove(&id);
        let mut pending = node.children;
        while let Some(child) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&child) {
                pending.extend(removed.children);
            }
            self.handlers.remove(&child);
        }
        true
    }

    /// Addresses of all tiles currently in the tree.
    pub fn attached_tiles(&self) -> impl Iterator<Item = &TileAddress> + '_ {
        self.nodes.values().filter_map(|n| match &n.kind {
            NodeKind::Tile(tile) => Some(&tile.address),
            NodeKind::Group(_) => None,
        })
    }

    /// Number of tile nodes in the tree.
    pub fn tile_count(&self) -> usize {
        self.attached_tiles().count()
    }

    /// `id` followed by each of its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = self.nodes.contains_key(&id).then_some(id);
        std::iter::successors(start, move |&n| self.parent(n))
    }

    /// Register a click handler on `id`, replacing any previous one.
    pub fn set_click_handler(&mut self, id: NodeId, handler: impl Clickable + 'static) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.handlers.insert(id, Box::new(handler));
        true
    }

    pub fn clear_click_handler(&mut self, id: NodeId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Deliver `event` to its target and then each ancestor in turn.
    ///
    /// Returns the node whose handler stopped propagation, if any.
    pub fn dispatch_click(&mut self, event: ClickEvent) -> Option<NodeId> {
        let chain: Vec<NodeId> = self.ancestors(event.target).collect();
        for node in chain {
            if let Some(handler) = self.handlers.get_mut(&node)
                && handler.on_click(&event, node) == Propagation::Stop
            {
                trace!(target_node = event.target.0, stopped_at = node.0, "click handled");
                return Some(node);
            }
        }
        None
    }

    fn insert(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        let id = NodeId(self.next_id);
        self.nodes.get_mut(&parent)?.children.push(id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            SceneNode {
                parent: Some(parent),
                children: Vec::new(),
                kind,
            },
        );
        Some(id)
    }
}

impl SceneGraph for SceneTree {
    fn attach(&mut self, tile: &Arc<Tile>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            SceneNode {
                parent: Some(self.tiles_group),
                children: Vec::new(),
                kind: NodeKind::Tile(Arc::clone(tile)),
            },
        );
        if let Some(group) = self.nodes.get_mut(&self.tiles_group) {
            group.children.push(id);
        }
        trace!(tile = %tile.address, node = id.0, "attached tile");
        id
    }

    fn detach(&mut self, node: NodeId) -> bool {
        if self.tile(node).is_none() {
            return false;
        }
        self.remove(node)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec3;
    use voxmap_tile::{TileGeometry, TileGrid};

    use super::*;

    fn tile(x: i32) -> Arc<Tile> {
        let address = TileAddress::new("overworld", 0, x, 0);
        let bounds = TileGrid::default().bounds(&address);
        Arc::new(Tile::new(address, TileGeometry::default(), bounds))
    }

    #[test]
    fn test_attach_and_detach_tiles() {
        let mut scene = SceneTree::new();
        let a = scene.attach(&tile(1));
        let b = scene.attach(&tile(2));
        assert_eq!(scene.tile_count(), 2);
        assert_eq!(scene.parent(a), Some(scene.tiles_group()));

        assert!(scene.detach(a));
        assert!(!scene.detach(a));
        assert_eq!(scene.tile_count(), 1);
        assert_eq!(
            scene.attached_tiles().collect::<Vec<_>>(),
            vec![&TileAddress::new("overworld", 0, 2, 0)]
        );
        assert_eq!(scene.tile(b).map(|t| t.address.x), Some(2));
    }

    #[test]
    fn test_detach_ignores_group_nodes() {
        let mut scene = SceneTree::new();
        let group = scene.tiles_group();
        assert!(!scene.detach(group));
        assert!(!scene.detach(scene.root()));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut scene = SceneTree::new();
        let markers = scene.add_group(scene.root(), "markers").unwrap();
        let poi = scene.add_group(markers, "poi").unwrap();
        assert!(scene.set_click_handler(poi, |_: &ClickEvent, _: NodeId| Propagation::Stop));

        assert!(scene.remove(markers));
        assert!(scene.node(poi).is_none());
        assert!(!scene.clear_click_handler(poi));
        assert!(!scene.remove(scene.root()));
    }

    #[test]
    fn test_click_bubbles_to_ancestors_until_stopped() {
        let mut scene = SceneTree::new();
        let markers = scene.add_group(scene.root(), "markers").unwrap();
        let poi = scene.add_group(markers, "poi").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        scene.set_click_handler(poi, move |_: &ClickEvent, node: NodeId| {
            log.borrow_mut().push(node);
            Propagation::Continue
        });
        let log = Rc::clone(&seen);
        scene.set_click_handler(markers, move |_: &ClickEvent, node: NodeId| {
            log.borrow_mut().push(node);
            Propagation::Stop
        });
        let log = Rc::clone(&seen);
        let root = scene.root();
        scene.set_click_handler(root, move |_: &ClickEvent, node: NodeId| {
            log.borrow_mut().push(node);
            Propagation::Stop
        });

        let stopped = scene.dispatch_click(ClickEvent {
            target: poi,
            position: Vec3::ZERO,
        });
        assert_eq!(stopped, Some(markers));
        assert_eq!(*seen.borrow(), vec![poi, markers]);
    }

    #[test]
    fn test_unhandled_click_reaches_root() {
        let mut scene = SceneTree::new();
        let node = scene.attach(&tile(0));
        assert_eq!(
            scene.ancestors(node).collect::<Vec<_>>(),
            vec![node, scene.tiles_group(), scene.root()]
        );
        let result = scene.dispatch_click(ClickEvent {
            target: node,
            position: Vec3::ZERO,
        });
        assert_eq!(result, None);
    }
}
