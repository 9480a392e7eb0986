use glam::Vec3;

use crate::NodeId;

/// A pointer click on a scene node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClickEvent {
    /// Node that was hit.
    pub target: NodeId,
    /// World-space hit position.
    pub position: Vec3,
}

/// Whether a click keeps bubbling to the parent node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

/// Capability of a scene node to react to clicks.
///
/// Handlers are registered per node on [`SceneTree`](crate::SceneTree) and
/// invoked from the hit node up through its ancestors until one returns
/// [`Propagation::Stop`].
pub trait Clickable {
    /// Handle `event` while it bubbles through `current`.
    fn on_click(&mut self, event: &ClickEvent, current: NodeId) -> Propagation;
}

impl<F> Clickable for F
where
    F: FnMut(&ClickEvent, NodeId) -> Propagation,
{
    fn on_click(&mut self, event: &ClickEvent, current: NodeId) -> Propagation {
        self(event, current)
    }
}
