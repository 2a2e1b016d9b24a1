//! Arena-based game-object tree.
//!
//! The scene owns every node; [`NodeId`] is a stable index into the
//! arena. The parent/child relation is bidirectional (a non-owning parent
//! back-reference plus an owned children list) and acyclic: every
//! reparent walks the ancestor chain first and fails with
//! [`SceneError::WouldCreateCycle`], leaving the tree untouched, when the
//! new parent is the node itself or one of its descendants.

use glam::Mat4;
use thiserror::Error;

use crate::transform::Transform;

/// Scene graph errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SceneError {
    /// The node id does not refer to a live node.
    #[error("Node {0:?} is not in the scene")]
    InvalidNode(NodeId),

    /// The requested reparent would make a node its own ancestor.
    #[error("Reparenting {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// The node being reparented.
        child: NodeId,
        /// The rejected new parent.
        parent: NodeId,
    },
}

/// Stable handle to a node in the scene arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Behavior attached to a node.
///
/// Components are owned by their node and dropped with it when the node
/// is removed.
pub trait Component {
    /// Component name, for diagnostics.
    fn name(&self) -> &str;

    /// Per-frame hook, given the owning node's local transform.
    fn update(&mut self, transform: &mut Transform, dt: f32) {
        let _ = (transform, dt);
    }
}

/// One game object in the arena.
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transform: Transform,
    components: Vec<Box<dyn Component>>,
}

/// Hierarchical scene of named nodes with transforms and components.
#[derive(Default)]
pub struct Scene {
    /// Arena slots; `None` marks a removed node.
    nodes: Vec<Option<Node>>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root-level node.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            components: Vec::new(),
        }));
        id
    }

    /// Adds a node as a child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidNode`] when `parent` is not live.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
    ) -> Result<NodeId, SceneError> {
        self.node(parent)?;
        let id = self.add_node(name);
        // Both nodes exist and the new node has no descendants, so this
        // cannot fail.
        self.set_parent(id, Some(parent))?;
        Ok(id)
    }

    /// Removes a node and its whole subtree.
    ///
    /// The node is detached from its parent; every node in the subtree is
    /// dropped together with its components.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidNode`] when `id` is not live.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), SceneError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.detach_from_parent(id, parent)?;
        }

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.nodes[current.0].take() {
                pending.extend(node.children);
            }
        }

        Ok(())
    }

    /// Reparents `child` under `new_parent`, or to the root when `None`.
    ///
    /// Updates both sides of the relation: the child's back-reference and
    /// the children lists of the old and new parents.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::WouldCreateCycle`], with no state change,
    /// when `new_parent` is the child itself or one of its descendants,
    /// or [`SceneError::InvalidNode`] when either id is not live.
    pub fn set_parent(
        &mut self,
        child: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<(), SceneError> {
        let old_parent = self.node(child)?.parent;

        if let Some(parent) = new_parent {
            self.node(parent)?;
            if parent == child || self.is_descendant_of(parent, child)? {
                return Err(SceneError::WouldCreateCycle { child, parent });
            }
        }

        if let Some(old_parent) = old_parent {
            self.detach_from_parent(child, old_parent)?;
        }

        if let Some(parent) = new_parent {
            self.node_mut(parent)?.children.push(child);
        }
        self.node_mut(child)?.parent = new_parent;

        Ok(())
    }

    /// Whether `node` is strictly a descendant of `ancestor`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidNode`] when `node` is not live.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> Result<bool, SceneError> {
        let mut current = self.node(node)?.parent;
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.node(id)?.parent;
        }
        Ok(false)
    }

    /// Returns the node's name.
    pub fn name(&self, id: NodeId) -> Result<&str, SceneError> {
        Ok(&self.node(id)?.name)
    }

    /// Returns the node's parent, if any.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.node(id)?.parent)
    }

    /// Returns the node's children.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.node(id)?.children)
    }

    /// Returns the node's local transform.
    pub fn transform(&self, id: NodeId) -> Result<&Transform, SceneError> {
        Ok(&self.node(id)?.transform)
    }

    /// Returns the node's local transform mutably.
    pub fn transform_mut(&mut self, id: NodeId) -> Result<&mut Transform, SceneError> {
        Ok(&mut self.node_mut(id)?.transform)
    }

    /// Attaches a component to the node. The node takes ownership.
    pub fn add_component(
        &mut self,
        id: NodeId,
        component: Box<dyn Component>,
    ) -> Result<(), SceneError> {
        self.node_mut(id)?.components.push(component);
        Ok(())
    }

    /// Number of components on the node.
    pub fn component_count(&self, id: NodeId) -> Result<usize, SceneError> {
        Ok(self.node(id)?.components.len())
    }

    /// Runs every component's update hook with its node's transform.
    pub fn update(&mut self, dt: f32) {
        for index in 0..self.nodes.len() {
            let Some(node) = self.nodes[index].as_mut() else {
                continue;
            };
            let mut components = std::mem::take(&mut node.components);
            for component in &mut components {
                component.update(&mut node.transform, dt);
            }
            node.components = components;
        }
    }

    /// The node's world matrix, composed through the parent chain.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidNode`] when `id` is not live.
    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        let node = self.node(id)?;
        let mut matrix = node.transform.local_matrix();
        let mut current = node.parent;
        while let Some(parent_id) = current {
            let parent = self.node(parent_id)?;
            matrix = parent.transform.local_matrix() * matrix;
            current = parent.parent;
        }
        Ok(matrix)
    }

    /// Number of live nodes in the scene.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether the scene has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(SceneError::InvalidNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(SceneError::InvalidNode(id))
    }

    fn detach_from_parent(&mut self, child: NodeId, parent: NodeId) -> Result<(), SceneError> {
        let children = &mut self.node_mut(parent)?.children;
        children.retain(|&c| c != child);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    struct Mover;

    impl Component for Mover {
        fn name(&self) -> &str {
            "mover"
        }

        fn update(&mut self, transform: &mut Transform, dt: f32) {
            transform.position += Vec3::X * dt;
        }
    }

    #[test]
    fn test_add_child_links_both_sides() {
        let mut scene = Scene::new();
        let root = scene.add_node("root");
        let child = scene.add_child(root, "child").unwrap();

        assert_eq!(scene.parent(child).unwrap(), Some(root));
        assert_eq!(scene.children(root).unwrap(), &[child]);
        assert_eq!(scene.name(child).unwrap(), "child");
    }

    #[test]
    fn test_set_parent_rejects_self() {
        let mut scene = Scene::new();
        let node = scene.add_node("node");

        let err = scene.set_parent(node, Some(node)).unwrap_err();
        assert_eq!(
            err,
            SceneError::WouldCreateCycle {
                child: node,
                parent: node
            }
        );
    }

    #[test]
    fn test_set_parent_rejects_descendant_with_no_state_change() {
        let mut scene = Scene::new();
        let a = scene.add_node("a");
        let b = scene.add_child(a, "b").unwrap();
        let c = scene.add_child(b, "c").unwrap();

        // a -> b -> c; making c the parent of a would close a cycle.
        let err = scene.set_parent(a, Some(c)).unwrap_err();
        assert_eq!(err, SceneError::WouldCreateCycle { child: a, parent: c });

        // Nothing moved.
        assert_eq!(scene.parent(a).unwrap(), None);
        assert_eq!(scene.parent(c).unwrap(), Some(b));
        assert_eq!(scene.children(c).unwrap(), &[] as &[NodeId]);
        assert_eq!(scene.children(a).unwrap(), &[b]);
    }

    #[test]
    fn test_reparent_to_sibling() {
        let mut scene = Scene::new();
        let root = scene.add_node("root");
        let left = scene.add_child(root, "left").unwrap();
        let right = scene.add_child(root, "right").unwrap();

        scene.set_parent(right, Some(left)).unwrap();

        assert_eq!(scene.parent(right).unwrap(), Some(left));
        assert_eq!(scene.children(left).unwrap(), &[right]);
        assert_eq!(scene.children(root).unwrap(), &[left]);
    }

    #[test]
    fn test_reparent_to_root() {
        let mut scene = Scene::new();
        let root = scene.add_node("root");
        let child = scene.add_child(root, "child").unwrap();

        scene.set_parent(child, None).unwrap();

        assert_eq!(scene.parent(child).unwrap(), None);
        assert!(scene.children(root).unwrap().is_empty());
    }

    #[test]
    fn test_is_descendant_of() {
        let mut scene = Scene::new();
        let a = scene.add_node("a");
        let b = scene.add_child(a, "b").unwrap();
        let c = scene.add_child(b, "c").unwrap();

        assert!(scene.is_descendant_of(c, a).unwrap());
        assert!(scene.is_descendant_of(b, a).unwrap());
        assert!(!scene.is_descendant_of(a, c).unwrap());
        // Strict: a node is not its own descendant.
        assert!(!scene.is_descendant_of(a, a).unwrap());
    }

    #[test]
    fn test_remove_node_drops_subtree() {
        let mut scene = Scene::new();
        let root = scene.add_node("root");
        let child = scene.add_child(root, "child").unwrap();
        let grandchild = scene.add_child(child, "grandchild").unwrap();

        scene.remove_node(child).unwrap();

        assert!(scene.children(root).unwrap().is_empty());
        assert_eq!(scene.name(child), Err(SceneError::InvalidNode(child)));
        assert_eq!(
            scene.name(grandchild),
            Err(SceneError::InvalidNode(grandchild))
        );
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_world_matrix_composes_through_parents() {
        let mut scene = Scene::new();
        let root = scene.add_node("root");
        let child = scene.add_child(root, "child").unwrap();

        scene.transform_mut(root).unwrap().position = Vec3::new(10.0, 0.0, 0.0);
        scene.transform_mut(child).unwrap().position = Vec3::new(0.0, 5.0, 0.0);

        let world = scene.world_matrix(child).unwrap();
        let position = world.transform_point3(Vec3::ZERO);
        assert!((position - Vec3::new(10.0, 5.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_update_runs_components() {
        let mut scene = Scene::new();
        let node = scene.add_node("node");
        assert_eq!(Mover.name(), "mover");
        scene.add_component(node, Box::new(Mover)).unwrap();

        scene.update(0.5);
        scene.update(0.5);

        assert_eq!(scene.component_count(node).unwrap(), 1);
        assert!(
            (scene.transform(node).unwrap().position - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5
        );
    }

    #[test]
    fn test_invalid_node_errors() {
        let mut scene = Scene::new();
        let node = scene.add_node("node");
        scene.remove_node(node).unwrap();

        assert_eq!(scene.parent(node), Err(SceneError::InvalidNode(node)));
        assert_eq!(
            scene.set_parent(node, None),
            Err(SceneError::InvalidNode(node))
        );
        assert!(scene.is_empty());
    }
}
