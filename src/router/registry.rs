//! Name-keyed machine registry with relative path resolution.

use super::addressable::{Addressable, RoutedMachine};
use super::path::{RoutePath, Segment};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Where a path walk currently stands.
enum Cursor<'a> {
    /// The machine the path is relative to, which need not be registered
    Origin(&'a dyn Addressable),
    Named(String),
}

/// Registry of running machines, shared by every machine of a tome.
///
/// Cloning shares the registry. Registration is last-write-wins, and nothing
/// here ever fails: a lookup that finds nothing returns `None`.
#[derive(Clone, Default)]
pub struct MachineRouter {
    machines: Arc<RwLock<HashMap<String, Arc<dyn RoutedMachine>>>>,
}

impl MachineRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `machine` under `name`, replacing any previous registration.
    ///
    /// Holders of a replaced machine keep a working handle; only lookups change.
    pub fn register(&self, name: impl Into<String>, machine: Arc<dyn RoutedMachine>) {
        let name = name.into();
        let replaced = self
            .machines
            .write()
            .insert(name.clone(), machine)
            .is_some();
        debug!(machine = %name, replaced, "machine registered");
    }

    /// Remove the registration for `name`, returning it if there was one.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn RoutedMachine>> {
        let removed = self.machines.write().remove(name);
        if removed.is_some() {
            debug!(machine = %name, "machine unregistered");
        }
        removed
    }

    /// Whether `other` is a clone of this router, sharing its registry.
    pub fn shares_registry(&self, other: &MachineRouter) -> bool {
        Arc::ptr_eq(&self.machines, &other.machines)
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn RoutedMachine>> {
        self.machines.read().get(name).cloned()
    }

    /// Resolve `path` starting from `origin`.
    ///
    /// `..` follows the current node's parent name, and a name selects the
    /// registered machine of that name whose parent is the current node.
    /// Absolute paths start from a registered name. Any broken link yields
    /// `None`.
    pub fn resolve_relative(
        &self,
        path: &str,
        origin: &dyn Addressable,
    ) -> Option<Arc<dyn RoutedMachine>> {
        let route = RoutePath::parse(path);
        let mut segments = route.segments().iter();

        let mut cursor = if route.is_relative() {
            Cursor::Origin(origin)
        } else {
            match segments.next()? {
                Segment::Child(name) => {
                    self.resolve(name)?;
                    Cursor::Named(name.clone())
                }
                Segment::Parent => return None,
            }
        };

        for segment in segments {
            cursor = match segment {
                Segment::Parent => Cursor::Named(self.parent_of(&cursor)?),
                Segment::Child(name) => {
                    let child = self.resolve(name)?;
                    let current = match &cursor {
                        Cursor::Origin(origin) => origin.name(),
                        Cursor::Named(name) => name.as_str(),
                    };
                    if child.parent_name().as_deref() != Some(current) {
                        return None;
                    }
                    Cursor::Named(name.clone())
                }
            };
        }

        match cursor {
            Cursor::Origin(origin) => self.resolve(origin.name()),
            Cursor::Named(name) => self.resolve(&name),
        }
    }

    fn parent_of(&self, cursor: &Cursor<'_>) -> Option<String> {
        match cursor {
            Cursor::Origin(origin) => origin.parent_name(),
            Cursor::Named(name) => self.resolve(name)?.parent_name(),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.machines.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.machines.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.machines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.read().is_empty()
    }

    pub fn clear(&self) {
        self.machines.write().clear();
    }
}

impl fmt::Debug for MachineRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineRouter")
            .field("machines", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Subscription;
    use crate::machine::{DeliveryError, Event, MachineSnapshot};
    use crate::router::SnapshotCallback;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    struct Stub {
        name: String,
        parent: Mutex<Option<String>>,
        tag: &'static str,
    }

    fn stub(name: &str, parent: Option<&str>, tag: &'static str) -> Arc<Stub> {
        Arc::new(Stub {
            name: name.to_string(),
            parent: Mutex::new(parent.map(str::to_string)),
            tag,
        })
    }

    impl Addressable for Stub {
        fn name(&self) -> &str {
            &self.name
        }

        fn parent_name(&self) -> Option<String> {
            self.parent.lock().clone()
        }
    }

    #[async_trait]
    impl RoutedMachine for Stub {
        fn send(&self, _event: Event) -> Result<(), DeliveryError> {
            Ok(())
        }

        fn snapshot(&self) -> MachineSnapshot {
            MachineSnapshot {
                machine: self.name.clone(),
                state: self.tag.to_string(),
                context: Value::Null,
                is_stable: true,
            }
        }

        fn subscribe(&self, _callback: SnapshotCallback) -> Subscription {
            Subscription::inert()
        }

        fn start(&self) {}

        fn stop(&self) {}

        fn set_parent(&self, parent: Option<String>) {
            *self.parent.lock() = parent;
        }

        fn is_settled(&self) -> bool {
            true
        }

        async fn settled(&self) {}
    }

    fn tag(machine: Option<Arc<dyn RoutedMachine>>) -> Option<String> {
        machine.map(|m| m.snapshot().state)
    }

    fn editor_family() -> (MachineRouter, Arc<Stub>) {
        let (router, editor, _) = editor_family_with_renderer();
        (router, editor)
    }

    fn editor_family_with_renderer() -> (MachineRouter, Arc<Stub>, Arc<Stub>) {
        let router = MachineRouter::new();
        let editor = stub("EditorMachine", Some("EditorTome"), "editor");
        let renderer = stub("Renderer", Some("PreviewMachine"), "renderer");
        router.register("EditorTome", stub("EditorTome", None, "tome"));
        router.register("EditorMachine", editor.clone());
        router.register("PreviewMachine", stub("PreviewMachine", Some("EditorTome"), "preview"));
        router.register("Renderer", renderer.clone());
        (router, editor, renderer)
    }

    #[test]
    fn register_is_last_write_wins() {
        let router = MachineRouter::new();
        let first: Arc<dyn RoutedMachine> = stub("A", None, "first");
        router.register("A", first.clone());
        router.register("A", stub("A", None, "second"));

        assert_eq!(tag(router.resolve("A")).as_deref(), Some("second"));
        assert_eq!(first.snapshot().state, "first");
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn unregister_removes_lookup() {
        let (router, _) = editor_family();
        assert!(router.unregister("PreviewMachine").is_some());
        assert!(router.unregister("PreviewMachine").is_none());
        assert!(router.resolve("PreviewMachine").is_none());
        assert!(!router.contains("PreviewMachine"));
    }

    #[test]
    fn resolves_sibling_through_parent() {
        let (router, editor) = editor_family();
        let found = router.resolve_relative("../PreviewMachine", editor.as_ref());
        assert_eq!(tag(found).as_deref(), Some("preview"));
    }

    #[test]
    fn resolves_nested_child_of_sibling() {
        let (router, editor) = editor_family();
        let found = router.resolve_relative("../PreviewMachine/Renderer", editor.as_ref());
        assert_eq!(tag(found).as_deref(), Some("renderer"));
    }

    #[test]
    fn parent_hops_re_resolve_through_router() {
        let (router, _, renderer) = editor_family_with_renderer();
        let found = router.resolve_relative("../../EditorMachine", renderer.as_ref());
        assert_eq!(tag(found).as_deref(), Some("editor"));

        let parent = router.resolve_relative("..", renderer.as_ref());
        assert_eq!(tag(parent).as_deref(), Some("preview"));
    }

    #[test]
    fn child_must_belong_to_current_node() {
        let (router, editor) = editor_family();
        // Renderer is registered, but under PreviewMachine
        assert!(router
            .resolve_relative("../Renderer", editor.as_ref())
            .is_none());
        assert!(router
            .resolve_relative("./Renderer", editor.as_ref())
            .is_none());
    }

    #[test]
    fn no_parent_yields_none() {
        let (router, _) = editor_family();
        let orphan = stub("Orphan", None, "orphan");
        assert!(router
            .resolve_relative("../PreviewMachine", orphan.as_ref())
            .is_none());
    }

    #[test]
    fn absolute_paths() {
        let (router, editor) = editor_family();
        assert_eq!(
            tag(router.resolve_relative("PreviewMachine", editor.as_ref())).as_deref(),
            Some("preview")
        );
        assert_eq!(
            tag(router.resolve_relative("PreviewMachine/Renderer", editor.as_ref())).as_deref(),
            Some("renderer")
        );
        assert!(router
            .resolve_relative("Missing/Renderer", editor.as_ref())
            .is_none());
    }

    #[test]
    fn dot_resolves_origin() {
        let (router, editor) = editor_family();
        assert_eq!(
            tag(router.resolve_relative(".", editor.as_ref())).as_deref(),
            Some("editor")
        );
        assert!(router.resolve_relative("", editor.as_ref()).is_none());
    }

    #[test]
    fn names_are_sorted() {
        let (router, _) = editor_family();
        assert_eq!(
            router.names(),
            vec!["EditorMachine", "EditorTome", "PreviewMachine", "Renderer"]
        );
        router.clear();
        assert!(router.is_empty());
    }

    #[test]
    fn clones_share_the_registry() {
        let router = MachineRouter::new();
        assert!(router.shares_registry(&router.clone()));
        assert!(!router.shares_registry(&MachineRouter::new()));
    }
}
