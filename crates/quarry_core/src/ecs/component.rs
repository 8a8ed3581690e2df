//! # Component System
//!
//! Components are plain data stored per slot in a
//! [`ComponentTable`](super::ComponentTable). Behaviour that must react to
//! their lifecycle is injected through a [`ComponentHook`] rather than
//! living on the component itself.

use super::entity::EntityId;

/// Marker trait for table components.
///
/// Components must be:
/// - `Default`: the zero value written into absent slots, which also drops
///   whatever the previous value owned
/// - `'static`: tables are looked up by `TypeId`
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default)]
/// struct Position { x: f32, y: f32 }
///
/// impl Component for Position {}
/// ```
pub trait Component: Default + 'static {}

/// Lifecycle callbacks for one component type.
///
/// Every method defaults to a no-op, so implementors only override the
/// points they care about. Hooks run synchronously inside the table
/// operation. "Before" hooks see the value prior to the table's own state
/// change and may modify it; "after" hooks observe the committed state.
///
/// A hook owns no reference to its table, so it cannot re-enter it.
pub trait ComponentHook<T: Component> {
    /// A value is about to be attached to an entity that had none.
    fn before_set(&mut self, _entity: EntityId, _component: &mut T) {}

    /// A fresh value was attached.
    fn after_set(&mut self, _entity: EntityId, _component: &T) {}

    /// An existing value is about to be overwritten with `incoming`.
    fn before_replace(&mut self, _entity: EntityId, _current: &mut T, _incoming: &mut T) {}

    /// An existing value was overwritten.
    fn after_replace(&mut self, _entity: EntityId, _component: &T) {}

    /// A value is about to be detached and reset to its default.
    fn before_delete(&mut self, _entity: EntityId, _component: &mut T) {}

    /// A value was detached.
    fn after_delete(&mut self, _entity: EntityId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Health(u32);

    impl Component for Health {}

    struct Clamp;

    impl ComponentHook<Health> for Clamp {
        fn before_set(&mut self, _entity: EntityId, component: &mut Health) {
            component.0 = component.0.min(100);
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let mut hook = Clamp;
        let id = EntityId::new(1, 0, 0);

        let mut value = Health(250);
        hook.before_set(id, &mut value);
        assert_eq!(value.0, 100);

        let mut current = Health(1);
        let mut incoming = Health(2);
        hook.before_replace(id, &mut current, &mut incoming);
        hook.after_delete(id);
        assert_eq!((current.0, incoming.0), (1, 2));
    }
}
