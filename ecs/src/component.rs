//! Component contract.
//!
//! Components are pure data records attached to entities. They share no
//! inheritance relationship; the only common surface is type-erased storage
//! (via [`downcast_rs`]) plus two optional capabilities: declared
//! dependencies, checked at attach time, and disposal, invoked exactly once
//! when the owning entity releases the component.

use downcast_rs::{impl_downcast, Downcast};
use smallvec::SmallVec;
use std::any::TypeId;

/// A data-only record attachable to an entity.
///
/// Each component type may appear at most once per entity. Implementations
/// hold no logic; derived caches (world matrices, cached AABBs, ...) are
/// plain fields recomputed by systems.
pub trait Component: Downcast {
    /// Component types that must already be present on an entity before a
    /// value of this type may be attached. Checked by
    /// [`World::add_component`](crate::World::add_component).
    fn dependencies(&self) -> SmallVec<[TypeId; 4]> {
        SmallVec::new()
    }

    /// Disposal capability. Components owning external resources return
    /// `Some(self)` and receive exactly one [`Disposable::dispose`] call
    /// when removed, when their entity is destroyed, or when the world is
    /// cleared.
    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        None
    }
}

impl_downcast!(Component);

/// Deterministic cleanup hook for components holding external resources.
pub trait Disposable {
    fn dispose(&mut self);
}

/// A set of component types usable as a query, e.g.
/// `world.entities_with::<(Transform, Camera)>()`.
///
/// Implemented for single components and tuples up to four elements.
pub trait ComponentSet {
    fn type_ids() -> SmallVec<[TypeId; 4]>;
}

impl<A: Component> ComponentSet for A {
    fn type_ids() -> SmallVec<[TypeId; 4]> {
        SmallVec::from_slice(&[TypeId::of::<A>()])
    }
}

macro_rules! impl_component_set {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentSet for ($($t,)+) {
            fn type_ids() -> SmallVec<[TypeId; 4]> {
                SmallVec::from_slice(&[$(TypeId::of::<$t>()),+])
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
