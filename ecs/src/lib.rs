//! ECS kernel for the ember renderer.
//!
//! Clients describe *what* exists by assembling entities from small
//! data-only components; deterministic systems discover those entities
//! each frame through typed indices and run in a fixed
//! (phase, priority, insertion) order.
//!
//! The kernel is graphics-agnostic: rendering components and systems live
//! in `ember-render` and reach their GL context through state they capture
//! at construction, not through the world.

mod component;
mod entity;
mod error;
mod layer;
mod lifetime;
mod profiler;
mod scene;
mod schedule;
mod store;
mod world;

pub use component::{Component, ComponentSet, Disposable};
pub use entity::EntityId;
pub use error::EcsError;
pub use layer::{Dimension, Layer};
pub use lifetime::{Lifetime, LifetimeKind, LifetimeReaper};
pub use profiler::{FrameProfile, SystemSample};
pub use scene::SceneManager;
pub use schedule::{priority, Phase, System, SystemError, Tick};
pub use world::{World, WorldObserver};

/// Commonly used names.
pub mod prelude {
    pub use crate::{
        Component, ComponentSet, Dimension, Disposable, EcsError, EntityId, Layer, Lifetime,
        LifetimeKind, LifetimeReaper, Phase, System, SystemError, Tick, World,
    };
}
