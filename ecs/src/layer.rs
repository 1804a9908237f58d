//! Layer and dimension routing tags.

use crate::component::Component;

/// Routing tag selecting which host event drives an entity.
///
/// Entities without a `Layer` component belong to [`Layer::World3d`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Layer {
    #[default]
    World3d,
    Hud,
    Gui,
}

impl Component for Layer {}

/// Signed dimension tag. An entity without a `Dimension` component is
/// present in every dimension.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Dimension(pub i32);

impl Component for Dimension {}
