//! Scene-wide state owned by the world: the active dimension and camera,
//! and the session-end latch consumed by the lifetime reaper.

use crate::entity::EntityId;

#[derive(Debug, Default)]
pub struct SceneManager {
    active_dimension: Option<i32>,
    active_camera: Option<EntityId>,
    session_ending: bool,
}

impl SceneManager {
    pub fn new() -> SceneManager {
        SceneManager::default()
    }

    /// Currently active dimension id, `None` before the host reported one.
    pub fn active_dimension(&self) -> Option<i32> {
        self.active_dimension
    }

    pub fn set_active_dimension(&mut self, id: i32) {
        if self.active_dimension != Some(id) {
            log::debug!("scene: active dimension -> {}", id);
            self.active_dimension = Some(id);
        }
    }

    /// Entity holding the camera with `active = true`, written by the
    /// camera system each frame.
    pub fn active_camera(&self) -> Option<EntityId> {
        self.active_camera
    }

    pub fn set_active_camera(&mut self, id: Option<EntityId>) {
        self.active_camera = id;
    }

    /// Latched by the host's session-end signal; cleared once the lifetime
    /// reaper has swept SESSION entities.
    pub fn session_ending(&self) -> bool {
        self.session_ending
    }

    pub fn signal_session_end(&mut self) {
        self.session_ending = true;
    }

    pub(crate) fn clear_session_end(&mut self) {
        self.session_ending = false;
    }
}
