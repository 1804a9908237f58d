//! Error type for the ECS kernel.

use std::any::TypeId;
use std::{error, fmt};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EcsError {
    /// `add_component` was called before one of the component's declared
    /// dependencies was present on the target entity. Programmer error,
    /// fatal at the call site.
    DependencyMissing {
        component: &'static str,
        dependency: TypeId,
    },
}

impl EcsError {
    /// The missing dependency, for matching in callers and tests.
    pub fn missing_dependency(&self) -> Option<TypeId> {
        match self {
            EcsError::DependencyMissing { dependency, .. } => Some(*dependency),
        }
    }
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EcsError::DependencyMissing {
                component,
                dependency,
            } => write!(
                f,
                "cannot attach {}: required component {:?} is missing",
                component, dependency
            ),
        }
    }
}

impl error::Error for EcsError {}
