// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types.
//!
//! `ChunkFull` is intentionally absent: exceeding a chunk's fixed capacity is
//! an internal invariant violation, not a recoverable condition, and panics
//! instead of returning a `Result`.

use std::fmt;

/// ECS error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity handle refers to a slot whose generation no longer matches
    /// (the entity was destroyed, possibly recycled into a different entity).
    EntityDead,

    /// The entity is alive but does not carry the requested component.
    ComponentMissing,

    /// The component type was never registered with a `ComponentTypeRegistry`.
    UnregisteredComponent,

    /// Internal lookup by archetype id failed to find a matching archetype.
    ArchetypeNotFound,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityDead => write!(f, "entity is dead"),
            EcsError::ComponentMissing => write!(f, "component missing"),
            EcsError::UnregisteredComponent => write!(f, "component type not registered"),
            EcsError::ArchetypeNotFound => write!(f, "archetype not found"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EcsError>;
