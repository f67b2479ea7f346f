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

//! Chunked archetype ECS - a data-oriented storage engine and query machine.
//!
//! Entities are grouped by their exact component-type set ("archetype");
//! each archetype stores its component columns in cache-aligned, fixed
//! capacity chunks. Queries resolve against an archetype index with a
//! generation-invalidated result cache and enumerate matching chunks with
//! zero allocation after warm-up.
//!
//! Out of scope (consumed only via the interfaces this crate exposes):
//! event channels, system scheduling, and binary snapshot serialization.

pub mod archetype;
pub mod archetype_index;
pub mod chunk;
pub mod component;
pub mod entity;
pub mod error;
pub mod logging;
pub mod pool;
pub mod query;
pub mod signature;
pub mod simd;
pub mod world;

pub mod prelude;

pub use archetype::Archetype;
pub use component::{Bundle, Component};
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use query::Query;
pub use world::{World, WorldConfig};
