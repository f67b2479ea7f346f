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

//! Optional structured event sinks.
//!
//! The core never logs to stdout/stderr and never owns a global subscriber -
//! that stays an application concern. A `World` may be handed a `Logger` and
//! a `HealthMonitor`; both default to no-op implementations the optimizer
//! erases entirely. This is a separate, always-available mechanism from the
//! `tracing` spans gated behind the `profiling` feature: one is the crate's
//! own diagnostics, the other is the structured-event contract external
//! layers (snapshotting, dashboards) are meant to consume.

use std::sync::Arc;

/// One structured event describing a core mutation, carrying a correlation
/// id so an external layer can stitch together the sub-steps one logical
/// operation (e.g. an archetype-migrating `add_component`) triggers.
#[derive(Debug, Clone)]
pub enum EcsEvent {
    EntityCreate {
        correlation_id: u64,
        entity_id: u32,
    },
    EntityDestroy {
        correlation_id: u64,
        entity_id: u32,
    },
    ComponentAdd {
        correlation_id: u64,
        entity_id: u32,
        component_id: u32,
    },
    ArchetypeTransition {
        correlation_id: u64,
        entity_id: u32,
        from_archetype: u64,
        to_archetype: u64,
    },
    Query {
        correlation_id: u64,
        matched_archetypes: usize,
    },
}

/// Sink for structured [`EcsEvent`]s.
pub trait Logger: Send + Sync {
    fn log(&self, event: EcsEvent);
}

/// Discards every event. The default when no logger is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    #[inline(always)]
    fn log(&self, _event: EcsEvent) {}
}

/// Sink for health/liveness signals, kept distinct from `Logger` since a
/// monitor typically samples a narrower slice of events (migration failures,
/// cache blowups) rather than the full structured stream.
pub trait HealthMonitor: Send + Sync {
    fn record(&self, event: &EcsEvent);
}

/// No-op health monitor, the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHealthMonitor;

impl HealthMonitor for NullHealthMonitor {
    #[inline(always)]
    fn record(&self, _event: &EcsEvent) {}
}

pub(crate) type SharedLogger = Arc<dyn Logger>;
pub(crate) type SharedHealthMonitor = Arc<dyn HealthMonitor>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLogger(AtomicUsize);

    impl Logger for CountingLogger {
        fn log(&self, _event: EcsEvent) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn logger_receives_events() {
        let logger = CountingLogger(AtomicUsize::new(0));
        logger.log(EcsEvent::EntityCreate {
            correlation_id: 1,
            entity_id: 1,
        });
        assert_eq!(logger.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn null_logger_is_inert() {
        NullLogger.log(EcsEvent::Query {
            correlation_id: 0,
            matched_archetypes: 0,
        });
    }
}
