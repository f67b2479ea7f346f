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

//! Query-cache purity and cross-world determinism, driven through the
//! public API only (spec scenarios S5, S6).

use chunked_ecs::World;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct NewMarker;

#[test]
fn repeated_identical_query_hits_cache_and_does_not_grow_miss_count() {
    let mut world = World::new();
    for i in 0..16u32 {
        let e = world.create_entity();
        world.add_component(e, Position { x: i as f32, y: 0.0, z: 0.0 });
        world.add_component(e, Velocity { x: 1.0, y: 0.0, z: 0.0 });
    }

    let first_count = world.query().with::<Position>().with::<Velocity>().count();
    let misses_after_first = world.stats().cache_misses;

    for _ in 0..10 {
        let count = world.query().with::<Position>().with::<Velocity>().count();
        assert_eq!(count, first_count);
    }

    assert_eq!(world.stats().cache_misses, misses_after_first);
    assert!(world.stats().cache_hits >= 10);
}

#[test]
fn introducing_a_new_archetype_invalidates_the_cache_once() {
    let mut world = World::new();
    let e = world.create_entity();
    world.add_component(e, Position { x: 1.0, y: 1.0, z: 1.0 });
    world.add_component(e, Velocity { x: 1.0, y: 1.0, z: 1.0 });

    let before = world.query().with::<Position>().with::<Velocity>().count();
    let misses_before = world.stats().cache_misses;

    let e2 = world.create_entity();
    world.add_component(e2, Position { x: 2.0, y: 2.0, z: 2.0 });
    world.add_component(e2, Velocity { x: 2.0, y: 2.0, z: 2.0 });
    world.add_component(e2, NewMarker);

    let after = world.query().with::<Position>().with::<Velocity>().count();

    assert_eq!(world.stats().cache_misses, misses_before + 1);
    // the new archetype also satisfies Position+Velocity, so the result set grows
    assert_eq!(after, before + 1);
}

#[test]
fn two_fresh_worlds_given_the_same_calls_agree_on_everything_observable() {
    fn drive(world: &mut World) -> Vec<u32> {
        let mut ids = Vec::new();
        for i in 0..200u32 {
            let e = world.create_entity();
            ids.push(e.id());
            world.add_component(e, Position { x: i as f32, y: i as f32, z: i as f32 });
            if i % 3 == 0 {
                world.add_component(e, Velocity { x: 1.0, y: 1.0, z: 1.0 });
            }
            if i % 7 == 0 {
                world.add_component(e, NewMarker);
            }
        }
        ids
    }

    let mut w1 = World::new();
    let mut w2 = World::new();
    let ids1 = drive(&mut w1);
    let ids2 = drive(&mut w2);

    assert_eq!(ids1, ids2);
    assert_eq!(w1.archetype_count(), w2.archetype_count());
    assert_eq!(
        w1.query().with::<Position>().count(),
        w2.query().with::<Position>().count()
    );
    assert_eq!(
        w1.query().with::<Position>().with::<Velocity>().count(),
        w2.query().with::<Position>().with::<Velocity>().count()
    );
    assert_eq!(
        w1.query().with::<NewMarker>().without::<Velocity>().count(),
        w2.query().with::<NewMarker>().without::<Velocity>().count()
    );
}
