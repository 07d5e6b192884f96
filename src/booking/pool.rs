use std::collections::HashSet;

use crate::db::models::{Resource, ResourceKind};

/// One bookable seat slot, identified by its resource and 1-based seat
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeatSlot {
    pub resource_id: i64,
    pub seat_number: i32,
}

/// The flattened, ordered pool of seat slots for one date. Order follows
/// resource insertion order, then seat number, so first-fit assignment is
/// deterministic for a stable resource set.
#[derive(Debug, Clone, Default)]
pub struct SeatPool {
    slots: Vec<SeatSlot>,
}

impl SeatPool {
    /// Flattens active seat-bank resources into `(resource, seat)` slots,
    /// seat numbers running `1..=units * seats_per_unit` per resource.
    /// Rooms are slot-booked separately and never join the daily pool.
    pub fn build(resources: &[Resource]) -> Self {
        let mut slots = Vec::new();
        for resource in resources {
            if !resource.is_active || resource.kind != ResourceKind::SeatBank {
                continue;
            }
            for seat_number in 1..=resource.total_capacity() {
                slots.push(SeatSlot {
                    resource_id: resource.id,
                    seat_number,
                });
            }
        }
        Self { slots }
    }

    pub fn total_capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[SeatSlot] {
        &self.slots
    }

    /// First-fit scan: the first slot not present in `occupied` wins.
    /// Returns `None` when the pool is exhausted.
    pub fn first_fit(&self, occupied: &HashSet<(i64, i32)>) -> Option<SeatSlot> {
        self.slots
            .iter()
            .find(|slot| !occupied.contains(&(slot.resource_id, slot.seat_number)))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn seat_bank(id: i64, units: i32, seats_per_unit: i32) -> Resource {
        Resource {
            id,
            name: format!("bank-{id}"),
            kind: ResourceKind::SeatBank,
            units,
            seats_per_unit,
            open_minute: None,
            close_minute: None,
            slot_minutes: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pool_size_matches_computed_capacity() {
        let pool = SeatPool::build(&[seat_bank(1, 4, 6)]);
        assert_eq!(pool.total_capacity(), 24);
        assert_eq!(pool.slots().first(), Some(&SeatSlot { resource_id: 1, seat_number: 1 }));
        assert_eq!(pool.slots().last(), Some(&SeatSlot { resource_id: 1, seat_number: 24 }));
    }

    #[test]
    fn pool_preserves_resource_insertion_order() {
        let pool = SeatPool::build(&[seat_bank(7, 1, 2), seat_bank(3, 1, 1)]);
        let slots: Vec<(i64, i32)> = pool
            .slots()
            .iter()
            .map(|s| (s.resource_id, s.seat_number))
            .collect();
        assert_eq!(slots, vec![(7, 1), (7, 2), (3, 1)]);
    }

    #[test]
    fn inactive_and_room_resources_are_excluded() {
        let mut inactive = seat_bank(1, 2, 2);
        inactive.is_active = false;

        let mut room = seat_bank(2, 1, 1);
        room.kind = ResourceKind::Room;
        room.open_minute = Some(540);
        room.close_minute = Some(1020);
        room.slot_minutes = Some(60);

        let pool = SeatPool::build(&[inactive, room, seat_bank(3, 1, 2)]);
        assert_eq!(pool.total_capacity(), 2);
        assert!(pool.slots().iter().all(|s| s.resource_id == 3));
    }

    #[test]
    fn empty_input_yields_zero_pool() {
        let pool = SeatPool::build(&[]);
        assert!(pool.is_empty());
        assert_eq!(pool.first_fit(&HashSet::new()), None);
    }

    #[test]
    fn first_fit_skips_occupied_slots() {
        let pool = SeatPool::build(&[seat_bank(1, 1, 3)]);

        let mut occupied = HashSet::new();
        assert_eq!(
            pool.first_fit(&occupied),
            Some(SeatSlot { resource_id: 1, seat_number: 1 })
        );

        occupied.insert((1, 1));
        occupied.insert((1, 2));
        assert_eq!(
            pool.first_fit(&occupied),
            Some(SeatSlot { resource_id: 1, seat_number: 3 })
        );

        occupied.insert((1, 3));
        assert_eq!(pool.first_fit(&occupied), None);
    }

    #[test]
    fn first_fit_is_deterministic_for_stable_inputs() {
        let resources = [seat_bank(1, 2, 2), seat_bank(2, 1, 4)];
        let occupied: HashSet<(i64, i32)> = [(1, 1), (1, 2)].into_iter().collect();

        let first = SeatPool::build(&resources).first_fit(&occupied);
        let second = SeatPool::build(&resources).first_fit(&occupied);
        assert_eq!(first, second);
        assert_eq!(first, Some(SeatSlot { resource_id: 1, seat_number: 3 }));
    }
}
