use airlock_core::items::ItemEntity;

use crate::config::SimTuning;

/// Advance one unheld item by one explicit-Euler step of `dt` seconds.
/// Returns true if the item moved.
pub fn step_item(item: &mut ItemEntity, tuning: &SimTuning, dt: f32) -> bool {
    if item.holder.is_some() {
        item.zero_velocity();
        return false;
    }
    if !item.is_moving() {
        return false;
    }

    item.vy += tuning.gravity * dt;
    item.x += item.vx * dt;
    item.y += item.vy * dt;
    item.z += item.vz * dt;

    if item.y <= tuning.floor_y {
        item.y = tuning.floor_y;
        item.vy = 0.0;
        item.vx *= tuning.ground_damping;
        item.vz *= tuning.ground_damping;
        if (item.vx * item.vx + item.vz * item.vz).sqrt() < tuning.rest_speed {
            item.vx = 0.0;
            item.vz = 0.0;
        }
    }
    true
}

/// Step every unheld moving item. Returns the number that moved.
pub fn step_items(items: &mut [ItemEntity], tuning: &SimTuning, dt: f32) -> usize {
    items
        .iter_mut()
        .map(|item| step_item(item, tuning, dt))
        .filter(|moved| *moved)
        .count()
}
