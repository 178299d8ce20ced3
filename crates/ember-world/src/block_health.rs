use ember_types::BlockPos;
use std::collections::HashMap;

/// Health is never stored at exactly 0 or exactly 1 (§4.4.1); both states are
/// represented by the key's absence from the map.
const FULL_HEALTH: f32 = 1.0;

/// Result of a `BlockHealth::damage` call, telling the caller whether to
/// broadcast a partial-damage update or treat the block as destroyed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    Damaged { health: f32 },
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
struct DamageEntry {
    health: f32,
    last_damage_instant: u64,
}

/// Per-chunk-section damage map (§4.4.1). Full-health blocks are not stored;
/// `get` returns the flyweight `1.0` sentinel for any position with no entry.
#[derive(Debug, Default)]
pub struct BlockHealth {
    entries: HashMap<BlockPos, DamageEntry>,
    regen_cooldown_millis: u64,
    regen_per_millis: f32,
}

impl BlockHealth {
    pub fn new(regen_cooldown_millis: u64, regen_per_second: f32) -> Self {
        Self {
            entries: HashMap::new(),
            regen_cooldown_millis,
            regen_per_millis: regen_per_second / 1_000.0,
        }
    }

    pub fn get(&self, pos: BlockPos) -> f32 {
        self.entries.get(&pos).map_or(FULL_HEALTH, |e| e.health)
    }

    /// Apply `amount` of damage, inserting a new entry if one doesn't exist.
    /// Non-positive `amount` cannot push an absent entry below full health, so
    /// the map is left untouched rather than gaining a forbidden 1.0 entry.
    pub fn damage(&mut self, pos: BlockPos, amount: f32, now: u64) -> DamageOutcome {
        let current = self.get(pos);
        let health = (current - amount).clamp(0.0, FULL_HEALTH);
        if health <= 0.0 {
            self.entries.remove(&pos);
            DamageOutcome::Destroyed
        } else if health >= FULL_HEALTH {
            self.entries.remove(&pos);
            DamageOutcome::Damaged { health }
        } else {
            self.entries.insert(
                pos,
                DamageEntry {
                    health,
                    last_damage_instant: now,
                },
            );
            DamageOutcome::Damaged { health }
        }
    }

    /// Heal `amount`, removing the entry (back to the implicit full-health
    /// sentinel) once it reaches 1.0.
    pub fn repair(&mut self, pos: BlockPos, amount: f32) {
        let Some(entry) = self.entries.get_mut(&pos) else {
            return;
        };
        entry.health = (entry.health + amount).min(FULL_HEALTH);
        if entry.health >= FULL_HEALTH {
            self.entries.remove(&pos);
        }
    }

    /// Passive regeneration: entries untouched for longer than the configured
    /// cooldown regain health over time. Returns every position that crossed
    /// back to full health this tick, for the caller to broadcast.
    pub fn tick(&mut self, dt_millis: u64, now: u64) -> Vec<BlockPos> {
        let mut healed = Vec::new();
        self.entries.retain(|&pos, entry| {
            if now.saturating_sub(entry.last_damage_instant) < self.regen_cooldown_millis {
                return true;
            }
            entry.health = (entry.health + self.regen_per_millis * dt_millis as f32).min(FULL_HEALTH);
            if entry.health >= FULL_HEALTH {
                healed.push(pos);
                false
            } else {
                true
            }
        });
        healed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32) -> BlockPos {
        BlockPos::new(x, 0, 0)
    }

    #[test]
    fn absent_position_reports_full_health() {
        let health = BlockHealth::new(1_000, 0.1);
        assert_eq!(health.get(pos(0)), 1.0);
    }

    #[test]
    fn damage_destroys_at_zero_and_removes_the_entry() {
        let mut health = BlockHealth::new(1_000, 0.1);
        health.damage(pos(0), 0.9, 0);
        assert_eq!(health.damage(pos(0), 0.2, 0), DamageOutcome::Destroyed);
        assert_eq!(health.get(pos(0)), 1.0);
    }

    #[test]
    fn zero_damage_on_a_full_block_does_not_insert_an_entry() {
        let mut health = BlockHealth::new(1_000, 0.1);
        let outcome = health.damage(pos(0), 0.0, 0);
        assert_eq!(outcome, DamageOutcome::Damaged { health: 1.0 });
        assert!(health.entries.is_empty());
    }

    #[test]
    fn repair_above_full_removes_the_entry() {
        let mut health = BlockHealth::new(1_000, 0.1);
        health.damage(pos(0), 0.5, 0);
        health.repair(pos(0), 1.0);
        assert_eq!(health.get(pos(0)), 1.0);
    }

    #[test]
    fn tick_ignores_entries_within_the_cooldown() {
        let mut health = BlockHealth::new(1_000, 1.0);
        health.damage(pos(0), 0.5, 1_000);
        let healed = health.tick(10_000, 1_500);
        assert!(healed.is_empty());
        assert_eq!(health.get(pos(0)), 0.5);
    }

    #[test]
    fn tick_regenerates_and_reports_full_heals() {
        let mut health = BlockHealth::new(1_000, 1.0);
        health.damage(pos(0), 0.5, 0);
        let healed = health.tick(10_000, 2_000);
        assert_eq!(healed, vec![pos(0)]);
        assert_eq!(health.get(pos(0)), 1.0);
    }
}
