//! Static role/team catalog: the fixed composition, night-action ordering,
//! and ability semantics of the 10-seat game.

use serde::{Deserialize, Serialize};

/// A secret identity assigned to a seat at game start. Never mutated once
/// assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Werewolf,
    Seer,
    Witch,
    Hunter,
    Villager,
}

impl Role {
    /// The faction this role wins and loses with.
    pub fn team(self) -> Team {
        match self {
            Role::Werewolf => Team::Werewolf,
            Role::Seer | Role::Witch | Role::Hunter | Role::Villager => Team::Villager,
        }
    }

    /// Position in the fixed night-action order, lowest first. Roles with no
    /// night action return `None`.
    pub fn night_order(self) -> Option<u8> {
        match self {
            Role::Werewolf => Some(1),
            Role::Seer => Some(2),
            Role::Witch => Some(3),
            Role::Hunter | Role::Villager => None,
        }
    }

    /// One-line ability description, used in narration and agent prompts.
    pub fn ability(self) -> &'static str {
        match self {
            Role::Werewolf => "Collectively choose one seat to kill, or empty-knife.",
            Role::Seer => "Check one seat; learn whether it is a werewolf.",
            Role::Witch => {
                "May save tonight's wolf target once per game; may poison one seat once per \
                 game; never both in the same night."
            }
            Role::Hunter => {
                "On death by wolf kill, poison, or vote: may shoot one alive seat, which dies \
                 immediately."
            }
            Role::Villager => "No ability.",
        }
    }

    /// Count of seats holding this role in a standard 10-seat game, per the
    /// fixed composition invariant.
    pub fn standard_count(self) -> usize {
        match self {
            Role::Werewolf => 3,
            Role::Seer => 1,
            Role::Witch => 1,
            Role::Hunter => 1,
            Role::Villager => 4,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Role::Werewolf => "Werewolf",
            Role::Seer => "Seer",
            Role::Witch => "Witch",
            Role::Hunter => "Hunter",
            Role::Villager => "Villager",
        };
        write!(f, "{s}")
    }
}

/// The two factions. A game ends when one team can no longer lose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Werewolf,
    Villager,
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Team::Werewolf => write!(f, "Werewolf"),
            Team::Villager => write!(f, "Villager"),
        }
    }
}

/// The kind of action a seat is being asked to produce. Shared vocabulary
/// between the Prompt Broker and the AI Agent Runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Speech,
    Vote,
    WolfKill,
    SeerCheck,
    WitchAct,
    HunterShoot,
    LastWords,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ActionKind::Speech => "SPEECH",
            ActionKind::Vote => "VOTE",
            ActionKind::WolfKill => "WOLF_KILL",
            ActionKind::SeerCheck => "SEER_CHECK",
            ActionKind::WitchAct => "WITCH_ACT",
            ActionKind::HunterShoot => "HUNTER_SHOOT",
            ActionKind::LastWords => "LAST_WORDS",
        };
        write!(f, "{s}")
    }
}

/// Static role catalog: composition, night order, and ability lookups.
///
/// There is exactly one valid catalog for the standard 10-seat variant; this
/// type exists mainly so callers depend on a named abstraction rather than
/// free functions, matching how the rest of the workspace exposes static
/// tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleCatalog;

impl RoleCatalog {
    /// All roles in the fixed night-action order (wolves, then seer, then
    /// witch). Hunter and Villager have no night slot and are omitted.
    pub fn night_order(&self) -> &'static [Role] {
        &[Role::Werewolf, Role::Seer, Role::Witch]
    }

    pub fn team(&self, role: Role) -> Team {
        role.team()
    }

    pub fn ability(&self, role: Role) -> &'static str {
        role.ability()
    }

    /// The standard 10-seat composition: 3 Werewolf, 1 Seer, 1 Witch,
    /// 1 Hunter, 4 Villager.
    pub fn standard_composition(&self) -> Vec<Role> {
        let mut roles = Vec::with_capacity(10);
        roles.extend(std::iter::repeat(Role::Werewolf).take(Role::Werewolf.standard_count()));
        roles.extend(std::iter::repeat(Role::Seer).take(Role::Seer.standard_count()));
        roles.extend(std::iter::repeat(Role::Witch).take(Role::Witch.standard_count()));
        roles.extend(std::iter::repeat(Role::Hunter).take(Role::Hunter.standard_count()));
        roles.extend(std::iter::repeat(Role::Villager).take(Role::Villager.standard_count()));
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_composition_has_ten_seats() {
        let catalog = RoleCatalog;
        let roles = catalog.standard_composition();
        assert_eq!(roles.len(), ww_core::SEAT_COUNT);
        assert_eq!(roles.iter().filter(|r| **r == Role::Werewolf).count(), 3);
        assert_eq!(roles.iter().filter(|r| **r == Role::Seer).count(), 1);
        assert_eq!(roles.iter().filter(|r| **r == Role::Witch).count(), 1);
        assert_eq!(roles.iter().filter(|r| **r == Role::Hunter).count(), 1);
        assert_eq!(roles.iter().filter(|r| **r == Role::Villager).count(), 4);
    }

    #[test]
    fn night_order_is_wolf_seer_witch() {
        let catalog = RoleCatalog;
        assert_eq!(
            catalog.night_order(),
            &[Role::Werewolf, Role::Seer, Role::Witch]
        );
    }

    #[test]
    fn hunter_and_villager_have_no_night_slot() {
        assert_eq!(Role::Hunter.night_order(), None);
        assert_eq!(Role::Villager.night_order(), None);
    }

    #[test]
    fn team_mapping_is_correct() {
        assert_eq!(Role::Werewolf.team(), Team::Werewolf);
        for r in [Role::Seer, Role::Witch, Role::Hunter, Role::Villager] {
            assert_eq!(r.team(), Team::Villager);
        }
    }
}
