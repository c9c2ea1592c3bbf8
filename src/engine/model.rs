// Entity records: players, monsters, guilds, the world boss and guild buffs.

use serde::{Deserialize, Serialize};

use super::config::{
    DEFAULT_ELEMENT_EMOJI, ELEMENT_PROFILES, FALLBACK_ABILITY, MAX_ABILITY_CHARS,
    MAX_EFFECTIVE_BUFF_STACKS, MAX_STAT,
};
use super::error::GameError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub essence: i64,
    /// Unix milliseconds of the last successful claim (0 = never claimed).
    pub last_claimed_at: i64,
    pub guild_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Monster {
    pub id: String,
    #[serde(skip)]
    pub player_id: String,
    #[serde(skip)]
    pub seq: i64,
    pub name: String,
    pub element: String,
    pub element_lore: String,
    pub bio: String,
    #[sqlx(try_from = "String")]
    pub rarity: Rarity,
    pub ability: String,
    pub atk: i64,
    pub def: i64,
    pub spd: i64,
    pub hp: i64,
    pub max_hp: i64,
    pub level: i64,
}

impl Monster {
    pub fn emoji(&self) -> &'static str {
        element_emoji(&self.element)
    }

    /// Current stats as a draft, used to seed evolve/merge prompts.
    pub fn to_draft(&self) -> MonsterDraft {
        MonsterDraft {
            name: self.name.clone(),
            element: self.element.clone(),
            element_lore: self.element_lore.clone(),
            bio: self.bio.clone(),
            rarity: self.rarity,
            ability: self.ability.clone(),
            atk: self.atk,
            def: self.def,
            spd: self.spd,
            hp: self.hp,
        }
    }
}

/// Monster content before it is owned: what the oracle produces and what
/// the database inserts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterDraft {
    pub name: String,
    pub element: String,
    pub element_lore: String,
    pub bio: String,
    pub rarity: Rarity,
    pub ability: String,
    pub atk: i64,
    pub def: i64,
    pub spd: i64,
    pub hp: i64,
}

impl MonsterDraft {
    /// Clamp every stat into `1..=MAX_STAT` and bound the ability name.
    /// Everything persisted goes through here.
    pub fn sanitized(mut self) -> Self {
        self.atk = self.atk.clamp(1, MAX_STAT);
        self.def = self.def.clamp(1, MAX_STAT);
        self.spd = self.spd.clamp(1, MAX_STAT);
        self.hp = self.hp.clamp(1, MAX_STAT);
        let ability: String = self.ability.trim().chars().take(MAX_ABILITY_CHARS).collect();
        self.ability = if ability.trim().is_empty() {
            FALLBACK_ABILITY.to_string()
        } else {
            ability.trim_end().to_string()
        };
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    #[default]
    Common,
    Rare,
    Unique,
}

impl Rarity {
    /// Case-insensitive; anything else is not a rarity.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "common" => Some(Rarity::Common),
            "rare" => Some(Rarity::Rare),
            "unique" => Some(Rarity::Unique),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::Unique => "Unique",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Rarity::Common => "⚪",
            Rarity::Rare => "🔷",
            Rarity::Unique => "🌟",
        }
    }
}

impl From<String> for Rarity {
    fn from(raw: String) -> Self {
        Rarity::parse(&raw).unwrap_or_default()
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub name: String,
    pub owner_id: String,
    pub vault: i64,
    pub join_requirement: i64,
    pub special_element: String,
    pub created_at: String,
}

/// A guild together with its derived member list and purchased buffs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildSummary {
    #[serde(flatten)]
    pub guild: Guild,
    pub members: Vec<String>,
    pub active_buffs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorldBoss {
    pub id: i64,
    pub name: String,
    pub hp: i64,
    pub max_hp: i64,
    pub active: bool,
}

impl WorldBoss {
    /// Stored HP can dip below zero on the killing blow; display clamps it.
    pub fn display_hp(&self) -> i64 {
        self.hp.max(0)
    }
}

/// Map an element label to its display emoji.
pub fn element_emoji(element: &str) -> &'static str {
    let key = element.trim().to_lowercase();
    ELEMENT_PROFILES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, emoji)| *emoji)
        .unwrap_or(DEFAULT_ELEMENT_EMOJI)
}

// ── Monster selection ─────────────────────────────────────────────────

/// How a request addresses one of the player's monsters: by 1-based
/// position in the current collection, or by stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonsterRef {
    Index(usize),
    Id(String),
}

impl MonsterRef {
    pub fn resolve<'a>(&self, monsters: &'a [Monster]) -> Result<&'a Monster, GameError> {
        match self {
            MonsterRef::Index(index) => {
                if *index == 0 || *index > monsters.len() {
                    return Err(GameError::InvalidSelection(format!(
                        "no monster at position {index} (collection has {})",
                        monsters.len()
                    )));
                }
                Ok(&monsters[index - 1])
            }
            MonsterRef::Id(id) => monsters
                .iter()
                .find(|m| &m.id == id)
                .ok_or_else(|| GameError::InvalidSelection(format!("no monster with id {id}"))),
        }
    }
}

impl std::fmt::Display for MonsterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonsterRef::Index(i) => write!(f, "#{i}"),
            MonsterRef::Id(id) => write!(f, "{id}"),
        }
    }
}

// ── Guild buffs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuffKind {
    WarDrums,
    BattleStandard,
    BountyCharter,
}

impl BuffKind {
    pub const ALL: [BuffKind; 3] = [
        BuffKind::WarDrums,
        BuffKind::BattleStandard,
        BuffKind::BountyCharter,
    ];

    pub fn id(self) -> &'static str {
        match self {
            BuffKind::WarDrums => "war_drums",
            BuffKind::BattleStandard => "battle_standard",
            BuffKind::BountyCharter => "bounty_charter",
        }
    }

    /// Parse a shop item id. Accepts any case and `-`/space separators.
    pub fn from_id(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|b| b.id() == normalized)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BuffKind::WarDrums => "War Drums",
            BuffKind::BattleStandard => "Battle Standard",
            BuffKind::BountyCharter => "Bounty Charter",
        }
    }

    pub fn price(self) -> i64 {
        match self {
            BuffKind::WarDrums => 2500,
            BuffKind::BattleStandard => 2000,
            BuffKind::BountyCharter => 3000,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BuffKind::WarDrums => "+10% raid damage for every member",
            BuffKind::BattleStandard => "+5 to every member's battle roll",
            BuffKind::BountyCharter => "+10% essence from battle victories",
        }
    }
}

/// Combined effect of a guild's purchased buffs. Each kind stacks
/// additively up to `MAX_EFFECTIVE_BUFF_STACKS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuffEffects {
    pub raid_damage_pct: i64,
    pub battle_roll_bonus: i64,
    pub battle_reward_pct: i64,
}

impl BuffEffects {
    pub fn from_ids<S: AsRef<str>>(ids: &[S]) -> Self {
        let stacks = |kind: BuffKind| {
            ids.iter()
                .filter(|id| BuffKind::from_id(id.as_ref()) == Some(kind))
                .count()
                .min(MAX_EFFECTIVE_BUFF_STACKS) as i64
        };
        Self {
            raid_damage_pct: 10 * stacks(BuffKind::WarDrums),
            battle_roll_bonus: 5 * stacks(BuffKind::BattleStandard),
            battle_reward_pct: 10 * stacks(BuffKind::BountyCharter),
        }
    }

    pub fn apply_raid(&self, damage: i64) -> i64 {
        damage.saturating_add(damage.saturating_mul(self.raid_damage_pct) / 100)
    }

    pub fn apply_reward(&self, reward: i64) -> i64 {
        reward.saturating_add(reward.saturating_mul(self.battle_reward_pct) / 100)
    }
}
