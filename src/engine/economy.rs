// Essence economy and monster progression: spawn, claim, evolve, merge, raid.

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::battle::roll_raid_damage;
use super::config::{
    BOSS_MAX_HP, BOSS_NAMES, CLAIM_AMOUNT, CLAIM_COOLDOWN_MS, EVOLVE_ATK_GAIN, EVOLVE_COST,
    EVOLVE_DEF_GAIN, EVOLVE_HP_GAIN, EVOLVE_SPD_GAIN, FALLBACK_ATK, FALLBACK_DEF, FALLBACK_HP,
    FALLBACK_ABILITY, FALLBACK_SPD, RAID_KILL_BONUS, RAID_PARTICIPATION_REWARD,
};
use super::error::{GameError, Wait};
use super::model::{element_emoji, Monster, MonsterDraft, MonsterRef, Rarity, WorldBoss};
use super::Engine;
use crate::metrics;
use crate::oracle::prompts;
use crate::rate_limit::RateLimitType;

const FALLBACK_SPAWN_NAME: &str = "Rift Wanderer";
const FALLBACK_SPAWN_ELEMENT: &str = "Void";

// ── Outcomes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnOutcome {
    pub monster: Monster,
    pub emoji: &'static str,
    /// 1-based position in the collection.
    pub position: usize,
    pub fallback: bool,
}

impl SpawnOutcome {
    pub fn text(&self) -> String {
        let m = &self.monster;
        format!(
            "{} **{}** has crossed the rift!\n\n**Type:** {}\n**Rarity:** {} {}\n**Ability:** {}\n**Lore:** {}\n**Stats:** ❤️ {} | ⚔️ {} | 🛡️ {} | 💨 {}\n\n*{}*\n\nSlot #{} in your collection.",
            self.emoji,
            m.name,
            m.element,
            m.rarity.badge(),
            m.rarity,
            m.ability,
            m.element_lore,
            m.hp,
            m.atk,
            m.def,
            m.spd,
            m.bio,
            self.position
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub essence: i64,
    pub guild: Option<String>,
    pub monsters: Vec<Monster>,
}

impl CollectionView {
    pub fn text(&self) -> String {
        if self.monsters.is_empty() {
            return format!(
                "📭 Your collection is empty. Use `/spawn`.\n💰 Essence: {}",
                self.essence
            );
        }
        let mut text = format!(
            "📂 **Digital Bestiary [Total: {}]**\n💰 Essence: {}\n\n",
            self.monsters.len(),
            self.essence
        );
        for (i, m) in self.monsters.iter().enumerate() {
            text.push_str(&format!(
                "**[{}]** {} **{}** (Lv.{}) {} {}\n   *{} | {} | ⚔️ {} | ❤️ {} HP*\n\n",
                i + 1,
                m.emoji(),
                m.name,
                m.level,
                m.rarity.badge(),
                m.rarity,
                m.element,
                m.ability,
                m.atk,
                m.hp
            ));
        }
        text.trim_end().to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub claimed: i64,
    pub essence: i64,
}

impl ClaimOutcome {
    pub fn text(&self) -> String {
        format!(
            "✨ **Essence Infused!**\n+{} added. Total: 💰 **{}**",
            self.claimed, self.essence
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolveOutcome {
    pub previous_name: String,
    pub monster: Monster,
    pub cost: i64,
    pub essence: i64,
    pub fallback: bool,
}

impl EvolveOutcome {
    pub fn text(&self) -> String {
        let m = &self.monster;
        format!(
            "🧬 **{}** evolved into {} **{}** (Lv.{})!\n**Stats:** ❤️ {} | ⚔️ {} | 🛡️ {} | 💨 {}\n\n*{}*\n\n-{} Essence. Remaining: 💰 {}",
            self.previous_name,
            m.emoji(),
            m.name,
            m.level,
            m.hp,
            m.atk,
            m.def,
            m.spd,
            m.bio,
            self.cost,
            self.essence
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub consumed: [String; 2],
    pub hybrid: Monster,
    pub collection_size: usize,
    pub fallback: bool,
}

impl MergeOutcome {
    pub fn text(&self) -> String {
        let m = &self.hybrid;
        format!(
            "🌀 **{}** and **{}** fused into {} **{}**!\n**Type:** {}\n**Stats:** ❤️ {} | ⚔️ {} | 🛡️ {} | 💨 {}\n\n*{}*\n\nYour collection now holds {} monsters; indices have shifted.",
            self.consumed[0],
            self.consumed[1],
            m.emoji(),
            m.name,
            m.element,
            m.hp,
            m.atk,
            m.def,
            m.spd,
            m.bio,
            self.collection_size
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidOutcome {
    pub monster: String,
    pub boss: WorldBoss,
    pub damage: i64,
    pub boss_hp: i64,
    pub reward: i64,
    pub kill_bonus: i64,
    pub killed: bool,
    pub essence: i64,
}

impl RaidOutcome {
    pub fn text(&self) -> String {
        let mut text = format!(
            "👹 **RAID: {} vs {}**\n💥 {} damage dealt. Boss HP: {}/{}\n+{} Essence for joining the fight.",
            self.monster, self.boss.name, self.damage, self.boss_hp, self.boss.max_hp, self.reward
        );
        if self.killed {
            text.push_str(&format!(
                "\n\n🏆 **{} has fallen!** Killing blow bonus: +{} Essence.",
                self.boss.name, self.kill_bonus
            ));
        }
        text.push_str(&format!("\n💰 Essence: {}", self.essence));
        text
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BossStatus {
    pub boss: Option<WorldBoss>,
}

impl BossStatus {
    pub fn text(&self) -> String {
        match &self.boss {
            Some(boss) => format!(
                "👹 **{}** roams the rift. HP: {}/{}",
                boss.name,
                boss.display_hp(),
                boss.max_hp
            ),
            None => "🌌 The rift is quiet. The next raid will summon a new boss.".to_string(),
        }
    }
}

// ── Stat helpers ──────────────────────────────────────────────────────

/// Current stats plus the fixed evolution gains, saturating at `MAX_STAT`.
pub fn evolution_seed(monster: &Monster) -> MonsterDraft {
    let mut seed = monster.to_draft();
    seed.atk = seed.atk.saturating_add(EVOLVE_ATK_GAIN);
    seed.def = seed.def.saturating_add(EVOLVE_DEF_GAIN);
    seed.spd = seed.spd.saturating_add(EVOLVE_SPD_GAIN);
    seed.hp = seed.hp.saturating_add(EVOLVE_HP_GAIN);
    seed.sanitized()
}

/// Raise every stat of `draft` to at least the seed's value. Rarity never
/// changes through evolution.
pub fn floor_stats(mut draft: MonsterDraft, seed: &MonsterDraft) -> MonsterDraft {
    draft.rarity = seed.rarity;
    draft.atk = draft.atk.max(seed.atk);
    draft.def = draft.def.max(seed.def);
    draft.spd = draft.spd.max(seed.spd);
    draft.hp = draft.hp.max(seed.hp);
    draft
}

/// Hybrid stats are fixed by the inputs: attack, health and defence add up
/// (saturating at `MAX_STAT`), speed is the faster of the two and rarity the
/// higher of the two.
pub fn hybrid_stats(mut draft: MonsterDraft, a: &Monster, b: &Monster) -> MonsterDraft {
    draft.atk = a.atk.saturating_add(b.atk);
    draft.hp = a.hp.saturating_add(b.hp);
    draft.def = a.def.saturating_add(b.def);
    draft.spd = a.spd.max(b.spd);
    draft.rarity = a.rarity.max(b.rarity);
    draft.sanitized()
}

fn spawn_fallback() -> MonsterDraft {
    MonsterDraft {
        name: FALLBACK_SPAWN_NAME.to_string(),
        element: FALLBACK_SPAWN_ELEMENT.to_string(),
        element_lore: "A drifter from between worlds.".to_string(),
        bio: "It slipped through the rift before anyone could name it.".to_string(),
        rarity: Rarity::Common,
        ability: FALLBACK_ABILITY.to_string(),
        atk: FALLBACK_ATK,
        def: FALLBACK_DEF,
        spd: FALLBACK_SPD,
        hp: FALLBACK_HP,
    }
}

fn merge_fallback(a: &Monster, b: &Monster) -> MonsterDraft {
    let front: String = a.name.chars().take((a.name.chars().count() + 1) / 2).collect();
    let back: String = {
        let chars: Vec<char> = b.name.chars().collect();
        chars[chars.len() / 2..].iter().collect()
    };
    MonsterDraft {
        name: format!("{front}{}", back.to_lowercase()),
        element: format!("{}/{}", a.element, b.element),
        element_lore: format!("{} entwined with {}.", a.element_lore, b.element_lore),
        bio: format!("Born when {} and {} were fused in the rift.", a.name, b.name),
        rarity: a.rarity.max(b.rarity),
        ability: a.ability.clone(),
        atk: 0,
        def: 0,
        spd: 0,
        hp: 0,
    }
}

// ── Operations ────────────────────────────────────────────────────────

impl Engine {
    pub async fn spawn(&self, player_id: &str, description: &str) -> Result<SpawnOutcome, GameError> {
        self.player(player_id).await?;
        let description = description.trim();
        if description.is_empty() {
            return Err(GameError::InvalidRequest("description is required".into()));
        }
        self.check_rate(player_id, RateLimitType::OracleActions)?;

        let hint = self.roll(|rng| prompts::element_hint(rng));
        let drafted = self
            .oracle
            .draft_monster(&prompts::spawn_prompt(description, &hint), spawn_fallback())
            .await;
        let fallback = drafted.is_fallback();
        let monster = self
            .db
            .insert_monster(player_id, &drafted.into_inner().sanitized())
            .await?;
        let position = self.db.list_monsters(player_id).await?.len();

        metrics::MONSTERS_CREATED_TOTAL
            .with_label_values(&["spawn"])
            .inc();
        tracing::info!(player = player_id, monster = %monster.name, fallback, "Monster spawned");

        Ok(SpawnOutcome {
            emoji: element_emoji(&monster.element),
            monster,
            position,
            fallback,
        })
    }

    pub async fn collection(&self, player_id: &str) -> Result<CollectionView, GameError> {
        let player = self.player(player_id).await?;
        let monsters = self.db.list_monsters(player_id).await?;
        Ok(CollectionView {
            essence: player.essence,
            guild: player.guild_name,
            monsters,
        })
    }

    pub async fn claim(&self, player_id: &str) -> Result<ClaimOutcome, GameError> {
        self.claim_at(player_id, Utc::now().timestamp_millis()).await
    }

    /// Claim as of `now_ms` (unix milliseconds).
    pub async fn claim_at(&self, player_id: &str, now_ms: i64) -> Result<ClaimOutcome, GameError> {
        self.player(player_id).await?;
        match self
            .db
            .try_claim(player_id, now_ms, CLAIM_AMOUNT, CLAIM_COOLDOWN_MS)
            .await?
        {
            Some(essence) => {
                metrics::ESSENCE_MINTED_TOTAL
                    .with_label_values(&["claim"])
                    .inc_by(CLAIM_AMOUNT as u64);
                Ok(ClaimOutcome {
                    claimed: CLAIM_AMOUNT,
                    essence,
                })
            }
            None => {
                let last = self
                    .db
                    .get_player(player_id)
                    .await?
                    .map(|p| p.last_claimed_at)
                    .unwrap_or(0);
                Err(GameError::CooldownActive {
                    remaining: Wait(last + CLAIM_COOLDOWN_MS - now_ms),
                })
            }
        }
    }

    pub async fn evolve(
        &self,
        player_id: &str,
        selection: &MonsterRef,
    ) -> Result<EvolveOutcome, GameError> {
        let player = self.player(player_id).await?;
        if player.essence < EVOLVE_COST {
            return Err(GameError::InsufficientFunds {
                need: EVOLVE_COST,
                have: player.essence,
            });
        }
        let monsters = self.db.list_monsters(player_id).await?;
        let current = selection.resolve(&monsters)?.clone();
        self.check_rate(player_id, RateLimitType::OracleActions)?;

        let seed = evolution_seed(&current);
        let drafted = self
            .oracle
            .draft_monster(&prompts::evolve_prompt(&current, &seed), seed.clone())
            .await;
        let fallback = drafted.is_fallback();
        let evolved = floor_stats(drafted.into_inner(), &seed).sanitized();

        let written = self
            .db
            .evolve_monster(player_id, &current.id, current.level, EVOLVE_COST, &evolved)
            .await?;
        let Some((monster, essence)) = written else {
            // Something changed while the oracle was drafting; report which.
            let have = self
                .db
                .get_player(player_id)
                .await?
                .map(|p| p.essence)
                .unwrap_or(0);
            if have < EVOLVE_COST {
                return Err(GameError::InsufficientFunds {
                    need: EVOLVE_COST,
                    have,
                });
            }
            return Err(GameError::InvalidSelection(format!(
                "{} changed while evolving; check /collection and try again",
                current.name
            )));
        };

        tracing::info!(player = player_id, monster = %monster.name, level = monster.level, "Monster evolved");

        Ok(EvolveOutcome {
            previous_name: current.name,
            monster,
            cost: EVOLVE_COST,
            essence,
            fallback,
        })
    }

    pub async fn merge(
        &self,
        player_id: &str,
        first: &MonsterRef,
        second: &MonsterRef,
    ) -> Result<MergeOutcome, GameError> {
        self.player(player_id).await?;
        let monsters = self.db.list_monsters(player_id).await?;
        let a = first.resolve(&monsters)?.clone();
        let b = second.resolve(&monsters)?.clone();
        if a.id == b.id {
            return Err(GameError::InvalidSelection(
                "pick two different monsters to merge".into(),
            ));
        }
        self.check_rate(player_id, RateLimitType::OracleActions)?;

        let drafted = self
            .oracle
            .draft_monster(&prompts::merge_prompt(&a, &b), merge_fallback(&a, &b))
            .await;
        let fallback = drafted.is_fallback();
        let hybrid = hybrid_stats(drafted.into_inner(), &a, &b).sanitized();

        let hybrid = self
            .db
            .merge_monsters(
                player_id,
                [(a.id.as_str(), a.level), (b.id.as_str(), b.level)],
                &hybrid,
            )
            .await?
            .ok_or_else(|| {
                GameError::InvalidSelection(
                    "one of those monsters changed while merging; check /collection and try again"
                        .into(),
                )
            })?;
        let collection_size = self.db.list_monsters(player_id).await?.len();

        metrics::MONSTERS_CREATED_TOTAL
            .with_label_values(&["merge"])
            .inc();
        tracing::info!(player = player_id, hybrid = %hybrid.name, "Monsters merged");

        Ok(MergeOutcome {
            consumed: [a.name, b.name],
            hybrid,
            collection_size,
            fallback,
        })
    }

    pub async fn boss_status(&self) -> Result<BossStatus, GameError> {
        Ok(BossStatus {
            boss: self.db.get_active_boss().await?,
        })
    }

    async fn ensure_boss(&self) -> Result<WorldBoss, GameError> {
        let name = self.roll(|rng| BOSS_NAMES.choose(rng).copied().unwrap_or(BOSS_NAMES[0]));
        Ok(self.db.ensure_active_boss(name, BOSS_MAX_HP).await?)
    }

    pub async fn raid(&self, player_id: &str, selection: &MonsterRef) -> Result<RaidOutcome, GameError> {
        let player = self.player(player_id).await?;
        let monsters = self.db.list_monsters(player_id).await?;
        let monster = selection.resolve(&monsters)?.clone();
        self.check_rate(player_id, RateLimitType::Raids)?;

        let buffs = self.buffs_for(&player).await?;
        let damage = buffs.apply_raid(self.roll(|rng| roll_raid_damage(rng, monster.atk)));

        // A boss killed between lookup and hit gets one retry on its successor.
        let mut write = None;
        for _ in 0..2 {
            let boss = self.ensure_boss().await?;
            write = self
                .db
                .raid_boss(
                    boss.id,
                    player_id,
                    damage,
                    RAID_PARTICIPATION_REWARD,
                    RAID_KILL_BONUS,
                )
                .await?;
            if write.is_some() {
                break;
            }
        }
        let write = write.ok_or_else(|| {
            GameError::InvalidRequest("the boss vanished mid-swing; raid again".into())
        })?;

        let minted = if write.killed {
            RAID_PARTICIPATION_REWARD + RAID_KILL_BONUS
        } else {
            RAID_PARTICIPATION_REWARD
        };
        metrics::ESSENCE_MINTED_TOTAL
            .with_label_values(&["raid"])
            .inc_by(minted as u64);
        if write.killed {
            metrics::BOSS_KILLS_TOTAL.inc();
            tracing::info!(player = player_id, boss = %write.boss.name, "World boss defeated");
        }

        Ok(RaidOutcome {
            monster: monster.name,
            boss_hp: write.boss.display_hp(),
            boss: write.boss,
            damage,
            reward: RAID_PARTICIPATION_REWARD,
            kill_bonus: if write.killed { RAID_KILL_BONUS } else { 0 },
            killed: write.killed,
            essence: write.essence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::MAX_STAT;

    fn monster(name: &str, atk: i64, def: i64, spd: i64, hp: i64) -> Monster {
        Monster {
            id: name.to_lowercase(),
            player_id: "p".into(),
            seq: 0,
            name: name.into(),
            element: "Inferno".into(),
            element_lore: "hot".into(),
            bio: "bio".into(),
            rarity: Rarity::Common,
            ability: format!("{name} Bite"),
            atk,
            def,
            spd,
            hp,
            max_hp: hp,
            level: 1,
        }
    }

    #[test]
    fn test_evolution_seed_adds_fixed_gains() {
        let seed = evolution_seed(&monster("Emberclaw", 60, 25, 12, 300));
        assert_eq!((seed.atk, seed.def, seed.spd, seed.hp), (105, 40, 17, 450));
        assert_eq!(seed.name, "Emberclaw");
    }

    #[test]
    fn test_floor_stats_never_lowers() {
        let seed = evolution_seed(&monster("Emberclaw", 60, 25, 12, 300));
        let mut weak = seed.clone();
        weak.atk = 10;
        weak.hp = 999;
        let floored = floor_stats(weak, &seed);
        assert_eq!(floored.atk, 105);
        assert_eq!(floored.hp, 999);
    }

    #[test]
    fn test_hybrid_stats_sum_and_max() {
        let a = monster("Emberclaw", 60, 25, 12, 300);
        let b = monster("Tidewyrm", 40, 30, 20, 200);
        let hybrid = hybrid_stats(merge_fallback(&a, &b), &a, &b);
        assert_eq!(hybrid.atk, 100);
        assert_eq!(hybrid.hp, 500);
        assert_eq!(hybrid.def, 55);
        assert_eq!(hybrid.spd, 20);
    }

    #[test]
    fn test_stat_math_saturates_at_cap() {
        let giant = monster("Colossus", MAX_STAT, MAX_STAT - 3, 1, MAX_STAT);
        let seed = evolution_seed(&giant);
        assert_eq!((seed.atk, seed.def, seed.hp), (MAX_STAT, MAX_STAT, MAX_STAT));

        let hybrid = hybrid_stats(merge_fallback(&giant, &giant), &giant, &giant);
        assert_eq!(hybrid.atk, MAX_STAT);
        assert_eq!(hybrid.hp, MAX_STAT);

        let mut stored = giant.clone();
        stored.atk = i64::MAX;
        assert_eq!(evolution_seed(&stored).atk, MAX_STAT);
    }

    #[test]
    fn test_rarity_through_evolve_and_merge() {
        let mut rare = monster("Emberclaw", 60, 25, 12, 300);
        rare.rarity = Rarity::Rare;
        let seed = evolution_seed(&rare);
        let mut drafted = seed.clone();
        drafted.rarity = Rarity::Unique;
        assert_eq!(floor_stats(drafted, &seed).rarity, Rarity::Rare);

        let common = monster("Tidewyrm", 40, 30, 20, 200);
        let hybrid = hybrid_stats(merge_fallback(&common, &rare), &common, &rare);
        assert_eq!(hybrid.rarity, Rarity::Rare);
        assert_eq!(hybrid.ability, "Tidewyrm Bite");
    }

    #[test]
    fn test_merge_fallback_blends_names() {
        let a = monster("Ember", 1, 1, 1, 1);
        let b = monster("Wyrm", 1, 1, 1, 1);
        let draft = merge_fallback(&a, &b);
        assert_eq!(draft.name, "Embrm");
        assert_eq!(draft.element, "Inferno/Inferno");
    }

    #[test]
    fn test_collection_text_lists_positions() {
        let view = CollectionView {
            essence: 1500,
            guild: None,
            monsters: vec![monster("Emberclaw", 60, 25, 12, 300)],
        };
        let text = view.text();
        assert!(text.contains("[Total: 1]"));
        assert!(text.contains("**[1]** 🔥 **Emberclaw** (Lv.1) ⚪ Common"));
        assert!(text.contains("Emberclaw Bite"));

        let empty = CollectionView {
            essence: 1000,
            guild: None,
            monsters: vec![],
        };
        assert!(empty.text().contains("empty"));
    }
}
