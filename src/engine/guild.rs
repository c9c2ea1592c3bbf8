// Guilds: lifecycle, shared vault, and the buff shop.
//
// Membership lives only on the player row (`guild_name`); member lists are
// always derived from it.

use rand::seq::SliceRandom;
use serde::Serialize;

use super::config::{GUILD_FOUNDING_COST, SPECIAL_ELEMENTS};
use super::error::GameError;
use super::model::{BuffKind, Guild, GuildSummary, Player};
use super::Engine;
use crate::db;

const MAX_GUILD_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub guild: String,
    pub members: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KickOutcome {
    pub guild: String,
    pub target_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveOutcome {
    pub guild: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbandOutcome {
    pub guild: String,
    pub forfeited_vault: i64,
    pub released: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositOutcome {
    pub guild: String,
    pub amount: i64,
    pub essence: i64,
    pub vault: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    pub price: i64,
    pub description: &'static str,
    /// How many the guild has bought already.
    pub owned: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopOutcome {
    pub guild: Option<String>,
    pub vault: Option<i64>,
    pub items: Vec<ShopItem>,
    pub purchased: Option<ShopItem>,
}

impl JoinOutcome {
    pub fn text(&self) -> String {
        format!(
            "🤝 Welcome to **{}**! The guild now has {} members.",
            self.guild, self.members
        )
    }
}

impl KickOutcome {
    pub fn text(&self) -> String {
        format!("🥾 {} was removed from **{}**.", self.target_id, self.guild)
    }
}

impl LeaveOutcome {
    pub fn text(&self) -> String {
        format!("👋 You left **{}**.", self.guild)
    }
}

impl DisbandOutcome {
    pub fn text(&self) -> String {
        format!(
            "🏚️ **{}** has been disbanded. {} members released; {} vault essence was lost to the rift.",
            self.guild,
            self.released.len(),
            self.forfeited_vault
        )
    }
}

impl DepositOutcome {
    pub fn text(&self) -> String {
        format!(
            "🏦 Deposited {} into **{}**. Vault: 💰 {} | Your essence: {}",
            self.amount, self.guild, self.vault, self.essence
        )
    }
}

impl ShopOutcome {
    pub fn text(&self) -> String {
        if let Some(item) = &self.purchased {
            return format!(
                "🛒 **{}** bought {} (x{} now active). Vault: 💰 {}",
                self.guild.as_deref().unwrap_or("guild"),
                item.name,
                item.owned,
                self.vault.unwrap_or(0)
            );
        }
        let mut text = String::from("🏪 **Guild Shop**\n");
        if let Some(vault) = self.vault {
            text.push_str(&format!("Vault: 💰 {vault}\n"));
        }
        text.push('\n');
        for item in &self.items {
            text.push_str(&format!(
                "`{}` **{}** ({} essence): {} [owned: {}]\n",
                item.id, item.name, item.price, item.description, item.owned
            ));
        }
        text.trim_end().to_string()
    }
}

/// Guild summary text, shared by create and info.
pub fn summary_text(summary: &GuildSummary) -> String {
    let g = &summary.guild;
    let buffs = if summary.active_buffs.is_empty() {
        "none".to_string()
    } else {
        summary.active_buffs.join(", ")
    };
    format!(
        "🏰 **{}** ({} affinity)\nOwner: {}\nMembers ({}): {}\nVault: 💰 {}\nJoin requirement: {} essence\nBuffs: {}",
        g.name,
        g.special_element,
        g.owner_id,
        summary.members.len(),
        summary.members.join(", "),
        g.vault,
        g.join_requirement,
        buffs
    )
}

fn catalog(owned: &[String]) -> Vec<ShopItem> {
    BuffKind::ALL.into_iter().map(|kind| shop_item(kind, owned)).collect()
}

fn shop_item(kind: BuffKind, owned: &[String]) -> ShopItem {
    ShopItem {
        id: kind.id(),
        name: kind.display_name(),
        price: kind.price(),
        description: kind.description(),
        owned: owned.iter().filter(|id| id.as_str() == kind.id()).count(),
    }
}

fn validate_guild_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::InvalidRequest("guild name is required".into()));
    }
    if name.chars().count() > MAX_GUILD_NAME_LEN {
        return Err(GameError::InvalidRequest(format!(
            "guild name must be at most {MAX_GUILD_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

impl Engine {
    async fn summarize(&self, guild: Guild) -> Result<GuildSummary, GameError> {
        let members = self.db.list_guild_members(&guild.name).await?;
        let active_buffs = self.db.list_guild_buffs(&guild.name).await?;
        Ok(GuildSummary {
            guild,
            members,
            active_buffs,
        })
    }

    async fn reload(&self, player_id: &str) -> Result<Player, GameError> {
        self.db
            .get_player(player_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("player {player_id}")))
    }

    pub async fn create_guild(
        &self,
        player_id: &str,
        name: &str,
        join_requirement: i64,
    ) -> Result<GuildSummary, GameError> {
        let player = self.player(player_id).await?;
        let name = validate_guild_name(name)?;
        if join_requirement < 0 {
            return Err(GameError::InvalidRequest(
                "joinRequirement cannot be negative".into(),
            ));
        }
        if let Some(current) = player.guild_name {
            return Err(GameError::AlreadyInGuild(current));
        }
        if player.essence < GUILD_FOUNDING_COST {
            return Err(GameError::InsufficientFunds {
                need: GUILD_FOUNDING_COST,
                have: player.essence,
            });
        }
        if self.db.get_guild(&name).await?.is_some() {
            return Err(GameError::NameTaken(name));
        }

        let element = self.roll(|rng| {
            SPECIAL_ELEMENTS
                .choose(rng)
                .copied()
                .unwrap_or(SPECIAL_ELEMENTS[0])
        });
        let created = match self
            .db
            .create_guild(player_id, &name, join_requirement, element, GUILD_FOUNDING_COST)
            .await
        {
            Ok(created) => created,
            Err(e) if db::is_unique_violation(&e) => return Err(GameError::NameTaken(name)),
            Err(e) => return Err(e.into()),
        };
        let Some(guild) = created else {
            let player = self.reload(player_id).await?;
            return Err(match player.guild_name {
                Some(current) => GameError::AlreadyInGuild(current),
                None => GameError::InsufficientFunds {
                    need: GUILD_FOUNDING_COST,
                    have: player.essence,
                },
            });
        };

        tracing::info!(owner = player_id, guild = %guild.name, element, "Guild founded");
        self.summarize(guild).await
    }

    pub async fn join_guild(&self, player_id: &str, guild_name: &str) -> Result<JoinOutcome, GameError> {
        let player = self.player(player_id).await?;
        if let Some(current) = player.guild_name {
            return Err(GameError::AlreadyInGuild(current));
        }
        let guild = self
            .db
            .get_guild(guild_name.trim())
            .await?
            .ok_or_else(|| GameError::NotFound(format!("guild {}", guild_name.trim())))?;
        if player.essence < guild.join_requirement {
            return Err(GameError::RequirementNotMet {
                need: guild.join_requirement,
                have: player.essence,
            });
        }

        if !self.db.join_guild(player_id, &guild.name).await? {
            // Lost a race: work out which gate closed.
            let player = self.reload(player_id).await?;
            if let Some(current) = player.guild_name {
                return Err(GameError::AlreadyInGuild(current));
            }
            return match self.db.get_guild(&guild.name).await? {
                None => Err(GameError::NotFound(format!("guild {}", guild.name))),
                Some(g) => Err(GameError::RequirementNotMet {
                    need: g.join_requirement,
                    have: player.essence,
                }),
            };
        }

        let members = self.db.list_guild_members(&guild.name).await?.len();
        tracing::info!(player = player_id, guild = %guild.name, "Joined guild");
        Ok(JoinOutcome {
            guild: guild.name,
            members,
        })
    }

    pub async fn kick_member(&self, owner_id: &str, target_id: &str) -> Result<KickOutcome, GameError> {
        self.player(owner_id).await?;
        let target_id = target_id.trim();
        if target_id.is_empty() {
            return Err(GameError::InvalidRequest("targetId is required".into()));
        }
        let guild = self
            .db
            .get_guild_owned_by(owner_id)
            .await?
            .ok_or(GameError::NotOwner)?;
        if target_id == owner_id {
            return Err(GameError::SelfKick);
        }
        if !self.db.remove_member(&guild.name, target_id).await? {
            return Err(GameError::NotFound(format!(
                "member {target_id} in {}",
                guild.name
            )));
        }

        tracing::info!(owner = owner_id, target = target_id, guild = %guild.name, "Member kicked");
        Ok(KickOutcome {
            guild: guild.name,
            target_id: target_id.to_string(),
        })
    }

    pub async fn leave_guild(&self, player_id: &str) -> Result<LeaveOutcome, GameError> {
        let player = self.player(player_id).await?;
        let guild_name = player.guild_name.ok_or(GameError::NoGuild)?;
        if let Some(guild) = self.db.get_guild(&guild_name).await? {
            if guild.owner_id == player_id {
                return Err(GameError::OwnerCannotLeave);
            }
        }
        if !self.db.remove_member(&guild_name, player_id).await? {
            return Err(GameError::NoGuild);
        }
        Ok(LeaveOutcome { guild: guild_name })
    }

    /// Owner-only. The vault is forfeited and every member is released.
    pub async fn disband_guild(&self, player_id: &str) -> Result<DisbandOutcome, GameError> {
        let player = self.player(player_id).await?;
        let Some(guild) = self.db.get_guild_owned_by(player_id).await? else {
            return Err(if player.guild_name.is_some() {
                GameError::NotOwner
            } else {
                GameError::NoGuild
            });
        };
        let (forfeited_vault, released) = self
            .db
            .disband_guild(&guild.name, player_id)
            .await?
            .ok_or(GameError::NotOwner)?;

        tracing::warn!(owner = player_id, guild = %guild.name, forfeited_vault, "Guild disbanded");
        Ok(DisbandOutcome {
            guild: guild.name,
            forfeited_vault,
            released,
        })
    }

    pub async fn deposit(&self, player_id: &str, amount: i64) -> Result<DepositOutcome, GameError> {
        let player = self.player(player_id).await?;
        if amount <= 0 {
            return Err(GameError::InvalidRequest(
                "amount must be a positive number".into(),
            ));
        }
        let guild = player.guild_name.ok_or(GameError::NoGuild)?;
        if player.essence < amount {
            return Err(GameError::InsufficientFunds {
                need: amount,
                have: player.essence,
            });
        }

        let Some((essence, vault)) = self.db.deposit(player_id, amount).await? else {
            let player = self.reload(player_id).await?;
            return Err(if player.guild_name.is_none() {
                GameError::NoGuild
            } else {
                GameError::InsufficientFunds {
                    need: amount,
                    have: player.essence,
                }
            });
        };

        Ok(DepositOutcome {
            guild,
            amount,
            essence,
            vault,
        })
    }

    /// List the catalog, or buy `buy_item` for the caller's guild (owner only).
    pub async fn shop(&self, player_id: &str, buy_item: Option<&str>) -> Result<ShopOutcome, GameError> {
        let player = self.player(player_id).await?;

        let Some(raw) = buy_item.map(str::trim).filter(|s| !s.is_empty()) else {
            let guild = match &player.guild_name {
                Some(name) => self.db.get_guild(name).await?,
                None => None,
            };
            let owned = match &guild {
                Some(g) => self.db.list_guild_buffs(&g.name).await?,
                None => Vec::new(),
            };
            return Ok(ShopOutcome {
                vault: guild.as_ref().map(|g| g.vault),
                guild: guild.map(|g| g.name),
                items: catalog(&owned),
                purchased: None,
            });
        };

        let guild = self
            .db
            .get_guild_owned_by(player_id)
            .await?
            .ok_or(GameError::NotOwner)?;
        let kind = BuffKind::from_id(raw)
            .ok_or_else(|| GameError::NotFound(format!("shop item {raw}")))?;
        if guild.vault < kind.price() {
            return Err(GameError::InsufficientVault {
                need: kind.price(),
                have: guild.vault,
            });
        }

        let Some(vault) = self.db.buy_buff(&guild.name, kind.id(), kind.price()).await? else {
            let have = self
                .db
                .get_guild(&guild.name)
                .await?
                .map(|g| g.vault)
                .unwrap_or(0);
            return Err(GameError::InsufficientVault {
                need: kind.price(),
                have,
            });
        };

        let owned = self.db.list_guild_buffs(&guild.name).await?;
        tracing::info!(owner = player_id, guild = %guild.name, item = kind.id(), vault, "Buff purchased");
        Ok(ShopOutcome {
            purchased: Some(shop_item(kind, &owned)),
            items: catalog(&owned),
            vault: Some(vault),
            guild: Some(guild.name),
        })
    }

    /// Summary of `guild_name`, or of the caller's own guild.
    pub async fn guild_info(
        &self,
        player_id: &str,
        guild_name: Option<&str>,
    ) -> Result<GuildSummary, GameError> {
        let player = self.player(player_id).await?;
        let name = match guild_name.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => name.to_string(),
            None => player.guild_name.ok_or(GameError::NoGuild)?,
        };
        let guild = self
            .db
            .get_guild(&name)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("guild {name}")))?;
        self.summarize(guild).await
    }
}
