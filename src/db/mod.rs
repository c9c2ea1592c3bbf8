// Database access layer (SQLite via sqlx).
//
// Every balance change is a single conditional UPDATE or a short
// transaction that begins with a write, so concurrent requests never lose
// updates and never drive essence or a vault below zero.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use crate::engine::model::{Guild, Monster, MonsterDraft, Player, WorldBoss};

const PLAYER_COLUMNS: &str = "id, essence, last_claimed_at, guild_name, created_at";
const MONSTER_COLUMNS: &str =
    "id, player_id, seq, name, element, element_lore, bio, rarity, ability, atk, def, spd, hp, max_hp, level";
const GUILD_COLUMNS: &str =
    "name, owner_id, vault, join_requirement, special_element, created_at";
const BOSS_COLUMNS: &str = "id, name, hp, max_hp, active";

/// Balances after a raid hit, and whether this hit was the killing blow.
#[derive(Debug, Clone)]
pub struct RaidWrite {
    pub boss: WorldBoss,
    pub essence: i64,
    pub killed: bool,
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its connection, so keep
        // exactly one open for the lifetime of the pool.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                essence INTEGER NOT NULL CHECK (essence >= 0),
                last_claimed_at INTEGER NOT NULL DEFAULT 0,
                guild_name TEXT COLLATE NOCASE,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monsters (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                player_id TEXT NOT NULL REFERENCES players(id),
                name TEXT NOT NULL,
                element TEXT NOT NULL DEFAULT '',
                element_lore TEXT NOT NULL DEFAULT '',
                bio TEXT NOT NULL DEFAULT '',
                rarity TEXT NOT NULL DEFAULT 'Common',
                ability TEXT NOT NULL DEFAULT '',
                atk INTEGER NOT NULL CHECK (atk >= 1),
                def INTEGER NOT NULL CHECK (def >= 1),
                spd INTEGER NOT NULL CHECK (spd >= 1),
                hp INTEGER NOT NULL CHECK (hp >= 1),
                max_hp INTEGER NOT NULL CHECK (max_hp >= 1),
                level INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_monsters_player ON monsters(player_id, seq)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guilds (
                name TEXT PRIMARY KEY COLLATE NOCASE,
                owner_id TEXT NOT NULL UNIQUE,
                vault INTEGER NOT NULL DEFAULT 0 CHECK (vault >= 0),
                join_requirement INTEGER NOT NULL DEFAULT 0 CHECK (join_requirement >= 0),
                special_element TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_buffs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_name TEXT NOT NULL COLLATE NOCASE,
                buff_id TEXT NOT NULL,
                purchased_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_bosses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                hp INTEGER NOT NULL,
                max_hp INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                defeated_by TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        // At most one boss can be active at a time.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_world_bosses_active ON world_bosses(active) WHERE active = 1",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Players ───────────────────────────────────────────────────────

    pub async fn ensure_player(
        &self,
        id: &str,
        starting_essence: i64,
    ) -> Result<Player, sqlx::Error> {
        sqlx::query("INSERT INTO players (id, essence) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
            .bind(id)
            .bind(starting_essence)
            .execute(&self.pool)
            .await?;

        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?");
        sqlx::query_as::<_, Player>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_player(&self, id: &str) -> Result<Option<Player>, sqlx::Error> {
        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?");
        sqlx::query_as::<_, Player>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn credit_essence(&self, id: &str, amount: i64) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("UPDATE players SET essence = essence + ? WHERE id = ? RETURNING essence")
            .bind(amount)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    // Zero rows while the cooldown is active.
    pub async fn try_claim(
        &self,
        id: &str,
        now_ms: i64,
        amount: i64,
        cooldown_ms: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE players SET essence = essence + ?, last_claimed_at = ? WHERE id = ? AND last_claimed_at <= ? RETURNING essence",
        )
        .bind(amount)
        .bind(now_ms)
        .bind(id)
        .bind(now_ms - cooldown_ms)
        .fetch_optional(&self.pool)
        .await
    }

    // ── Monsters ──────────────────────────────────────────────────────

    pub async fn list_monsters(&self, player_id: &str) -> Result<Vec<Monster>, sqlx::Error> {
        let sql = format!("SELECT {MONSTER_COLUMNS} FROM monsters WHERE player_id = ? ORDER BY seq");
        sqlx::query_as::<_, Monster>(&sql)
            .bind(player_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn insert_monster(
        &self,
        player_id: &str,
        draft: &MonsterDraft,
    ) -> Result<Monster, sqlx::Error> {
        let sql = format!(
            "INSERT INTO monsters (id, player_id, name, element, element_lore, bio, rarity, ability, atk, def, spd, hp, max_hp, level) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1) RETURNING {MONSTER_COLUMNS}"
        );
        sqlx::query_as::<_, Monster>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(player_id)
            .bind(&draft.name)
            .bind(&draft.element)
            .bind(&draft.element_lore)
            .bind(&draft.bio)
            .bind(draft.rarity.as_str())
            .bind(&draft.ability)
            .bind(draft.atk)
            .bind(draft.def)
            .bind(draft.spd)
            .bind(draft.hp)
            .bind(draft.hp)
            .fetch_one(&self.pool)
            .await
    }

    /// Charge `cost` and overwrite the monster with `draft`, only while it is
    /// still at `expected_level`.
    pub async fn evolve_monster(
        &self,
        player_id: &str,
        monster_id: &str,
        expected_level: i64,
        cost: i64,
        draft: &MonsterDraft,
    ) -> Result<Option<(Monster, i64)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let essence: Option<i64> = sqlx::query_scalar(
            "UPDATE players SET essence = essence - ? WHERE id = ? AND essence >= ? RETURNING essence",
        )
        .bind(cost)
        .bind(player_id)
        .bind(cost)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(essence) = essence else {
            return Ok(None);
        };

        let sql = format!(
            "UPDATE monsters SET name = ?, element = ?, element_lore = ?, bio = ?, rarity = ?, ability = ?, atk = ?, def = ?, spd = ?, hp = ?, max_hp = ?, level = level + 1 \
             WHERE id = ? AND player_id = ? AND level = ? RETURNING {MONSTER_COLUMNS}"
        );
        let monster = sqlx::query_as::<_, Monster>(&sql)
            .bind(&draft.name)
            .bind(&draft.element)
            .bind(&draft.element_lore)
            .bind(&draft.bio)
            .bind(draft.rarity.as_str())
            .bind(&draft.ability)
            .bind(draft.atk)
            .bind(draft.def)
            .bind(draft.spd)
            .bind(draft.hp)
            .bind(draft.hp)
            .bind(monster_id)
            .bind(player_id)
            .bind(expected_level)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(monster) = monster else {
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some((monster, essence)))
    }

    pub async fn merge_monsters(
        &self,
        player_id: &str,
        sources: [(&str, i64); 2],
        hybrid: &MonsterDraft,
    ) -> Result<Option<Monster>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for (monster_id, level) in sources {
            let removed = sqlx::query("DELETE FROM monsters WHERE id = ? AND player_id = ? AND level = ?")
                .bind(monster_id)
                .bind(player_id)
                .bind(level)
                .execute(&mut *tx)
                .await?;
            if removed.rows_affected() != 1 {
                return Ok(None);
            }
        }

        let sql = format!(
            "INSERT INTO monsters (id, player_id, name, element, element_lore, bio, rarity, ability, atk, def, spd, hp, max_hp, level) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1) RETURNING {MONSTER_COLUMNS}"
        );
        let monster = sqlx::query_as::<_, Monster>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(player_id)
            .bind(&hybrid.name)
            .bind(&hybrid.element)
            .bind(&hybrid.element_lore)
            .bind(&hybrid.bio)
            .bind(hybrid.rarity.as_str())
            .bind(&hybrid.ability)
            .bind(hybrid.atk)
            .bind(hybrid.def)
            .bind(hybrid.spd)
            .bind(hybrid.hp)
            .bind(hybrid.hp)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(monster))
    }

    // ── World boss ────────────────────────────────────────────────────

    pub async fn get_active_boss(&self) -> Result<Option<WorldBoss>, sqlx::Error> {
        let sql = format!("SELECT {BOSS_COLUMNS} FROM world_bosses WHERE active = 1");
        sqlx::query_as::<_, WorldBoss>(&sql)
            .fetch_optional(&self.pool)
            .await
    }

    // Concurrent inserts race on the partial unique index; losers read the
    // winner's boss.
    pub async fn ensure_active_boss(
        &self,
        name: &str,
        max_hp: i64,
    ) -> Result<WorldBoss, sqlx::Error> {
        for _ in 0..3 {
            if let Some(boss) = self.get_active_boss().await? {
                return Ok(boss);
            }
            sqlx::query("INSERT OR IGNORE INTO world_bosses (name, hp, max_hp, active) VALUES (?, ?, ?, 1)")
                .bind(name)
                .bind(max_hp)
                .bind(max_hp)
                .execute(&self.pool)
                .await?;
        }
        self.get_active_boss()
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Apply one raid hit as a unit: damage the boss (only while it is
    /// active), pay the participation reward, and if the boss dropped to
    /// zero deactivate it with a compare-and-set. Only the request that wins
    /// the compare-and-set receives `kill_bonus`.
    ///
    /// Returns None if the boss was no longer active.
    pub async fn raid_boss(
        &self,
        boss_id: i64,
        player_id: &str,
        damage: i64,
        participation: i64,
        kill_bonus: i64,
    ) -> Result<Option<RaidWrite>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE world_bosses SET hp = hp - ? WHERE id = ? AND active = 1 RETURNING {BOSS_COLUMNS}"
        );
        let boss = sqlx::query_as::<_, WorldBoss>(&sql)
            .bind(damage)
            .bind(boss_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut boss) = boss else {
            return Ok(None);
        };

        let mut essence: i64 =
            sqlx::query_scalar("UPDATE players SET essence = essence + ? WHERE id = ? RETURNING essence")
                .bind(participation)
                .bind(player_id)
                .fetch_one(&mut *tx)
                .await?;

        let mut killed = false;
        if boss.hp <= 0 {
            let deactivated = sqlx::query(
                "UPDATE world_bosses SET active = 0, defeated_by = ? WHERE id = ? AND active = 1 AND hp <= 0",
            )
            .bind(player_id)
            .bind(boss_id)
            .execute(&mut *tx)
            .await?;

            if deactivated.rows_affected() == 1 {
                killed = true;
                boss.active = false;
                essence = sqlx::query_scalar(
                    "UPDATE players SET essence = essence + ? WHERE id = ? RETURNING essence",
                )
                .bind(kill_bonus)
                .bind(player_id)
                .fetch_one(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(Some(RaidWrite {
            boss,
            essence,
            killed,
        }))
    }

    // ── Guilds ────────────────────────────────────────────────────────

    pub async fn get_guild(&self, name: &str) -> Result<Option<Guild>, sqlx::Error> {
        let sql = format!("SELECT {GUILD_COLUMNS} FROM guilds WHERE name = ?");
        sqlx::query_as::<_, Guild>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_guild_owned_by(&self, owner_id: &str) -> Result<Option<Guild>, sqlx::Error> {
        let sql = format!("SELECT {GUILD_COLUMNS} FROM guilds WHERE owner_id = ?");
        sqlx::query_as::<_, Guild>(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_guild_members(&self, name: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM players WHERE guild_name = ? ORDER BY created_at, id")
            .bind(name)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_guild_buffs(&self, name: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT buff_id FROM guild_buffs WHERE guild_name = ? ORDER BY id")
            .bind(name)
            .fetch_all(&self.pool)
            .await
    }

    // A duplicate name surfaces as a unique violation.
    pub async fn create_guild(
        &self,
        owner_id: &str,
        name: &str,
        join_requirement: i64,
        special_element: &str,
        cost: i64,
    ) -> Result<Option<Guild>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let charged = sqlx::query(
            "UPDATE players SET essence = essence - ?, guild_name = ? WHERE id = ? AND essence >= ? AND guild_name IS NULL",
        )
        .bind(cost)
        .bind(name)
        .bind(owner_id)
        .bind(cost)
        .execute(&mut *tx)
        .await?;
        if charged.rows_affected() != 1 {
            return Ok(None);
        }

        let sql = format!(
            "INSERT INTO guilds (name, owner_id, join_requirement, special_element) VALUES (?, ?, ?, ?) RETURNING {GUILD_COLUMNS}"
        );
        let guild = sqlx::query_as::<_, Guild>(&sql)
            .bind(name)
            .bind(owner_id)
            .bind(join_requirement)
            .bind(special_element)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(guild))
    }

    pub async fn join_guild(&self, player_id: &str, guild_name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE players
            SET guild_name = (SELECT name FROM guilds WHERE name = ?)
            WHERE id = ?
              AND guild_name IS NULL
              AND essence >= (SELECT join_requirement FROM guilds WHERE name = ?)
        "#,
        )
        .bind(guild_name)
        .bind(player_id)
        .bind(guild_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn remove_member(&self, guild_name: &str, player_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE players SET guild_name = NULL WHERE id = ? AND guild_name = ?")
            .bind(player_id)
            .bind(guild_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn deposit(&self, player_id: &str, amount: i64) -> Result<Option<(i64, i64)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let debited: Option<(i64, String)> = sqlx::query_as(
            "UPDATE players SET essence = essence - ? WHERE id = ? AND essence >= ? AND guild_name IS NOT NULL RETURNING essence, guild_name",
        )
        .bind(amount)
        .bind(player_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((essence, guild_name)) = debited else {
            return Ok(None);
        };

        let vault: Option<i64> =
            sqlx::query_scalar("UPDATE guilds SET vault = vault + ? WHERE name = ? RETURNING vault")
                .bind(amount)
                .bind(&guild_name)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(vault) = vault else {
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some((essence, vault)))
    }

    pub async fn buy_buff(
        &self,
        guild_name: &str,
        buff_id: &str,
        price: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let vault: Option<i64> = sqlx::query_scalar(
            "UPDATE guilds SET vault = vault - ? WHERE name = ? AND vault >= ? RETURNING vault",
        )
        .bind(price)
        .bind(guild_name)
        .bind(price)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(vault) = vault else {
            return Ok(None);
        };

        sqlx::query("INSERT INTO guild_buffs (guild_name, buff_id) VALUES (?, ?)")
            .bind(guild_name)
            .bind(buff_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(vault))
    }

    /// Returns the forfeited vault and the released member ids.
    pub async fn disband_guild(
        &self,
        guild_name: &str,
        owner_id: &str,
    ) -> Result<Option<(i64, Vec<String>)>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let vault: Option<i64> =
            sqlx::query_scalar("DELETE FROM guilds WHERE name = ? AND owner_id = ? RETURNING vault")
                .bind(guild_name)
                .bind(owner_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(vault) = vault else {
            return Ok(None);
        };

        let released: Vec<String> =
            sqlx::query_scalar("UPDATE players SET guild_name = NULL WHERE guild_name = ? RETURNING id")
                .bind(guild_name)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM guild_buffs WHERE guild_name = ?")
            .bind(guild_name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((vault, released)))
    }
}
