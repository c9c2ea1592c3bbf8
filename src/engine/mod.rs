// Game engine: the operations behind every webhook action.
//
// The engine owns no state of its own beyond an RNG; players, monsters,
// guilds and the boss live in the database and every mutation goes through
// one of its conditional writes.

pub mod battle;
pub mod config;
pub mod economy;
pub mod error;
pub mod guild;
pub mod model;

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::db::Database;
use crate::oracle::Oracle;
use crate::rate_limit::{RateLimitType, RateLimiter};

use config::STARTING_ESSENCE;
use error::GameError;
use model::{BuffEffects, Player};

#[derive(Clone)]
pub struct Engine {
    db: Arc<Database>,
    oracle: Oracle,
    rate_limiter: RateLimiter,
    rng: Arc<Mutex<StdRng>>,
}

impl Engine {
    pub fn new(db: Arc<Database>, oracle: Oracle, rate_limiter: RateLimiter) -> Self {
        Self::with_rng(db, oracle, rate_limiter, StdRng::from_entropy())
    }

    /// Deterministic engine for tests.
    pub fn with_seed(
        db: Arc<Database>,
        oracle: Oracle,
        rate_limiter: RateLimiter,
        seed: u64,
    ) -> Self {
        Self::with_rng(db, oracle, rate_limiter, StdRng::seed_from_u64(seed))
    }

    fn with_rng(db: Arc<Database>, oracle: Oracle, rate_limiter: RateLimiter, rng: StdRng) -> Self {
        Self {
            db,
            oracle,
            rate_limiter,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Run `f` with the engine RNG. Never hold the guard across an await.
    fn roll<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap();
        f(&mut rng)
    }

    /// Load the player, creating it on first reference.
    async fn player(&self, player_id: &str) -> Result<Player, GameError> {
        if player_id.trim().is_empty() {
            return Err(GameError::InvalidRequest("playerId is required".into()));
        }
        Ok(self.db.ensure_player(player_id, STARTING_ESSENCE).await?)
    }

    fn check_rate(&self, player_id: &str, limit: RateLimitType) -> Result<(), GameError> {
        self.rate_limiter.check_limit(player_id, limit)?;
        Ok(())
    }

    /// Effects of the buffs bought by the player's guild (none if guildless).
    async fn buffs_for(&self, player: &Player) -> Result<BuffEffects, GameError> {
        match &player.guild_name {
            Some(name) => {
                let ids = self.db.list_guild_buffs(name).await?;
                Ok(BuffEffects::from_ids(&ids))
            }
            None => Ok(BuffEffects::default()),
        }
    }
}
