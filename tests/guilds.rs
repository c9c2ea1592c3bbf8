// Integration tests for the guild lifecycle, vault and shop.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use rift_backend::db::Database;
use rift_backend::engine::config::{GUILD_FOUNDING_COST, SPECIAL_ELEMENTS, STARTING_ESSENCE};
use rift_backend::engine::error::GameError;
use rift_backend::engine::Engine;
use rift_backend::oracle::{Oracle, ScriptedGenerator};
use rift_backend::rate_limit::RateLimiter;

fn engine_on(db: Database) -> Engine {
    let oracle = Oracle::new(Arc::new(ScriptedGenerator::offline()), Duration::from_secs(1));
    Engine::with_seed(Arc::new(db), oracle, RateLimiter::disabled(), 11)
}

async fn test_engine() -> Engine {
    engine_on(Database::new("sqlite::memory:").await.unwrap())
}

/// Create `owner` with enough essence and found `name`.
async fn founded(engine: &Engine, owner: &str, name: &str, requirement: i64) {
    engine.collection(owner).await.unwrap();
    engine
        .db()
        .credit_essence(owner, GUILD_FOUNDING_COST)
        .await
        .unwrap();
    engine.create_guild(owner, name, requirement).await.unwrap();
}

async fn essence(engine: &Engine, player: &str) -> i64 {
    engine.db().get_player(player).await.unwrap().unwrap().essence
}

#[tokio::test]
async fn test_vanguard_founding_scenario() {
    let engine = test_engine().await;

    match engine.create_guild("P1", "Vanguard", 200).await {
        Err(GameError::InsufficientFunds { need, have }) => {
            assert_eq!(need, GUILD_FOUNDING_COST);
            assert_eq!(have, STARTING_ESSENCE);
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
    assert!(engine.db().get_guild("Vanguard").await.unwrap().is_none());

    engine.db().credit_essence("P1", 4000).await.unwrap();
    let summary = engine.create_guild("P1", "Vanguard", 200).await.unwrap();

    assert_eq!(summary.guild.name, "Vanguard");
    assert_eq!(summary.guild.owner_id, "P1");
    assert_eq!(summary.guild.vault, 0);
    assert_eq!(summary.guild.join_requirement, 200);
    assert!(SPECIAL_ELEMENTS.contains(&summary.guild.special_element.as_str()));
    assert_eq!(summary.members, vec!["P1".to_string()]);
    assert!(summary.active_buffs.is_empty());

    let p1 = engine.db().get_player("P1").await.unwrap().unwrap();
    assert_eq!(p1.essence, 0);
    assert_eq!(p1.guild_name.as_deref(), Some("Vanguard"));
}

#[tokio::test]
async fn test_create_guild_rejections() {
    let engine = test_engine().await;
    founded(&engine, "P1", "Vanguard", 0).await;

    engine.db().credit_essence("P1", GUILD_FOUNDING_COST).await.unwrap();
    assert!(matches!(
        engine.create_guild("P1", "Second", 0).await,
        Err(GameError::AlreadyInGuild(name)) if name == "Vanguard"
    ));

    engine.collection("P2").await.unwrap();
    engine.db().credit_essence("P2", GUILD_FOUNDING_COST).await.unwrap();
    assert!(matches!(
        engine.create_guild("P2", "vanguard", 0).await,
        Err(GameError::NameTaken(_))
    ));
    assert!(matches!(
        engine.create_guild("P2", "  ", 0).await,
        Err(GameError::InvalidRequest(_))
    ));
    assert!(matches!(
        engine.create_guild("P2", "Rearguard", -5).await,
        Err(GameError::InvalidRequest(_))
    ));
    // None of the rejections charged anything
    assert_eq!(essence(&engine, "P2").await, STARTING_ESSENCE + GUILD_FOUNDING_COST);
}

#[tokio::test]
async fn test_join_requirement_is_a_gate_not_a_fee() {
    let engine = test_engine().await;
    founded(&engine, "owner", "Vanguard", 200).await;

    // Park most of the essence in another guild's vault first
    founded(&engine, "other", "Rearguard", 0).await;
    engine.join_guild("poor", "Rearguard").await.unwrap();
    engine.deposit("poor", 900).await.unwrap();
    engine.leave_guild("poor").await.unwrap();
    match engine.join_guild("poor", "Vanguard").await {
        Err(GameError::RequirementNotMet { need, have }) => {
            assert_eq!(need, 200);
            assert_eq!(have, 100);
        }
        other => panic!("expected requirement not met, got {other:?}"),
    }

    let joined = engine.join_guild("rich", "vanguard").await.unwrap();
    assert_eq!(joined.guild, "Vanguard");
    assert_eq!(joined.members, 2);
    assert_eq!(essence(&engine, "rich").await, STARTING_ESSENCE);

    assert!(matches!(
        engine.join_guild("rich", "Vanguard").await,
        Err(GameError::AlreadyInGuild(_))
    ));
    assert!(matches!(
        engine.join_guild("poor", "Nowhere").await,
        Err(GameError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_kick_rules() {
    let engine = test_engine().await;
    founded(&engine, "owner", "Vanguard", 0).await;
    engine.join_guild("m1", "Vanguard").await.unwrap();

    assert!(matches!(
        engine.kick_member("m1", "owner").await,
        Err(GameError::NotOwner)
    ));
    assert!(matches!(
        engine.kick_member("owner", "owner").await,
        Err(GameError::SelfKick)
    ));
    assert!(matches!(
        engine.kick_member("owner", "stranger").await,
        Err(GameError::NotFound(_))
    ));

    let kicked = engine.kick_member("owner", "m1").await.unwrap();
    assert_eq!(kicked.target_id, "m1");
    let m1 = engine.db().get_player("m1").await.unwrap().unwrap();
    assert!(m1.guild_name.is_none());

    // Free to join elsewhere
    founded(&engine, "other", "Rearguard", 0).await;
    engine.join_guild("m1", "Rearguard").await.unwrap();
    let info = engine.guild_info("owner", None).await.unwrap();
    assert_eq!(info.members, vec!["owner".to_string()]);
}

#[tokio::test]
async fn test_deposit_moves_essence_into_vault() {
    let engine = test_engine().await;
    founded(&engine, "owner", "Vanguard", 0).await;
    engine.join_guild("m1", "Vanguard").await.unwrap();

    assert!(matches!(
        engine.deposit("m1", 0).await,
        Err(GameError::InvalidRequest(_))
    ));
    assert!(matches!(
        engine.deposit("loner", 10).await,
        Err(GameError::NoGuild)
    ));
    assert!(matches!(
        engine.deposit("m1", 5000).await,
        Err(GameError::InsufficientFunds { need: 5000, have: 1000 })
    ));

    let outcome = engine.deposit("m1", 400).await.unwrap();
    assert_eq!(outcome.essence, 600);
    assert_eq!(outcome.vault, 400);
    assert_eq!(outcome.guild, "Vanguard");
}

#[tokio::test]
async fn test_concurrent_deposits_never_overdraw() {
    let path = std::env::temp_dir().join(format!("rift-guilds-{}.db", uuid::Uuid::new_v4()));
    let engine = engine_on(
        Database::new(&format!("sqlite://{}", path.display()))
            .await
            .unwrap(),
    );
    founded(&engine, "owner", "Vanguard", 0).await;
    engine.join_guild("m1", "Vanguard").await.unwrap();

    let results = join_all((0..10).map(|_| engine.deposit("m1", 200))).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    assert_eq!(essence(&engine, "m1").await, 0);
    let vault = engine.db().get_guild("Vanguard").await.unwrap().unwrap().vault;
    assert_eq!(vault, 1000);

    drop(engine);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[tokio::test]
async fn test_shop_listing_and_purchase() {
    let engine = test_engine().await;
    founded(&engine, "owner", "Vanguard", 0).await;
    engine.join_guild("m1", "Vanguard").await.unwrap();

    let listing = engine.shop("m1", None).await.unwrap();
    assert_eq!(listing.items.len(), 3);
    assert_eq!(listing.vault, Some(0));
    assert!(listing.purchased.is_none());

    // Guildless players still see the catalog
    let outside = engine.shop("loner", Some("  ")).await.unwrap();
    assert!(outside.vault.is_none());

    assert!(matches!(
        engine.shop("m1", Some("war_drums")).await,
        Err(GameError::NotOwner)
    ));
    assert!(matches!(
        engine.shop("owner", Some("moon_beam")).await,
        Err(GameError::NotFound(_))
    ));
    assert!(matches!(
        engine.shop("owner", Some("war_drums")).await,
        Err(GameError::InsufficientVault { need: 2500, have: 0 })
    ));

    engine.db().credit_essence("m1", 2000).await.unwrap();
    engine.deposit("m1", 3000).await.unwrap();
    let bought = engine.shop("owner", Some("War Drums")).await.unwrap();
    let item = bought.purchased.unwrap();
    assert_eq!(item.id, "war_drums");
    assert_eq!(item.owned, 1);
    assert_eq!(bought.vault, Some(500));

    let info = engine.guild_info("m1", None).await.unwrap();
    assert_eq!(info.active_buffs, vec!["war_drums".to_string()]);
    assert_eq!(info.guild.vault, 500);
}

#[tokio::test]
async fn test_leave_and_disband() {
    let engine = test_engine().await;
    founded(&engine, "owner", "Vanguard", 0).await;
    engine.join_guild("m1", "Vanguard").await.unwrap();
    engine.join_guild("m2", "Vanguard").await.unwrap();
    engine.deposit("m2", 300).await.unwrap();

    assert!(matches!(
        engine.leave_guild("owner").await,
        Err(GameError::OwnerCannotLeave)
    ));
    assert!(matches!(
        engine.leave_guild("loner").await,
        Err(GameError::NoGuild)
    ));
    let left = engine.leave_guild("m1").await.unwrap();
    assert_eq!(left.guild, "Vanguard");

    assert!(matches!(
        engine.disband_guild("m2").await,
        Err(GameError::NotOwner)
    ));
    assert!(matches!(
        engine.disband_guild("m1").await,
        Err(GameError::NoGuild)
    ));

    let disbanded = engine.disband_guild("owner").await.unwrap();
    assert_eq!(disbanded.forfeited_vault, 300);
    assert_eq!(disbanded.released.len(), 2);
    assert!(disbanded.released.contains(&"m2".to_string()));
    assert!(engine.db().get_player("m2").await.unwrap().unwrap().guild_name.is_none());
    assert!(matches!(
        engine.guild_info("owner", Some("Vanguard")).await,
        Err(GameError::NotFound(_))
    ));

    // The name is free again
    founded(&engine, "m2", "Vanguard", 0).await;
}
