// LLM-friendly documentation endpoint content.

pub const LLMS_TXT: &str = r#"# Rift Monster RPG Webhook API
> Webhook backend for a Discord bot: collect LLM-invented monsters, battle them, evolve and fuse them, raid a shared world boss, and run guilds.

## Conventions
- Every action is POST with a JSON body and a required `playerId` (string or number).
- Monster selections accept a 1-based position (`1`, `"1"`) or a monster id (`monsterId`).
- Success: 200 `{ "text": "...", ...fields }`.
- Rejection: 200 `{ "error": "<kind>", "text": "<reason>" }`; check for `error` to tell it apart. Only storage failures return 500.

## Authentication
When the server has `WEBHOOK_SECRET` set, send `Authorization: Bearer <secret>` on action routes.

## Monsters
- POST /spawn - playerId, description. Summon a new monster (free) with a rarity (Common, Rare or Unique) and a signature ability.
- POST /collection - playerId. Ordered monsters and essence.
- POST /claim - playerId. +500 essence once every 24 hours.
- POST /battle - playerId, monsterIndex | monsterId. Win 150-500 essence; losses cost nothing.
- POST /evolve - playerId, monsterIndex | monsterId. Costs 1000 essence; +1 level, stats never drop.
- POST /merge - playerId, index1, index2. Fuse two monsters; attack, defence and HP add up, the higher rarity carries over.

## World boss
- POST /raid - playerId, monsterIndex | monsterId. +50 essence per hit, +2000 for the killing blow.
- GET /boss - Current boss and HP.

## Guilds
- POST /guild/create - playerId, name, joinRequirement. Costs 5000 essence.
- POST /guild/join - playerId, guildName. Requires essence >= joinRequirement (nothing is deducted).
- POST /guild/kick - playerId (owner), targetId.
- POST /guild/leave - playerId. Owners must disband instead.
- POST /guild/disband - playerId (owner). Vault is forfeited, members released.
- POST /guild/deposit - playerId, amount. Moves essence into the guild vault.
- POST /guild/shop - playerId, buyItem?. Without buyItem lists the catalog; owners buy with vault essence.
- POST /guild/info - playerId, guildName?. Guild summary (defaults to your own guild).

## Guild buffs (up to 3 stacks count)
- war_drums (2500) - +10% raid damage
- battle_standard (2000) - +5 battle roll
- bounty_charter (3000) - +10% battle rewards

## Service
- GET /health
- GET /metrics - Prometheus text format
- GET /llms.txt - This document
"#;
