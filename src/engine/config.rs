// Game constants for the monster collection economy.

// Player defaults
pub const STARTING_ESSENCE: i64 = 1000;

// Daily claim
pub const CLAIM_AMOUNT: i64 = 500;
pub const CLAIM_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;

// Evolution
pub const EVOLVE_COST: i64 = 1000;
pub const EVOLVE_ATK_GAIN: i64 = 45;
pub const EVOLVE_DEF_GAIN: i64 = 15;
pub const EVOLVE_SPD_GAIN: i64 = 5;
pub const EVOLVE_HP_GAIN: i64 = 150;

// Battle: win when atk + swing + bonus >= threshold
pub const BATTLE_SWING: i64 = 40;
pub const BATTLE_WIN_THRESHOLD: i64 = 60;
pub const BATTLE_REWARD_MIN: i64 = 150;
pub const BATTLE_REWARD_MAX: i64 = 500;

// Raid
pub const RAID_DAMAGE_FLOOR: i64 = 30;
pub const RAID_ATK_MULTIPLIER_MAX: f64 = 1.5;
pub const RAID_PARTICIPATION_REWARD: i64 = 50;
pub const RAID_KILL_BONUS: i64 = 2000;
pub const BOSS_MAX_HP: i64 = 10_000;

pub const BOSS_NAMES: [&str; 6] = [
    "Omega Leviathan",
    "The Hollow King",
    "Chrono Wyrm",
    "Abyssal Colossus",
    "Glitch Sovereign",
    "Starfall Behemoth",
];

// Guilds
pub const GUILD_FOUNDING_COST: i64 = 5000;
pub const SPECIAL_ELEMENTS: [&str; 3] = ["Magic", "Soul", "Legend"];

/// Buff stacks beyond this count are still bought but add no further effect.
pub const MAX_EFFECTIVE_BUFF_STACKS: usize = 3;

// Oracle fallbacks (used when the generator output is missing or unusable)
pub const FALLBACK_ATK: i64 = 50;
pub const FALLBACK_DEF: i64 = 20;
pub const FALLBACK_SPD: i64 = 10;
pub const FALLBACK_HP: i64 = 250;
pub const FALLBACK_ABILITY: &str = "Rift Strike";

/// Ceiling for every stored stat. Generated values above it are clamped,
/// and evolve/merge results saturate at it.
pub const MAX_STAT: i64 = 1_000_000;
pub const MAX_ABILITY_CHARS: usize = 48;

/// Standard elements offered to the generator, with their display emoji.
pub const ELEMENT_PROFILES: [(&str, &str); 12] = [
    ("inferno", "🔥"),
    ("abyssal", "🌑"),
    ("cyber", "📡"),
    ("void", "🌀"),
    ("celestial", "✨"),
    ("bio-hazard", "☣️"),
    ("plasma", "⚡"),
    ("glitch", "👾"),
    ("aura", "🌸"),
    ("spectre", "👻"),
    ("chrono", "⏳"),
    ("vortex", "🌪️"),
];

pub const DEFAULT_ELEMENT_EMOJI: &str = "💎";

/// Chance that a spawn prompt lets the generator invent a brand new element.
pub const CUSTOM_ELEMENT_CHANCE: f64 = 0.05;
/// Chance (including the custom slice) that a spawn prompt asks for
/// something other than a standard element.
pub const RARE_ELEMENT_CHANCE: f64 = 0.20;
