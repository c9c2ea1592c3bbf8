// Prompt builders for the generation oracle.

use rand::Rng;

use crate::engine::config::{
    CUSTOM_ELEMENT_CHANCE, ELEMENT_PROFILES, RARE_ELEMENT_CHANCE, SPECIAL_ELEMENTS,
};
use crate::engine::model::{Monster, MonsterDraft};

pub const MONSTER_FORMAT: &str = r#"{"name": "Name", "element": "Type", "elLore": "Lore", "atk": 40, "def": 20, "spd": 10, "hp": 200, "rarity": "Common|Rare|Unique", "ability": "Move Name", "bio": "Bio"}"#;

pub const RIVAL_FORMAT: &str = r#"{"rivalName": "Name", "rivalElement": "Type", "atk": 40, "hp": 200, "narrative": "Two or three sentences."}"#;

/// Append the output contract the generator must follow.
pub fn with_contract(instruction: &str, format: &str) -> String {
    format!(
        "{instruction}\n\nRETURN ONLY RAW JSON. NO CODE BLOCKS. NO COMMENTARY.\nFORMAT: {format}"
    )
}

/// Pick the element guidance for a new spawn: usually one of the standard
/// element profiles, sometimes one of the rare elements, and occasionally
/// an element the generator invents itself.
pub fn element_hint<R: Rng + ?Sized>(rng: &mut R) -> String {
    let roll: f64 = rng.gen();
    if roll < CUSTOM_ELEMENT_CHANCE {
        "Create a completely new, unique element type based on the description.".to_string()
    } else if roll < RARE_ELEMENT_CHANCE {
        format!(
            "Pick one rare element from this list: {}.",
            SPECIAL_ELEMENTS.join(", ")
        )
    } else {
        let names: Vec<&str> = ELEMENT_PROFILES.iter().map(|(name, _)| *name).collect();
        format!(
            "Pick one element from this list: {}.",
            names.join(", ")
        )
    }
}

pub fn spawn_prompt(description: &str, element_hint: &str) -> String {
    format!(
        "Act as a monster RPG engine. Create a monster from this description: \"{description}\". \
         {element_hint} Give it a rarity (Common, Rare or Unique) and a signature ability. \
         Stats should be modest for a level 1 creature (atk 20-80, hp 100-400)."
    )
}

pub fn evolve_prompt(monster: &Monster, seed: &MonsterDraft) -> String {
    format!(
        "Act as a monster RPG engine. Evolve the level {level} {element} monster \"{name}\" \
         ({bio}) into a stronger form. Keep the element theme; its ability \"{ability}\" \
         may grow into a stronger move. \
         Use at least these stats: atk {atk}, def {def}, spd {spd}, hp {hp}.",
        level = monster.level,
        element = monster.element,
        name = monster.name,
        bio = monster.bio,
        ability = monster.ability,
        atk = seed.atk,
        def = seed.def,
        spd = seed.spd,
        hp = seed.hp,
    )
}

pub fn merge_prompt(a: &Monster, b: &Monster) -> String {
    format!(
        "Act as a monster RPG engine. Fuse \"{}\" ({}) and \"{}\" ({}) into a single hybrid \
         creature with a new name, a blended element, a new ability and a one-sentence bio. \
         Stats will be set by the engine; any values are fine.",
        a.name, a.element, b.name, b.element
    )
}

pub fn battle_prompt(monster: &Monster, won: bool) -> String {
    let outcome = if won {
        format!("{} WINS the fight", monster.name)
    } else {
        format!("{} LOSES the fight and retreats", monster.name)
    };
    format!(
        "Act as a monster arena announcer. Invent a rival monster (different name) to fight \
         \"{name}\", a level {level} {element} monster with {atk} attack. \
         The outcome is already decided: {outcome}. Narrate the fight in two or three \
         sentences consistent with that outcome; do not change it.",
        name = monster.name,
        level = monster.level,
        element = monster.element,
        atk = monster.atk,
    )
}
