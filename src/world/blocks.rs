//! Static block tables: transparency and material classes.

/// Block names an agent can see and move through.
const TRANSPARENT: &[&str] = &[
    "air",
    "cave_air",
    "void_air",
    "water",
    "lava",
    "glass",
    "glass_pane",
    "short_grass",
    "grass",
    "tall_grass",
    "fern",
    "large_fern",
    "dead_bush",
    "vine",
    "torch",
    "wall_torch",
    "snow",
    "sugar_cane",
    "kelp",
    "seagrass",
    "tall_seagrass",
    "dandelion",
    "poppy",
    "ladder",
];

/// Suffixes of transparent families (stained glass, leaves, flowers...).
const TRANSPARENT_SUFFIXES: &[&str] = &[
    "_leaves",
    "_glass",
    "_glass_pane",
    "_sapling",
    "_flower",
    "_tulip",
    "_carpet",
    "_button",
    "_sign",
];

/// True for the empty block types.
pub fn is_air(name: &str) -> bool {
    matches!(name, "air" | "cave_air" | "void_air")
}

/// True if the block does not obstruct an approach.
pub fn is_transparent(name: &str) -> bool {
    TRANSPARENT.contains(&name) || TRANSPARENT_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Which tool family breaks a block fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialClass {
    /// Pickaxe blocks.
    Stone,
    /// Shovel blocks.
    Soil,
    /// Axe blocks.
    Wood,
}

impl MaterialClass {
    /// Classify a block by name. `None` for blocks no tool speeds up.
    pub fn of(name: &str) -> Option<Self> {
        match name {
            "stone" | "cobblestone" | "granite" | "diorite" | "andesite" | "deepslate"
            | "cobbled_deepslate" | "sandstone" | "netherrack" | "obsidian" | "tuff" => {
                Some(Self::Stone)
            }
            "sand" | "red_sand" | "dirt" | "coarse_dirt" | "grass_block" | "gravel" | "clay"
            | "mud" | "podzol" | "mycelium" | "soul_sand" | "snow_block" => Some(Self::Soil),
            "log" | "planks" | "crafting_table" | "chest" | "bookshelf" => Some(Self::Wood),
            _ if name.ends_with("_ore") => Some(Self::Stone),
            _ if name.ends_with("_log") || name.ends_with("_planks") || name.ends_with("_wood") => {
                Some(Self::Wood)
            }
            _ => None,
        }
    }

    /// Tool suffix used in item names for this class.
    pub fn tool_suffix(&self) -> &'static str {
        match self {
            Self::Stone => "pickaxe",
            Self::Soil => "shovel",
            Self::Wood => "axe",
        }
    }
}

impl std::fmt::Display for MaterialClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stone => write!(f, "stone"),
            Self::Soil => write!(f, "soil"),
            Self::Wood => write!(f, "wood"),
        }
    }
}
