//! Tool selection.
//!
//! For each material class there is a fixed list of acceptable tool tiers.
//! Among the acceptable tools the agent carries, the most worn one wins so
//! that partly used tools are exhausted before fresh ones are started.

use crate::world::{Item, MaterialClass};

/// Tiers an agent may use, in catalogue order.
pub const TOOL_TIERS: &[&str] = &["stone", "iron", "golden", "diamond", "netherite"];

/// Item names acceptable for breaking a material class.
pub fn acceptable_tools(class: MaterialClass) -> Vec<String> {
    TOOL_TIERS
        .iter()
        .map(|tier| format!("{}_{}", tier, class.tool_suffix()))
        .collect()
}

/// Pick the most worn acceptable tool, or `None` to dig bare-handed.
///
/// Ties go to the lower tier, then to the earlier inventory slot.
pub fn select_tool(inventory: &[Item], class: MaterialClass) -> Option<&Item> {
    let mut best: Option<&Item> = None;

    for name in acceptable_tools(class) {
        for item in inventory.iter().filter(|i| i.name == name && i.count > 0) {
            match best {
                Some(current) if item.wear() <= current.wear() => {}
                _ => best = Some(item),
            }
        }
    }

    best
}

/// Convenience wrapper that classifies the block first.
pub fn select_tool_for_block<'a>(inventory: &'a [Item], block_name: &str) -> Option<&'a Item> {
    MaterialClass::of(block_name).and_then(|class| select_tool(inventory, class))
}
