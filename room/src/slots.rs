//! Static slot registry: which render target and placeholder belong to a slot.

use room_core::SlotId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a render target (the element a slot draws into).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetId(String);

impl RenderTargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Conventional target id for a slot, e.g. `video-marketing`.
    pub fn for_slot(slot: SlotId) -> Self {
        Self(format!("video-{}", slot))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderTargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display names of the panel agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelNames {
    pub host: String,
    pub marketing: String,
    pub finance: String,
    pub product: String,
    pub legal: String,
}

impl Default for PanelNames {
    fn default() -> Self {
        Self {
            host: "Cosmo".to_string(),
            marketing: "Maya".to_string(),
            finance: "Ricardo".to_string(),
            product: "Lucas".to_string(),
            legal: "Fernanda".to_string(),
        }
    }
}

impl PanelNames {
    /// Display name of whoever occupies `slot`.
    pub fn name_for(&self, slot: SlotId) -> &str {
        match slot {
            SlotId::Agent | SlotId::Host => &self.host,
            SlotId::Marketing => &self.marketing,
            SlotId::Finance => &self.finance,
            SlotId::Product => &self.product,
            SlotId::Legal => &self.legal,
        }
    }
}

/// What a slot shows while no video is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub display_name: String,
    pub caption: String,
    pub initials: String,
}

impl Placeholder {
    pub fn new(display_name: impl Into<String>, caption: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let initials = display_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect();
        Self {
            display_name,
            caption: caption.into(),
            initials,
        }
    }
}

/// One registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub slot: SlotId,
    pub target: RenderTargetId,
    pub placeholder: Placeholder,
}

/// Read-only slot lookup table, built once at startup.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    entries: Vec<SlotEntry>,
}

impl SlotRegistry {
    pub fn from_entries(entries: Vec<SlotEntry>) -> Self {
        Self { entries }
    }

    /// Registry with the single `Agent` slot.
    pub fn single_agent(names: &PanelNames) -> Self {
        Self::from_entries(vec![SlotEntry {
            slot: SlotId::Agent,
            target: RenderTargetId::for_slot(SlotId::Agent),
            placeholder: Placeholder::new(names.name_for(SlotId::Agent), "AI Agent"),
        }])
    }

    /// Registry with the host and the four specialist slots.
    pub fn mentor_panel(names: &PanelNames) -> Self {
        let entries = SlotId::PANEL
            .iter()
            .map(|&slot| SlotEntry {
                slot,
                target: RenderTargetId::for_slot(slot),
                placeholder: Placeholder::new(names.name_for(slot), caption_for(slot)),
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn render_target(&self, slot: SlotId) -> Option<&RenderTargetId> {
        self.entry(slot).map(|e| &e.target)
    }

    pub fn placeholder(&self, slot: SlotId) -> Option<&Placeholder> {
        self.entry(slot).map(|e| &e.placeholder)
    }

    pub fn entries(&self) -> &[SlotEntry] {
        &self.entries
    }

    /// Slots in declaration order.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.entries.iter().map(|e| e.slot)
    }

    fn entry(&self, slot: SlotId) -> Option<&SlotEntry> {
        self.entries.iter().find(|e| e.slot == slot)
    }
}

fn caption_for(slot: SlotId) -> &'static str {
    match slot {
        SlotId::Agent => "AI Agent",
        SlotId::Host => "Business Mentor",
        SlotId::Marketing => "Marketing & Growth",
        SlotId::Finance => "Business Finance",
        SlotId::Product => "Product & Innovation",
        SlotId::Legal => "Legal & Contracts",
    }
}
