//! Room rendering state for mentor_room
//!
//! This crate decides where each participant's media goes: identity
//! resolution, the static slot registry, the render targets and the track
//! router that mutates them in response to session events.

pub mod identity;
pub mod router;
pub mod slots;
pub mod stage;

pub use identity::{IdentityResolver, IdentityRule};
pub use router::TrackRouter;
pub use slots::{PanelNames, Placeholder, RenderTargetId, SlotEntry, SlotRegistry};
pub use stage::{AudioSink, ElementId, MediaElement, RenderTarget, SlotContent, Stage};

/// Which slot layout the client renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One agent card
    Single,
    /// Host plus four specialists
    #[default]
    Panel,
}

impl TrackRouter {
    /// Build a router with the resolver and registry for `layout`.
    pub fn for_layout(layout: Layout, names: &PanelNames) -> Self {
        match layout {
            Layout::Single => TrackRouter::new(
                IdentityResolver::single_agent(),
                SlotRegistry::single_agent(names),
            ),
            Layout::Panel => TrackRouter::new(
                IdentityResolver::mentor_panel(names),
                SlotRegistry::mentor_panel(names),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_core::SlotId;

    #[test]
    fn layouts_build_matching_routers() {
        let names = PanelNames::default();

        let single = TrackRouter::for_layout(Layout::Single, &names);
        assert_eq!(single.registry().slots().collect::<Vec<_>>(), vec![SlotId::Agent]);
        assert_eq!(single.resolver().resolve("maya-specialist-07"), SlotId::Agent);

        let panel = TrackRouter::for_layout(Layout::Panel, &names);
        assert_eq!(panel.registry().slots().count(), 5);
        assert_eq!(panel.resolver().resolve("maya-specialist-07"), SlotId::Marketing);
    }
}
