//! Render targets and the off-screen audio sink.
//!
//! A render target holds either its placeholder or exactly one video element;
//! `SlotContent` makes any other combination unrepresentable.

use crate::slots::{Placeholder, RenderTargetId, SlotRegistry};
use room_core::{RemoteTrack, TrackKind, TrackSid};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a presentation element created by the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

/// A presentation element bound to one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaElement {
    pub id: ElementId,
    pub track: TrackSid,
    pub kind: TrackKind,
    /// Identity of the publishing participant
    pub participant: String,
    /// Sized to fill its container
    pub fill: bool,
}

/// What a render target currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotContent {
    Placeholder(Placeholder),
    Video(MediaElement),
}

#[derive(Debug, Clone)]
pub struct RenderTarget {
    id: RenderTargetId,
    content: SlotContent,
}

impl RenderTarget {
    fn new(id: RenderTargetId, placeholder: Placeholder) -> Self {
        Self {
            id,
            content: SlotContent::Placeholder(placeholder),
        }
    }

    pub fn id(&self) -> &RenderTargetId {
        &self.id
    }

    pub fn content(&self) -> &SlotContent {
        &self.content
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.content, SlotContent::Placeholder(_))
    }

    /// The attached video element, if any.
    pub fn video(&self) -> Option<&MediaElement> {
        match &self.content {
            SlotContent::Video(element) => Some(element),
            SlotContent::Placeholder(_) => None,
        }
    }

    /// Number of attached video elements (0 or 1).
    pub fn video_elements(&self) -> usize {
        usize::from(self.video().is_some())
    }

    pub fn shows_track(&self, sid: &TrackSid) -> bool {
        self.video().is_some_and(|element| &element.track == sid)
    }

    /// Replace the current content with `element`, returning the displaced
    /// video element if there was one.
    pub(crate) fn show_video(&mut self, element: MediaElement) -> Option<MediaElement> {
        match std::mem::replace(&mut self.content, SlotContent::Video(element)) {
            SlotContent::Video(previous) => Some(previous),
            SlotContent::Placeholder(_) => None,
        }
    }

    /// Restore the placeholder, returning the removed video element if any.
    pub(crate) fn show_placeholder(&mut self, placeholder: Placeholder) -> Option<MediaElement> {
        match std::mem::replace(&mut self.content, SlotContent::Placeholder(placeholder)) {
            SlotContent::Video(previous) => Some(previous),
            SlotContent::Placeholder(_) => None,
        }
    }
}

/// Persistent off-screen container for audio elements.
#[derive(Debug, Clone, Default)]
pub struct AudioSink {
    elements: Vec<MediaElement>,
}

impl AudioSink {
    /// Attach `element`, replacing any element already bound to the same track.
    pub(crate) fn attach(&mut self, element: MediaElement) {
        self.elements.retain(|e| e.track != element.track);
        self.elements.push(element);
    }

    /// Remove every element bound to `sid`; returns how many were removed.
    pub(crate) fn detach_track(&mut self, sid: &TrackSid) -> usize {
        let before = self.elements.len();
        self.elements.retain(|e| &e.track != sid);
        before - self.elements.len()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.elements.len();
        self.elements.clear();
        removed
    }

    pub fn elements(&self) -> &[MediaElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains_track(&self, sid: &TrackSid) -> bool {
        self.elements.iter().any(|e| &e.track == sid)
    }
}

/// All render targets plus the audio sink.
#[derive(Debug, Clone)]
pub struct Stage {
    targets: HashMap<RenderTargetId, RenderTarget>,
    audio_sink: AudioSink,
    next_element: u64,
}

impl Stage {
    /// One render target per registry entry, each showing its placeholder.
    pub fn from_registry(registry: &SlotRegistry) -> Self {
        let targets = registry
            .entries()
            .iter()
            .map(|entry| {
                (
                    entry.target.clone(),
                    RenderTarget::new(entry.target.clone(), entry.placeholder.clone()),
                )
            })
            .collect();
        Self {
            targets,
            audio_sink: AudioSink::default(),
            next_element: 0,
        }
    }

    pub fn target(&self, id: &RenderTargetId) -> Option<&RenderTarget> {
        self.targets.get(id)
    }

    pub(crate) fn target_mut(&mut self, id: &RenderTargetId) -> Option<&mut RenderTarget> {
        self.targets.get_mut(id)
    }

    pub(crate) fn targets_mut(&mut self) -> impl Iterator<Item = &mut RenderTarget> {
        self.targets.values_mut()
    }

    pub fn audio_sink(&self) -> &AudioSink {
        &self.audio_sink
    }

    pub(crate) fn audio_sink_mut(&mut self) -> &mut AudioSink {
        &mut self.audio_sink
    }

    /// Create a fresh presentation element for `track`.
    pub(crate) fn create_element(
        &mut self,
        track: &RemoteTrack,
        participant: &str,
    ) -> MediaElement {
        self.next_element += 1;
        MediaElement {
            id: ElementId(self.next_element),
            track: track.sid.clone(),
            kind: track.kind,
            participant: participant.to_string(),
            fill: track.kind == TrackKind::Video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::PanelNames;
    use room_core::SlotId;

    fn stage() -> Stage {
        Stage::from_registry(&SlotRegistry::mentor_panel(&PanelNames::default()))
    }

    #[test]
    fn targets_start_with_placeholders() {
        let stage = stage();
        for slot in SlotId::PANEL {
            let target = stage.target(&RenderTargetId::for_slot(slot)).unwrap();
            assert!(target.is_placeholder());
            assert_eq!(target.video_elements(), 0);
        }
        assert!(stage.audio_sink().is_empty());
    }

    #[test]
    fn show_video_displaces_previous_element() {
        let mut stage = stage();
        let id = RenderTargetId::for_slot(SlotId::Host);
        let first = stage.create_element(&RemoteTrack::new("TR_a", TrackKind::Video), "cosmo");
        let second = stage.create_element(&RemoteTrack::new("TR_b", TrackKind::Video), "cosmo");
        assert_ne!(first.id, second.id);
        assert!(second.fill);

        let target = stage.target_mut(&id).unwrap();
        assert!(target.show_video(first.clone()).is_none());
        assert_eq!(target.show_video(second), Some(first));
        assert_eq!(target.video_elements(), 1);
        assert!(target.shows_track(&TrackSid::new("TR_b")));
    }

    #[test]
    fn audio_sink_replaces_same_track() {
        let mut stage = stage();
        let track = RemoteTrack::new("TR_audio", TrackKind::Audio);
        let first = stage.create_element(&track, "maya");
        let second = stage.create_element(&track, "maya");
        assert!(!first.fill);

        let sink = stage.audio_sink_mut();
        sink.attach(first);
        sink.attach(second.clone());
        assert_eq!(sink.elements(), &[second]);
        assert_eq!(sink.detach_track(&track.sid), 1);
        assert!(sink.is_empty());
    }
}
