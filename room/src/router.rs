use crate::identity::IdentityResolver;
use crate::slots::{RenderTargetId, SlotRegistry};
use crate::stage::{RenderTarget, Stage};
use log::{debug, info, warn};
use room_core::{
    Participant, PresenceStatus, RemoteTrack, RoomEvent, SlotId, TrackKind, TrackSid,
};
use std::collections::{HashMap, HashSet};

/// Where the elements of one track were attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Slot(SlotId),
    AudioSink,
}

#[derive(Debug, Clone)]
struct Attachment {
    placement: Placement,
    participant: String,
}

/// Routes subscribed tracks into slots and keeps per-slot presence.
///
/// Every handler runs to completion and returns the room events it produced,
/// in the order they happened.
pub struct TrackRouter {
    resolver: IdentityResolver,
    registry: SlotRegistry,
    stage: Stage,
    presence: HashMap<SlotId, PresenceStatus>,
    attachments: HashMap<TrackSid, Attachment>,
}

impl TrackRouter {
    pub fn new(resolver: IdentityResolver, registry: SlotRegistry) -> Self {
        let stage = Stage::from_registry(&registry);
        let presence = registry
            .slots()
            .map(|slot| (slot, PresenceStatus::Offline))
            .collect();
        Self {
            resolver,
            registry,
            stage,
            presence,
            attachments: HashMap::new(),
        }
    }

    /// Handle a track subscription.
    pub fn on_track_subscribed(
        &mut self,
        track: &RemoteTrack,
        participant: &Participant,
    ) -> Vec<RoomEvent> {
        if participant.is_local {
            debug!("Not routing local {} track {}", track.kind, track.sid);
            return Vec::new();
        }
        let slot = self.resolver.resolve(&participant.identity);
        let Some(target_id) = self.target_for(slot) else {
            return Vec::new();
        };
        debug!(
            "Routing {} track {} from {} to slot {}",
            track.kind, track.sid, participant.identity, slot
        );

        let mut events = Vec::new();
        match track.kind {
            TrackKind::Video => {
                // A second subscribe for the same track replaces, never stacks
                self.discard_track_elements(&track.sid, &mut events);

                let element = self.stage.create_element(track, &participant.identity);
                let Some(target) = self.stage.target_mut(&target_id) else {
                    warn!("Render target {} vanished for slot {}", target_id, slot);
                    return events;
                };
                if let Some(displaced) = target.show_video(element) {
                    debug!(
                        "Track {} replaced track {} in slot {}",
                        track.sid, displaced.track, slot
                    );
                    self.attachments.remove(&displaced.track);
                }
                self.attachments.insert(
                    track.sid.clone(),
                    Attachment {
                        placement: Placement::Slot(slot),
                        participant: participant.identity.clone(),
                    },
                );
                push_unique(&mut events, RoomEvent::SlotContentChanged(slot));
                self.mark_online(slot, &mut events);
            }
            TrackKind::Audio => {
                let element = self.stage.create_element(track, &participant.identity);
                self.stage.audio_sink_mut().attach(element);
                self.attachments.insert(
                    track.sid.clone(),
                    Attachment {
                        placement: Placement::AudioSink,
                        participant: participant.identity.clone(),
                    },
                );
                events.push(RoomEvent::AudioSinkChanged {
                    elements: self.stage.audio_sink().len(),
                });
            }
        }
        events
    }

    /// Handle a track unsubscription.
    pub fn on_track_unsubscribed(
        &mut self,
        track: &RemoteTrack,
        participant: &Participant,
    ) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        let placement = self.attachments.get(&track.sid).map(|a| a.placement);
        let restored = self.discard_track_elements(&track.sid, &mut events);

        match placement {
            Some(Placement::Slot(slot)) => {
                debug!("Video track {} left slot {}", track.sid, slot);
                self.set_presence(slot, PresenceStatus::Offline, &mut events);
            }
            Some(Placement::AudioSink) => {
                debug!("Audio track {} detached", track.sid);
            }
            None if restored.is_empty() => {
                debug!(
                    "No elements for track {} from {}, nothing to detach",
                    track.sid, participant.identity
                );
            }
            None => {}
        }
        events
    }

    /// Handle a participant joining: its slot goes online before any track.
    pub fn on_participant_connected(&mut self, participant: &Participant) -> Vec<RoomEvent> {
        if participant.is_local {
            return Vec::new();
        }
        let slot = self.resolver.resolve(&participant.identity);
        let mut events = Vec::new();
        if self.target_for(slot).is_some() {
            info!("Participant {} joined slot {}", participant.identity, slot);
            self.mark_online(slot, &mut events);
        }
        events
    }

    /// Handle a participant leaving: drop everything it published and force
    /// its slot back to placeholder and offline.
    pub fn on_participant_disconnected(&mut self, participant: &Participant) -> Vec<RoomEvent> {
        if participant.is_local {
            return Vec::new();
        }
        let slot = self.resolver.resolve(&participant.identity);
        let mut events = Vec::new();
        let Some(target_id) = self.target_for(slot) else {
            return events;
        };
        info!("Participant {} left slot {}", participant.identity, slot);

        let owned: Vec<TrackSid> = self
            .attachments
            .iter()
            .filter(|(_, a)| a.participant == participant.identity)
            .map(|(sid, _)| sid.clone())
            .collect();
        for sid in owned {
            self.discard_track_elements(&sid, &mut events);
        }

        if let Some(target) = self.stage.target_mut(&target_id) {
            if let Some(placeholder) = self.registry.placeholder(slot).cloned() {
                if let Some(removed) = target.show_placeholder(placeholder) {
                    self.attachments.remove(&removed.track);
                    push_unique(&mut events, RoomEvent::SlotContentChanged(slot));
                }
            }
        }
        self.set_presence(slot, PresenceStatus::Offline, &mut events);
        events
    }

    /// Mark the slots of `speakers` as speaking; slots that stopped speaking
    /// fall back to online.
    pub fn on_active_speakers(&mut self, speakers: &[Participant]) -> Vec<RoomEvent> {
        let speaking: HashSet<SlotId> = speakers
            .iter()
            .filter(|p| !p.is_local)
            .map(|p| self.resolver.resolve(&p.identity))
            .collect();

        let mut events = Vec::new();
        let slots: Vec<SlotId> = self.registry.slots().collect();
        for slot in slots {
            let current = self.presence(slot);
            if speaking.contains(&slot) {
                self.set_presence(slot, PresenceStatus::Speaking, &mut events);
            } else if current == PresenceStatus::Speaking {
                self.set_presence(slot, PresenceStatus::Online, &mut events);
            }
        }
        events
    }

    /// Return every slot to placeholder/offline and empty the audio sink.
    pub fn reset(&mut self) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        let entries = self.registry.entries().to_vec();
        for entry in entries {
            if let Some(target) = self.stage.target_mut(&entry.target) {
                if target.show_placeholder(entry.placeholder.clone()).is_some() {
                    events.push(RoomEvent::SlotContentChanged(entry.slot));
                }
            }
            self.set_presence(entry.slot, PresenceStatus::Offline, &mut events);
        }
        if self.stage.audio_sink_mut().clear() > 0 {
            events.push(RoomEvent::AudioSinkChanged { elements: 0 });
        }
        self.attachments.clear();
        events
    }

    pub fn presence(&self, slot: SlotId) -> PresenceStatus {
        self.presence.get(&slot).copied().unwrap_or_default()
    }

    /// The render target of `slot`, if the registry declares one.
    pub fn target(&self, slot: SlotId) -> Option<&RenderTarget> {
        self.registry
            .render_target(slot)
            .and_then(|id| self.stage.target(id))
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    fn target_for(&self, slot: SlotId) -> Option<RenderTargetId> {
        match self.registry.render_target(slot) {
            Some(id) if self.stage.target(id).is_some() => Some(id.clone()),
            _ => {
                warn!("No render target for slot {}, skipping", slot);
                None
            }
        }
    }

    /// Remove every element created for `sid`, restoring placeholders where
    /// a video element is removed. Returns the slots that were restored.
    fn discard_track_elements(
        &mut self,
        sid: &TrackSid,
        events: &mut Vec<RoomEvent>,
    ) -> Vec<SlotId> {
        self.attachments.remove(sid);

        let mut restored = Vec::new();
        for entry in self.registry.entries() {
            let Some(target) = self.stage.target_mut(&entry.target) else {
                continue;
            };
            if target.shows_track(sid) {
                target.show_placeholder(entry.placeholder.clone());
                push_unique(events, RoomEvent::SlotContentChanged(entry.slot));
                restored.push(entry.slot);
            }
        }

        if self.stage.audio_sink_mut().detach_track(sid) > 0 {
            events.push(RoomEvent::AudioSinkChanged {
                elements: self.stage.audio_sink().len(),
            });
        }
        restored
    }

    fn mark_online(&mut self, slot: SlotId, events: &mut Vec<RoomEvent>) {
        if self.presence(slot) == PresenceStatus::Offline {
            self.set_presence(slot, PresenceStatus::Online, events);
        }
    }

    fn set_presence(&mut self, slot: SlotId, status: PresenceStatus, events: &mut Vec<RoomEvent>) {
        let previous = self.presence.insert(slot, status).unwrap_or_default();
        if previous != status {
            events.push(RoomEvent::PresenceChanged { slot, status });
        }
    }
}

fn push_unique(events: &mut Vec<RoomEvent>, event: RoomEvent) {
    if !events.contains(&event) {
        events.push(event);
    }
}
