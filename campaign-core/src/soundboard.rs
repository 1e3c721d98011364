//! Mood playlists: a built-in catalog plus tracks the GM adds.
//!
//! User tracks can point at a URL or at an audio blob in the object store's
//! `audio` bucket. Playback is up to the front end.

use crate::ids::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playlist category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Ambient,
    Tavern,
    Battle,
    Mystery,
    Travel,
    Boss,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Ambient,
        Mood::Tavern,
        Mood::Battle,
        Mood::Mystery,
        Mood::Travel,
        Mood::Boss,
    ];
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Ambient => "ambient",
            Mood::Tavern => "tavern",
            Mood::Battle => "battle",
            Mood::Mystery => "mystery",
            Mood::Travel => "travel",
            Mood::Boss => "boss",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|m| m.to_string() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown mood '{s}'"))
    }
}

/// Where a track's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TrackSource {
    Url(String),
    /// Object id in the `audio` bucket.
    Blob(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: RecordId,
    pub title: String,
    pub source: TrackSource,
}

impl Track {
    pub fn url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            title: title.into(),
            source: TrackSource::Url(url.into()),
        }
    }

    pub fn blob(title: impl Into<String>, object: RecordId) -> Self {
        Self {
            id: RecordId::new(),
            title: title.into(),
            source: TrackSource::Blob(object),
        }
    }

    fn builtin(n: u128, title: &str, path: &str) -> Self {
        Self {
            id: RecordId::from_u128(0xB0A2_0000_0000_0000_0000_0000_0000_0000 | n),
            title: title.to_string(),
            source: TrackSource::Url(path.to_string()),
        }
    }
}

/// A named group of tracks for one mood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub mood: Mood,
    pub name: &'static str,
    pub tracks: Vec<Track>,
}

lazy_static::lazy_static! {
    /// Playlists that ship with the application.
    pub static ref BUILTIN_PLAYLISTS: Vec<Playlist> = vec![
        Playlist {
            mood: Mood::Ambient,
            name: "Quiet Wilds",
            tracks: vec![
                Track::builtin(1, "Forest at Night", "audio/ambient/forest-night.mp3"),
                Track::builtin(2, "Rain on Stone", "audio/ambient/rain-on-stone.mp3"),
            ],
        },
        Playlist {
            mood: Mood::Tavern,
            name: "Common Room",
            tracks: vec![
                Track::builtin(10, "Crowded Tavern", "audio/tavern/crowded.mp3"),
                Track::builtin(11, "Lute by the Hearth", "audio/tavern/lute.mp3"),
            ],
        },
        Playlist {
            mood: Mood::Battle,
            name: "Steel and Blood",
            tracks: vec![
                Track::builtin(20, "Skirmish", "audio/battle/skirmish.mp3"),
                Track::builtin(21, "War Drums", "audio/battle/war-drums.mp3"),
            ],
        },
        Playlist {
            mood: Mood::Mystery,
            name: "Whispers",
            tracks: vec![
                Track::builtin(30, "Crypt Echoes", "audio/mystery/crypt.mp3"),
            ],
        },
        Playlist {
            mood: Mood::Travel,
            name: "Open Road",
            tracks: vec![
                Track::builtin(40, "Wagon Wheels", "audio/travel/wagon.mp3"),
                Track::builtin(41, "Sea Crossing", "audio/travel/sea.mp3"),
            ],
        },
        Playlist {
            mood: Mood::Boss,
            name: "Final Stand",
            tracks: vec![
                Track::builtin(50, "Dragon's Lair", "audio/boss/dragon.mp3"),
            ],
        },
    ];
}

/// A track the GM added under a mood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTrack {
    pub mood: Mood,
    #[serde(flatten)]
    pub track: Track,
}

/// Persisted user tracks layered over the built-in catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Soundboard {
    user: Vec<UserTrack>,
}

impl Soundboard {
    /// Built-in tracks for `mood` followed by user tracks.
    pub fn playlist(&self, mood: Mood) -> Vec<&Track> {
        BUILTIN_PLAYLISTS
            .iter()
            .filter(|p| p.mood == mood)
            .flat_map(|p| p.tracks.iter())
            .chain(
                self.user
                    .iter()
                    .filter(|u| u.mood == mood)
                    .map(|u| &u.track),
            )
            .collect()
    }

    pub fn user_tracks(&self) -> &[UserTrack] {
        &self.user
    }

    pub fn add_track(&mut self, mood: Mood, track: Track) -> RecordId {
        let id = track.id;
        self.user.push(UserTrack { mood, track });
        id
    }

    /// Remove a user track. Built-in tracks cannot be removed.
    pub fn remove_track(&mut self, id: RecordId) -> Option<UserTrack> {
        let index = self.user.iter().position(|u| u.track.id == id)?;
        Some(self.user.remove(index))
    }

    pub fn find(&self, id: RecordId) -> Option<&Track> {
        BUILTIN_PLAYLISTS
            .iter()
            .flat_map(|p| p.tracks.iter())
            .chain(self.user.iter().map(|u| &u.track))
            .find(|t| t.id == id)
    }
}
