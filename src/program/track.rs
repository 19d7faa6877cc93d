// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tracks: ordered groups of snippets.
//!
//! `Track::add_snippet` is the only way to build a snippet. It validates the
//! requested parameters, classifies the snippet on both axes, derives the
//! end event for duration-based snippets and marks clone sources as
//! recording.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{ConstructionError, Result, UnsupportedCombination};
use crate::snippet::{
    LengthBehavior, Repeat, Snippet, SnippetId, SnippetRef, SnippetSpec, SourceBehavior,
};

/// Snippet creation counter; wiring follows this order across tracks
static NEXT_SNIPPET_ID: AtomicU64 = AtomicU64::new(1);

/// An ordered group of snippets
#[derive(Debug)]
pub struct Track {
    name: String,
    snippets: Vec<Snippet>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snippets: Vec::new(),
        }
    }

    /// Track name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate `spec` and append the snippet it describes
    pub fn add_snippet(&mut self, spec: SnippetSpec) -> Result<SnippetRef> {
        let SnippetSpec {
            source,
            start,
            end,
            duration,
            repeat,
            effects,
            monitoring,
            name,
        } = spec;

        let requested = repeat.unwrap_or(1);
        let repeat = Repeat::try_from(requested)?;
        let name = name.unwrap_or_else(|| format!("snippet {}", self.snippets.len() + 1));

        let (length, explicit_length, playback_end) = match &source {
            SourceBehavior::Live(_) => {
                if repeat != Repeat::Once {
                    return Err(ConstructionError::RepeatOnLiveInput.into());
                }
                let length = match (end, duration) {
                    (Some(_), Some(_)) => return Err(ConstructionError::ConflictingLength.into()),
                    (None, None) => return Err(ConstructionError::MissingLength.into()),
                    (Some(end), None) => LengthBehavior::EventBounded { end },
                    (None, Some(declared)) => LengthBehavior::DurationDerived {
                        end: start.after(declared.clone()),
                        declared,
                    },
                };
                (length, true, None)
            }
            SourceBehavior::Cloned(origin) => {
                if origin.is_clone() {
                    return Err(
                        UnsupportedCombination::CloneOfClone(origin.name().to_string()).into(),
                    );
                }
                if end.is_some() && duration.is_some() {
                    return Err(ConstructionError::ConflictingLength.into());
                }
                if (end.is_some() || duration.is_some()) && matches!(repeat, Repeat::Times(_)) {
                    return Err(ConstructionError::RepeatWithExplicitLength {
                        repeat: requested,
                    }
                    .into());
                }
                if end.is_some() {
                    return Err(UnsupportedCombination::ClonedEventBounded.into());
                }

                let explicit = duration.is_some();
                let declared = duration.unwrap_or_else(|| origin.duration());
                let playback_end = match repeat {
                    Repeat::Times(n) => Some(start.after(declared.scaled(n as f64))),
                    _ => None,
                };
                let length = LengthBehavior::DurationDerived {
                    end: start.after(declared.clone()),
                    declared,
                };
                (length, explicit, playback_end)
            }
        };

        let id = SnippetId(NEXT_SNIPPET_ID.fetch_add(1, Ordering::Relaxed));
        let is_clone = matches!(source, SourceBehavior::Cloned(_));
        let handle = SnippetRef::new(id, name, start, length, is_clone);

        if let SourceBehavior::Cloned(origin) = &source {
            origin.mark_recording();
        }

        debug!(
            track = %self.name,
            snippet = handle.name(),
            source = ?source,
            length = ?handle.length(),
            repeat = repeat.count(),
            "snippet added"
        );

        self.snippets.push(Snippet::new(
            handle.clone(),
            source,
            repeat,
            effects,
            monitoring,
            explicit_length,
            playback_end,
        ));
        Ok(handle)
    }

    /// Snippets in insertion order
    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub(crate) fn snippets_mut(&mut self) -> impl Iterator<Item = &mut Snippet> {
        self.snippets.iter_mut()
    }

    /// Number of snippets
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    /// Whether the track has no snippets
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Iterate over snippets
    pub fn iter(&self) -> std::slice::Iter<'_, Snippet> {
        self.snippets.iter()
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new("Untitled track")
    }
}

impl<'a> IntoIterator for &'a Track {
    type Item = &'a Snippet;
    type IntoIter = std::slice::Iter<'a, Snippet>;

    fn into_iter(self) -> Self::IntoIter {
        self.snippets.iter()
    }
}
