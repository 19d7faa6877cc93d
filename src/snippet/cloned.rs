// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Wiring for snippets that replay another snippet's take.
//!
//! Order on the source's end event matters: the source's finalize action is
//! registered first (snippets wire in creation order), so the alias action
//! always sees the finished take.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use super::{Repeat, Snippet, SnippetRef, WiringContext};
use crate::audio::{apply_effects, PlaybackHandle, StreamHandle};
use crate::error::{Result, TemporalError, UnsupportedCombination};
use crate::events::Event;

type PlaybackSlot = Arc<Mutex<Option<(PlaybackHandle, StreamHandle)>>>;

fn lock(slot: &PlaybackSlot) -> MutexGuard<'_, Option<(PlaybackHandle, StreamHandle)>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

pub(super) fn wire(snippet: &Snippet, source: &SnippetRef, ctx: &WiringContext) -> Result<()> {
    let handle = snippet.handle();
    if handle.is_recording() {
        return Err(UnsupportedCombination::CloneOfClone(handle.name().to_string()).into());
    }

    debug!(
        snippet = handle.name(),
        source = source.name(),
        start = %handle.start(),
        repeat = snippet.repeat().count(),
        "wiring cloned snippet"
    );

    wire_alias(handle, source);

    if snippet.repeat() == Repeat::Disabled {
        debug!(snippet = handle.name(), "playback disabled");
        return Ok(());
    }

    let slot = PlaybackSlot::default();
    wire_playback(snippet, &slot, ctx);
    if let Some(stop) = stop_event(snippet) {
        wire_stop(snippet, stop, &slot, ctx);
    }
    Ok(())
}

/// Event that stops playback, if anything does
fn stop_event(snippet: &Snippet) -> Option<&Event> {
    match snippet.repeat() {
        Repeat::Times(_) => snippet.playback_end(),
        Repeat::Once if snippet.has_explicit_length() => Some(snippet.handle().end()),
        _ => None,
    }
}

fn wire_alias(handle: &SnippetRef, source: &SnippetRef) {
    let clone = handle.clone();
    let origin = source.clone();
    source.end().add_action(move || {
        let take = origin
            .take()
            .ok_or_else(|| TemporalError::BufferUnavailable(origin.name().to_string()))?;
        debug!(
            snippet = clone.name(),
            source = origin.name(),
            frames = take.frames(),
            "take aliased"
        );
        clone.store_take(take);
        Ok(())
    });
}

fn wire_playback(snippet: &Snippet, slot: &PlaybackSlot, ctx: &WiringContext) {
    let handle = snippet.handle().clone();
    let looping = snippet.repeat().loops();
    let effects = snippet.effects().to_vec();
    let monitoring = snippet.is_monitoring();
    let backend = Arc::clone(&ctx.backend);
    let indicator = Arc::clone(&ctx.indicator);
    let slot = Arc::clone(slot);

    snippet.handle().start().add_action(move || {
        let take = handle
            .take()
            .ok_or_else(|| TemporalError::BufferUnavailable(handle.name().to_string()))?;
        let playback = backend.start_playback(&take, looping)?;
        let output = apply_effects(playback.output(), &effects);
        info!(
            snippet = handle.name(),
            looping,
            seconds = take.duration_seconds(),
            "playback started"
        );

        if monitoring {
            backend.route_to_output(&output)?;
            indicator.monitoring_started(handle.name());
        }
        *lock(&slot) = Some((playback, output));
        Ok(())
    });
}

fn wire_stop(snippet: &Snippet, stop: &Event, slot: &PlaybackSlot, ctx: &WiringContext) {
    let name = snippet.name().to_string();
    let monitoring = snippet.is_monitoring();
    let backend = Arc::clone(&ctx.backend);
    let indicator = Arc::clone(&ctx.indicator);
    let slot = Arc::clone(slot);

    stop.add_action(move || {
        let Some((playback, output)) = lock(&slot).take() else {
            warn!(snippet = %name, "stop reached with no playback running");
            return Ok(());
        };
        if monitoring {
            backend.stop_routing(&output)?;
            indicator.monitoring_stopped(&name);
        }
        backend.stop_playback(&playback)?;
        info!(snippet = %name, "playback stopped");
        Ok(())
    });
}
