// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Built-in performance programs.

use std::fmt;
use std::str::FromStr;

use crate::audio::InputRef;
use crate::error::Result;
use crate::program::Program;
use crate::snippet::SnippetSpec;

/// A built-in program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Demo {
    /// Count-in, a loop, then a second loop of the same length layered on top
    #[default]
    Loop,
    /// Three tracks: rhythm guitar, bass and lead
    Song,
}

impl Demo {
    /// Every built-in program
    pub const ALL: [Demo; 2] = [Demo::Loop, Demo::Song];

    /// Name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Demo::Loop => "loop",
            Demo::Song => "song",
        }
    }

    /// One-line description
    pub fn description(&self) -> &'static str {
        match self {
            Demo::Loop => "record a loop, then layer a second loop of the same length",
            Demo::Song => "three-track song: rhythm guitar, bass, lead guitar",
        }
    }

    /// Add this program's tracks and snippets to `program`
    pub fn build(&self, program: &mut Program) -> Result<()> {
        match self {
            Demo::Loop => simple_loop(program),
            Demo::Song => song(program),
        }
    }
}

impl fmt::Display for Demo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Demo {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Demo::ALL
            .into_iter()
            .find(|demo| demo.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown demo '{}' (expected loop or song)", s))
    }
}

/// Press 1 ends the count-in, press 2 closes the first loop, which then
/// repeats forever. A second take of the same length starts one loop later
/// and also repeats forever.
pub fn simple_loop(program: &mut Program) -> Result<()> {
    let events = program.events();
    let track = program.add_track("looper");

    let count_in = track.add_snippet(
        SnippetSpec::live(InputRef::default(), events.boot())
            .ending_at(events.button_press())
            .named("count-in"),
    )?;
    let first = track.add_snippet(
        SnippetSpec::live(InputRef::default(), count_in.end().clone())
            .ending_at(events.button_press())
            .named("loop 1"),
    )?;
    track.add_snippet(
        SnippetSpec::clone_of(&first, first.end().clone())
            .repeat(-1)
            .named("loop 1 (repeat)"),
    )?;

    let second_start = first.end() + first.duration();
    let second = track.add_snippet(
        SnippetSpec::live(InputRef::default(), second_start)
            .lasting(first.duration())
            .named("loop 2"),
    )?;
    track.add_snippet(
        SnippetSpec::clone_of(&second, second.end().clone())
            .repeat(-1)
            .named("loop 2 (repeat)"),
    )?;
    Ok(())
}

/// Four presses on the rhythm track; bass and lead follow lengths recorded
/// on it.
pub fn song(program: &mut Program) -> Result<()> {
    let events = program.events();
    let input = InputRef::default();

    let rhythm = program.add_track("rhythm guitar");
    let intro = rhythm.add_snippet(
        SnippetSpec::live(input, events.boot())
            .ending_at(events.button_press())
            .named("intro"),
    )?;
    let verse = rhythm.add_snippet(
        SnippetSpec::live(input, intro.end().clone())
            .ending_at(events.button_press())
            .named("verse"),
    )?;
    let chorus = rhythm.add_snippet(
        SnippetSpec::live(input, verse.end().clone())
            .ending_at(events.button_press())
            .named("chorus"),
    )?;
    let verse_again = rhythm.add_snippet(
        SnippetSpec::clone_of(&verse, chorus.end().clone()).named("verse (replay)"),
    )?;
    let chorus_again = rhythm.add_snippet(
        SnippetSpec::clone_of(&chorus, verse_again.end().clone()).named("chorus (replay)"),
    )?;
    let bridge = rhythm.add_snippet(
        SnippetSpec::live(input, chorus_again.end().clone())
            .ending_at(events.button_press())
            .named("bridge"),
    )?;
    rhythm.add_snippet(
        SnippetSpec::clone_of(&chorus, bridge.end().clone()).named("chorus (outro)"),
    )?;

    let bass = program.add_track("bass");
    let bass_verse = bass.add_snippet(
        SnippetSpec::live(input, chorus.end().clone())
            .lasting(verse.duration())
            .named("bass verse"),
    )?;
    let bass_chorus = bass.add_snippet(
        SnippetSpec::live(input, bass_verse.end().clone())
            .lasting(chorus.duration())
            .named("bass chorus"),
    )?;
    bass.add_snippet(
        SnippetSpec::clone_of(&bass_chorus, bridge.end().clone()).named("bass chorus (outro)"),
    )?;

    let lead = program.add_track("lead guitar");
    lead.add_snippet(
        SnippetSpec::live(input, bridge.end().clone())
            .lasting(chorus.duration())
            .named("solo"),
    )?;
    Ok(())
}
