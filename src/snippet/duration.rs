// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Snippet lengths that may not be known yet.
//!
//! A [`Length`] is either a number of seconds or a [`DeferredDuration`]: a
//! reference to a snippet whose duration will only be known once its end
//! event has fired, scaled by a factor. Deferred lengths are resolved at the
//! moment something actually needs seconds (arming a timer, sizing a
//! buffer), never earlier.

use std::fmt;
use std::ops::Mul;

use super::SnippetRef;
use crate::error::TemporalError;

/// A length in seconds, or a reference to one that is not known yet
#[derive(Clone)]
pub enum Length {
    /// Known number of seconds
    Resolved(f64),
    /// Another snippet's eventual duration, scaled
    Deferred(DeferredDuration),
}

impl Length {
    /// Seconds if they can be known right now
    pub fn try_seconds(&self) -> Option<f64> {
        match self {
            Length::Resolved(seconds) => Some(*seconds),
            Length::Deferred(deferred) => deferred.try_compute(),
        }
    }

    /// Seconds; an error while the referenced snippet is unresolved
    pub fn seconds(&self) -> Result<f64, TemporalError> {
        match self {
            Length::Resolved(seconds) => Ok(*seconds),
            Length::Deferred(deferred) => deferred.compute(),
        }
    }

    /// Whether this is a plain number of seconds
    pub fn is_resolved(&self) -> bool {
        matches!(self, Length::Resolved(_))
    }

    /// A new length multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Length {
        match self {
            Length::Resolved(seconds) => Length::Resolved(seconds * factor),
            Length::Deferred(deferred) => Length::Deferred(deferred.scaled(factor)),
        }
    }
}

impl From<f64> for Length {
    fn from(seconds: f64) -> Self {
        Length::Resolved(seconds)
    }
}

impl From<DeferredDuration> for Length {
    fn from(deferred: DeferredDuration) -> Self {
        Length::Deferred(deferred)
    }
}

impl From<std::time::Duration> for Length {
    fn from(duration: std::time::Duration) -> Self {
        Length::Resolved(duration.as_secs_f64())
    }
}

impl Mul<f64> for Length {
    type Output = Length;

    fn mul(self, factor: f64) -> Length {
        self.scaled(factor)
    }
}

impl Mul<Length> for f64 {
    type Output = Length;

    fn mul(self, length: Length) -> Length {
        length.scaled(self)
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Resolved(seconds) => write!(f, "{:.3}s", seconds),
            Length::Deferred(deferred) => deferred.fmt(f),
        }
    }
}

/// A snippet's duration that is not known yet, times a factor
#[derive(Clone)]
pub struct DeferredDuration {
    snippet: SnippetRef,
    factor: f64,
}

impl DeferredDuration {
    /// Defer to the full duration of `snippet`
    pub fn new(snippet: SnippetRef) -> Self {
        Self {
            snippet,
            factor: 1.0,
        }
    }

    /// The referenced snippet
    pub fn snippet(&self) -> &SnippetRef {
        &self.snippet
    }

    /// Multiplier applied to the snippet's duration
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// A new deferred duration with the factors combined
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            snippet: self.snippet.clone(),
            factor: self.factor * factor,
        }
    }

    /// Seconds if the referenced snippet is resolvable now
    pub fn try_compute(&self) -> Option<f64> {
        self.snippet
            .resolved_seconds()
            .map(|seconds| seconds * self.factor)
    }

    /// Seconds; an error while the referenced snippet is unresolved
    pub fn compute(&self) -> Result<f64, TemporalError> {
        self.try_compute()
            .ok_or_else(|| TemporalError::DurationUnresolved(self.snippet.name().to_string()))
    }
}

impl Mul<f64> for DeferredDuration {
    type Output = DeferredDuration;

    fn mul(self, factor: f64) -> DeferredDuration {
        self.scaled(factor)
    }
}

impl Mul<DeferredDuration> for f64 {
    type Output = DeferredDuration;

    fn mul(self, deferred: DeferredDuration) -> DeferredDuration {
        deferred.scaled(self)
    }
}

impl fmt::Debug for DeferredDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x duration({})", self.factor, self.snippet.name())
    }
}
