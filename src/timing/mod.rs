// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! Provides the clock every event reads its firing timestamp from.

pub mod clock;

pub use clock::{signed_seconds_between, Clock, ManualClock, SystemClock};
