// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Line-based trigger: every line read (press Enter) is one trigger.

use std::io::{self, BufRead, BufReader, Stdin};

use super::TriggerSource;
use crate::error::TriggerError;

/// Trigger source reading lines from a reader; end of input closes it
pub struct ConsoleTrigger<R> {
    reader: R,
    line: String,
}

impl ConsoleTrigger<BufReader<Stdin>> {
    /// Read from standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> ConsoleTrigger<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead + Send> TriggerSource for ConsoleTrigger<R> {
    fn await_trigger(&mut self) -> Result<(), TriggerError> {
        self.line.clear();
        match self.reader.read_line(&mut self.line) {
            Ok(0) => Err(TriggerError::Closed),
            Ok(_) => Ok(()),
            Err(e) => Err(TriggerError::Device(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        "console (press Enter)".to_string()
    }
}
