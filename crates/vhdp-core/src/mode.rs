// Dweve VHDP - VHDPlus Editor Integration
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Analysis phases and the mode set passed to the analyzer.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// One analysis phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Parse the file and record its declarations.
    Indexing,
    /// Bind references against the project.
    Resolve,
    /// Run semantic checks that produce diagnostics.
    Check,
}

impl Phase {
    const ALL: [Phase; 3] = [Phase::Indexing, Phase::Resolve, Phase::Check];

    const fn bit(self) -> u8 {
        match self {
            Phase::Indexing => 0b001,
            Phase::Resolve => 0b010,
            Phase::Check => 0b100,
        }
    }
}

/// Set of phases requested for one analysis pass.
///
/// Phases can be requested individually or combined:
///
/// ```
/// use vhdp_core::{AnalyzerMode, Phase};
///
/// let mode = AnalyzerMode::RESOLVE | AnalyzerMode::CHECK;
/// assert!(mode.contains(Phase::Check));
/// assert!(!mode.contains(Phase::Indexing));
/// assert!(mode.publishes_diagnostics());
/// assert!(!AnalyzerMode::INDEXING.publishes_diagnostics());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AnalyzerMode(u8);

impl AnalyzerMode {
    pub const INDEXING: Self = Self(Phase::Indexing.bit());
    pub const RESOLVE: Self = Self(Phase::Resolve.bit());
    pub const CHECK: Self = Self(Phase::Check.bit());
    /// Indexing + Resolve + Check.
    pub const FULL: Self = Self(0b111);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, phase: Phase) -> bool {
        self.0 & phase.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every phase of `other` is in `self`.
    pub const fn includes(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, phase: Phase) -> Self {
        Self(self.0 & !phase.bit())
    }

    /// A pass that (re)parses from text rather than reusing a prior tree.
    pub const fn is_indexing(self) -> bool {
        self.contains(Phase::Indexing)
    }

    /// Only passes that include `Check` announce new diagnostics; Indexing
    /// or Resolve alone are silent legs feeding later phases.
    pub const fn publishes_diagnostics(self) -> bool {
        self.contains(Phase::Check)
    }

    pub fn phases(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl From<Phase> for AnalyzerMode {
    fn from(phase: Phase) -> Self {
        Self(phase.bit())
    }
}

impl BitOr for AnalyzerMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for AnalyzerMode {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for AnalyzerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "None");
        }
        let names: Vec<_> = self.phases().map(|p| format!("{:?}", p)).collect();
        write!(f, "{}", names.join("|"))
    }
}
