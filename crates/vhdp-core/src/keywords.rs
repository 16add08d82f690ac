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

//! Reserved words and built-in names of the VHDP language.
//!
//! All lookups are case-insensitive; VHDP inherits VHDL's case-insensitive
//! identifiers.

/// Port direction keywords.
pub const DIRECTIONS: &[&str] = &["IN", "OUT", "INOUT", "BUFFER"];

/// Types that are always in scope (IEEE standard library).
pub const BUILTIN_TYPES: &[&str] = &[
    "STD_LOGIC",
    "STD_LOGIC_VECTOR",
    "STD_ULOGIC",
    "STD_ULOGIC_VECTOR",
    "UNSIGNED",
    "SIGNED",
    "INTEGER",
    "NATURAL",
    "POSITIVE",
    "BOOLEAN",
    "BIT",
    "BIT_VECTOR",
    "CHARACTER",
    "STRING",
    "REAL",
    "TIME",
];

/// Words that are operators or literals inside expressions.
pub const OPERATOR_WORDS: &[&str] = &[
    "AND", "OR", "NOT", "XOR", "NAND", "NOR", "XNOR", "MOD", "REM", "ABS", "SLL", "SRL", "SLA",
    "SRA", "ROL", "ROR", "DOWNTO", "TO", "OTHERS", "OPEN", "NULL", "IS", "OF", "RANGE", "ARRAY",
    "RECORD", "END", "RETURN", "TRUE", "FALSE",
];

/// Keywords that open a statement block (`If (cond) { ... }`).
pub const BLOCK_KEYWORDS: &[&str] = &[
    "IF", "ELSIF", "ELSE", "WHILE", "FOR", "CASE", "WHEN", "THREAD", "SEQFOR", "STEPFOR",
    "PARFOR", "STEP", "GENERATE", "SEQUENCE", "ELSEIF",
];

/// Statement keywords offered in bodies that are not declarations.
pub const STATEMENT_KEYWORDS: &[&str] = &["Wait", "Return", "Report", "Null", "Exit", "Next"];

/// Functions and attributes resolved by the IEEE library rather than the project.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "RISING_EDGE",
    "FALLING_EDGE",
    "TO_UNSIGNED",
    "TO_SIGNED",
    "TO_INTEGER",
    "RESIZE",
    "SHIFT_LEFT",
    "SHIFT_RIGHT",
    "ROTATE_LEFT",
    "ROTATE_RIGHT",
    "CONV_INTEGER",
    "CONV_STD_LOGIC_VECTOR",
    "STD_LOGIC_VECTOR",
    "UNSIGNED",
    "SIGNED",
    "INTEGER",
    "ABS",
    "LOG2",
    "CEIL",
    "FLOOR",
    "REAL",
];

/// Package paths offered inside `Include(...)`.
pub const PACKAGE_NAMES: &[&str] = &[
    "IEEE.STD_LOGIC_1164.ALL",
    "IEEE.NUMERIC_STD.ALL",
    "IEEE.MATH_REAL.ALL",
    "IEEE.STD_LOGIC_UNSIGNED.ALL",
    "IEEE.STD_LOGIC_ARITH.ALL",
];

/// Port names with a conventional meaning on VHDPlus boards.
pub const BUILTIN_PORTS: &[&str] = &["CLK", "RESET", "LED", "BTN"];

fn contains(list: &[&str], word: &str) -> bool {
    list.iter().any(|k| k.eq_ignore_ascii_case(word))
}

pub fn is_direction(word: &str) -> bool {
    contains(DIRECTIONS, word)
}

pub fn is_builtin_type(word: &str) -> bool {
    contains(BUILTIN_TYPES, word)
}

pub fn is_operator_word(word: &str) -> bool {
    contains(OPERATOR_WORDS, word)
}

pub fn is_block_keyword(word: &str) -> bool {
    contains(BLOCK_KEYWORDS, word)
}

pub fn is_builtin_function(word: &str) -> bool {
    contains(BUILTIN_FUNCTIONS, word)
}

/// Whether a bare identifier never needs a declaration.
pub fn is_builtin(word: &str) -> bool {
    is_builtin_type(word)
        || is_operator_word(word)
        || is_builtin_function(word)
        || is_block_keyword(word)
        || contains(STATEMENT_KEYWORDS, word)
        || contains(BUILTIN_PORTS, word)
}
