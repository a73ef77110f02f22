// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashMap;
use std::fmt;

use crate::library::Catalog;

/// Two clips resolved to the same key. The most recent keybind assignment
/// wins; the loser stays bound in its clip but unreachable until rebound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeybindCollision {
    pub key: char,
    pub winner: String,
    pub loser: String,
}

impl fmt::Display for KeybindCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key {} is bound to both {} and {}, dispatching {}",
            self.key, self.winner, self.loser, self.winner,
        )
    }
}

/// Derived mapping from a normalized key to the file name of the bound clip.
/// Rebuilt on every catalog change, never persisted.
#[derive(Default)]
pub struct KeybindIndex {
    bindings: HashMap<char, String>,
}

impl KeybindIndex {
    pub fn new() -> KeybindIndex {
        KeybindIndex {
            bindings: HashMap::new(),
        }
    }

    /// Recomputes the index from the catalog. When two clips claim the same
    /// key, the one whose keybind was assigned last wins and the collision is
    /// returned for reporting.
    pub fn rebuild(catalog: &Catalog) -> (KeybindIndex, Vec<KeybindCollision>) {
        let mut bound: HashMap<char, (&str, u64)> = HashMap::new();
        let mut collisions = Vec::new();

        for clip in catalog.clips() {
            let Some(key) = clip.keybind else {
                continue;
            };

            match bound.get(&key) {
                Some(&(other, other_seq)) => {
                    let (winner, loser) = if clip.bind_seq > other_seq {
                        bound.insert(key, (&clip.filename, clip.bind_seq));
                        (clip.filename.clone(), other.to_string())
                    } else {
                        (other.to_string(), clip.filename.clone())
                    };
                    collisions.push(KeybindCollision { key, winner, loser });
                }
                None => {
                    bound.insert(key, (&clip.filename, clip.bind_seq));
                }
            }
        }

        let bindings = bound
            .into_iter()
            .map(|(key, (filename, _))| (key, filename.to_string()))
            .collect();
        (KeybindIndex { bindings }, collisions)
    }

    /// Resolves a key to the bound clip's file name. Matching is
    /// case-insensitive.
    pub fn resolve(&self, key: char) -> Option<&str> {
        self.bindings
            .get(&key.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
