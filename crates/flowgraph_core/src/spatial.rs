// SPDX-License-Identifier: MIT OR Apache-2.0
//! Uniform hash grid for proximity queries over 2D positions.

use egui::{Pos2, Rect};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::hash::Hash;

/// Default cell size, close to typical socket spacing
pub const DEFAULT_CELL_SIZE: f32 = 50.0;

type Cell = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct Entry {
    position: Pos2,
    cell: Cell,
}

/// Spatial hash mapping tokens to positions.
///
/// Insert, update, remove and point queries are amortized O(1) when tokens are
/// spread evenly. Empty cells are dropped so the map never accumulates dead
/// buckets.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T: Eq + Hash + Clone> {
    cell_size: f32,
    cells: HashMap<Cell, IndexSet<T>>,
    entries: HashMap<T, Entry>,
}

impl<T: Eq + Hash + Clone> SpatialGrid<T> {
    /// Create a grid; non-positive cell sizes fall back to the default
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 && cell_size.is_finite() {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Cell edge length
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_of(&self, position: Pos2) -> Cell {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Place a token, replacing any previous entry for it
    pub fn insert(&mut self, token: T, position: Pos2) {
        self.remove(&token);
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().insert(token.clone());
        self.entries.insert(token, Entry { position, cell });
    }

    /// Move a token; stays in place when the cell is unchanged
    pub fn update(&mut self, token: &T, position: Pos2) {
        let cell = self.cell_of(position);
        match self.entries.get_mut(token) {
            Some(entry) if entry.cell == cell => entry.position = position,
            _ => self.insert(token.clone(), position),
        }
    }

    /// Remove a token; returns whether it was present
    pub fn remove(&mut self, token: &T) -> bool {
        let Some(entry) = self.entries.remove(token) else {
            return false;
        };
        if let Some(bucket) = self.cells.get_mut(&entry.cell) {
            bucket.swap_remove(token);
            if bucket.is_empty() {
                self.cells.remove(&entry.cell);
            }
        }
        true
    }

    /// Closest token within `tolerance` of `position`.
    ///
    /// Scans the square of cells covering the tolerance, so candidates in the
    /// corners are examined but still filtered by true distance.
    pub fn find_at(&self, position: Pos2, tolerance: f32) -> Option<&T> {
        let tolerance = tolerance.max(0.0);
        let (min_x, min_y) = self.cell_of(Pos2::new(position.x - tolerance, position.y - tolerance));
        let (max_x, max_y) = self.cell_of(Pos2::new(position.x + tolerance, position.y + tolerance));

        let mut best: Option<(&T, f32)> = None;
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for token in bucket {
                    let Some(entry) = self.entries.get(token) else {
                        continue;
                    };
                    let distance = entry.position.distance(position);
                    if distance > tolerance {
                        continue;
                    }
                    if best.map_or(true, |(_, d)| distance < d) {
                        best = Some((token, distance));
                    }
                }
            }
        }
        best.map(|(token, _)| token)
    }

    /// Every token whose position lies inside `rect`
    pub fn find_in_rect(&self, rect: Rect) -> Vec<&T> {
        let (min_x, min_y) = self.cell_of(rect.min);
        let (max_x, max_y) = self.cell_of(rect.max);
        let mut found = Vec::new();
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                found.extend(bucket.iter().filter(|token| {
                    self.entries
                        .get(*token)
                        .is_some_and(|entry| rect.contains(entry.position))
                }));
            }
        }
        found
    }

    /// Discard every cell and re-place all known tokens.
    ///
    /// Tokens for which `locate` returns `None` are dropped.
    pub fn rebuild(&mut self, mut locate: impl FnMut(&T) -> Option<Pos2>) {
        let tokens: Vec<T> = self.entries.keys().cloned().collect();
        self.clear();
        for token in tokens {
            if let Some(position) = locate(&token) {
                self.insert(token, position);
            }
        }
    }

    /// Remove every token
    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
    }

    /// Last position of a token
    pub fn position(&self, token: &T) -> Option<Pos2> {
        self.entries.get(token).map(|entry| entry.position)
    }

    /// Whether a token is present
    pub fn contains(&self, token: &T) -> bool {
        self.entries.contains_key(token)
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the grid holds no tokens
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

impl<T: Eq + Hash + Clone> Default for SpatialGrid<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}
