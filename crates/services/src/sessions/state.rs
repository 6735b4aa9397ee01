use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use practice_core::model::{PlaybackUnit, Step, UnitRecord, UnitStatus};

/// Everything that changes while a session is being played.
///
/// Indices address `units`, the expanded playback list. A unit is never both
/// completed and omitted.
///
/// Marks and navigation on different indices commute as far as the
/// completed/omitted sets and the cursor go. Unit records do not: completing
/// the current unit stores its stopwatch, so completing before or after
/// navigating away yields different `actual_secs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    sequence: Vec<Step>,
    units: Vec<PlaybackUnit>,
    current_index: usize,
    completed: BTreeSet<usize>,
    omitted: BTreeSet<usize>,
    elapsed_secs: u64,
    unit_elapsed_secs: u64,
    records: BTreeMap<usize, UnitRecord>,
}

impl PlaybackState {
    pub(crate) fn new(sequence: Vec<Step>, units: Vec<PlaybackUnit>) -> Self {
        Self {
            sequence,
            units,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sequence(&self) -> &[Step] {
        &self.sequence
    }

    #[must_use]
    pub fn units(&self) -> &[PlaybackUnit] {
        &self.units
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_unit(&self) -> Option<&PlaybackUnit> {
        self.units.get(self.current_index)
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    #[must_use]
    pub fn omitted(&self) -> &BTreeSet<usize> {
        &self.omitted
    }

    #[must_use]
    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    #[must_use]
    pub fn is_omitted(&self, index: usize) -> bool {
        self.omitted.contains(&index)
    }

    /// Units neither completed nor omitted.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.units.len() - self.completed.len() - self.omitted.len()
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Time spent on the current unit since it was last navigated to.
    #[must_use]
    pub fn unit_elapsed_secs(&self) -> u64 {
        self.unit_elapsed_secs
    }

    /// Latest outcome per marked unit, keyed by index.
    #[must_use]
    pub fn records(&self) -> &BTreeMap<usize, UnitRecord> {
        &self.records
    }

    pub(crate) fn mark_completed(&mut self, index: usize) {
        self.assert_in_range(index);
        self.omitted.remove(&index);
        self.completed.insert(index);
        let actual = if index == self.current_index {
            self.unit_elapsed_secs
        } else {
            0
        };
        self.record(index, UnitStatus::Completed, actual);
    }

    pub(crate) fn mark_omitted(&mut self, index: usize) {
        self.assert_in_range(index);
        self.completed.remove(&index);
        self.omitted.insert(index);
        self.record(index, UnitStatus::Omitted, 0);
    }

    pub(crate) fn navigate_to(&mut self, index: usize) {
        self.assert_in_range(index);
        self.current_index = index;
        self.unit_elapsed_secs = 0;
    }

    /// Adds up to `delta_secs` without passing `limit_secs`; returns true once the limit is hit.
    pub(crate) fn add_elapsed(&mut self, delta_secs: u64, limit_secs: u64) -> bool {
        let added = delta_secs.min(limit_secs.saturating_sub(self.elapsed_secs));
        self.elapsed_secs += added;
        self.unit_elapsed_secs += added;
        self.elapsed_secs >= limit_secs
    }

    /// Checks the structural invariants of a state restored from outside.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.units.is_empty() {
            return Err("no playback units".into());
        }
        let len = self.units.len();
        if self.current_index >= len {
            return Err(format!("current index {} out of {len} units", self.current_index));
        }
        if let Some(index) = self
            .completed
            .iter()
            .chain(&self.omitted)
            .chain(self.records.keys())
            .find(|i| **i >= len)
        {
            return Err(format!("unit index {index} out of {len} units"));
        }
        if let Some(index) = self.completed.intersection(&self.omitted).next() {
            return Err(format!("unit {index} is both completed and omitted"));
        }
        Ok(())
    }

    fn record(&mut self, index: usize, status: UnitStatus, actual_secs: u64) {
        let record = UnitRecord::new(index, &self.units[index], status, actual_secs);
        self.records.insert(index, record);
    }

    fn assert_in_range(&self, index: usize) {
        assert!(
            index < self.units.len(),
            "unit index {index} out of range ({} units)",
            self.units.len()
        );
    }
}
