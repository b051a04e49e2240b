use super::record::AttendanceRecord;
use std::collections::{BTreeSet, HashMap};

/// Baseline snapshot plus the ids whose draft content differs from it.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    baseline: HashMap<String, AttendanceRecord>,
    dirty: BTreeSet<String>,
}

impl DirtyTracker {
    pub fn new(records: &[AttendanceRecord]) -> Self {
        Self {
            baseline: records
                .iter()
                .map(|r| (r.student_id.clone(), r.clone()))
                .collect(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn observe(&mut self, record: &AttendanceRecord) {
        let clean = self
            .baseline
            .get(&record.student_id)
            .map(|b| b.same_content(record))
            .unwrap_or(false);
        if clean {
            self.dirty.remove(&record.student_id);
        } else {
            self.dirty.insert(record.student_id.clone());
        }
    }

    pub fn observe_all(&mut self, records: &[AttendanceRecord]) {
        for r in records {
            self.observe(r);
        }
    }

    /// Advances the baseline for the given records and marks them clean.
    pub fn commit<'a>(&mut self, records: impl IntoIterator<Item = &'a AttendanceRecord>) {
        for r in records {
            self.dirty.remove(&r.student_id);
            self.baseline.insert(r.student_id.clone(), r.clone());
        }
    }

    pub fn is_dirty(&self, student_id: &str) -> bool {
        self.dirty.contains(student_id)
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn baseline(&self, student_id: &str) -> Option<&AttendanceRecord> {
        self.baseline.get(student_id)
    }
}
