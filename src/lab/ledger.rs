use std::collections::BTreeMap;

use crate::lab::{order_test, LabTestSpec, RepeatOrders, TestResult};
use crate::population::PersonId;
use crate::HashMap;

/// Every result a session has handed out, per person in order of placement.
#[derive(Debug, Clone, Default)]
pub struct LabLedger {
    history: BTreeMap<PersonId, Vec<TestResult>>,
    /// Orders seen per (person, test code, day).
    orders: HashMap<(PersonId, String, i32), u32>,
}

impl LabLedger {
    pub fn new() -> Self {
        LabLedger::default()
    }

    /// Places an order and records the result. Under [`RepeatOrders::Cached`] a repeat of the
    /// same person, test and day returns the first result without recording it again.
    pub fn order(
        &mut self,
        spec: &LabTestSpec,
        person_id: &PersonId,
        infected: bool,
        day_since_onset: i32,
        session_seed: u64,
        policy: RepeatOrders,
    ) -> TestResult {
        let key = (person_id.clone(), spec.code.clone(), day_since_onset);
        let previous = self.orders.get(&key).copied().unwrap_or(0);
        if previous > 0 && policy == RepeatOrders::Cached {
            if let Some(cached) = self.find(person_id, &spec.code, day_since_onset) {
                return cached.clone();
            }
        }

        let result = order_test(
            spec,
            person_id,
            infected,
            day_since_onset,
            session_seed,
            previous,
        );
        self.orders.insert(key, previous + 1);
        self.history
            .entry(person_id.clone())
            .or_default()
            .push(result.clone());
        result
    }

    fn find(&self, person_id: &PersonId, code: &str, day_since_onset: i32) -> Option<&TestResult> {
        self.history(person_id)
            .iter()
            .find(|result| result.test_code == code && result.day_since_onset == day_since_onset)
    }

    pub fn history(&self, person_id: &PersonId) -> &[TestResult] {
        self.history
            .get(person_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// People with at least one result, in id order.
    pub fn people(&self) -> impl Iterator<Item = &PersonId> {
        self.history.keys()
    }

    pub fn len(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
