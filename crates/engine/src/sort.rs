use std::cmp::Ordering;

use api_types::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};

use crate::util::fold;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Date,
    /// Compares absolute values, so a large expense sorts above a small income.
    Amount,
    Description,
    Origin,
    Bank,
}

impl TryFrom<&str> for SortField {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "date" => Ok(Self::Date),
            "amount" => Ok(Self::Amount),
            "description" => Ok(Self::Description),
            "origin" => Ok(Self::Origin),
            "bank" => Ok(Self::Bank),
            other => Err(format!("invalid sort field: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Sort order of the list. Defaults to newest first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Stable sort in place; equal keys keep their input order in both
    /// directions.
    pub(crate) fn apply(&self, records: &mut [&TransactionRecord]) {
        match self.field {
            SortField::Date => self.sort_by_key(records, |r| r.date),
            SortField::Amount => self.sort_by_key(records, |r| r.amount_minor.unsigned_abs()),
            SortField::Description => self.sort_cached(records, |r| fold(&r.description)),
            SortField::Origin => self.sort_cached(records, |r| fold(&r.origin)),
            SortField::Bank => self.sort_cached(records, |r| fold(&r.bank)),
        }
    }

    fn sort_by_key<K: Ord>(
        &self,
        records: &mut [&TransactionRecord],
        key: impl Fn(&TransactionRecord) -> K,
    ) {
        records.sort_by(|a, b| self.directed(key(*a).cmp(&key(*b))));
    }

    /// Folding allocates, so compute each key once.
    fn sort_cached(
        &self,
        records: &mut [&TransactionRecord],
        key: impl Fn(&TransactionRecord) -> String,
    ) {
        let mut keyed: Vec<(String, &TransactionRecord)> =
            records.iter().map(|r| (key(*r), *r)).collect();
        keyed.sort_by(|a, b| self.directed(a.0.cmp(&b.0)));
        for (slot, (_, record)) in records.iter_mut().zip(keyed) {
            *slot = record;
        }
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}
