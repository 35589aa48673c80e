//! Record filtering.
//!
//! [`FilterCriteria`] is a plain value object; every field defaults to "no
//! constraint", so `FilterCriteria::default()` is the identity filter. A
//! record passes only if it satisfies every active predicate.

use std::collections::BTreeSet;

use api_types::transaction::{RecordStatus, TransactionRecord};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::util::{amount_text, fold, non_blank};

/// Tri-state filter on the `flagged` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlagFilter {
    #[default]
    Any,
    Flagged,
    Unflagged,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub status: Option<RecordStatus>,
    pub major_category: Option<String>,
    pub category: Option<String>,
    pub origin: Option<String>,
    pub bank: Option<String>,
    pub flagged: FlagFilter,
    /// All of these tags must be present on the record.
    pub tags: BTreeSet<String>,
    /// Case-insensitive substring over description, notes and amount.
    pub search: Option<String>,
    /// First local calendar day to include.
    pub date_from: Option<NaiveDate>,
    /// Last local calendar day to include.
    pub date_to: Option<NaiveDate>,
}

impl FilterCriteria {
    /// Returns `true` when no predicate is active.
    pub fn is_identity(&self) -> bool {
        self.compile(Tz::UTC).is_identity()
    }

    pub(crate) fn compile(&self, tz: Tz) -> CompiledFilter {
        let label = |value: &Option<String>| non_blank(value.as_deref()).map(fold);
        CompiledFilter {
            status: self.status,
            major_category: label(&self.major_category),
            category: label(&self.category),
            origin: label(&self.origin),
            bank: label(&self.bank),
            flagged: self.flagged,
            tags: self
                .tags
                .iter()
                .filter_map(|tag| non_blank(Some(tag)).map(fold))
                .collect(),
            search: label(&self.search),
            from: self.date_from.and_then(|day| start_of_day(day, tz)),
            to: self.date_to.and_then(|day| end_of_day(day, tz)),
        }
    }
}

/// Criteria with labels folded and day bounds resolved to instants.
#[derive(Debug)]
pub(crate) struct CompiledFilter {
    status: Option<RecordStatus>,
    major_category: Option<String>,
    category: Option<String>,
    origin: Option<String>,
    bank: Option<String>,
    flagged: FlagFilter,
    tags: Vec<String>,
    search: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl CompiledFilter {
    fn is_identity(&self) -> bool {
        self.status.is_none()
            && self.major_category.is_none()
            && self.category.is_none()
            && self.origin.is_none()
            && self.bank.is_none()
            && self.flagged == FlagFilter::Any
            && self.tags.is_empty()
            && self.search.is_none()
            && self.from.is_none()
            && self.to.is_none()
    }

    pub(crate) fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }
        if !label_matches(self.major_category.as_deref(), record.major_category.as_deref())
            || !label_matches(self.category.as_deref(), record.category.as_deref())
            || !label_matches(self.origin.as_deref(), Some(&record.origin))
            || !label_matches(self.bank.as_deref(), Some(&record.bank))
        {
            return false;
        }
        match self.flagged {
            FlagFilter::Any => {}
            FlagFilter::Flagged if !record.flagged => return false,
            FlagFilter::Unflagged if record.flagged => return false,
            _ => {}
        }
        if !self.tags.is_empty() {
            let present: Vec<String> = record.tags.iter().map(|t| fold(t)).collect();
            if !self.tags.iter().all(|tag| present.contains(tag)) {
                return false;
            }
        }
        if let Some(from) = self.from
            && record.date < from
        {
            return false;
        }
        if let Some(to) = self.to
            && record.date > to
        {
            return false;
        }
        if let Some(needle) = &self.search
            && !search_matches(needle, record)
        {
            return false;
        }
        true
    }
}

fn label_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => non_blank(actual).is_some_and(|actual| fold(actual) == wanted),
    }
}

fn search_matches(needle: &str, record: &TransactionRecord) -> bool {
    fold(&record.description).contains(needle)
        || record
            .notes
            .as_deref()
            .is_some_and(|notes| fold(notes).contains(needle))
        || amount_text(record.amount_minor).contains(needle)
}

fn start_of_day(day: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    local_instant(day.and_time(NaiveTime::MIN), tz, true)
}

fn end_of_day(day: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
    local_instant(day.and_time(last), tz, false)
}

/// Resolves a local wall-clock time, stepping over DST gaps.
fn local_instant(naive: NaiveDateTime, tz: Tz, earliest: bool) -> Option<DateTime<Utc>> {
    let resolve = |naive: NaiveDateTime| {
        let local = tz.from_local_datetime(&naive);
        if earliest { local.earliest() } else { local.latest() }
    };
    let shift = if earliest {
        Duration::hours(1)
    } else {
        Duration::hours(-1)
    };
    resolve(naive)
        .or_else(|| resolve(naive + shift))
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(id: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.into(),
            date: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            description: "Coffee Shop".to_string(),
            amount_minor: -450,
            origin: "Checking".to_string(),
            bank: "Northwind".to_string(),
            status: RecordStatus::Pending,
            flagged: false,
            major_category: Some("Food".to_string()),
            category: Some("Cafes".to_string()),
            tags: ["work".to_string(), "weekday".to_string()].into(),
            notes: Some("with Sam".to_string()),
        }
    }

    fn passes(criteria: FilterCriteria, record: &TransactionRecord) -> bool {
        criteria.compile(Tz::UTC).matches(record)
    }

    #[test]
    fn default_is_identity() {
        assert!(FilterCriteria::default().is_identity());
        assert!(passes(FilterCriteria::default(), &record("a")));
    }

    #[test]
    fn blank_labels_count_as_unset() {
        let criteria = FilterCriteria {
            bank: Some("   ".to_string()),
            search: Some(String::new()),
            ..FilterCriteria::default()
        };
        assert!(criteria.is_identity());
    }

    #[test]
    fn labels_compare_case_insensitively() {
        let criteria = FilterCriteria {
            bank: Some("NORTHWIND".to_string()),
            major_category: Some("food".to_string()),
            ..FilterCriteria::default()
        };
        assert!(passes(criteria, &record("a")));
    }

    #[test]
    fn missing_label_never_matches() {
        let mut r = record("a");
        r.category = None;
        let criteria = FilterCriteria {
            category: Some("Cafes".to_string()),
            ..FilterCriteria::default()
        };
        assert!(!passes(criteria, &r));
    }

    #[test]
    fn every_active_control_must_match() {
        let bank = FilterCriteria {
            bank: Some("northwind".to_string()),
            ..FilterCriteria::default()
        };
        assert!(passes(bank.clone(), &record("a")));

        let bank_and_status = FilterCriteria {
            status: Some(RecordStatus::Categorized),
            ..bank
        };
        assert!(!passes(bank_and_status, &record("a")));
    }

    #[test]
    fn tags_use_and_semantics() {
        let both = FilterCriteria {
            tags: ["work".to_string(), "Weekday".to_string()].into(),
            ..FilterCriteria::default()
        };
        assert!(passes(both, &record("a")));

        let extra = FilterCriteria {
            tags: ["work".to_string(), "travel".to_string()].into(),
            ..FilterCriteria::default()
        };
        assert!(!passes(extra, &record("a")));
    }

    #[test]
    fn flagged_tri_state() {
        let mut flagged = record("a");
        flagged.flagged = true;
        let only_flagged = FilterCriteria {
            flagged: FlagFilter::Flagged,
            ..FilterCriteria::default()
        };
        let only_unflagged = FilterCriteria {
            flagged: FlagFilter::Unflagged,
            ..FilterCriteria::default()
        };
        assert!(passes(only_flagged.clone(), &flagged));
        assert!(!passes(only_flagged, &record("b")));
        assert!(passes(only_unflagged.clone(), &record("b")));
        assert!(!passes(only_unflagged, &flagged));
    }

    #[test]
    fn search_covers_description_notes_and_amount() {
        let search = |needle: &str| FilterCriteria {
            search: Some(needle.to_string()),
            ..FilterCriteria::default()
        };
        assert!(passes(search("coffee"), &record("a")));
        assert!(passes(search("SAM"), &record("a")));
        assert!(passes(search("-4.5"), &record("a")));
        assert!(!passes(search("rent"), &record("a")));
    }

    #[test]
    fn date_bounds_are_inclusive_whole_days() {
        let mut late = record("a");
        late.date = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap();
        let mut early = record("b");
        early.date = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let criteria = FilterCriteria {
            date_from: Some(day),
            date_to: Some(day),
            ..FilterCriteria::default()
        };
        assert!(passes(criteria.clone(), &late));
        assert!(passes(criteria.clone(), &early));

        let mut next = record("c");
        next.date = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        assert!(!passes(criteria, &next));
    }

    #[test]
    fn date_bounds_follow_local_calendar_day() {
        // 23:30 UTC on the 10th is already the 11th in Rome.
        let mut r = record("a");
        r.date = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        let criteria = FilterCriteria {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 11),
            ..FilterCriteria::default()
        };
        assert!(criteria.compile(chrono_tz::Europe::Rome).matches(&r));
        assert!(!criteria.compile(Tz::UTC).matches(&r));
    }
}
