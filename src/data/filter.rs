// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Bill;
use crate::prefs::{self, Prefs};
use chrono::NaiveDate;

/// Upper end of the date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpperBound {
    #[default]
    Open,
    /// Follows the date of the newest bill.
    Latest,
    Date(NaiveDate),
}

/// Inclusive date range over bills, persisted in the preference store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BillFilter {
    pub lower: Option<NaiveDate>,
    pub upper: UpperBound,
}

fn parse_bound(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

impl BillFilter {
    pub fn from_prefs(prefs: &Prefs) -> rusqlite::Result<Self> {
        let lower = parse_bound(&prefs.lower_date_bound()?);
        let upper_raw = prefs.upper_date_bound()?;
        let upper = if upper_raw == prefs::LATEST_UPPER_BOUND {
            UpperBound::Latest
        } else {
            parse_bound(&upper_raw).map(UpperBound::Date).unwrap_or_default()
        };
        Ok(Self { lower, upper })
    }

    pub fn store(&self, prefs: &Prefs) -> rusqlite::Result<()> {
        prefs.set(
            prefs::LOWER_DATE_BOUND,
            &self.lower.map(|d| d.to_string()).unwrap_or_default(),
        )?;
        let upper = match self.upper {
            UpperBound::Open => String::new(),
            UpperBound::Latest => prefs::LATEST_UPPER_BOUND.to_string(),
            UpperBound::Date(d) => d.to_string(),
        };
        prefs.set(prefs::UPPER_DATE_BOUND, &upper)
    }

    /// An upper date equal to the newest bill's date becomes [`UpperBound::Latest`].
    pub fn with_upper(mut self, upper: Option<NaiveDate>, latest_bill: Option<NaiveDate>) -> Self {
        self.upper = match upper {
            None => UpperBound::Open,
            Some(d) if Some(d) == latest_bill => UpperBound::Latest,
            Some(d) => UpperBound::Date(d),
        };
        self
    }

    pub fn contains(&self, date: NaiveDate, latest_bill: Option<NaiveDate>) -> bool {
        if self.lower.is_some_and(|l| date < l) {
            return false;
        }
        match self.upper {
            UpperBound::Open => true,
            UpperBound::Latest => latest_bill.is_none_or(|l| date <= l),
            UpperBound::Date(u) => date <= u,
        }
    }

    pub fn apply<'a>(&self, bills: &'a [Bill]) -> Vec<&'a Bill> {
        let latest = bills.iter().map(Bill::date).max();
        bills.iter().filter(|b| self.contains(b.date(), latest)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn d(s: &str) -> NaiveDate {
        parse_bound(s).unwrap()
    }

    #[test]
    fn bounds_round_trip_through_prefs() {
        let prefs = Prefs::new(db::open_in_memory().unwrap());
        assert_eq!(BillFilter::from_prefs(&prefs).unwrap(), BillFilter::default());

        let f = BillFilter {
            lower: Some(d("2024-01-01")),
            upper: UpperBound::Latest,
        };
        f.store(&prefs).unwrap();
        assert_eq!(prefs.upper_date_bound().unwrap(), "latest");
        assert_eq!(BillFilter::from_prefs(&prefs).unwrap(), f);
    }

    #[test]
    fn upper_equal_to_newest_bill_tracks_latest() {
        let latest = Some(d("2024-03-01"));
        let f = BillFilter::default().with_upper(Some(d("2024-03-01")), latest);
        assert_eq!(f.upper, UpperBound::Latest);
        assert!(f.contains(d("2024-03-01"), latest));
        assert!(f.contains(d("2024-03-05"), Some(d("2024-03-05"))));

        let f = BillFilter::default().with_upper(Some(d("2024-02-01")), latest);
        assert!(!f.contains(d("2024-02-02"), latest));
    }
}
