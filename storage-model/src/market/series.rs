use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// A single observation of a calendar-date-indexed series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./market.ts")]
pub struct DatedValue {
    /// The delivery day of the observation.
    pub date: NaiveDate,
    /// The observed value (price per unit or demanded volume).
    pub value: f64,
}

/// A calendar-date-indexed numeric sequence, used for both prices and demand.
///
/// Points keep the order they were supplied in. The optimizer indexes the
/// series positionally, so callers are expected to hand in calendar order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./market.ts")]
pub struct DateSeries {
    /// The observations of the series.
    pub points: Vec<DatedValue>,
}

impl DateSeries {
    pub fn new(points: Vec<DatedValue>) -> Self {
        Self { points }
    }

    /// Builds a series from `(date, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self {
            points: pairs
                .into_iter()
                .map(|(date, value)| DatedValue { date, value })
                .collect(),
        }
    }

    /// Builds a series of consecutive days starting at `start`.
    pub fn daily(start: NaiveDate, values: &[f64]) -> Self {
        Self::from_pairs(
            start
                .iter_days()
                .zip(values.iter().copied())
                .collect::<Vec<_>>(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|point| point.date)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }

    pub fn date_set(&self) -> BTreeSet<NaiveDate> {
        self.dates().collect()
    }

    /// Dates of this series that have no counterpart in `reference`,
    /// e.g. demand days on which the market did not hold a session.
    pub fn dates_missing_from(&self, reference: &DateSeries) -> Vec<NaiveDate> {
        let known = reference.date_set();
        self.dates().filter(|date| !known.contains(date)).collect()
    }

    /// Keeps only the points whose date also appears in `reference`.
    pub fn restricted_to(&self, reference: &DateSeries) -> DateSeries {
        let known = reference.date_set();
        DateSeries {
            points: self
                .points
                .iter()
                .filter(|point| known.contains(&point.date))
                .copied()
                .collect(),
        }
    }
}

/// A set of equally likely scenario members, one series per scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./market.ts")]
pub struct ScenarioSet {
    /// One series per scenario.
    pub members: Vec<DateSeries>,
}

impl ScenarioSet {
    pub fn new(members: Vec<DateSeries>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn first(&self) -> Option<&DateSeries> {
        self.members.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateSeries> {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 1, d).unwrap()
    }

    #[test]
    fn test_daily_series_uses_consecutive_days() {
        let series = DateSeries::daily(day(30), &[1.0, 2.0, 3.0]);
        let dates: Vec<NaiveDate> = series.dates().collect();
        assert_eq!(
            dates,
            vec![day(30), day(31), NaiveDate::from_ymd_opt(2013, 2, 1).unwrap()]
        );
        assert_eq!(series.values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_dates_and_restriction() {
        let prices = DateSeries::from_pairs(vec![(day(1), 30.0), (day(2), 31.0), (day(4), 29.0)]);
        let demand = DateSeries::daily(day(1), &[5.0, 6.0, 7.0, 8.0]);

        assert_eq!(demand.dates_missing_from(&prices), vec![day(3)]);

        let aligned = demand.restricted_to(&prices);
        assert_eq!(aligned.values(), vec![5.0, 6.0, 8.0]);
        assert!(prices.dates_missing_from(&demand).is_empty());
    }
}
