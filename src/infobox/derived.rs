//! Values computed from other infobox fields rather than read directly.

use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use lazy_regex::regex_captures;

use crate::infobox::fields::{FieldMap, FieldValue};

/// Fields that can be computed when the infobox does not carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedField {
    /// Whole years since `birth_date`.
    Age,
}

impl FromStr for DerivedField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "age" => Ok(DerivedField::Age),
            _ => Err(()),
        }
    }
}

impl DerivedField {
    pub fn name(&self) -> &'static str {
        match self {
            DerivedField::Age => "age",
        }
    }

    /// Compute the value against `today`. `None` when the inputs are missing
    /// or do not form a valid value.
    pub fn compute(&self, fields: &FieldMap, today: NaiveDate) -> Option<FieldValue> {
        match self {
            DerivedField::Age => {
                let birth = birth_date(fields.get("birth_date")?)?;
                age_on(birth, today).map(FieldValue::Integer)
            }
        }
    }
}

/// First `Y|M|D` triple in a birth date value such as
/// `{{birth date and age|1946|6|14}}`.
fn birth_date(value: &str) -> Option<NaiveDate> {
    let (_, y, m, d) = regex_captures!(r"(\d+)\|(\d+)\|(\d+)", value)?;
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Whole calendar years between `birth` and `today`.
fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<i64> {
    let mut years = i64::from(today.year() - birth.year());
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    (years >= 0).then_some(years)
}

/// Resolve `name` as a derived field using the local date.
pub fn resolve(name: &str, fields: &FieldMap) -> Option<FieldValue> {
    resolve_at(name, fields, Local::now().date_naive())
}

/// Resolve `name` as a derived field as of `today`.
pub fn resolve_at(name: &str, fields: &FieldMap, today: NaiveDate) -> Option<FieldValue> {
    let field = name.parse::<DerivedField>().ok()?;
    let value = field.compute(fields, today);
    if value.is_none() {
        log::debug!("Derived field {} could not be computed", field.name());
    }
    value
}
