//! Required-field gate for leaving the entry step.

use serde::Serialize;
use thiserror::Error;

use crate::core::types::FormInput;

/// First required field found missing, checked in the order date, url, decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    #[error("missing required field: date")]
    Date,
    #[error("missing required field: url")]
    Url,
    #[error("missing required field: decided")]
    Decided,
}

impl MissingField {
    pub fn name(self) -> &'static str {
        match self {
            MissingField::Date => "date",
            MissingField::Url => "url",
            MissingField::Decided => "decided",
        }
    }
}

/// Check the fields the workflow cannot start without.
///
/// Whitespace-only text counts as missing. `anniversary` and `remarks` are
/// never required.
pub fn validate(form: &FormInput) -> Result<(), MissingField> {
    if form.date.is_none() {
        return Err(MissingField::Date);
    }
    if is_blank(&form.url) {
        return Err(MissingField::Url);
    }
    if is_blank(&form.decided) {
        return Err(MissingField::Decided);
    }
    Ok(())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn complete() -> FormInput {
        FormInput {
            date: NaiveDate::from_ymd_opt(2024, 1, 1),
            url: "http://x".to_string(),
            decided: "buy".to_string(),
            anniversary: String::new(),
            remarks: String::new(),
        }
    }

    #[test]
    fn complete_form_passes() {
        assert_eq!(validate(&complete()), Ok(()));
    }

    #[test]
    fn reports_first_missing_field_in_fixed_order() {
        let mut form = complete();
        form.date = None;
        form.url.clear();
        form.decided.clear();
        assert_eq!(validate(&form), Err(MissingField::Date));

        form.date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(validate(&form), Err(MissingField::Url));

        form.url = "http://x".to_string();
        assert_eq!(validate(&form), Err(MissingField::Decided));
    }

    #[test]
    fn whitespace_counts_as_missing() {
        let mut form = complete();
        form.decided = "  \n".to_string();
        assert_eq!(validate(&form), Err(MissingField::Decided));
    }

    #[test]
    fn optional_fields_are_never_required() {
        let mut form = complete();
        form.anniversary = String::new();
        form.remarks = String::new();
        assert!(validate(&form).is_ok());
        assert_eq!(MissingField::Url.to_string(), "missing required field: url");
    }
}
