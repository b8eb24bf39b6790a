use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

const MAX_CYCLE_LENGTH_DAYS: u32 = 90;

/// Health profile kept alongside the owner's sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub owner_id: String,
    pub name: String,
    pub age: Option<u32>,
    pub cycle_length_days: Option<u32>,
    pub pain_level: Option<u8>,
    pub medications: Option<String>,
    pub last_period_start_date: Option<NaiveDate>,
}

impl Profile {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
            age: None,
            cycle_length_days: None,
            pain_level: None,
            medications: None,
            last_period_start_date: None,
        }
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.owner_id.trim().is_empty() {
            return Err(SessionError::AuthRequired);
        }
        if let Some(days) = self.cycle_length_days {
            if days == 0 || days > MAX_CYCLE_LENGTH_DAYS {
                return Err(SessionError::validation(format!(
                    "cycle length must be between 1 and {MAX_CYCLE_LENGTH_DAYS} days, got {days}"
                )));
            }
        }
        if let Some(level) = self.pain_level {
            if level > 10 {
                return Err(SessionError::validation(format!(
                    "pain level must be between 0 and 10, got {level}"
                )));
            }
        }
        Ok(())
    }

    /// Start date of the next cycle: last start plus one cycle length.
    pub fn predicted_next_cycle(&self) -> Option<NaiveDate> {
        let start = self.last_period_start_date?;
        let days = self.cycle_length_days.filter(|days| *days > 0)?;
        start.checked_add_days(Days::new(u64::from(days)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(start: Option<NaiveDate>, cycle: Option<u32>) -> Profile {
        Profile {
            last_period_start_date: start,
            cycle_length_days: cycle,
            ..Profile::new("owner-1", "Asha")
        }
    }

    #[test]
    fn predicts_next_cycle_from_last_start() {
        let start = NaiveDate::from_ymd_opt(2026, 9, 20).unwrap();
        let profile = profile_with(Some(start), Some(28));
        assert_eq!(
            profile.predicted_next_cycle(),
            NaiveDate::from_ymd_opt(2026, 10, 18)
        );
    }

    #[test]
    fn no_prediction_without_start_or_length() {
        let start = NaiveDate::from_ymd_opt(2026, 9, 20).unwrap();
        assert_eq!(profile_with(None, Some(28)).predicted_next_cycle(), None);
        assert_eq!(profile_with(Some(start), None).predicted_next_cycle(), None);
        assert_eq!(profile_with(Some(start), Some(0)).predicted_next_cycle(), None);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut profile = profile_with(None, Some(120));
        assert!(matches!(profile.validate(), Err(SessionError::Validation(_))));

        profile.cycle_length_days = Some(28);
        profile.pain_level = Some(11);
        assert!(matches!(profile.validate(), Err(SessionError::Validation(_))));

        profile.pain_level = Some(6);
        assert!(profile.validate().is_ok());
    }
}
