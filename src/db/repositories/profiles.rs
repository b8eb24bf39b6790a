use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        helpers::{parse_optional_date, to_u64, to_u8},
        Database,
    },
    models::Profile,
};

fn row_to_profile(row: &Row) -> Result<Profile> {
    let age: Option<i64> = row.get("age")?;
    let cycle: Option<i64> = row.get("cycle_length_days")?;
    let pain: Option<i64> = row.get("pain_level")?;
    let last_start: Option<String> = row.get("last_period_start_date")?;

    Ok(Profile {
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        age: age
            .map(|v| to_u64(v, "age").and_then(|v| u32::try_from(v).context("age too large")))
            .transpose()?,
        cycle_length_days: cycle
            .map(|v| {
                to_u64(v, "cycle_length_days")
                    .and_then(|v| u32::try_from(v).context("cycle_length_days too large"))
            })
            .transpose()?,
        pain_level: pain.map(|v| to_u8(v, "pain_level")).transpose()?,
        medications: row.get("medications")?,
        last_period_start_date: parse_optional_date(last_start, "last_period_start_date")?,
    })
}

impl Database {
    /// Insert or replace the owner's profile.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let profile = profile.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO profiles (owner_id, name, age, cycle_length_days, pain_level,
                     medications, last_period_start_date, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(owner_id) DO UPDATE SET
                     name = excluded.name,
                     age = excluded.age,
                     cycle_length_days = excluded.cycle_length_days,
                     pain_level = excluded.pain_level,
                     medications = excluded.medications,
                     last_period_start_date = excluded.last_period_start_date,
                     updated_at = excluded.updated_at",
                params![
                    profile.owner_id,
                    profile.name,
                    profile.age.map(i64::from),
                    profile.cycle_length_days.map(i64::from),
                    profile.pain_level.map(i64::from),
                    profile.medications,
                    profile
                        .last_period_start_date
                        .map(|d| d.format("%Y-%m-%d").to_string()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("failed to upsert profile")?;
            Ok(())
        })
        .await
    }

    pub async fn get_profile(&self, owner_id: &str) -> Result<Option<Profile>> {
        let owner_id = owner_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT owner_id, name, age, cycle_length_days, pain_level, medications,
                        last_period_start_date
                 FROM profiles
                 WHERE owner_id = ?1",
            )?;
            let profile = stmt
                .query_row(params![owner_id], |row| Ok(row_to_profile(row)))
                .optional()?
                .transpose()?;
            Ok(profile)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn upsert_replaces_existing_profile() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_profile("owner-a").await.unwrap(), None);

        let mut profile = Profile::new("owner-a", "Asha");
        profile.cycle_length_days = Some(28);
        profile.last_period_start_date = NaiveDate::from_ymd_opt(2026, 10, 2);
        db.upsert_profile(&profile).await.unwrap();

        profile.pain_level = Some(7);
        profile.medications = Some("ibuprofen".into());
        db.upsert_profile(&profile).await.unwrap();

        let loaded = db.get_profile("owner-a").await.unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(
            loaded.predicted_next_cycle(),
            NaiveDate::from_ymd_opt(2026, 10, 30)
        );
    }
}
