use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_gateway::BackendClient;

use crate::models::{DayAvailability, ScheduleError, SelectableShift, WorkScheduleRow};
use crate::services::slots::{group_by_shift, is_date_bookable, is_shift_selectable};

pub struct WorkScheduleService {
    gateway: Arc<BackendClient>,
}

impl WorkScheduleService {
    pub fn new(gateway: Arc<BackendClient>) -> Self {
        Self { gateway }
    }

    /// Raw schedule rows for a doctor on an exact date.
    pub async fn schedules_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<WorkScheduleRow>, ScheduleError> {
        debug!("Fetching work schedules for doctor {} on {}", doctor_id, date);

        let path = format!(
            "/rest/v1/work_schedules?doctor_id=eq.{}&date=eq.{}&order=start_time.asc",
            doctor_id, date
        );

        self.fetch_rows(&path, auth_token).await
    }

    /// Raw schedule rows for a doctor across a date range (inclusive).
    pub async fn schedules_in_range(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<WorkScheduleRow>, ScheduleError> {
        debug!("Fetching work schedules for doctor {} from {} to {}", doctor_id, from, to);

        let path = format!(
            "/rest/v1/work_schedules?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            doctor_id, from, to
        );

        self.fetch_rows(&path, auth_token).await
    }

    /// Shifts for the slot picker: grouped by shift identity, each flagged
    /// with whether it can be selected given the clock.
    pub async fn shifts_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        today: NaiveDate,
        now: NaiveTime,
        auth_token: &str,
    ) -> Result<Vec<SelectableShift>, ScheduleError> {
        if !is_date_bookable(date, today) {
            return Err(ScheduleError::ValidationError(
                "Date is outside the booking horizon".to_string(),
            ));
        }

        let rows = self.schedules_for_date(doctor_id, date, auth_token).await?;

        let shifts = group_by_shift(rows)
            .into_iter()
            .map(|availability| {
                let selectable = is_shift_selectable(&availability, date, today, now);
                SelectableShift { availability, selectable }
            })
            .collect();

        Ok(shifts)
    }

    /// For each date in the range, whether the doctor has at least one shift
    /// that could still be selected. Drives the date picker's enabled days.
    pub async fn days_with_availability(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
        now: NaiveTime,
        auth_token: &str,
    ) -> Result<Vec<DayAvailability>, ScheduleError> {
        let rows = self.schedules_in_range(doctor_id, from, to, auth_token).await?;

        let mut days = Vec::new();
        let mut date = from;
        while date <= to {
            let day_rows: Vec<WorkScheduleRow> = rows.iter()
                .filter(|row| row.date == date)
                .cloned()
                .collect();

            let has_open_shift = is_date_bookable(date, today)
                && group_by_shift(day_rows)
                    .iter()
                    .any(|shift| is_shift_selectable(shift, date, today, now));

            days.push(DayAvailability { date, has_open_shift });
            date += Duration::days(1);
        }

        Ok(days)
    }

    async fn fetch_rows(&self, path: &str, auth_token: &str) -> Result<Vec<WorkScheduleRow>, ScheduleError> {
        let result: Vec<Value> = self.gateway.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<WorkScheduleRow>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse work schedules: {}", e)))
    }
}
