// src/routes/time_slot_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{ApiError, db_error},
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    pagination::{like_pattern, Page, Paginated, SortOrder},
    scheduling::{
        calendar::{hhmm, normalize_date, parse_time_of_day},
        AppointmentStatus, DayAvailability,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/spa-time-slots", get(list_time_slots).post(create_time_slot))
        .route("/spa-time-slots/availability", get(get_availability))
        .route(
            "/spa-time-slots/{time_slot_id}",
            get(get_time_slot).put(update_time_slot).delete(delete_time_slot),
        )
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TimeSlotRow {
    pub time_slot_id: Uuid,
    #[serde(rename = "time", with = "hhmm")]
    pub slot_time: NaiveTime,
    pub max_capacity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_capacity(max_capacity: i32) -> Result<(), ApiError> {
    if max_capacity < 1 {
        return Err(ApiError::validation("max_capacity must be at least 1"));
    }
    Ok(())
}

/* ============================================================
   Availability (shared with the appointment routes)
   ============================================================ */

/// Counts every non-cancelled booking on `date` against the active slots.
pub(crate) async fn load_day_availability(
    conn: &mut PgConnection,
    date: NaiveDate,
) -> Result<DayAvailability, ApiError> {
    let slots: Vec<(NaiveTime, i32)> = sqlx::query_as(
        r#"
        SELECT slot_time, max_capacity
        FROM spa_time_slot
        WHERE is_active = true
        "#,
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    let bookings: Vec<(NaiveTime, AppointmentStatus)> = sqlx::query_as(
        r#"
        SELECT appointment_time, status
        FROM spa_appointment
        WHERE appointment_date = $1
        "#,
    )
    .bind(date)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(DayAvailability::compute(date, slots, bookings))
}

/// Row-locks the active slots at `time` so concurrent writers targeting the
/// same time-of-day are serialized until the transaction ends.
pub(crate) async fn lock_slots_at(conn: &mut PgConnection, time: NaiveTime) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        SELECT time_slot_id
        FROM spa_time_slot
        WHERE slot_time = $1
          AND is_active = true
        FOR UPDATE
        "#,
    )
    .bind(time)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityDto {
    pub date: NaiveDate,
    pub slots: DayAvailability,
}

pub async fn get_availability(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<ApiOk<AvailabilityDto>>, ApiError> {
    let date = normalize_date(q.date.as_deref().unwrap_or_default())?;

    let mut conn = state.db.acquire().await.map_err(db_error)?;
    let slots = load_day_availability(&mut conn, date).await?;

    Ok(Json(ApiOk {
        data: AvailabilityDto { date, slots },
    }))
}

/* ============================================================
   GET /spa-time-slots
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListTimeSlotsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

fn time_slot_sort_column(sort_by: Option<&str>) -> Result<&'static str, ApiError> {
    match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
        None | Some("time") | Some("slot_time") => Ok("slot_time"),
        Some("capacity") | Some("max_capacity") => Ok("max_capacity"),
        Some(other) => Err(ApiError::validation(format!(
            "sort_by must be time or capacity (got {other})"
        ))),
    }
}

pub async fn list_time_slots(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ListTimeSlotsQuery>,
) -> Result<Json<Paginated<TimeSlotRow>>, ApiError> {
    let page = Page::new(q.page, q.limit)?;
    let column = time_slot_sort_column(q.sort_by.as_deref())?;
    let order = q.sort_order.unwrap_or_default().as_sql();
    let like = like_pattern(q.search.as_deref());

    const FILTER: &str = r#"
        WHERE ($1::boolean IS NULL OR is_active = $1)
          AND ($2::text IS NULL
               OR slot_time::text ILIKE $2
               OR max_capacity::text ILIKE $2)
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM spa_time_slot {FILTER}"))
        .bind(q.is_active)
        .bind(like.as_deref())
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    let rows: Vec<TimeSlotRow> = sqlx::query_as::<_, TimeSlotRow>(&format!(
        r#"
        SELECT time_slot_id, slot_time, max_capacity, is_active, created_at, updated_at
        FROM spa_time_slot
        {FILTER}
        ORDER BY {column} {order}, slot_time ASC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(q.is_active)
    .bind(like.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(Paginated::new(rows, page, total)))
}

/* ============================================================
   CRUD
   ============================================================ */

pub async fn get_time_slot(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(time_slot_id): Path<Uuid>,
) -> Result<Json<ApiOk<TimeSlotRow>>, ApiError> {
    let row = sqlx::query_as::<_, TimeSlotRow>(
        r#"
        SELECT time_slot_id, slot_time, max_capacity, is_active, created_at, updated_at
        FROM spa_time_slot
        WHERE time_slot_id = $1
        "#,
    )
    .bind(time_slot_id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("time slot"))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTimeSlotRequest {
    #[serde(alias = "slot_time")]
    pub time: String,
    pub max_capacity: i32,
    pub is_active: Option<bool>,
}

pub async fn create_time_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateTimeSlotRequest>,
) -> Result<Json<ApiOk<TimeSlotRow>>, ApiError> {
    auth.ensure_admin()?;

    let slot_time = parse_time_of_day(&req.time)?;
    validate_capacity(req.max_capacity)?;

    let row = sqlx::query_as::<_, TimeSlotRow>(
        r#"
        INSERT INTO spa_time_slot (slot_time, max_capacity, is_active)
        VALUES ($1, $2, $3)
        RETURNING time_slot_id, slot_time, max_capacity, is_active, created_at, updated_at
        "#,
    )
    .bind(slot_time)
    .bind(req.max_capacity)
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    tracing::info!(
        time_slot_id = %row.time_slot_id,
        time = %row.slot_time.format("%H:%M"),
        capacity = row.max_capacity,
        "time slot created"
    );

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTimeSlotRequest {
    #[serde(alias = "slot_time")]
    pub time: Option<String>,
    pub max_capacity: Option<i32>,
    pub is_active: Option<bool>,
}

pub async fn update_time_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(time_slot_id): Path<Uuid>,
    Json(req): Json<UpdateTimeSlotRequest>,
) -> Result<Json<ApiOk<TimeSlotRow>>, ApiError> {
    auth.ensure_admin()?;

    let slot_time = req.time.as_deref().map(parse_time_of_day).transpose()?;
    if let Some(c) = req.max_capacity {
        validate_capacity(c)?;
    }

    let row = sqlx::query_as::<_, TimeSlotRow>(
        r#"
        UPDATE spa_time_slot
        SET
          slot_time    = COALESCE($2, slot_time),
          max_capacity = COALESCE($3, max_capacity),
          is_active    = COALESCE($4, is_active),
          updated_at   = now()
        WHERE time_slot_id = $1
        RETURNING time_slot_id, slot_time, max_capacity, is_active, created_at, updated_at
        "#,
    )
    .bind(time_slot_id)
    .bind(slot_time)
    .bind(req.max_capacity)
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("time slot"))?;

    tracing::info!(time_slot_id = %row.time_slot_id, "time slot updated");

    Ok(Json(ApiOk { data: row }))
}

/// Appointments keep their stored date/time; nothing cascades.
pub async fn delete_time_slot(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(time_slot_id): Path<Uuid>,
) -> Result<Json<ApiOk<TimeSlotRow>>, ApiError> {
    auth.ensure_admin()?;

    let row = sqlx::query_as::<_, TimeSlotRow>(
        r#"
        DELETE FROM spa_time_slot
        WHERE time_slot_id = $1
        RETURNING time_slot_id, slot_time, max_capacity, is_active, created_at, updated_at
        "#,
    )
    .bind(time_slot_id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("time slot"))?;

    tracing::info!(time_slot_id = %row.time_slot_id, "time slot deleted");

    Ok(Json(ApiOk { data: row }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_column_is_whitelisted() {
        assert_eq!(time_slot_sort_column(None).unwrap(), "slot_time");
        assert_eq!(time_slot_sort_column(Some("capacity")).unwrap(), "max_capacity");
        assert!(time_slot_sort_column(Some("1; DROP TABLE spa_time_slot")).is_err());
    }

    #[test]
    fn capacity_must_be_positive() {
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(-3).is_err());
        assert!(validate_capacity(1).is_ok());
    }

    #[test]
    fn create_request_accepts_either_time_key() {
        let a: CreateTimeSlotRequest =
            serde_json::from_str(r#"{"time":"09:00","max_capacity":3}"#).unwrap();
        let b: CreateTimeSlotRequest =
            serde_json::from_str(r#"{"slot_time":"09:00","max_capacity":3}"#).unwrap();
        assert_eq!(a.time, b.time);
        assert_eq!(a.is_active, None);
    }
}
