// src/routes/spa_appointment_routes.rs

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{ApiError, db_error},
    middleware::auth_context::AuthContext,
    models::{deserialize_double_option, ApiOk, AppState, OkData, PetSize, PetType},
    pagination::{like_pattern, Page, Paginated, SortOrder},
    routes::time_slot_routes::{load_day_availability, lock_slots_at},
    scheduling::{
        availability::check_move,
        calendar::{hhmm, normalize_date, parse_time_of_day},
        pricing::{resolve_selection, total_amount, CatalogueEntry, ServiceSelection},
        AppointmentStatus, PaymentStatus, SchedulingError,
    },
    text::{normalize_optional, require},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/spa-appointments", post(create_appointment))
        .route("/spa-appointments/admin", get(list_admin_appointments))
        .route(
            "/spa-appointments/{appointment_id}",
            get(get_appointment).put(update_appointment).delete(delete_appointment),
        )
        .route("/spa-appointments/{appointment_id}/status", put(update_status))
        .route(
            "/spa-appointments/{appointment_id}/payment-status",
            put(update_payment_status),
        )
        .route(
            "/spa-appointments/{appointment_id}/reschedule",
            put(reschedule_appointment),
        )
        .route("/spa-appointments/{appointment_id}/restore", put(restore_appointment))
}

/* ============================================================
   Rows + DTOs
   ============================================================ */

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub pet_name: String,
    pub pet_type: PetType,
    pub pet_breed: Option<String>,
    pub pet_size: PetSize,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub total_amount: i64,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub pet_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentRow {
    fn slot(&self) -> (NaiveDate, NaiveTime) {
        (self.appointment_date, self.appointment_time)
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    #[serde(flatten)]
    pub appointment: AppointmentRow,
    pub services: Vec<ServiceSelection>,
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentServiceRow {
    appointment_id: Uuid,
    #[sqlx(flatten)]
    selection: ServiceSelection,
}

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, customer_name, customer_phone, customer_email,
    pet_name, pet_type, pet_breed, pet_size,
    appointment_date, appointment_time, total_amount,
    status, payment_status, payment_method, pet_notes,
    created_at, updated_at
"#;

/* ============================================================
   Helpers: fetch / lock / services
   ============================================================ */

async fn attach_services(
    conn: &mut PgConnection,
    rows: Vec<AppointmentRow>,
) -> Result<Vec<AppointmentDto>, ApiError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.appointment_id).collect();
    let items: Vec<AppointmentServiceRow> = sqlx::query_as::<_, AppointmentServiceRow>(
        r#"
        SELECT appointment_id, service_id, service_name, price
        FROM spa_appointment_service
        WHERE appointment_id = ANY($1)
        ORDER BY appointment_id, position ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    let mut by_appointment: HashMap<Uuid, Vec<ServiceSelection>> = HashMap::new();
    for it in items {
        by_appointment
            .entry(it.appointment_id)
            .or_default()
            .push(it.selection);
    }

    Ok(rows
        .into_iter()
        .map(|appointment| {
            let services = by_appointment
                .remove(&appointment.appointment_id)
                .unwrap_or_default();
            AppointmentDto {
                appointment,
                services,
            }
        })
        .collect())
}

async fn fetch_appointment(
    conn: &mut PgConnection,
    appointment_id: Uuid,
) -> Result<AppointmentDto, ApiError> {
    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM spa_appointment WHERE appointment_id = $1"
    ))
    .bind(appointment_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    attach_services(conn, vec![row])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("appointment"))
}

/// Loads and row-locks the appointment for the rest of the transaction.
async fn load_for_update(
    conn: &mut PgConnection,
    appointment_id: Uuid,
) -> Result<AppointmentRow, ApiError> {
    sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM spa_appointment WHERE appointment_id = $1 FOR UPDATE"
    ))
    .bind(appointment_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("appointment"))
}

/// Resolves ids against the active catalogue, freezing current prices.
async fn resolve_services(
    conn: &mut PgConnection,
    service_ids: &[Uuid],
) -> Result<Vec<ServiceSelection>, ApiError> {
    let entries: Vec<CatalogueEntry> = if service_ids.is_empty() {
        vec![]
    } else {
        sqlx::query_as::<_, CatalogueEntry>(
            r#"
            SELECT service_id, name, price
            FROM spa_service
            WHERE service_id = ANY($1)
              AND is_active = true
            "#,
        )
        .bind(service_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?
    };

    let catalogue: HashMap<Uuid, CatalogueEntry> =
        entries.into_iter().map(|e| (e.service_id, e)).collect();
    Ok(resolve_selection(service_ids, &catalogue)?)
}

async fn replace_services(
    conn: &mut PgConnection,
    appointment_id: Uuid,
    selection: &[ServiceSelection],
) -> Result<(), ApiError> {
    sqlx::query(r#"DELETE FROM spa_appointment_service WHERE appointment_id = $1"#)
        .bind(appointment_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    for (position, s) in selection.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO spa_appointment_service (appointment_id, position, service_id, service_name, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(appointment_id)
        .bind(position as i32)
        .bind(s.service_id)
        .bind(&s.service_name)
        .bind(s.price)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

/// Constraint violations are the caller's fault and come back as 400 with
/// `code`; anything else is a server failure.
fn write_error(code: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_check_violation() || db.is_foreign_key_violation() || db.is_unique_violation() {
                return ApiError::BadRequest(code, db.message().to_string());
            }
        }
        db_error(e)
    }
}

fn refused(appointment_id: Option<Uuid>, e: SchedulingError) -> ApiError {
    tracing::warn!(?appointment_id, error = %e, "appointment change refused");
    e.into()
}

/* ============================================================
   Field validation
   ============================================================ */

fn validate_phone(raw: &str) -> Result<String, ApiError> {
    let phone = require("customer_phone", raw).map_err(ApiError::validation)?;
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | ' ' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !allowed || !(8..=15).contains(&digits) {
        return Err(ApiError::validation("customer_phone is not a valid phone number"));
    }
    Ok(phone)
}

fn validate_email(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(email) = normalize_optional(raw) else {
        return Ok(None);
    };
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::validation("customer_email is not a valid email address"));
    }
    Ok(Some(email))
}

/// Accepts an optional enum filter from the query string; blank or `all`
/// means no filter.
fn parse_filter<T: DeserializeOwned>(field: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty() && *s != "all") else {
        return Ok(None);
    };
    let de: serde::de::value::StrDeserializer<'_, serde::de::value::Error> = s.into_deserializer();
    T::deserialize(de)
        .map(Some)
        .map_err(|_| ApiError::validation(format!("invalid {field}: {s}")))
}

/* ============================================================
   GET /spa-appointments/admin
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub date: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

fn appointment_order_by(sort_by: Option<&str>, order: SortOrder) -> Result<String, ApiError> {
    let order = order.as_sql();
    match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
        None | Some("date") | Some("appointment_date") => Ok(format!(
            "appointment_date {order}, appointment_time {order}"
        )),
        Some("created_at") => Ok(format!("created_at {order}")),
        Some("total_amount") => Ok(format!("total_amount {order}")),
        Some(other) => Err(ApiError::validation(format!(
            "sort_by must be date, created_at or total_amount (got {other})"
        ))),
    }
}

pub async fn list_admin_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<AdminListQuery>,
) -> Result<Json<Paginated<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;

    let page = Page::new(q.page, q.limit)?;
    let status: Option<AppointmentStatus> = parse_filter("status", q.status.as_deref())?;
    let payment_status: Option<PaymentStatus> =
        parse_filter("payment_status", q.payment_status.as_deref())?;
    let date = match q.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(d) => Some(normalize_date(d)?),
        None => None,
    };
    let like = like_pattern(q.search.as_deref());
    let order_by = appointment_order_by(
        q.sort_by.as_deref(),
        q.sort_order.unwrap_or(SortOrder::Desc),
    )?;

    const FILTER: &str = r#"
        WHERE ($1::smallint IS NULL OR status = $1)
          AND ($2::smallint IS NULL OR payment_status = $2)
          AND ($3::date IS NULL OR appointment_date = $3)
          AND ($4::text IS NULL
               OR customer_name ILIKE $4
               OR customer_phone ILIKE $4
               OR customer_email ILIKE $4
               OR pet_name ILIKE $4)
    "#;

    let mut conn = state.db.acquire().await.map_err(db_error)?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM spa_appointment {FILTER}"))
        .bind(status)
        .bind(payment_status)
        .bind(date)
        .bind(like.as_deref())
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;

    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM spa_appointment
        {FILTER}
        ORDER BY {order_by}, appointment_id ASC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(status)
    .bind(payment_status)
    .bind(date)
    .bind(like.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    let data = attach_services(&mut conn, rows).await?;
    Ok(Json(Paginated::new(data, page, total)))
}

/* ============================================================
   GET /spa-appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;

    let mut conn = state.db.acquire().await.map_err(db_error)?;
    let dto = fetch_appointment(&mut conn, appointment_id).await?;
    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   POST /spa-appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub pet_name: String,
    pub pet_type: PetType,
    pub pet_breed: Option<String>,
    pub pet_size: PetSize,
    #[serde(alias = "appointment_date")]
    pub date: String,
    #[serde(alias = "appointment_time")]
    pub time: String,
    #[serde(alias = "services")]
    pub service_ids: Vec<Uuid>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
    #[serde(alias = "notes")]
    pub pet_notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;

    let customer_name = require("customer_name", &req.customer_name).map_err(ApiError::validation)?;
    let customer_phone = validate_phone(&req.customer_phone)?;
    let customer_email = validate_email(req.customer_email.as_deref())?;
    let pet_name = require("pet_name", &req.pet_name).map_err(ApiError::validation)?;
    let date = normalize_date(&req.date)?;
    let time = parse_time_of_day(&req.time)?;

    let mut tx = state.db.begin().await.map_err(db_error)?;

    let selection = resolve_services(&mut tx, &req.service_ids).await?;
    let total = total_amount(&selection)?;

    lock_slots_at(&mut tx, time).await?;
    let availability = load_day_availability(&mut tx, date).await?;
    availability
        .check_booking(time, None)
        .map_err(|e| refused(None, e))?;

    let appointment_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO spa_appointment (
          customer_name, customer_phone, customer_email,
          pet_name, pet_type, pet_breed, pet_size,
          appointment_date, appointment_time, total_amount,
          status, payment_status, payment_method, pet_notes,
          created_by_user_id
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
        RETURNING appointment_id
        "#,
    )
    .bind(&customer_name)
    .bind(&customer_phone)
    .bind(customer_email)
    .bind(&pet_name)
    .bind(req.pet_type)
    .bind(normalize_optional(req.pet_breed.as_deref()))
    .bind(req.pet_size)
    .bind(date)
    .bind(time)
    .bind(total)
    .bind(AppointmentStatus::Pending)
    .bind(req.payment_status.unwrap_or(PaymentStatus::Pending))
    .bind(normalize_optional(req.payment_method.as_deref()))
    .bind(normalize_optional(req.pet_notes.as_deref()))
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(write_error("APPOINTMENT_CREATE_FAILED"))?;

    replace_services(&mut tx, appointment_id, &selection).await?;

    let dto = fetch_appointment(&mut tx, appointment_id).await?;
    tx.commit().await.map_err(db_error)?;

    tracing::info!(
        %appointment_id,
        %date,
        time = %time.format("%H:%M"),
        total_amount = total,
        services = selection.len(),
        "appointment created"
    );

    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   PUT /spa-appointments/{id} (full edit)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub customer_email: Option<Option<String>>,
    pub pet_name: Option<String>,
    pub pet_type: Option<PetType>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub pet_breed: Option<Option<String>>,
    pub pet_size: Option<PetSize>,
    #[serde(alias = "appointment_date")]
    pub date: Option<String>,
    #[serde(alias = "appointment_time")]
    pub time: Option<String>,
    #[serde(alias = "services")]
    pub service_ids: Option<Vec<Uuid>>,
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub payment_method: Option<Option<String>>,
    #[serde(default, alias = "notes", deserialize_with = "deserialize_double_option")]
    pub pet_notes: Option<Option<String>>,
}

/// Status is not editable here; it only moves through the status, restore
/// and reschedule endpoints.
pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;

    let mut tx = state.db.begin().await.map_err(db_error)?;
    let existing = load_for_update(&mut tx, appointment_id).await?;

    let customer_name = match req.customer_name.as_deref() {
        Some(n) => require("customer_name", n).map_err(ApiError::validation)?,
        None => existing.customer_name.clone(),
    };
    let customer_phone = match req.customer_phone.as_deref() {
        Some(p) => validate_phone(p)?,
        None => existing.customer_phone.clone(),
    };
    let customer_email = match req.customer_email {
        None => existing.customer_email.clone(),
        Some(e) => validate_email(e.as_deref())?,
    };
    let pet_name = match req.pet_name.as_deref() {
        Some(n) => require("pet_name", n).map_err(ApiError::validation)?,
        None => existing.pet_name.clone(),
    };
    let pet_breed = match req.pet_breed {
        None => existing.pet_breed.clone(),
        Some(b) => normalize_optional(b.as_deref()),
    };
    let payment_method = match req.payment_method {
        None => existing.payment_method.clone(),
        Some(m) => normalize_optional(m.as_deref()),
    };
    let pet_notes = match req.pet_notes {
        None => existing.pet_notes.clone(),
        Some(n) => normalize_optional(n.as_deref()),
    };

    let date = match req.date.as_deref() {
        Some(d) => normalize_date(d)?,
        None => existing.appointment_date,
    };
    let time = match req.time.as_deref() {
        Some(t) => parse_time_of_day(t)?,
        None => existing.appointment_time,
    };
    if (date, time) != existing.slot() {
        lock_slots_at(&mut tx, time).await?;
        let availability = load_day_availability(&mut tx, date).await?;
        check_move(existing.status, existing.slot(), time, &availability)
            .map_err(|e| refused(Some(appointment_id), e))?;
    }

    let selection = match req.service_ids.as_deref() {
        Some(ids) => Some(resolve_services(&mut tx, ids).await?),
        None => None,
    };
    let total = match &selection {
        Some(s) => total_amount(s)?,
        None => existing.total_amount,
    };

    sqlx::query(
        r#"
        UPDATE spa_appointment
        SET customer_name = $2,
            customer_phone = $3,
            customer_email = $4,
            pet_name = $5,
            pet_type = $6,
            pet_breed = $7,
            pet_size = $8,
            appointment_date = $9,
            appointment_time = $10,
            total_amount = $11,
            payment_status = $12,
            payment_method = $13,
            pet_notes = $14,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(&customer_name)
    .bind(&customer_phone)
    .bind(customer_email)
    .bind(&pet_name)
    .bind(req.pet_type.unwrap_or(existing.pet_type))
    .bind(pet_breed)
    .bind(req.pet_size.unwrap_or(existing.pet_size))
    .bind(date)
    .bind(time)
    .bind(total)
    .bind(req.payment_status.unwrap_or(existing.payment_status))
    .bind(payment_method)
    .bind(pet_notes)
    .execute(&mut *tx)
    .await
    .map_err(write_error("APPOINTMENT_UPDATE_FAILED"))?;

    if let Some(selection) = &selection {
        replace_services(&mut tx, appointment_id, selection).await?;
    }

    let dto = fetch_appointment(&mut tx, appointment_id).await?;
    tx.commit().await.map_err(db_error)?;

    tracing::info!(%appointment_id, "appointment updated");

    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   Status transitions
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
}

/// Applies `next` inside one transaction. With `restore_only`, the current
/// status must be cancelled.
async fn change_status(
    state: &AppState,
    appointment_id: Uuid,
    next: AppointmentStatus,
    restore_only: bool,
) -> Result<AppointmentDto, ApiError> {
    let mut tx = state.db.begin().await.map_err(db_error)?;
    let existing = load_for_update(&mut tx, appointment_id).await?;
    let current = existing.status;

    if restore_only && current != AppointmentStatus::Cancelled {
        return Err(refused(
            Some(appointment_id),
            SchedulingError::InvalidTransition {
                from: current,
                to: next,
            },
        ));
    }

    if current == next {
        // idempotent: cancelling twice frees nothing more
        let dto = fetch_appointment(&mut tx, appointment_id).await?;
        tx.commit().await.map_err(db_error)?;
        return Ok(dto);
    }

    current
        .check_transition(next)
        .map_err(|e| refused(Some(appointment_id), e))?;

    if current.is_restore(next) {
        let (date, time) = existing.slot();
        lock_slots_at(&mut tx, time).await?;
        let availability = load_day_availability(&mut tx, date).await?;
        availability
            .check_restore(time)
            .map_err(|e| refused(Some(appointment_id), e))?;
    }

    sqlx::query(
        r#"
        UPDATE spa_appointment
        SET status = $2,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(next)
    .execute(&mut *tx)
    .await
    .map_err(write_error("APPOINTMENT_UPDATE_FAILED"))?;

    let dto = fetch_appointment(&mut tx, appointment_id).await?;
    tx.commit().await.map_err(db_error)?;

    tracing::info!(%appointment_id, from = %current, to = %next, "appointment status changed");
    Ok(dto)
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;
    let dto = change_status(&state, appointment_id, req.status, false).await?;
    Ok(Json(ApiOk { data: dto }))
}

pub async fn restore_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;
    let dto = change_status(&state, appointment_id, AppointmentStatus::Pending, true).await?;
    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   PUT /spa-appointments/{id}/payment-status
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub payment_method: Option<Option<String>>,
}

/// Payment is its own axis: allowed whatever the appointment status.
pub async fn update_payment_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<PaymentStatusRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;

    let set_method = req.payment_method.is_some();
    let method = req
        .payment_method
        .flatten()
        .and_then(|m| normalize_optional(Some(m.as_str())));

    let mut tx = state.db.begin().await.map_err(db_error)?;

    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE spa_appointment
        SET payment_status = $2,
            payment_method = CASE WHEN $3 THEN $4 ELSE payment_method END,
            updated_at = now()
        WHERE appointment_id = $1
        RETURNING appointment_id
        "#,
    )
    .bind(appointment_id)
    .bind(req.payment_status)
    .bind(set_method)
    .bind(method)
    .fetch_optional(&mut *tx)
    .await
    .map_err(write_error("APPOINTMENT_UPDATE_FAILED"))?;

    if updated.is_none() {
        return Err(ApiError::not_found("appointment"));
    }

    let dto = fetch_appointment(&mut tx, appointment_id).await?;
    tx.commit().await.map_err(db_error)?;

    tracing::info!(%appointment_id, payment_status = %req.payment_status, "payment status changed");

    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   PUT /spa-appointments/{id}/reschedule
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    #[serde(alias = "appointment_date")]
    pub date: Option<String>,
    #[serde(alias = "appointment_time")]
    pub time: Option<String>,
}

impl RescheduleRequest {
    fn target(&self) -> Result<(NaiveDate, NaiveTime), ApiError> {
        let (Some(date), Some(time)) = (
            self.date.as_deref().filter(|s| !s.trim().is_empty()),
            self.time.as_deref().filter(|s| !s.trim().is_empty()),
        ) else {
            return Err(ApiError::validation("date and time are both required"));
        };
        Ok((normalize_date(date)?, parse_time_of_day(time)?))
    }
}

/// Moves date/time only. Status and payment status are left untouched.
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    auth.ensure_manage_appointments()?;
    let (date, time) = req.target()?;

    let mut tx = state.db.begin().await.map_err(db_error)?;
    let existing = load_for_update(&mut tx, appointment_id).await?;

    lock_slots_at(&mut tx, time).await?;
    let availability = load_day_availability(&mut tx, date).await?;
    check_move(existing.status, existing.slot(), time, &availability)
        .map_err(|e| refused(Some(appointment_id), e))?;

    sqlx::query(
        r#"
        UPDATE spa_appointment
        SET appointment_date = $2,
            appointment_time = $3,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(date)
    .bind(time)
    .execute(&mut *tx)
    .await
    .map_err(write_error("APPOINTMENT_UPDATE_FAILED"))?;

    let dto = fetch_appointment(&mut tx, appointment_id).await?;
    tx.commit().await.map_err(db_error)?;

    tracing::info!(
        %appointment_id,
        from_date = %existing.appointment_date,
        from_time = %existing.appointment_time.format("%H:%M"),
        to_date = %date,
        to_time = %time.format("%H:%M"),
        "appointment rescheduled"
    );

    Ok(Json(ApiOk { data: dto }))
}

/* ============================================================
   DELETE /spa-appointments/{id}
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    auth.ensure_admin()?;

    let deleted: Option<Uuid> = sqlx::query_scalar(
        r#"
        DELETE FROM spa_appointment
        WHERE appointment_id = $1
        RETURNING appointment_id
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?;

    if deleted.is_none() {
        return Err(ApiError::not_found("appointment"));
    }

    tracing::info!(%appointment_id, "appointment deleted");
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}
