// src/routes/spa_service_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, db_error},
    middleware::auth_context::AuthContext,
    models::{deserialize_double_option, ApiOk, AppState},
    pagination::{like_pattern, Page, Paginated, SortOrder},
    text::{normalize_optional, require, slugify},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/spa-services", get(list_spa_services).post(create_spa_service))
        .route(
            "/spa-services/{service_id}",
            get(get_spa_service).put(update_spa_service).delete(delete_spa_service),
        )
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SpaServiceRow {
    pub service_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: i64,
    pub duration_min: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SERVICE_COLUMNS: &str =
    "service_id, name, slug, description, price, duration_min, image_url, is_active, created_at, updated_at";

fn validate_price(price: i64) -> Result<(), ApiError> {
    if price < 0 {
        return Err(ApiError::validation("price must be >= 0"));
    }
    Ok(())
}

fn validate_duration(duration_min: Option<i32>) -> Result<(), ApiError> {
    if matches!(duration_min, Some(d) if d <= 0) {
        return Err(ApiError::validation("duration_min must be > 0"));
    }
    Ok(())
}

fn write_error(e: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return ApiError::Conflict(
                "DUPLICATE",
                "a service with the same name already exists".into(),
            );
        }
    }
    db_error(e)
}

fn delete_error(e: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() {
            return ApiError::BadRequest(
                "IN_USE",
                "service is used by existing appointments; deactivate it instead".into(),
            );
        }
    }
    db_error(e)
}

/* ============================================================
   GET /spa-services
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListSpaServicesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

fn service_sort_column(sort_by: Option<&str>) -> Result<&'static str, ApiError> {
    match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
        None | Some("name") => Ok("name"),
        Some("price") => Ok("price"),
        Some("created_at") => Ok("created_at"),
        Some(other) => Err(ApiError::validation(format!(
            "sort_by must be name, price or created_at (got {other})"
        ))),
    }
}

pub async fn list_spa_services(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ListSpaServicesQuery>,
) -> Result<Json<Paginated<SpaServiceRow>>, ApiError> {
    let page = Page::new(q.page, q.limit)?;
    let column = service_sort_column(q.sort_by.as_deref())?;
    let order = q.sort_order.unwrap_or_default().as_sql();
    let like = like_pattern(q.search.as_deref());

    const FILTER: &str = r#"
        WHERE ($1::boolean IS NULL OR is_active = $1)
          AND ($2::text IS NULL OR name ILIKE $2 OR slug ILIKE $2)
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM spa_service {FILTER}"))
        .bind(q.is_active)
        .bind(like.as_deref())
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    let rows = sqlx::query_as::<_, SpaServiceRow>(&format!(
        r#"
        SELECT {SERVICE_COLUMNS}
        FROM spa_service
        {FILTER}
        ORDER BY {column} {order}, service_id ASC
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

pub async fn get_spa_service(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(service_id): Path<Uuid>,
) -> Result<Json<ApiOk<SpaServiceRow>>, ApiError> {
    let row = sqlx::query_as::<_, SpaServiceRow>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM spa_service WHERE service_id = $1"
    ))
    .bind(service_id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("service"))?;

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct CreateSpaServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub duration_min: Option<i32>,
    // older forms send `url`
    #[serde(alias = "url")]
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn create_spa_service(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateSpaServiceRequest>,
) -> Result<Json<ApiOk<SpaServiceRow>>, ApiError> {
    auth.ensure_admin()?;

    let name = require("name", &req.name).map_err(ApiError::validation)?;
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::validation("name must contain letters or digits"));
    }
    validate_price(req.price)?;
    validate_duration(req.duration_min)?;

    let row = sqlx::query_as::<_, SpaServiceRow>(&format!(
        r#"
        INSERT INTO spa_service (name, slug, description, price, duration_min, image_url, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {SERVICE_COLUMNS}
        "#
    ))
    .bind(&name)
    .bind(&slug)
    .bind(normalize_optional(req.description.as_deref()))
    .bind(req.price)
    .bind(req.duration_min)
    .bind(normalize_optional(req.image_url.as_deref()))
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(&state.db)
    .await
    .map_err(write_error)?;

    tracing::info!(service_id = %row.service_id, slug = %row.slug, "spa service created");

    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSpaServiceRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub description: Option<Option<String>>,
    pub price: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub duration_min: Option<Option<i32>>,
    #[serde(default, alias = "url", deserialize_with = "deserialize_double_option")]
    pub image_url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Catalogue edits never touch prices already frozen on appointments.
pub async fn update_spa_service(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(service_id): Path<Uuid>,
    Json(req): Json<UpdateSpaServiceRequest>,
) -> Result<Json<ApiOk<SpaServiceRow>>, ApiError> {
    auth.ensure_admin()?;

    let existing = sqlx::query_as::<_, SpaServiceRow>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM spa_service WHERE service_id = $1"
    ))
    .bind(service_id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("service"))?;

    let name = match req.name.as_deref() {
        Some(n) => require("name", n).map_err(ApiError::validation)?,
        None => existing.name.clone(),
    };
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::validation("name must contain letters or digits"));
    }

    let description = match req.description {
        None => existing.description,
        Some(d) => normalize_optional(d.as_deref()),
    };
    let image_url = match req.image_url {
        None => existing.image_url,
        Some(u) => normalize_optional(u.as_deref()),
    };
    let duration_min = req.duration_min.unwrap_or(existing.duration_min);
    let price = req.price.unwrap_or(existing.price);
    validate_price(price)?;
    validate_duration(duration_min)?;

    let row = sqlx::query_as::<_, SpaServiceRow>(&format!(
        r#"
        UPDATE spa_service
        SET name = $2,
            slug = $3,
            description = $4,
            price = $5,
            duration_min = $6,
            image_url = $7,
            is_active = $8,
            updated_at = now()
        WHERE service_id = $1
        RETURNING {SERVICE_COLUMNS}
        "#
    ))
    .bind(service_id)
    .bind(&name)
    .bind(&slug)
    .bind(description)
    .bind(price)
    .bind(duration_min)
    .bind(image_url)
    .bind(req.is_active.unwrap_or(existing.is_active))
    .fetch_one(&state.db)
    .await
    .map_err(write_error)?;

    tracing::info!(service_id = %row.service_id, "spa service updated");

    Ok(Json(ApiOk { data: row }))
}

/// Services still referenced by appointments cannot be removed; the client
/// shows the 400 message verbatim.
pub async fn delete_spa_service(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(service_id): Path<Uuid>,
) -> Result<Json<ApiOk<SpaServiceRow>>, ApiError> {
    auth.ensure_admin()?;

    let row = sqlx::query_as::<_, SpaServiceRow>(&format!(
        "DELETE FROM spa_service WHERE service_id = $1 RETURNING {SERVICE_COLUMNS}"
    ))
    .bind(service_id)
    .fetch_optional(&state.db)
    .await
    .map_err(delete_error)?
    .ok_or_else(|| ApiError::not_found("service"))?;

    tracing::info!(service_id = %row.service_id, "spa service deleted");

    Ok(Json(ApiOk { data: row }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_url_key_maps_to_image_url() {
        let req: CreateSpaServiceRequest = serde_json::from_str(
            r#"{"name":"Bath","price":100000,"url":"/uploads/a.png"}"#,
        )
        .unwrap();
        assert_eq!(req.image_url.as_deref(), Some("/uploads/a.png"));
    }

    #[test]
    fn update_distinguishes_clear_from_keep() {
        let keep: UpdateSpaServiceRequest = serde_json::from_str(r#"{"price":5}"#).unwrap();
        let clear: UpdateSpaServiceRequest =
            serde_json::from_str(r#"{"image_url":null,"description":null}"#).unwrap();
        assert!(keep.image_url.is_none());
        assert_eq!(clear.image_url, Some(None));
        assert_eq!(clear.description, Some(None));
    }

    #[test]
    fn validation_rules() {
        assert!(validate_price(-1).is_err());
        assert!(validate_price(0).is_ok());
        assert!(validate_duration(Some(0)).is_err());
        assert!(validate_duration(None).is_ok());
        assert_eq!(service_sort_column(Some("price")).unwrap(), "price");
        assert!(service_sort_column(Some("slug")).is_err());
    }
}
