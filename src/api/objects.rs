//! Donated object API endpoints.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{error, rejected_body, success, ApiResponse, ApiResult};
use crate::db::{GroupField, ObjectFilter};
use crate::errors::{AppError, NOT_FOUND_MESSAGE};
use crate::models::{DonatedObject, ObjectDraft, ObjectStatistics};
use crate::AppState;

/// Maximum number of objects returned by a listing.
pub const LIST_LIMIT: i64 = 50;

/// Number of cities reported in the statistics.
pub const TOP_CITIES: i64 = 10;

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub categoria: Option<String>,
    /// Case-insensitive substring of the city.
    #[serde(default)]
    pub cidade: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
    /// Defaults to `true`.
    #[serde(default)]
    pub disponivel: Option<bool>,
}

impl ListQuery {
    fn into_filter(self) -> ObjectFilter {
        fn non_empty(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        ObjectFilter {
            category: non_empty(self.categoria),
            city: non_empty(self.cidade),
            condition: non_empty(self.estado),
            available: Some(self.disponivel.unwrap_or(true)),
        }
    }
}

fn not_found() -> AppError {
    AppError::NotFound(NOT_FOUND_MESSAGE.to_string())
}

/// GET /api/objetos - List objects matching the query filters.
pub async fn list_objects(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<DonatedObject>> {
    const CONTEXT: &str = "Erro ao buscar objetos";

    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return error(AppError::BadRequest(rejection.body_text()), CONTEXT),
    };

    match state
        .repo
        .list_matching(&query.into_filter(), LIST_LIMIT)
        .await
    {
        Ok(objects) => {
            let count = objects.len();
            Ok(ApiResponse::new(objects).with_count(count))
        }
        Err(e) => error(e, CONTEXT),
    }
}

/// GET /api/objetos/:id - Get a single object.
pub async fn get_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DonatedObject> {
    const CONTEXT: &str = "Erro ao buscar objeto";

    match state.repo.get_by_id(&id).await {
        Ok(Some(object)) => success(object),
        Ok(None) => error(not_found(), CONTEXT),
        Err(e) => error(e, CONTEXT),
    }
}

/// POST /api/objetos - Create a new object.
pub async fn create_object(
    State(state): State<AppState>,
    body: Result<Json<ObjectDraft>, JsonRejection>,
) -> ApiResult<DonatedObject> {
    const CONTEXT: &str = "Erro ao criar objeto";

    let Json(draft) = match body {
        Ok(body) => body,
        Err(rejection) => return error(rejected_body(rejection), CONTEXT),
    };

    match state.repo.insert(draft).await {
        Ok(object) => Ok(ApiResponse::new(object)
            .with_status(StatusCode::CREATED)
            .with_message("Objeto criado com sucesso")),
        Err(e) => error(e, CONTEXT),
    }
}

/// PUT /api/objetos/:id - Update an object, re-validating the result.
pub async fn update_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ObjectDraft>, JsonRejection>,
) -> ApiResult<DonatedObject> {
    const CONTEXT: &str = "Erro ao atualizar objeto";

    let Json(patch) = match body {
        Ok(body) => body,
        Err(rejection) => return error(rejected_body(rejection), CONTEXT),
    };

    match state.repo.update_by_id(&id, patch).await {
        Ok(Some(object)) => {
            Ok(ApiResponse::new(object).with_message("Objeto atualizado com sucesso"))
        }
        Ok(None) => error(not_found(), CONTEXT),
        Err(e) => error(e, CONTEXT),
    }
}

/// DELETE /api/objetos/:id - Delete an object.
pub async fn delete_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    const CONTEXT: &str = "Erro ao deletar objeto";

    match state.repo.delete_by_id(&id).await {
        Ok(Some(object)) => {
            tracing::info!(id = %object.id, "object deleted");
            Ok(ApiResponse::empty().with_message("Objeto deletado com sucesso"))
        }
        Ok(None) => error(not_found(), CONTEXT),
        Err(e) => error(e, CONTEXT),
    }
}

/// PATCH /api/objetos/:id/indisponivel - Mark an object as no longer available.
pub async fn mark_unavailable(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DonatedObject> {
    const CONTEXT: &str = "Erro ao marcar objeto como indisponível";

    match state.repo.set_availability(&id, false).await {
        Ok(Some(object)) => {
            Ok(ApiResponse::new(object).with_message("Objeto marcado como indisponível"))
        }
        Ok(None) => error(not_found(), CONTEXT),
        Err(e) => error(e, CONTEXT),
    }
}

/// GET /api/objetos/estatisticas - Aggregate statistics.
pub async fn get_statistics(State(state): State<AppState>) -> ApiResult<ObjectStatistics> {
    const CONTEXT: &str = "Erro ao buscar estatísticas";

    let all = ObjectFilter::default();
    let available = ObjectFilter {
        available: Some(true),
        ..ObjectFilter::default()
    };

    // Independent reads; no snapshot across them.
    let result = tokio::try_join!(
        state.repo.count(&all),
        state.repo.count(&available),
        state.repo.aggregate_count(GroupField::Category, None),
        state.repo.aggregate_count(GroupField::City, Some(TOP_CITIES)),
    );

    match result {
        Ok((total, disponiveis, por_categoria, por_cidade)) => success(ObjectStatistics {
            total,
            disponiveis,
            por_categoria,
            por_cidade,
        }),
        Err(e) => error(e, CONTEXT),
    }
}
