//! REST read API
//!
//! Every collection exposes the same two endpoints: a filtered, paginated
//! list and a single-entity lookup. Query strings follow the bracketed
//! parameter conventions understood by [`FilterRequest::from_params`].

pub mod auth;
pub mod error;
pub mod health;

use axum::Json;
use axum::Router;
use axum::extract::{Path, RawQuery, State};
use axum::routing::get;
use serde_json::{Value, json};

use crate::app::AppState;
use crate::entities::{
    ClassRoom, Course, LearningMaterial, LearningMaterialQuestion,
    LearningMaterialQuestionTestCase, Role, School, StudentScore, User,
};
use crate::query::{Entity, FilterRequest, ParamBag, QueryComposer, RequestContext};
use crate::resource::ShapePlan;

use self::error::ApiError;

/// Routes for all collections, to be nested under `/api`
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(collection::<School>("/schools"))
        .merge(collection::<ClassRoom>("/class-rooms"))
        .merge(collection::<Course>("/courses"))
        .merge(collection::<LearningMaterial>("/learning-materials"))
        .merge(collection::<LearningMaterialQuestion>(
            "/learning-material-questions",
        ))
        .merge(collection::<LearningMaterialQuestionTestCase>(
            "/learning-material-question-test-cases",
        ))
        .merge(collection::<User>("/users"))
        .merge(collection::<Role>("/roles"))
        .merge(collection::<StudentScore>("/student-scores"))
}

fn collection<E: Entity>(path: &str) -> Router<AppState> {
    Router::new()
        .route(path, get(index::<E>))
        .route(&format!("{path}/{{id}}"), get(show::<E>))
}

fn composer<E: Entity>(state: &AppState) -> QueryComposer<E> {
    QueryComposer::new().with_limits(state.config.page_limits())
}

fn filter_request(raw: Option<String>) -> FilterRequest {
    let params = ParamBag::from_query(raw.as_deref().unwrap_or_default());
    FilterRequest::from_params(&params)
}

async fn index<E: Entity>(
    State(state): State<AppState>,
    ctx: RequestContext,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, ApiError> {
    let request = filter_request(raw);
    let page = composer::<E>(&state)
        .paginate(state.db.pool(), &request, &ctx)
        .await?;

    let plan = ShapePlan::from_request(&request);
    let data = state.shaper.shape_many(&page.data, &plan);
    Ok(Json(json!({ "data": data, "meta": page.meta })))
}

async fn show<E: Entity>(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, ApiError> {
    let request = filter_request(raw);
    let entity = composer::<E>(&state)
        .find(state.db.pool(), id, &request, &ctx)
        .await?;

    let plan = ShapePlan::from_request(&request);
    let data = state.shaper.shape(&entity, &plan);
    Ok(Json(json!({ "data": data })))
}
