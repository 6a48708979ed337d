//! School read endpoints.
//!
//! Every handler scans the whole store; there is no indexed lookup.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{SchoolList, SchoolSummary};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GetSchoolParams {
    #[serde(default)]
    pub school_name: Option<String>,
}

/// GET /api/get-school?school_name= - First school with a matching name, or `{}`.
pub async fn get_school(
    State(state): State<AppState>,
    Query(params): Query<GetSchoolParams>,
) -> Result<Json<Value>, AppError> {
    let schools = state.store.list_schools().await?;

    let found = params
        .school_name
        .as_deref()
        .and_then(|name| schools.into_iter().find(|school| school.name == name));

    let body = match found {
        Some(school) => serde_json::to_value(SchoolSummary::from(school))?,
        None => Value::Object(Map::new()),
    };
    tracing::debug!("get-school response: {}", body);

    Ok(Json(body))
}

/// GET /api/get-school-list - Every school name in store order.
pub async fn get_school_list(State(state): State<AppState>) -> Result<Json<SchoolList>, AppError> {
    let school_list: Vec<String> = state
        .store
        .list_schools()
        .await?
        .into_iter()
        .map(|school| school.name)
        .collect();
    tracing::debug!("get-school-list returned {} schools", school_list.len());

    Ok(Json(SchoolList { school_list }))
}

/// GET /api/dump-all - Every school keyed by document id.
pub async fn dump_all(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let mut body = Map::new();
    for school in state.store.list_schools().await? {
        let id = school.id.clone();
        body.insert(id, serde_json::to_value(SchoolSummary::from(school))?);
    }
    tracing::debug!("dump-all returned {} schools", body.len());

    Ok(Json(Value::Object(body)))
}
