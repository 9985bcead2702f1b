//! HTTP handlers. Parse the request, call one use case, wrap the result in the
//! success envelope.

use super::auth::{CurrentUser, MaybeUser};
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::usecases::stream_service::{GetStreamsQuery, StreamChanges};
use crate::usecases::subscription_service::{
    AddSubscriptions, PropertyChange, RemoveSubscriptions, UpdateSubscriptions,
};
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::request::Parts,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// `Json` whose rejection renders as the error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection renders as the error envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `{"result":"success","msg":""}` plus the keys of `data`.
fn success(data: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("result".into(), json!("success"));
    body.insert("msg".into(), json!(""));
    if let Value::Object(fields) = data {
        body.extend(fields);
    }
    Json(Value::Object(body))
}

fn to_value<T: serde::Serialize>(value: T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn health() -> Json<Value> {
    success(json!({ "status": "ok" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Streams
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_streams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<GetStreamsQuery>,
) -> ApiResult<Json<Value>> {
    let streams = state.streams.get_streams(&user, query).await?;
    Ok(success(json!({ "streams": to_value(streams)? })))
}

pub async fn get_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(stream_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let stream = state.streams.get_stream(&user, stream_id).await?;
    Ok(success(json!({ "stream": to_value(stream)? })))
}

pub async fn update_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(stream_id): Path<i64>,
    ApiJson(changes): ApiJson<StreamChanges>,
) -> ApiResult<Json<Value>> {
    state.streams.update_stream(&user, stream_id, changes).await?;
    Ok(success(json!({})))
}

pub async fn deactivate_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(stream_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.streams.deactivate_stream(&user, stream_id).await?;
    Ok(success(json!({})))
}

pub async fn get_subscribers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(stream_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let subscribers = state.streams.subscribers(&user, stream_id).await?;
    Ok(success(json!({ "subscribers": subscribers })))
}

pub async fn get_stream_email_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(stream_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let email = state.streams.email_address(&user, stream_id).await?;
    Ok(success(json!({ "email": email })))
}

pub async fn get_topics(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(stream_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let topics = state.streams.topics(user.as_ref(), stream_id).await?;
    Ok(success(json!({ "topics": to_value(topics)? })))
}

#[derive(Debug, Deserialize)]
pub struct StreamIdQuery {
    pub stream: String,
}

pub async fn get_stream_id(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<StreamIdQuery>,
) -> ApiResult<Json<Value>> {
    let stream_id = state.streams.get_stream_id(&user, &query.stream).await?;
    Ok(success(json!({ "stream_id": stream_id })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteTopicBody {
    pub topic_name: String,
}

pub async fn delete_topic(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(stream_id): Path<i64>,
    ApiJson(body): ApiJson<DeleteTopicBody>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .topic_deletion
        .delete_in_topic(&user, stream_id, &body.topic_name)
        .await?;
    Ok(success(json!({ "complete": outcome.complete })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriptions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListSubscriptionsQuery {
    #[serde(default)]
    pub include_subscribers: bool,
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<ListSubscriptionsQuery>,
) -> ApiResult<Json<Value>> {
    let subscriptions = state
        .subscriptions
        .list_subscriptions(&user, query.include_subscribers)
        .await?;
    Ok(success(json!({ "subscriptions": to_value(subscriptions)? })))
}

pub async fn add_subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<AddSubscriptions>,
) -> ApiResult<Json<Value>> {
    let result = state.subscriptions.add_subscriptions(&user, request).await?;
    Ok(success(to_value(result)?))
}

pub async fn remove_subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<RemoveSubscriptions>,
) -> ApiResult<Json<Value>> {
    let result = state
        .subscriptions
        .remove_subscriptions(&user, request)
        .await?;
    Ok(success(to_value(result)?))
}

pub async fn update_subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<UpdateSubscriptions>,
) -> ApiResult<Json<Value>> {
    let merged = state
        .subscriptions
        .update_subscriptions(&user, request)
        .await?;
    Ok(success(Value::Object(merged)))
}

#[derive(Debug, Deserialize)]
pub struct PropertiesBody {
    pub subscription_data: Vec<PropertyChange>,
}

pub async fn update_subscription_properties(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<PropertiesBody>,
) -> ApiResult<Json<Value>> {
    state
        .subscriptions
        .update_properties(&user, body.subscription_data)
        .await?;
    Ok(success(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct PropertyBody {
    pub property: String,
    pub value: Value,
}

pub async fn update_subscription_property(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(stream_id): Path<i64>,
    ApiJson(body): ApiJson<PropertyBody>,
) -> ApiResult<Json<Value>> {
    let change = PropertyChange {
        stream_id,
        property: body.property,
        value: body.value,
    };
    state
        .subscriptions
        .update_properties(&user, vec![change])
        .await?;
    Ok(success(json!({})))
}

// ─────────────────────────────────────────────────────────────────────────────
// Default streams
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StreamIdBody {
    pub stream_id: i64,
}

pub async fn add_default_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<StreamIdBody>,
) -> ApiResult<Json<Value>> {
    state
        .default_streams
        .add_default_stream(&user, body.stream_id)
        .await?;
    Ok(success(json!({})))
}

pub async fn remove_default_stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<StreamIdBody>,
) -> ApiResult<Json<Value>> {
    state
        .default_streams
        .remove_default_stream(&user, body.stream_id)
        .await?;
    Ok(success(json!({})))
}

pub async fn list_default_stream_groups(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let groups = state.default_streams.list_groups().await?;
    Ok(success(json!({ "default_stream_groups": to_value(groups)? })))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    pub group_name: String,
    #[serde(default)]
    pub description: String,
    pub stream_names: Vec<String>,
}

pub async fn create_default_stream_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<CreateGroupBody>,
) -> ApiResult<Json<Value>> {
    let group = state
        .default_streams
        .create_group(&user, &body.group_name, &body.description, &body.stream_names)
        .await?;
    Ok(success(json!({ "group_id": group.id })))
}

#[derive(Debug, Deserialize)]
pub struct GroupInfoBody {
    #[serde(default)]
    pub new_group_name: Option<String>,
    #[serde(default)]
    pub new_description: Option<String>,
}

pub async fn update_default_stream_group_info(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i64>,
    ApiJson(body): ApiJson<GroupInfoBody>,
) -> ApiResult<Json<Value>> {
    state
        .default_streams
        .update_group_info(
            &user,
            group_id,
            body.new_group_name.as_deref(),
            body.new_description.as_deref(),
        )
        .await?;
    Ok(success(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct GroupStreamsBody {
    pub op: String,
    pub stream_names: Vec<String>,
}

pub async fn update_default_stream_group_streams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i64>,
    ApiJson(body): ApiJson<GroupStreamsBody>,
) -> ApiResult<Json<Value>> {
    state
        .default_streams
        .update_group_streams(&user, group_id, &body.op, &body.stream_names)
        .await?;
    Ok(success(json!({})))
}

pub async fn remove_default_stream_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.default_streams.delete_group(&user, group_id).await?;
    Ok(success(json!({})))
}

// ─────────────────────────────────────────────────────────────────────────────
// Integrations
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_integrations(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let all: Vec<_> = state.integrations.iter().collect();
    Ok(success(json!({ "integrations": to_value(all)? })))
}

pub async fn get_integration(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let integration = state.integrations.get(&name)?;
    Ok(success(json!({ "integration": to_value(integration)? })))
}
