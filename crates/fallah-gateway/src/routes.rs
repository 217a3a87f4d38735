use axum::{
    Json, Router,
    extract::{
        FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    routing::{get, patch},
};
use fallah_core::{
    Equipment, Feed, Fertilizer, Harvest, HistoryPage, InventoryKind, QuantityLedgerEntry,
    Seeds, Stock, StockError, StockService, Tools,
};
use fallah_platform::{
    AdjustQuantityRequest, CreateItemRequest, ErrorBody, HistoryQuery, ItemView,
    ItemWithHistoryView, RedisBus, UpdateItemRequest,
};
use tracing::{error, warn};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Clone)]
pub struct AppState {
    pub service: StockService,
    pub alerts: Option<RedisBus>,
    pub history_embed_limit: usize,
}

/// The caller's user id, injected by the upstream auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct RequestingUser(pub Uuid);

impl<S> FromRequestParts<S> for RequestingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(RequestingUser)
            .ok_or_else(|| {
                api_error(
                    StatusCode::UNAUTHORIZED,
                    "missing or invalid user context",
                    "UnauthorizedError",
                )
            })
    }
}

pub fn router(state: AppState) -> Router {
    let router = Router::new().route("/healthz", get(healthz));
    let router = nest_kind::<Stock>(router);
    let router = nest_kind::<Feed>(router);
    let router = nest_kind::<Seeds>(router);
    let router = nest_kind::<Fertilizer>(router);
    let router = nest_kind::<Equipment>(router);
    let router = nest_kind::<Harvest>(router);
    let router = nest_kind::<Tools>(router);
    router.with_state(state)
}

fn nest_kind<K: InventoryKind>(router: Router<AppState>) -> Router<AppState> {
    let kind_router = Router::new()
        .route("/", get(list_items::<K>).post(create_item::<K>))
        .route("/low-stock", get(list_low_stock::<K>))
        .route(
            "/{id}",
            get(get_item::<K>)
                .patch(update_item::<K>)
                .delete(delete_item::<K>),
        )
        .route("/{id}/quantity", patch(adjust_quantity::<K>))
        .route("/{id}/history", get(item_history::<K>));

    router.nest(&format!("/{}", K::KIND), kind_router)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_items<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
) -> Result<Json<Vec<ItemView>>, ApiError> {
    let items = state
        .service
        .list::<K>(owner_id)
        .await
        .map_err(stock_error)?;
    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

async fn list_low_stock<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
) -> Result<Json<Vec<ItemView>>, ApiError> {
    let items = state
        .service
        .low_stock::<K>(owner_id)
        .await
        .map_err(stock_error)?;
    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

async fn create_item<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ItemView>), ApiError> {
    let Json(payload) = payload.map_err(invalid_body)?;
    let request = payload.into_new_item().map_err(stock_error)?;
    let item = state
        .service
        .create::<K>(owner_id, request)
        .await
        .map_err(stock_error)?;
    Ok((StatusCode::CREATED, Json(ItemView::from(item))))
}

async fn get_item<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
    item_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ItemView>, ApiError> {
    let item_id = item_path::<K>(item_id)?;
    let item = state
        .service
        .get::<K>(owner_id, item_id)
        .await
        .map_err(stock_error)?;
    Ok(Json(ItemView::from(item)))
}

async fn update_item<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
    item_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<ItemView>, ApiError> {
    let item_id = item_path::<K>(item_id)?;
    let Json(payload) = payload.map_err(invalid_body)?;
    let patch = payload.into_patch().map_err(stock_error)?;
    let item = state
        .service
        .update_details::<K>(owner_id, item_id, patch)
        .await
        .map_err(stock_error)?;
    Ok(Json(ItemView::from(item)))
}

async fn delete_item<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
    item_id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let item_id = item_path::<K>(item_id)?;
    state
        .service
        .delete::<K>(owner_id, item_id)
        .await
        .map_err(stock_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn adjust_quantity<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
    item_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AdjustQuantityRequest>, JsonRejection>,
) -> Result<Json<ItemWithHistoryView>, ApiError> {
    let item_id = item_path::<K>(item_id)?;
    let Json(payload) = payload.map_err(invalid_body)?;
    let command = payload.into_command().map_err(stock_error)?;

    let adjusted = state
        .service
        .adjust::<K>(owner_id, item_id, command, state.history_embed_limit)
        .await
        .map_err(stock_error)?;

    if let (Some(alerts), Some(event)) = (&state.alerts, adjusted.low_stock_event()) {
        // The adjustment is already committed; a lost alert is only logged.
        if let Err(err) = alerts.publish_low_stock(&event).await {
            warn!(item_id = %event.item_id, "failed to publish low-stock alert: {err:#}");
        }
    }

    Ok(Json(ItemWithHistoryView {
        item: ItemView::from(adjusted.outcome.item),
        history: adjusted.history,
    }))
}

async fn item_history<K: InventoryKind>(
    State(state): State<AppState>,
    RequestingUser(owner_id): RequestingUser,
    item_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<QuantityLedgerEntry>>, ApiError> {
    let item_id = item_path::<K>(item_id)?;
    let Query(query) = query.map_err(invalid_query)?;
    let entries = state
        .service
        .history::<K>(owner_id, item_id, HistoryPage::new(query.limit, query.offset))
        .await
        .map_err(stock_error)?;
    Ok(Json(entries))
}

/// Ids that are not UUIDs cannot name an item, so they read as not found.
fn item_path<K: InventoryKind>(item_id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    item_id.map(|Path(item_id)| item_id).map_err(|_| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("{} item not found", K::KIND),
            "NotFoundError",
        )
    })
}

fn stock_error(err: StockError) -> ApiError {
    match err {
        StockError::Validation(message) => {
            api_error(StatusCode::BAD_REQUEST, message, "ValidationError")
        }
        StockError::NotFound { kind, .. } => api_error(
            StatusCode::NOT_FOUND,
            format!("{kind} item not found"),
            "NotFoundError",
        ),
        StockError::Storage(source) => {
            error!("storage failure: {source}");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                "StorageError",
            )
        }
    }
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        rejection.body_text(),
        "ValidationError",
    )
}

fn invalid_query(rejection: QueryRejection) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        rejection.body_text(),
        "ValidationError",
    )
}

fn api_error(status: StatusCode, message: impl Into<String>, error: &str) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
            error: Some(error.to_string()),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use fallah_stockstore::InMemoryStockStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        router(AppState {
            service: StockService::new(Arc::new(InMemoryStockStore::new())),
            alerts: None,
            history_embed_limit: 20,
        })
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(app: &Router, kind: &str, user: Uuid, quantity: i64) -> String {
        let (status, body) = send(
            app,
            "POST",
            &format!("/{kind}"),
            Some(user),
            Some(json!({
                "name": "Maize",
                "quantity": quantity,
                "unit": "kg",
                "lowStockThreshold": 5,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn healthz_responds() {
        let app = app();
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn add_returns_item_with_history() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "stock", user, 50).await;

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/stock/{id}/quantity"),
            Some(user),
            Some(json!({ "quantity": 20, "type": "add", "notes": "market purchase" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["quantity"], json!("70"));
        assert_eq!(body["unit"], json!("kg"));
        assert_eq!(body["lowStock"], json!(false));
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["reason"], json!("add"));
        assert_eq!(history[0]["quantity"], json!("20"));
        assert_eq!(history[0]["note"], json!("market purchase"));
    }

    #[tokio::test]
    async fn removal_beyond_stock_floors_at_zero() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "stock", user, 10).await;

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/stock/{id}/quantity"),
            Some(user),
            Some(json!({ "quantity": 15, "type": "remove" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["quantity"], json!("0"));
        assert_eq!(body["lowStock"], json!(true));
        assert_eq!(body["history"][0]["quantity"], json!("15"));
    }

    #[tokio::test]
    async fn invalid_type_is_rejected_without_changes() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "stock", user, 50).await;

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/stock/{id}/quantity"),
            Some(user),
            Some(json!({ "quantity": 5, "type": "invalid" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("type must be one of: add, remove"));
        assert_eq!(body["error"], json!("ValidationError"));

        let (_, item) = send(&app, "GET", &format!("/stock/{id}"), Some(user), None).await;
        assert_eq!(item["quantity"], json!("50"));
        let (status, history) =
            send(&app, "GET", &format!("/stock/{id}/history"), Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history, json!([]));
    }

    #[tokio::test]
    async fn non_positive_or_missing_quantity_is_rejected() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "feed", user, 50).await;
        let uri = format!("/feed/{id}/quantity");

        for body in [
            json!({ "type": "add" }),
            json!({ "quantity": 0, "type": "add" }),
            json!({ "quantity": -4, "type": "expired" }),
            json!({ "quantity": "a lot", "type": "damaged" }),
        ] {
            let (status, response) = send(&app, "PATCH", &uri, Some(user), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{response}");
        }
    }

    #[tokio::test]
    async fn other_users_item_is_not_found() {
        let app = app();
        let owner = Uuid::new_v4();
        let id = create(&app, "stock", owner, 50).await;

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/stock/{id}/quantity"),
            Some(Uuid::new_v4()),
            Some(json!({ "quantity": 5, "type": "add" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("stock item not found"));

        let (_, item) = send(&app, "GET", &format!("/stock/{id}"), Some(owner), None).await;
        assert_eq!(item["quantity"], json!("50"));
    }

    #[tokio::test]
    async fn missing_user_context_is_unauthorized() {
        let app = app();
        let (status, body) = send(&app, "GET", "/stock", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], json!("missing or invalid user context"));
    }

    #[tokio::test]
    async fn malformed_body_and_id_are_client_errors() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "stock", user, 1).await;

        let request = Request::builder()
            .method("PATCH")
            .uri(format!("/stock/{id}/quantity"))
            .header(USER_ID_HEADER, user.to_string())
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "PATCH",
            "/stock/not-a-uuid/quantity",
            Some(user),
            Some(json!({ "quantity": 1, "type": "add" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_paginates() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "harvest", user, 100).await;
        let uri = format!("/harvest/{id}/quantity");

        for (quantity, kind) in [(5, "add"), (2, "damaged"), (3, "expired")] {
            let (status, _) = send(
                &app,
                "PATCH",
                &uri,
                Some(user),
                Some(json!({ "quantity": quantity, "type": kind })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, history) =
            send(&app, "GET", &format!("/harvest/{id}/history"), Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        let reasons: Vec<_> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["reason"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(reasons, vec!["expired", "damaged", "add"]);

        let (_, page) = send(
            &app,
            "GET",
            &format!("/harvest/{id}/history?limit=1&offset=1"),
            Some(user),
            None,
        )
        .await;
        assert_eq!(page.as_array().unwrap().len(), 1);
        assert_eq!(page[0]["reason"], json!("damaged"));
    }

    #[tokio::test]
    async fn malformed_history_query_is_a_validation_error() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "feed", user, 10).await;

        for query in ["limit=abc", "offset=-1", "limit=1.5"] {
            let (status, body) = send(
                &app,
                "GET",
                &format!("/feed/{id}/history?{query}"),
                Some(user),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
            assert_eq!(body["error"], json!("ValidationError"), "{query}");
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        }

        let (status, _) = send(
            &app,
            "GET",
            &format!("/feed/{id}/history?offset=18446744073709551615"),
            Some(user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn add_beyond_decimal_range_is_rejected_without_changes() {
        let app = app();
        let user = Uuid::new_v4();
        let (status, created) = send(
            &app,
            "POST",
            "/stock",
            Some(user),
            Some(json!({
                "name": "Maize",
                "quantity": "79228162514264337593543950335",
                "unit": "kg",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        let id = created["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/stock/{id}/quantity"),
            Some(user),
            Some(json!({ "quantity": 1, "type": "add" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["error"], json!("ValidationError"));

        let (_, item) = send(&app, "GET", &format!("/stock/{id}"), Some(user), None).await;
        assert_eq!(item["quantity"], json!("79228162514264337593543950335"));
        let (_, history) =
            send(&app, "GET", &format!("/stock/{id}/history"), Some(user), None).await;
        assert!(history.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn equipment_lists_its_own_allowed_types() {
        let app = app();
        let user = Uuid::new_v4();
        let id = create(&app, "equipment", user, 2).await;

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/equipment/{id}/quantity"),
            Some(user),
            Some(json!({ "quantity": 1, "type": "expired" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            json!("type 'expired' is not allowed for equipment; expected one of: add, remove, damaged")
        );
    }

    #[tokio::test]
    async fn item_lifecycle_and_low_stock_listing() {
        let app = app();
        let user = Uuid::new_v4();
        let full = create(&app, "seeds", user, 50).await;
        let low = create(&app, "seeds", user, 3).await;

        let (status, listed) = send(&app, "GET", "/seeds", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 2);

        let (_, low_stock) = send(&app, "GET", "/seeds/low-stock", Some(user), None).await;
        let low_ids: Vec<_> = low_stock
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(low_ids, vec![low.clone()]);

        let (status, updated) = send(
            &app,
            "PATCH",
            &format!("/seeds/{full}"),
            Some(user),
            Some(json!({ "name": "Hybrid maize seed", "lowStockThreshold": 60 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], json!("Hybrid maize seed"));
        assert_eq!(updated["lowStock"], json!(true));

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/seeds/{full}"),
            Some(user),
            Some(json!({ "quantity": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let (status, _) = send(&app, "DELETE", &format!("/seeds/{low}"), Some(user), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/seeds/{low}/history"), Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
