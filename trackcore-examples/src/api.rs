//! REST API over [`TrackingService`].
//!
//! ```bash
//! # Place an order
//! curl -X POST http://localhost:3000/orders \
//!   -H "Content-Type: application/json" \
//!   -d '{"customer": {"name": "Ada", "email": "ada@example.com"},
//!        "items": [{"product_id": "sku-1", "name": "Mug", "price": "12.50", "quantity": 2}]}'
//!
//! # Move it along
//! curl -X PUT http://localhost:3000/orders/{order_id}/status \
//!   -H "Content-Type: application/json" -d '{"status": "confirmed"}'
//!
//! # Track it
//! curl http://localhost:3000/tracking/TRK-1717232400000-AB12CD
//! ```
//!
//! Input is validated at this boundary; tracking errors map onto status
//! codes in [`ApiError`].

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use trackcore::{
    Actor, CustomerEmail, CustomerSnapshot, EventId, Location, Money, NewOrder, Note, OrderId,
    OrderItem, OrderStatus, OrderSummary, OrderView, Page, PageRequest, ProductId, Quantity,
    RetryGuidance, TimelineStep, Timestamp, TrackingError, TrackingService, UpdateStatus,
    UpdatedView,
};
use trackcore_memory::InMemoryOrderStore;
use uuid::Uuid;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The tracking service behind the API
    pub service: Arc<TrackingService<InMemoryOrderStore>>,
}

impl AppState {
    /// Wraps a service for the router.
    pub fn new(service: TrackingService<InMemoryOrderStore>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

// API Request/Response Types
#[derive(Debug, Deserialize)]
#[allow(missing_docs)]
pub struct CustomerRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(missing_docs)]
pub struct ItemRequest {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(missing_docs)]
pub struct CreateOrderRequest {
    pub customer: CustomerRequest,
    pub items: Vec<ItemRequest>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(missing_docs)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub admin_override: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub actor: Actor,
    #[serde(default)]
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[allow(missing_docs)]
pub struct SearchRequest {
    pub email: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(flatten)]
    pub page: PageRequest,
}

#[derive(Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ErrorResponse {
    pub error: String,
    pub retry: String,
}

/// Failure of a request, rendered as JSON with a matching status code.
#[derive(Debug)]
pub enum ApiError {
    /// The request body or path did not validate
    BadRequest(String),
    /// The tracking service refused or failed
    Tracking(TrackingError),
}

impl From<TrackingError> for ApiError {
    fn from(error: TrackingError) -> Self {
        Self::Tracking(error)
    }
}

impl ApiError {
    fn field(name: &str, error: impl std::fmt::Display) -> Self {
        Self::BadRequest(format!("{name}: {error}"))
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Tracking(TrackingError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Tracking(TrackingError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Tracking(TrackingError::InvalidTransition { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Tracking(TrackingError::ConcurrentModification(_)) => StatusCode::CONFLICT,
            Self::Tracking(TrackingError::PersistenceUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Tracking(TrackingError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn retry(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "do_not_retry",
            Self::Tracking(error) => match error.retry_guidance() {
                RetryGuidance::SafeToRetry => "safe_to_retry",
                RetryGuidance::RetryWithIdempotencyKey => "retry_with_idempotency_key",
                RetryGuidance::DoNotRetry => "do_not_retry",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry = self.retry().to_string();
        let error = match self {
            Self::BadRequest(message) => message,
            Self::Tracking(error) => error.to_string(),
        };
        if status.is_server_error() {
            warn!(%status, %error, "Request failed");
        }
        (status, Json(ErrorResponse { error, retry })).into_response()
    }
}

/// Empty strings count as absent.
fn optional<T, E>(
    name: &str,
    value: Option<String>,
    parse: impl FnOnce(String) -> Result<T, E>,
) -> Result<Option<T>, ApiError>
where
    E: std::fmt::Display,
{
    value
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| parse(raw).map_err(|e| ApiError::field(name, e)))
        .transpose()
}

impl CreateOrderRequest {
    /// Validates the request into a [`NewOrder`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] naming the first invalid field.
    pub fn into_new_order(self) -> Result<NewOrder, ApiError> {
        let customer = CustomerSnapshot {
            name: self.customer.name,
            email: CustomerEmail::try_new(self.customer.email)
                .map_err(|e| ApiError::field("customer.email", e))?,
            phone: self.customer.phone,
            city: self.customer.city,
            address: self.customer.address,
        };
        let items = self
            .items
            .into_iter()
            .map(|item| {
                Ok(OrderItem {
                    product_id: ProductId::try_new(item.product_id)
                        .map_err(|e| ApiError::field("items.product_id", e))?,
                    name: item.name,
                    price: Money::new(item.price).map_err(|e| ApiError::field("items.price", e))?,
                    quantity: Quantity::try_new(item.quantity)
                        .map_err(|e| ApiError::field("items.quantity", e))?,
                    image: item.image,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(NewOrder {
            customer,
            items,
            estimated_delivery: self.estimated_delivery.map(Timestamp::new),
            note: optional("note", self.note, Note::try_new)?,
            actor: Actor::System,
        })
    }
}

impl UpdateStatusRequest {
    /// Validates the request into an [`UpdateStatus`] for `order_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] naming the first invalid field.
    pub fn into_update(self, order_id: OrderId) -> Result<UpdateStatus, ApiError> {
        let status =
            OrderStatus::from_str(&self.status).map_err(|e| ApiError::field("status", e))?;
        let mut update = UpdateStatus::new(order_id, status).with_actor(self.actor);
        if self.admin_override {
            update = update.with_override();
        }
        if let Some(note) = optional("note", self.note, Note::try_new)? {
            update = update.with_note(note);
        }
        if let Some(location) = optional("location", self.location, Location::try_new)? {
            update = update.with_location(location);
        }
        if let Some(key) = self.idempotency_key {
            let key = EventId::try_new(key)
                .map_err(|_| ApiError::BadRequest("idempotency_key: must be a UUIDv7".into()))?;
            update = update.with_idempotency_key(key);
        }
        Ok(update)
    }
}

fn order_id(raw: Uuid) -> Result<OrderId, ApiError> {
    OrderId::try_new(raw).map_err(|_| ApiError::BadRequest("order id: must be a UUIDv7".into()))
}

// Axum Handlers
#[allow(missing_docs)]
pub async fn open_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let new_order = request.into_new_order()?;
    let view = state.service.open_order(new_order).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[allow(missing_docs)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.service.view(order_id(id)?).await?))
}

#[allow(missing_docs)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdatedView>, ApiError> {
    let update = request.into_update(order_id(id)?)?;
    Ok(Json(state.service.update_status(update).await?))
}

#[allow(missing_docs)]
pub async fn get_timeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineStep>>, ApiError> {
    Ok(Json(
        state.service.build_timeline_view(order_id(id)?).await?,
    ))
}

#[allow(missing_docs)]
pub async fn track(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.service.lookup_by_identifier(&identifier).await?))
}

#[allow(missing_docs)]
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Page<OrderSummary>>, ApiError> {
    let page = state
        .service
        .search_by_email(&request.email, request.order_number.as_deref(), request.page)
        .await?;
    Ok(Json(page))
}

// Application factory
#[allow(missing_docs)]
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(open_order))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", put(update_status))
        .route("/orders/{id}/timeline", get(get_timeline))
        .route("/tracking/search", post(search))
        .route("/tracking/{identifier}", get(track))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(body: &str) -> UpdateStatusRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn status_names_are_case_insensitive() {
        let request = update(r#"{"status": "Shipped", "admin_override": true}"#)
            .into_update(OrderId::new())
            .unwrap();
        assert_eq!(request.status, OrderStatus::Shipped);
        assert_eq!(request.mode, trackcore::TransitionMode::AdminOverride);
    }

    #[test]
    fn blank_notes_are_dropped() {
        let request = update(r#"{"status": "confirmed", "note": "   "}"#)
            .into_update(OrderId::new())
            .unwrap();
        assert_eq!(request.note, None);
    }

    #[test]
    fn unknown_status_is_a_bad_request() {
        let err = update(r#"{"status": "lost"}"#)
            .into_update(OrderId::new())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn actors_deserialize_from_tagged_json() {
        let body = r#"{"status": "shipped", "actor": {"kind": "carrier", "feed": "ups"}}"#;
        let request = update(body).into_update(OrderId::new()).unwrap();
        assert_eq!(request.actor, Actor::carrier("ups"));
    }

    #[test]
    fn tracking_errors_map_to_status_codes() {
        let cases = [
            (TrackingError::NotFound("ORD-1-1".into()), StatusCode::NOT_FOUND),
            (
                TrackingError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Shipped,
                    reason: trackcore::TransitionRejection::TerminalState,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                TrackingError::ConcurrentModification(OrderId::new()),
                StatusCode::CONFLICT,
            ),
            (
                TrackingError::PersistenceUnavailable("timed out".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (TrackingError::InvalidInput("email".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn create_request_rejects_bad_email() {
        let request: CreateOrderRequest = serde_json::from_str(
            r#"{"customer": {"name": "Ada", "email": "nope"},
                "items": [{"product_id": "sku-1", "name": "Mug", "price": "1.00", "quantity": 1}]}"#,
        )
        .unwrap();
        match request.into_new_order() {
            Err(ApiError::BadRequest(message)) => assert!(message.starts_with("customer.email")),
            other => panic!("expected bad request, got {other:?}"),
        }
    }
}
