use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::auth::TenantContext;
use crate::error::PayablesError;
use crate::lifecycle::BillStatistics;
use crate::models::{
    BillFilter, BillView, Branch, Category, CreateBill, CreateBranch, CreateCategory,
    CreatePaymentMethod, CreateSupplier, PaymentMethod, Supplier, UpdateBill,
};
use crate::store::BillStore;

type ApiResult<T> = Result<T, PayablesError>;

/// Bill creation body: the bill fields plus an optional repeat count.
#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    #[serde(flatten)]
    pub bill: CreateBill,
    #[serde(default)]
    pub recurrence_count: Option<u32>,
}

/// A single bill, or the whole group when the request expanded a recurrence.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreatedBills {
    One(BillView),
    Group(Vec<BillView>),
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequest {
    /// String, integer or float. Defaults to the bill's final amount.
    #[serde(default)]
    pub amount_paid: Option<Value>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `POST /api/bills`
pub async fn create_bill<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreateBillRequest>,
) -> ApiResult<(StatusCode, Json<CreatedBills>)> {
    let count = request.recurrence_count.unwrap_or(1);
    let expanding = request.bill.is_recurring && count > 1;

    let bills = state
        .service
        .expand_recurring(&ctx, request.bill, count)
        .await?;

    let today = today();
    let mut views: Vec<BillView> = bills.into_iter().map(|b| BillView::new(b, today)).collect();
    let body = if expanding || views.len() != 1 {
        CreatedBills::Group(views)
    } else {
        CreatedBills::One(views.remove(0))
    };

    Ok((StatusCode::CREATED, Json(body)))
}

/// `GET /api/bills`
pub async fn list_bills<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Query(filter): Query<BillFilter>,
) -> ApiResult<Json<Vec<BillView>>> {
    let bills = state.service.list_bills(&ctx, &filter).await?;
    info!("Listing {} bill(s) for company {}", bills.len(), ctx.company_id);

    let today = today();
    Ok(Json(bills.into_iter().map(|b| BillView::new(b, today)).collect()))
}

/// `GET /api/bills/statistics`
pub async fn statistics<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<BillStatistics>> {
    Ok(Json(state.service.statistics(&ctx).await?))
}

/// `GET /api/bills/:id`
pub async fn get_bill<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Path(bill_id): Path<Uuid>,
) -> ApiResult<Json<BillView>> {
    let bill = state.service.get_bill(&ctx, bill_id).await?;
    Ok(Json(BillView::new(bill, today())))
}

/// `PATCH /api/bills/:id`
pub async fn update_bill<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Path(bill_id): Path<Uuid>,
    Json(changes): Json<UpdateBill>,
) -> ApiResult<Json<BillView>> {
    let bill = state.service.update_bill(&ctx, bill_id, changes).await?;
    Ok(Json(BillView::new(bill, today())))
}

/// `POST /api/bills/:id/pay`
pub async fn record_payment<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Path(bill_id): Path<Uuid>,
    Json(payment): Json<PaymentRequest>,
) -> ApiResult<Json<BillView>> {
    let bill = state
        .service
        .record_payment(&ctx, bill_id, payment.amount_paid.as_ref(), payment.payment_date)
        .await?;
    Ok(Json(BillView::new(bill, today())))
}

/// `POST /api/bills/:id/cancel`
pub async fn cancel_bill<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Path(bill_id): Path<Uuid>,
) -> ApiResult<Json<BillView>> {
    let bill = state.service.cancel(&ctx, bill_id).await?;
    Ok(Json(BillView::new(bill, today())))
}

pub async fn create_branch<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<CreateBranch>,
) -> ApiResult<(StatusCode, Json<Branch>)> {
    let branch = state.service.create_branch(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

pub async fn create_supplier<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<CreateSupplier>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.service.create_supplier(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn create_category<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<CreateCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.service.create_category(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn create_payment_method<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
    Json(input): Json<CreatePaymentMethod>,
) -> ApiResult<(StatusCode, Json<PaymentMethod>)> {
    let method = state.service.create_payment_method(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn list_branches<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<Vec<Branch>>> {
    Ok(Json(state.service.list_branches(&ctx).await?))
}

pub async fn list_suppliers<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.service.list_suppliers(&ctx).await?))
}

pub async fn list_categories<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.service.list_categories(&ctx).await?))
}

pub async fn list_payment_methods<S: BillStore>(
    State(state): State<AppState<S>>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Json<Vec<PaymentMethod>>> {
    Ok(Json(state.service.list_payment_methods(&ctx).await?))
}
