use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

use super::elapsed_ms;
use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{ApiResponse, Product, ProductData, ProductFilter, ProductRequest, ProductsData},
    repository::RepositoryState,
    validation::ValidJson,
};

/// 400 when `sku` already belongs to a product other than `own_id`.
async fn ensure_sku_free(
    repo: &RepositoryState,
    sku: &str,
    own_id: Option<Uuid>,
) -> Result<(), ApiError> {
    match repo.find_product_by_sku(sku).await? {
        Some(existing) if Some(existing.id) != own_id => {
            tracing::warn!(sku, existing_id = %existing.id, "SKU already in use");
            Err(ApiError::bad_request("El SKU ya está en uso"))
        }
        _ => Ok(()),
    }
}

/// list_products
///
/// [Public Route] Catalog listing, newest first. Hidden products are included
/// unless `isActive` narrows the result.
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "products",
    params(ProductFilter),
    responses((status = 200, description = "Products", body = ApiResponse<ProductsData>))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ApiResponse<ProductsData>>, ApiError> {
    let products = state.repo.list_products(&filter).await?;
    Ok(Json(ApiResponse::data(ProductsData { products })))
}

/// get_product
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "products",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductData>),
        (status = 404, description = "Unknown product", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductData>>, ApiError> {
    let product = state
        .repo
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Producto no encontrado"))?;

    Ok(Json(ApiResponse::data(ProductData { product })))
}

/// create_product
///
/// [Staff Route] Adds a product to the catalog. The SKU must be unused.
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "products",
    security(("bearer_auth" = [])),
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductData>),
        (status = 400, description = "Invalid input or SKU in use", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not staff", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_product(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductData>>), ApiError> {
    let started = Instant::now();
    tracing::info!(sku = %payload.sku, actor_id = %auth.id, "product creation attempt");

    ensure_sku_free(&state.repo, &payload.sku, None).await?;

    let now = Utc::now();
    let product = state
        .repo
        .create_product(Product {
            id: Uuid::new_v4(),
            nombre: payload.nombre,
            descripcion: payload.descripcion,
            sku: payload.sku,
            // Presence is enforced by validation.
            precio: payload.precio.unwrap_or_default(),
            precio_oferta: payload.precio_oferta,
            stock: payload.stock.unwrap_or(0),
            imagen: payload.imagen,
            categoria: payload.categoria,
            is_active: payload.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(
        product_id = %product.id,
        sku = %product.sku,
        elapsed_ms = elapsed_ms(started),
        "product created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Producto creado exitosamente",
            ProductData { product },
        )),
    ))
}

/// update_product
///
/// [Staff Route] Replaces a product's fields. `stock` and `isActive` keep
/// their stored values when omitted.
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductData>),
        (status = 400, description = "Invalid input or SKU in use", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_product(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<ProductRequest>,
) -> Result<Json<ApiResponse<ProductData>>, ApiError> {
    let started = Instant::now();
    tracing::info!(product_id = %id, actor_id = %auth.id, "product update attempt");

    let mut product = state
        .repo
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Producto no encontrado"))?;

    if payload.sku != product.sku {
        ensure_sku_free(&state.repo, &payload.sku, Some(product.id)).await?;
    }

    product.nombre = payload.nombre;
    product.descripcion = payload.descripcion;
    product.sku = payload.sku;
    product.precio = payload.precio.unwrap_or(product.precio);
    product.precio_oferta = payload.precio_oferta;
    product.imagen = payload.imagen;
    product.categoria = payload.categoria;
    if let Some(stock) = payload.stock {
        product.stock = stock;
    }
    if let Some(is_active) = payload.is_active {
        product.is_active = is_active;
    }

    let product = state
        .repo
        .update_product(&product)
        .await?
        .ok_or_else(|| ApiError::not_found("Producto no encontrado"))?;

    tracing::info!(product_id = %id, elapsed_ms = elapsed_ms(started), "product updated");

    Ok(Json(ApiResponse::with_message(
        "Producto actualizado exitosamente",
        ProductData { product },
    )))
}

/// toggle_product_visibility
///
/// [Staff Route] Flips `isActive`, hiding or showing the product in the storefront.
#[utoipa::path(
    patch,
    path = "/api/products/{id}/toggle-visibility",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Visibility flipped", body = ApiResponse<ProductData>),
        (status = 404, description = "Unknown product", body = crate::error::ErrorResponse)
    )
)]
pub async fn toggle_product_visibility(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductData>>, ApiError> {
    let started = Instant::now();
    tracing::info!(product_id = %id, actor_id = %auth.id, "visibility toggle attempt");

    let product = state
        .repo
        .toggle_product_active(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Producto no encontrado"))?;

    tracing::info!(
        product_id = %id,
        is_active = product.is_active,
        elapsed_ms = elapsed_ms(started),
        "visibility toggled"
    );

    let message = if product.is_active {
        "Producto visible exitosamente"
    } else {
        "Producto oculto exitosamente"
    };
    Ok(Json(ApiResponse::with_message(
        message,
        ProductData { product },
    )))
}

/// delete_product
///
/// [Staff Route] Removes a product and echoes the deleted row.
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<ProductData>),
        (status = 404, description = "Unknown product", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_product(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductData>>, ApiError> {
    let started = Instant::now();
    tracing::info!(product_id = %id, actor_id = %auth.id, "product deletion attempt");

    let product = state
        .repo
        .delete_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Producto no encontrado"))?;

    tracing::info!(
        product_id = %id,
        sku = %product.sku,
        elapsed_ms = elapsed_ms(started),
        "product deleted"
    );

    Ok(Json(ApiResponse::with_message(
        "Producto eliminado exitosamente",
        ProductData { product },
    )))
}
