use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::time::Instant;
use uuid::Uuid;

use super::elapsed_ms;
use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{
        ApiResponse, MessageResponse, UpdateUserRequest, UserData, UserFilter, UserResponse,
        UsersData,
    },
    roles::{ManagementAction, ManagementDenied, Role, check_management},
    validation::ValidJson,
};

/// Maps a refused management check onto the HTTP error for `action`.
fn management_error(action: ManagementAction, denied: ManagementDenied) -> ApiError {
    match (denied, action) {
        (ManagementDenied::OwnAccount, ManagementAction::Delete) => {
            ApiError::bad_request("No puedes eliminar tu propia cuenta")
        }
        (ManagementDenied::OwnAccount, _) => {
            ApiError::bad_request("No puedes desactivar tu propia cuenta")
        }
        (ManagementDenied::OutRanked { .. }, ManagementAction::Delete) => {
            ApiError::forbidden("Los Administradores solo pueden eliminar usuarios normales")
        }
        (ManagementDenied::OutRanked { .. }, _) => {
            ApiError::forbidden("Los Administradores solo pueden modificar usuarios normales")
        }
    }
}

/// list_users
///
/// [Staff Route] Every account, newest first, optionally filtered by role,
/// active flag or a search term.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserFilter),
    responses(
        (status = 200, description = "Users", body = ApiResponse<UsersData>),
        (status = 403, description = "Caller is not staff", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<ApiResponse<UsersData>>, ApiError> {
    let users = state.repo.list_users(&filter).await?;
    Ok(Json(ApiResponse::data(UsersData {
        users: users.iter().map(UserResponse::from).collect(),
    })))
}

/// get_user
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = ApiResponse<UserData>),
        (status = 404, description = "Unknown user", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserData>>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    Ok(Json(ApiResponse::data(UserData {
        user: UserResponse::from(&user),
    })))
}

/// update_user
///
/// [Staff Route] Changes another account's role or active flag.
///
/// Only the owner may change roles. Administrators may only touch regular
/// users, and nobody may deactivate their own account.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserData>),
        (status = 400, description = "Self-deactivation", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not manage this account", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown user", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserData>>, ApiError> {
    let started = Instant::now();
    tracing::info!(target_id = %id, actor_id = %auth.id, "user update attempt");

    let mut user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    if payload.role.is_some() && auth.role != Role::Dueno {
        tracing::warn!(actor_id = %auth.id, role = %auth.role, "user update rejected: role change by non-owner");
        return Err(ApiError::forbidden(
            "Solo el Dueño puede cambiar roles de usuario",
        ));
    }

    let action = if payload.is_active == Some(false) {
        ManagementAction::Deactivate
    } else {
        ManagementAction::Modify
    };
    check_management(action, auth.principal(), user.principal()).map_err(|denied| {
        tracing::warn!(actor_id = %auth.id, target_id = %id, %denied, "user update rejected");
        management_error(action, denied)
    })?;

    if let Some(role) = payload.role {
        user.role = role;
    }
    if let Some(is_active) = payload.is_active {
        user.is_active = is_active;
    }

    let user = state
        .repo
        .update_user(&user)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    tracing::info!(
        target_id = %id,
        role = %user.role,
        is_active = user.is_active,
        elapsed_ms = elapsed_ms(started),
        "user updated"
    );

    Ok(Json(ApiResponse::with_message(
        "Usuario actualizado exitosamente",
        UserData {
            user: UserResponse::from(&user),
        },
    )))
}

/// delete_user
///
/// [Staff Route] Removes an account. Owners may delete anyone but themselves;
/// administrators only regular users.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Self-deletion", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not manage this account", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown user", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let started = Instant::now();
    tracing::info!(target_id = %id, actor_id = %auth.id, "user deletion attempt");

    if auth.id == id {
        tracing::warn!(actor_id = %auth.id, "user deletion rejected: own account");
        return Err(management_error(
            ManagementAction::Delete,
            ManagementDenied::OwnAccount,
        ));
    }

    let target = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    check_management(ManagementAction::Delete, auth.principal(), target.principal()).map_err(
        |denied| {
            tracing::warn!(actor_id = %auth.id, target_id = %id, target_role = %target.role, "user deletion rejected");
            management_error(ManagementAction::Delete, denied)
        },
    )?;

    if !state.repo.delete_user(id).await? {
        return Err(ApiError::not_found("Usuario no encontrado"));
    }

    tracing::info!(
        target_id = %id,
        email = %target.email,
        elapsed_ms = elapsed_ms(started),
        "user deleted"
    );

    Ok(Json(MessageResponse::success("Usuario eliminado exitosamente")))
}
