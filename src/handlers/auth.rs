use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

use super::elapsed_ms;
use crate::{
    AppState,
    auth::{AuthUser, hash_password, issue_token, verify_password},
    error::ApiError,
    models::{
        ApiResponse, AuthData, LoginRequest, RegisterRequest, UpdateProfileRequest, User,
        UserData, UserResponse,
    },
    roles::Role,
    rut::{self, Rut},
    validation::ValidJson,
};

/// register_user
///
/// [Public Route] Creates a customer account and returns it with a session token.
///
/// The RUT is validated and stored in clean form; email and RUT must both be
/// unused. A role other than `usuario` can only be assigned when the request
/// itself carries an owner's token.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AuthData>),
        (status = 400, description = "Invalid input, invalid RUT or duplicate account", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not assign the requested role", body = crate::error::ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>), ApiError> {
    let started = Instant::now();
    tracing::info!(email = %payload.email, rut = %payload.rut, "registration attempt");

    let Some(parsed_rut) = Rut::parse(&payload.rut) else {
        tracing::warn!(email = %payload.email, rut = %payload.rut, "registration rejected: invalid RUT");
        return Err(ApiError::bad_request("RUT inválido"));
    };
    let cleaned_rut = parsed_rut.into_inner();

    if let Some(existing) = state
        .repo
        .find_conflicting_user(&payload.email, &cleaned_rut)
        .await?
    {
        let message = if existing.email == payload.email {
            "El email ya está registrado"
        } else {
            "El RUT ya está registrado"
        };
        tracing::warn!(email = %payload.email, rut = %cleaned_rut, reason = message, "registration rejected: duplicate");
        return Err(ApiError::bad_request(message));
    }

    let role = match payload.role {
        None | Some(Role::Usuario) => Role::Usuario,
        Some(requested) => match caller.as_ref() {
            Some(owner) if owner.role == Role::Dueno => {
                tracing::info!(role = %requested, granted_by = %owner.email, "staff role assigned at registration");
                requested
            }
            _ => {
                tracing::warn!(role = %requested, email = %payload.email, "registration rejected: role not assignable");
                return Err(ApiError::forbidden("No tienes permisos para asignar este rol"));
            }
        },
    };

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let now = Utc::now();
    let user = state
        .repo
        .create_user(User {
            id: Uuid::new_v4(),
            nombre: payload.nombre,
            apellido_paterno: payload.apellido_paterno,
            apellido_materno: payload.apellido_materno,
            rut: cleaned_rut,
            email: payload.email,
            password_hash,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    let token = issue_token(&user, &state.config)?;

    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        role = %user.role,
        elapsed_ms = elapsed_ms(started),
        "user registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Usuario registrado exitosamente",
            AuthData {
                user: UserResponse::from(&user),
                token,
            },
        )),
    ))
}

/// login
///
/// [Public Route] Exchanges email and password for a session token.
/// Unknown email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<AuthData>),
        (status = 401, description = "Invalid credentials or inactive account", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthData>>, ApiError> {
    let started = Instant::now();
    tracing::info!(email = %payload.email, "login attempt");

    let Some(user) = state.repo.find_user_by_email(&payload.email).await? else {
        tracing::warn!(email = %payload.email, "login rejected: unknown email");
        return Err(ApiError::unauthorized("Credenciales inválidas"));
    };

    if !user.is_active {
        tracing::warn!(email = %payload.email, user_id = %user.id, "login rejected: inactive account");
        return Err(ApiError::unauthorized("Usuario inactivo"));
    }

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::warn!(email = %payload.email, user_id = %user.id, "login rejected: wrong password");
        return Err(ApiError::unauthorized("Credenciales inválidas"));
    }

    let token = issue_token(&user, &state.config)?;

    tracing::info!(
        user_id = %user.id,
        role = %user.role,
        elapsed_ms = elapsed_ms(started),
        "login succeeded"
    );

    Ok(Json(ApiResponse::with_message(
        "Inicio de sesión exitoso",
        AuthData {
            user: UserResponse::from(&user),
            token,
        },
    )))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile. Also mounted as
/// `GET /api/auth/profile`.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserData>),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserData>>, ApiError> {
    let user = state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    Ok(Json(ApiResponse::data(UserData {
        user: UserResponse::from(&user),
    })))
}

/// update_profile
///
/// [Authenticated Route] Partial update of the caller's own account.
///
/// A changed RUT must validate and be unused, a changed email must be unused,
/// and a new password requires the current one.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserData>),
        (status = 400, description = "Invalid input, duplicate RUT/email or wrong password", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserData>>, ApiError> {
    let started = Instant::now();
    tracing::info!(user_id = %auth.id, "profile update attempt");

    let mut user = state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    if let Some(raw_rut) = payload.rut.as_deref() {
        let cleaned = rut::clean(raw_rut);
        if cleaned != user.rut {
            let Some(parsed) = Rut::parse(raw_rut) else {
                tracing::warn!(user_id = %user.id, rut = %raw_rut, "profile update rejected: invalid RUT");
                return Err(ApiError::bad_request("RUT inválido"));
            };
            if let Some(other) = state.repo.find_user_by_rut(parsed.as_str()).await?
                && other.id != user.id
            {
                tracing::warn!(user_id = %user.id, rut = %parsed.as_str(), "profile update rejected: RUT in use");
                return Err(ApiError::bad_request("El RUT ya está registrado"));
            }
            user.rut = parsed.into_inner();
        }
    }

    if let Some(email) = payload.email
        && email != user.email
    {
        if let Some(other) = state.repo.find_user_by_email(&email).await?
            && other.id != user.id
        {
            tracing::warn!(user_id = %user.id, email = %email, "profile update rejected: email in use");
            return Err(ApiError::bad_request("El email ya está registrado"));
        }
        user.email = email;
    }

    if let Some(nombre) = payload.nombre {
        user.nombre = nombre;
    }
    if let Some(apellido_paterno) = payload.apellido_paterno {
        user.apellido_paterno = apellido_paterno;
    }
    if let Some(apellido_materno) = payload.apellido_materno {
        user.apellido_materno = Some(apellido_materno).filter(|m| !m.is_empty());
    }

    if let Some(new_password) = payload.new_password {
        let Some(current_password) = payload.current_password else {
            tracing::warn!(user_id = %user.id, "password change rejected: current password missing");
            return Err(ApiError::bad_request("Debes proporcionar tu contraseña actual"));
        };
        if !verify_password(current_password, user.password_hash.clone()).await? {
            tracing::warn!(user_id = %user.id, "password change rejected: current password wrong");
            return Err(ApiError::bad_request("Contraseña actual incorrecta"));
        }
        user.password_hash = hash_password(new_password, state.config.bcrypt_cost).await?;
        tracing::info!(user_id = %user.id, "password changed");
    }

    let user = state
        .repo
        .update_user(&user)
        .await?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    tracing::info!(user_id = %user.id, elapsed_ms = elapsed_ms(started), "profile updated");

    Ok(Json(ApiResponse::with_message(
        "Perfil actualizado correctamente",
        UserData {
            user: UserResponse::from(&user),
        },
    )))
}
