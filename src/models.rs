use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    roles::{Principal, Role},
    rut,
    validation::{Sanitize, trim_in_place, trim_optional},
};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. Carries the password hash, so it is never
/// serialized; handlers respond with [`UserResponse`] instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub nombre: String,
    pub apellido_paterno: String,
    pub apellido_materno: Option<String>,
    // Clean form: digits plus uppercase check character, no separators.
    pub rut: String,
    // Always stored lowercase.
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// `nombre apellidoPaterno [apellidoMaterno]`.
    pub fn nombre_completo(&self) -> String {
        match self.apellido_materno.as_deref() {
            Some(materno) if !materno.is_empty() => {
                format!("{} {} {}", self.nombre, self.apellido_paterno, materno)
            }
            _ => format!("{} {}", self.nombre, self.apellido_paterno),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            role: self.role,
        }
    }
}

/// UserResponse
///
/// Public projection of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserResponse {
    pub id: Uuid,
    pub nombre: String,
    pub apellido_paterno: String,
    pub apellido_materno: Option<String>,
    pub nombre_completo: String,
    pub rut: String,
    /// The RUT rendered as `NN.NNN.NNN-C`.
    pub rut_formateado: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nombre: user.nombre.clone(),
            apellido_paterno: user.apellido_paterno.clone(),
            apellido_materno: user.apellido_materno.clone(),
            nombre_completo: user.nombre_completo(),
            rut: user.rut.clone(),
            rut_formateado: rut::format(&user.rut),
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Product
///
/// A row of the `products` table; also the wire representation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub nombre: String,
    pub descripcion: String,
    // Unique, trimmed and uppercase.
    pub sku: String,
    pub precio: f64,
    pub precio_oferta: Option<f64>,
    pub stock: i32,
    pub imagen: Option<String>,
    pub categoria: String,
    // Hidden products stay in the catalog table but are filtered by the storefront.
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for POST /api/auth/register. `role` is only honoured when the
/// caller is an authenticated owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "El nombre debe tener entre 2 y 50 caracteres"))]
    pub nombre: String,
    #[validate(length(
        min = 2,
        max = 50,
        message = "El apellido paterno debe tener entre 2 y 50 caracteres"
    ))]
    pub apellido_paterno: String,
    #[validate(length(max = 50, message = "El apellido materno no puede exceder 50 caracteres"))]
    pub apellido_materno: Option<String>,
    #[validate(length(min = 1, message = "El RUT es requerido"))]
    pub rut: String,
    #[validate(
        email(message = "Email inválido"),
        length(max = 255, message = "El email no puede exceder 255 caracteres")
    )]
    pub email: String,
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    pub password: String,
    pub role: Option<Role>,
}

impl Sanitize for RegisterRequest {
    fn sanitize(&mut self) {
        trim_in_place(&mut self.nombre);
        trim_in_place(&mut self.apellido_paterno);
        trim_optional(&mut self.apellido_materno);
        trim_in_place(&mut self.rut);
        self.email = self.email.trim().to_lowercase();
    }
}

/// LoginRequest
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[serde(default)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    #[validate(length(min = 1, message = "La contraseña es requerida"))]
    pub password: String,
}

impl Sanitize for LoginRequest {
    fn sanitize(&mut self) {
        self.email = self.email.trim().to_lowercase();
    }
}

/// UpdateProfileRequest
///
/// Partial update of the caller's own account (PUT /api/auth/profile). Every
/// field is optional; `newPassword` additionally requires `currentPassword`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50, message = "El nombre debe tener entre 2 y 50 caracteres"))]
    pub nombre: Option<String>,
    #[validate(length(
        min = 2,
        max = 50,
        message = "El apellido paterno debe tener entre 2 y 50 caracteres"
    ))]
    pub apellido_paterno: Option<String>,
    /// Present and blank clears the field; absent leaves it unchanged.
    #[validate(length(max = 50, message = "El apellido materno no puede exceder 50 caracteres"))]
    pub apellido_materno: Option<String>,
    pub rut: Option<String>,
    #[validate(
        email(message = "Email inválido"),
        length(max = 255, message = "El email no puede exceder 255 caracteres")
    )]
    pub email: Option<String>,
    pub current_password: Option<String>,
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    pub new_password: Option<String>,
}

impl Sanitize for UpdateProfileRequest {
    fn sanitize(&mut self) {
        trim_optional(&mut self.nombre);
        trim_optional(&mut self.apellido_paterno);
        if let Some(materno) = self.apellido_materno.as_mut() {
            trim_in_place(materno);
        }
        trim_optional(&mut self.rut);
        self.email = self
            .email
            .take()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        self.current_password = self.current_password.take().filter(|p| !p.is_empty());
        self.new_password = self.new_password.take().filter(|p| !p.is_empty());
    }
}

/// UpdateUserRequest
///
/// Administrative update of another account (PUT /api/users/{id}).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub is_active: Option<bool>,
    pub role: Option<Role>,
}

impl Sanitize for UpdateUserRequest {}

/// ProductRequest
///
/// Full product payload used by both POST and PUT /api/products.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct ProductRequest {
    #[validate(length(min = 2, max = 200, message = "El nombre debe tener entre 2 y 200 caracteres"))]
    pub nombre: String,
    #[validate(length(min = 1, max = 2000, message = "La descripción es requerida (máximo 2000 caracteres)"))]
    pub descripcion: String,
    #[validate(length(min = 1, max = 64, message = "El SKU es requerido (máximo 64 caracteres)"))]
    pub sku: String,
    #[validate(
        required(message = "El precio es requerido"),
        range(min = 0.0, message = "El precio debe ser mayor o igual a 0")
    )]
    pub precio: Option<f64>,
    #[validate(range(min = 0.0, message = "El precio de oferta debe ser mayor o igual a 0"))]
    pub precio_oferta: Option<f64>,
    #[validate(range(min = 0, message = "El stock debe ser mayor o igual a 0"))]
    pub stock: Option<i32>,
    pub imagen: Option<String>,
    #[validate(length(min = 1, max = 100, message = "La categoría es requerida (máximo 100 caracteres)"))]
    pub categoria: String,
    pub is_active: Option<bool>,
}

impl Sanitize for ProductRequest {
    fn sanitize(&mut self) {
        trim_in_place(&mut self.nombre);
        trim_in_place(&mut self.descripcion);
        self.sku = self.sku.trim().to_uppercase();
        trim_optional(&mut self.imagen);
        trim_in_place(&mut self.categoria);
        // A zero offer price means "no offer".
        self.precio_oferta = self.precio_oferta.filter(|p| *p > 0.0);
    }
}

// --- Query Filters ---

/// UserFilter
///
/// Query parameters accepted by GET /api/users.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    /// Case-insensitive match against name, first surname, email and RUT.
    pub search: Option<String>,
}

/// ProductFilter
///
/// Query parameters accepted by GET /api/products.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub categoria: Option<String>,
    pub is_active: Option<bool>,
    /// Case-insensitive match against name, description and SKU.
    pub search: Option<String>,
}

// --- Response Envelopes (Output) ---

/// ApiResponse
///
/// Success envelope shared by every endpoint: `{"status":"success", "message"?, "data"?}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.into()),
            data,
        }
    }
}

/// MessageResponse
///
/// Success envelope for operations that return nothing but a message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

/// AuthData
///
/// Payload returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthData {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserData {
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UsersData {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProductData {
    pub product: Product,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProductsData {
    pub products: Vec<Product>,
}
