use chrono::Utc;
use eduplay_api::{
    models::{
        ApiResponse, Product, ProductRequest, RegisterRequest, UpdateProfileRequest, User,
        UserData, UserResponse,
    },
    roles::Role,
    validation::Sanitize,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

fn user(materno: Option<&str>) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        nombre: "Camila".to_string(),
        apellido_paterno: "Fuentes".to_string(),
        apellido_materno: materno.map(str::to_string),
        rut: "76543216".to_string(),
        email: "camila@example.cl".to_string(),
        password_hash: "$2b$04$hash".to_string(),
        role: Role::Administrador,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn sanitized<T: Sanitize + serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    let mut payload: T = serde_json::from_value(value).expect("deserialize");
    payload.sanitize();
    payload
}

// --- Wire shape ---

#[test]
fn test_user_response_is_camel_case_without_password() {
    let response = UserResponse::from(&user(Some("Lagos")));
    let json = serde_json::to_value(&response).expect("serialize");

    assert_eq!(json["apellidoPaterno"], "Fuentes");
    assert_eq!(json["nombreCompleto"], "Camila Fuentes Lagos");
    assert_eq!(json["rutFormateado"], "7.654.321-6");
    assert_eq!(json["role"], "administrador");
    assert_eq!(json["isActive"], true);
    assert!(json.get("passwordHash").is_none());
    assert!(json.get("password_hash").is_none());
}

#[test]
fn test_full_name_skips_missing_second_surname() {
    assert_eq!(user(None).nombre_completo(), "Camila Fuentes");
    assert_eq!(user(Some("")).nombre_completo(), "Camila Fuentes");
}

#[test]
fn test_success_envelope_omits_empty_message() {
    let data = UserData {
        user: UserResponse::from(&user(None)),
    };
    let json = serde_json::to_value(ApiResponse::data(data)).expect("serialize");
    assert_eq!(json["status"], "success");
    assert!(json.get("message").is_none());
    assert_eq!(json["data"]["user"]["email"], "camila@example.cl");
}

#[test]
fn test_product_serializes_camel_case() {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4(),
        nombre: "Rompecabezas".to_string(),
        descripcion: "100 piezas".to_string(),
        sku: "RMP-100".to_string(),
        precio: 7990.0,
        precio_oferta: Some(5990.0),
        stock: 3,
        imagen: None,
        categoria: "Puzzles".to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let json = serde_json::to_value(&product).expect("serialize");
    assert_eq!(json["precioOferta"], 5990.0);
    assert_eq!(json["isActive"], true);
    assert!(json.get("precio_oferta").is_none());
}

// --- Sanitize + validate ---

#[test]
fn test_register_request_is_trimmed_and_lowercased() {
    let payload: RegisterRequest = sanitized(json!({
        "nombre": "  Camila ",
        "apellidoPaterno": "Fuentes",
        "apellidoMaterno": "   ",
        "rut": " 7.654.321-6 ",
        "email": " Camila@Example.CL ",
        "password": "secreto123",
    }));

    assert_eq!(payload.nombre, "Camila");
    assert_eq!(payload.apellido_materno, None);
    assert_eq!(payload.rut, "7.654.321-6");
    assert_eq!(payload.email, "camila@example.cl");
    assert_eq!(payload.role, None);
    assert!(payload.validate().is_ok());
}

#[test]
fn test_register_request_rejects_short_fields() {
    let payload: RegisterRequest = sanitized(json!({
        "nombre": "C",
        "apellidoPaterno": "F",
        "rut": "",
        "email": "camila@example.cl",
        "password": "12345",
    }));

    let errors = payload.validate().expect_err("invalid");
    let fields = errors.field_errors();
    for field in ["nombre", "apellido_paterno", "rut", "password"] {
        assert!(fields.contains_key(field), "missing error for {field}");
    }
    assert!(!fields.contains_key("email"));
}

#[test]
fn test_unknown_role_label_fails_to_deserialize() {
    let result = serde_json::from_value::<RegisterRequest>(json!({ "role": "superadmin" }));
    assert!(result.is_err());
}

#[test]
fn test_profile_update_blank_optionals() {
    let payload: UpdateProfileRequest = sanitized(json!({
        "nombre": "  ",
        "apellidoMaterno": "  ",
        "email": "",
        "currentPassword": "",
    }));

    // Blank values mean "unchanged", except apellidoMaterno which clears.
    assert_eq!(payload.nombre, None);
    assert_eq!(payload.email, None);
    assert_eq!(payload.current_password, None);
    assert_eq!(payload.apellido_materno.as_deref(), Some(""));
    assert!(payload.validate().is_ok());
}

#[test]
fn test_product_request_normalization() {
    let payload: ProductRequest = sanitized(json!({
        "nombre": " Rompecabezas ",
        "descripcion": "100 piezas",
        "sku": " rmp-100 ",
        "precio": 7990,
        "precioOferta": 0,
        "categoria": "Puzzles",
    }));

    assert_eq!(payload.sku, "RMP-100");
    assert_eq!(payload.nombre, "Rompecabezas");
    assert_eq!(payload.precio_oferta, None);
    assert!(payload.validate().is_ok());
}

#[test]
fn test_product_request_bounds() {
    let payload: ProductRequest = sanitized(json!({
        "nombre": "R",
        "descripcion": "x".repeat(2001),
        "sku": "RMP-100",
        "precio": -1,
        "categoria": "",
    }));

    let errors = payload.validate().expect_err("invalid");
    let fields = errors.field_errors();
    for field in ["nombre", "descripcion", "precio", "categoria"] {
        assert!(fields.contains_key(field), "missing error for {field}");
    }
}
