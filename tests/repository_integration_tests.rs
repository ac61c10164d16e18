use chrono::{Duration, Utc};
use eduplay_api::{
    models::{Product, ProductFilter, User, UserFilter},
    repository::{MemoryRepository, PostgresRepository, Repository, RepositoryError, UniqueField},
    roles::Role,
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Data Helpers ---

fn make_user(email: &str, rut: &str, role: Role, age_minutes: i64) -> User {
    let created = Utc::now() - Duration::minutes(age_minutes);
    User {
        id: Uuid::new_v4(),
        nombre: "Pedro".to_string(),
        apellido_paterno: "González".to_string(),
        apellido_materno: None,
        rut: rut.to_string(),
        email: email.to_string(),
        password_hash: "$2b$04$placeholder".to_string(),
        role,
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}

fn make_product(sku: &str, categoria: &str, age_minutes: i64) -> Product {
    let created = Utc::now() - Duration::minutes(age_minutes);
    Product {
        id: Uuid::new_v4(),
        nombre: format!("Set {sku}"),
        descripcion: "Bloques de construcción".to_string(),
        sku: sku.to_string(),
        precio: 15990.0,
        precio_oferta: None,
        stock: 10,
        imagen: Some("https://cdn.example.cl/set.png".to_string()),
        categoria: categoria.to_string(),
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}

/// Behaviour every `Repository` implementation must share.
async fn exercise_users(repo: &dyn Repository, suffix: &str) {
    let older = repo
        .create_user(make_user(
            &format!("older{suffix}@example.cl"),
            &format!("1{suffix}"),
            Role::Usuario,
            10,
        ))
        .await
        .unwrap();
    let newer = repo
        .create_user(make_user(
            &format!("newer{suffix}@example.cl"),
            &format!("2{suffix}"),
            Role::Administrador,
            1,
        ))
        .await
        .unwrap();

    let fetched = repo.get_user(older.id).await.unwrap().expect("stored");
    assert_eq!(fetched.email, older.email);
    assert_eq!(fetched.role, Role::Usuario);

    assert!(
        repo.find_user_by_rut(&format!("2{suffix}"))
            .await
            .unwrap()
            .is_some_and(|u| u.id == newer.id)
    );

    let conflict = repo
        .find_conflicting_user("nobody@example.cl", &format!("1{suffix}"))
        .await
        .unwrap();
    assert_eq!(conflict.map(|u| u.id), Some(older.id));
    assert!(
        repo.find_conflicting_user("nobody@example.cl", "0")
            .await
            .unwrap()
            .is_none()
    );

    // Unique columns are enforced by the store itself.
    let same_email = repo
        .create_user(make_user(&older.email, &format!("3{suffix}"), Role::Usuario, 0))
        .await;
    assert!(matches!(
        same_email,
        Err(RepositoryError::Conflict(UniqueField::Email))
    ));
    let same_rut = repo
        .create_user(make_user(
            &format!("third{suffix}@example.cl"),
            &older.rut,
            Role::Usuario,
            0,
        ))
        .await;
    assert!(matches!(same_rut, Err(RepositoryError::Conflict(UniqueField::Rut))));
    let mut stolen = newer.clone();
    stolen.email = older.email.clone();
    assert!(matches!(
        repo.update_user(&stolen).await,
        Err(RepositoryError::Conflict(UniqueField::Email))
    ));

    let filter = UserFilter {
        search: Some(suffix.to_string()),
        ..UserFilter::default()
    };
    let listed = repo.list_users(&filter).await.unwrap();
    assert_eq!(
        listed.iter().map(|u| u.id).collect::<Vec<_>>(),
        vec![newer.id, older.id],
        "newest first"
    );

    let admins = repo
        .list_users(&UserFilter {
            role: Some(Role::Administrador),
            search: Some(suffix.to_string()),
            ..UserFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(admins.len(), 1);

    let mut changed = older.clone();
    changed.role = Role::Dueno;
    changed.is_active = false;
    let saved = repo.update_user(&changed).await.unwrap().expect("updated");
    assert_eq!(saved.role, Role::Dueno);
    assert!(!saved.is_active);
    assert!(saved.updated_at >= older.updated_at);

    assert!(repo.delete_user(older.id).await.unwrap());
    assert!(!repo.delete_user(older.id).await.unwrap());
    assert!(repo.get_user(older.id).await.unwrap().is_none());
    assert!(repo.delete_user(newer.id).await.unwrap());
}

async fn exercise_products(repo: &dyn Repository, suffix: &str) {
    let sku_a = format!("A-{suffix}");
    let sku_b = format!("B-{suffix}");
    let a = repo.create_product(make_product(&sku_a, "Bloques", 5)).await.unwrap();
    let mut hidden = make_product(&sku_b, "Bloques", 1);
    hidden.is_active = false;
    let b = repo.create_product(hidden).await.unwrap();

    assert!(
        repo.find_product_by_sku(&sku_a)
            .await
            .unwrap()
            .is_some_and(|p| p.id == a.id)
    );

    let all = repo
        .list_products(&ProductFilter {
            search: Some(suffix.to_lowercase()),
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id, a.id]);

    let visible = repo
        .list_products(&ProductFilter {
            is_active: Some(true),
            search: Some(suffix.to_string()),
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, a.id);

    let duplicate = repo.create_product(make_product(&sku_a, "Bloques", 0)).await;
    assert!(matches!(
        duplicate,
        Err(RepositoryError::Conflict(UniqueField::Sku))
    ));

    let shown = repo.toggle_product_active(b.id).await.unwrap().expect("toggled");
    assert!(shown.is_active);
    let hidden_again = repo.toggle_product_active(b.id).await.unwrap().expect("toggled");
    assert!(!hidden_again.is_active);
    assert!(
        repo.toggle_product_active(Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );

    let mut changed = a.clone();
    changed.precio_oferta = Some(12990.0);
    changed.stock = 0;
    let saved = repo.update_product(&changed).await.unwrap().expect("updated");
    assert_eq!(saved.precio_oferta, Some(12990.0));
    assert_eq!(saved.stock, 0);

    let removed = repo.delete_product(a.id).await.unwrap().expect("deleted");
    assert_eq!(removed.sku, sku_a);
    assert!(repo.delete_product(a.id).await.unwrap().is_none());
    assert!(repo.delete_product(b.id).await.unwrap().is_some());
}

// --- In-memory store ---

#[tokio::test]
async fn test_memory_repository_users() {
    exercise_users(&MemoryRepository::new(), "77").await;
}

#[tokio::test]
async fn test_memory_repository_products() {
    exercise_products(&MemoryRepository::new(), "MEM").await;
}

#[tokio::test]
async fn test_memory_update_of_missing_rows_is_none() {
    let repo = MemoryRepository::new();
    assert!(
        repo.update_user(&make_user("x@example.cl", "1", Role::Usuario, 0))
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.update_product(&make_product("X", "Y", 0))
            .await
            .unwrap()
            .is_none()
    );
}

// --- PostgreSQL ---

/// Connects to `DATABASE_URL` and applies the migrations.
async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();
    let db_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set to run integration tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations.");
    PostgresRepository::new(pool)
}

fn unique_suffix() -> String {
    // Digits only so the value can stand in for a RUT body.
    (Uuid::new_v4().as_u128() % 1_000_000_000).to_string()
}

#[tokio::test]
#[ignore = "requires a running Postgres at DATABASE_URL"]
async fn test_postgres_repository_users() {
    let repo = postgres().await;
    exercise_users(&repo, &unique_suffix()).await;
}

#[tokio::test]
#[ignore = "requires a running Postgres at DATABASE_URL"]
async fn test_postgres_repository_products() {
    let repo = postgres().await;
    exercise_products(&repo, &unique_suffix()).await;
}
