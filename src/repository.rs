use crate::{
    config::AppConfig,
    models::{Product, ProductFilter, User, UserFilter},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, postgres::PgPoolOptions, query_builder::QueryBuilder};
use std::{fmt, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A column whose value must be unique across its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Rut,
    Sku,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Email => "email",
            Self::Rut => "rut",
            Self::Sku => "sku",
        })
    }
}

/// RepositoryError
///
/// `Conflict` is raised by writes that would duplicate a unique column, so
/// the check and the write happen atomically in the store itself.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} already in use")]
    Conflict(UniqueField),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract used by handlers, extractors and the admin CLI.
/// `Send + Sync + async_trait` make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries.
///
/// Lookups return `Ok(None)` for missing rows. Writes report duplicates of
/// email, RUT or SKU as [`RepositoryError::Conflict`].
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_rut(&self, rut: &str) -> RepoResult<Option<User>>;
    /// First account already holding `email` or `rut`.
    async fn find_conflicting_user(
        &self,
        email: &str,
        rut: &str,
    ) -> RepoResult<Option<User>>;
    /// Newest first.
    async fn list_users(&self, filter: &UserFilter) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: User) -> RepoResult<User>;
    /// Persists every mutable column of `user` and bumps `updated_at`.
    async fn update_user(&self, user: &User) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    // --- Products ---
    /// Newest first.
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
    async fn find_product_by_sku(&self, sku: &str) -> RepoResult<Option<Product>>;
    async fn create_product(&self, product: Product) -> RepoResult<Product>;
    async fn update_product(&self, product: &Product) -> RepoResult<Option<Product>>;
    /// Flips `is_active` in a single write and returns the updated row.
    async fn toggle_product_active(&self, id: Uuid) -> RepoResult<Option<Product>>;
    /// Returns the removed row.
    async fn delete_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
}

/// RepositoryState
///
/// The type shared through `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

/// connect
///
/// Builds the repository named by `config.db_url`: `memory://` selects the
/// in-process store, anything else is treated as a Postgres URL and has the
/// embedded migrations applied.
pub async fn connect(config: &AppConfig) -> Result<RepositoryState, sqlx::Error> {
    if config.db_url.starts_with("memory://") {
        tracing::warn!("using the in-memory store; data is lost on shutdown");
        return Ok(Arc::new(MemoryRepository::default()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Arc::new(PostgresRepository::new(pool)))
}

const USER_COLUMNS: &str = "id, nombre, apellido_paterno, apellido_materno, rut, email, \
     password_hash, role, is_active, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, nombre, descripcion, sku, precio, precio_oferta, stock, \
     imagen, categoria, is_active, created_at, updated_at";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Queries are checked at runtime so the
/// crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_user_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
    }
}

fn like_pattern(search: &str) -> String {
    format!("%{}%", search.trim())
}

/// Maps a unique-constraint violation to the column it protects.
fn map_write_error(error: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &error
        && db.is_unique_violation()
    {
        let field = match db.constraint() {
            Some("users_email_key") => Some(UniqueField::Email),
            Some("users_rut_key") => Some(UniqueField::Rut),
            Some("products_sku_key") => Some(UniqueField::Sku),
            _ => None,
        };
        if let Some(field) = field {
            return RepositoryError::Conflict(field);
        }
    }
    RepositoryError::Database(error)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.fetch_user_where("email", email).await?)
    }

    async fn find_user_by_rut(&self, rut: &str) -> RepoResult<Option<User>> {
        Ok(self.fetch_user_where("rut", rut).await?)
    }

    async fn find_conflicting_user(
        &self,
        email: &str,
        rut: &str,
    ) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR rut = $2 LIMIT 1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(rut)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    /// list_users
    ///
    /// Filters are appended with `QueryBuilder` so every value is bound, never
    /// interpolated.
    async fn list_users(&self, filter: &UserFilter) -> RepoResult<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1"));

        if let Some(role) = filter.role {
            builder.push(" AND role = ");
            builder.push_bind(role.as_str());
        }

        if let Some(is_active) = filter.is_active {
            builder.push(" AND is_active = ");
            builder.push_bind(is_active);
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder.push(" AND (nombre ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR apellido_paterno ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR email ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR rut ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        Ok(builder.build_query_as::<User>().fetch_all(&self.pool).await?)
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, nombre, apellido_paterno, apellido_materno, rut, email, \
             password_hash, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.nombre)
            .bind(&user.apellido_paterno)
            .bind(&user.apellido_materno)
            .bind(&user.rut)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn update_user(&self, user: &User) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET nombre = $2, apellido_paterno = $3, apellido_materno = $4, \
             rut = $5, email = $6, password_hash = $7, role = $8, is_active = $9, \
             updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.nombre)
            .bind(&user.apellido_paterno)
            .bind(&user.apellido_materno)
            .bind(&user.rut)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"));

        if let Some(categoria) = filter.categoria.as_deref().filter(|c| !c.is_empty()) {
            builder.push(" AND categoria = ");
            builder.push_bind(categoria.to_string());
        }

        if let Some(is_active) = filter.is_active {
            builder.push(" AND is_active = ");
            builder.push_bind(is_active);
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder.push(" AND (nombre ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR descripcion ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR sku ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        Ok(builder.build_query_as::<Product>().fetch_all(&self.pool).await?)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn find_product_by_sku(&self, sku: &str) -> RepoResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn create_product(&self, product: Product) -> RepoResult<Product> {
        let sql = format!(
            "INSERT INTO products (id, nombre, descripcion, sku, precio, precio_oferta, stock, \
             imagen, categoria, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(product.id)
            .bind(&product.nombre)
            .bind(&product.descripcion)
            .bind(&product.sku)
            .bind(product.precio)
            .bind(product.precio_oferta)
            .bind(product.stock)
            .bind(&product.imagen)
            .bind(&product.categoria)
            .bind(product.is_active)
            .bind(product.created_at)
            .bind(product.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn update_product(&self, product: &Product) -> RepoResult<Option<Product>> {
        let sql = format!(
            "UPDATE products SET nombre = $2, descripcion = $3, sku = $4, precio = $5, \
             precio_oferta = $6, stock = $7, imagen = $8, categoria = $9, is_active = $10, \
             updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(product.id)
            .bind(&product.nombre)
            .bind(&product.descripcion)
            .bind(&product.sku)
            .bind(product.precio)
            .bind(product.precio_oferta)
            .bind(product.stock)
            .bind(&product.imagen)
            .bind(&product.categoria)
            .bind(product.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn toggle_product_active(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let sql = format!(
            "UPDATE products SET is_active = NOT is_active, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let sql = format!("DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }
}

// --- In-memory implementation ---

/// MemoryRepository
///
/// `Repository` over in-process vectors. Backs the test suites and the
/// `DATABASE_URL=memory://` mode. Unique columns are checked under the write
/// lock, mirroring the table constraints.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<Vec<User>>,
    products: RwLock<Vec<Product>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Another row already holding the email or RUT of `user`.
fn user_conflict(users: &[User], user: &User) -> RepoResult<()> {
    for other in users.iter().filter(|u| u.id != user.id) {
        if other.email == user.email {
            return Err(RepositoryError::Conflict(UniqueField::Email));
        }
        if other.rut == user.rut {
            return Err(RepositoryError::Conflict(UniqueField::Rut));
        }
    }
    Ok(())
}

fn sku_conflict(products: &[Product], product: &Product) -> RepoResult<()> {
    if products
        .iter()
        .any(|p| p.id != product.id && p.sku == product.sku)
    {
        return Err(RepositoryError::Conflict(UniqueField::Sku));
    }
    Ok(())
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) {
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_rut(&self, rut: &str) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.rut == rut).cloned())
    }

    async fn find_conflicting_user(
        &self,
        email: &str,
        rut: &str,
    ) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email || u.rut == rut)
            .cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> RepoResult<Vec<User>> {
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .iter()
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| filter.is_active.is_none_or(|active| u.is_active == active))
            .filter(|u| {
                search.as_deref().is_none_or(|s| {
                    contains_ci(&u.nombre, s)
                        || contains_ci(&u.apellido_paterno, s)
                        || contains_ci(&u.email, s)
                        || contains_ci(&u.rut, s)
                })
            })
            .cloned()
            .collect();

        newest_first(&mut users, |u| u.created_at);
        Ok(users)
    }

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut users = self.users.write().await;
        user_conflict(&users, &user)?;
        users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> RepoResult<Option<User>> {
        let mut users = self.users.write().await;
        user_conflict(&users, user)?;
        Ok(users.iter_mut().find(|u| u.id == user.id).map(|stored| {
            *stored = User {
                updated_at: chrono::Utc::now(),
                ..user.clone()
            };
            stored.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<Vec<Product>> {
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let categoria = filter.categoria.as_deref().filter(|c| !c.is_empty());

        let mut products: Vec<Product> = self
            .products
            .read()
            .await
            .iter()
            .filter(|p| categoria.is_none_or(|c| p.categoria == c))
            .filter(|p| filter.is_active.is_none_or(|active| p.is_active == active))
            .filter(|p| {
                search.as_deref().is_none_or(|s| {
                    contains_ci(&p.nombre, s)
                        || contains_ci(&p.descripcion, s)
                        || contains_ci(&p.sku, s)
                })
            })
            .cloned()
            .collect();

        newest_first(&mut products, |p| p.created_at);
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn find_product_by_sku(&self, sku: &str) -> RepoResult<Option<Product>> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|p| p.sku == sku)
            .cloned())
    }

    async fn create_product(&self, product: Product) -> RepoResult<Product> {
        let mut products = self.products.write().await;
        sku_conflict(&products, &product)?;
        products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, product: &Product) -> RepoResult<Option<Product>> {
        let mut products = self.products.write().await;
        sku_conflict(&products, product)?;
        Ok(products.iter_mut().find(|p| p.id == product.id).map(|stored| {
            *stored = Product {
                updated_at: chrono::Utc::now(),
                ..product.clone()
            };
            stored.clone()
        }))
    }

    async fn toggle_product_active(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products.iter_mut().find(|p| p.id == id).map(|stored| {
            stored.is_active = !stored.is_active;
            stored.updated_at = chrono::Utc::now();
            stored.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let mut products = self.products.write().await;
        let index = products.iter().position(|p| p.id == id);
        Ok(index.map(|i| products.remove(i)))
    }
}
