#![allow(dead_code)]

use reqwest::{Client, RequestBuilder, StatusCode};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use marketplace::api::{create_api_router, AppContext};
use marketplace::entities::{seed_categories, setup_schema};
use marketplace::images::{ImageHost, LocalImageHost, DEFAULT_FILE_SIZE_LIMIT};
use marketplace::middleware::auth::JwtKeys;

pub const PASSWORD: &str = "Muzion15";

pub const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub const PIXEL_GIF: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// A running server on an ephemeral port. `db` shares the server's pool.
pub struct TestApp {
    pub base: String,
    pub client: Client,
    pub upload_dir: PathBuf,
    pub db: DatabaseConnection,
}

impl TestApp {
    pub async fn spawn() -> TestApp {
        Self::spawn_with_limit(DEFAULT_FILE_SIZE_LIMIT).await
    }

    pub async fn spawn_with_limit(file_size_limit: usize) -> TestApp {
        let db = memory_db().await;
        let upload_dir = temp_upload_dir();
        let images = Arc::new(LocalImageHost::new(upload_dir.clone(), "products"));
        Self::start(db, upload_dir, images, file_size_limit).await
    }

    /// Same app on a SQLite file with a pool of several connections, so
    /// requests really run side by side.
    pub async fn spawn_file_backed(max_connections: u32) -> TestApp {
        let path = std::env::temp_dir().join(format!("marketplace-test-{}.db", Uuid::new_v4()));
        let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
        options
            .max_connections(max_connections)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("Failed to open file database");
        prepare(&db).await;

        let upload_dir = temp_upload_dir();
        let images = Arc::new(LocalImageHost::new(upload_dir.clone(), "products"));
        Self::start(db, upload_dir, images, DEFAULT_FILE_SIZE_LIMIT).await
    }

    /// In-memory app whose image host is built by `wrap` around the local
    /// host. `wrap` also gets a handle on the server's pool.
    pub async fn spawn_with_images<F>(wrap: F) -> TestApp
    where
        F: FnOnce(LocalImageHost, DatabaseConnection) -> Arc<dyn ImageHost>,
    {
        let db = memory_db().await;
        let upload_dir = temp_upload_dir();
        let images = wrap(
            LocalImageHost::new(upload_dir.clone(), "products"),
            db.clone(),
        );
        Self::start(db, upload_dir, images, DEFAULT_FILE_SIZE_LIMIT).await
    }

    async fn start(
        db: DatabaseConnection,
        upload_dir: PathBuf,
        images: Arc<dyn ImageHost>,
        file_size_limit: usize,
    ) -> TestApp {
        let app = create_api_router(AppContext {
            db: Arc::new(db.clone()),
            images,
            keys: Arc::new(JwtKeys::new("test-secret")),
            file_size_limit,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server crashed");
        });

        TestApp {
            base: format!("http://{addr}"),
            client: Client::new(),
            upload_dir,
            db,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn put(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn patch(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn register(&self, email: &str, role: &str) -> Value {
        let mut payload = json!({
            "email": email,
            "password": PASSWORD,
            "role": role,
        });
        if role == "seller" {
            payload["store_name"] = json!(format!("{email} store"));
        }

        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&payload)
            .send()
            .await
            .expect("Failed to send register request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse register response")
    }

    pub async fn login(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("Failed to send login request");
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.expect("Failed to parse login response");
        body["token"]
            .as_str()
            .expect("Token not found in login response")
            .to_string()
    }

    /// Registers an account of `role` and returns its token.
    pub async fn account(&self, email: &str, role: &str) -> String {
        self.register(email, role).await;
        self.login(email).await
    }

    pub async fn create_product(&self, seller: &str, title: &str, price: f64, stock: i32) -> Value {
        let response = self
            .post("/api/seller/products", seller)
            .json(&json!({
                "title": title,
                "description": format!("{title} description"),
                "price": price,
                "category": "1",
                "stock": stock,
                "image": PIXEL_PNG,
            }))
            .send()
            .await
            .expect("Failed to send create product request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse product")
    }

    pub async fn add_to_cart(&self, buyer: &str, product_id: &str, quantity: i32) -> Value {
        let response = self
            .post("/api/cart", buyer)
            .json(&json!({ "id": product_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to send add to cart request");
        assert!(response.status().is_success());
        response.json().await.expect("Failed to parse bag")
    }

    pub async fn create_address(&self, buyer: &str, line: &str) -> Value {
        let response = self
            .post("/api/addresses", buyer)
            .json(&json!({
                "address_line1": line,
                "city": "Berlin",
                "postal_code": "10115",
                "region": "Berlin",
                "country": "Germany",
            }))
            .send()
            .await
            .expect("Failed to send create address request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("Failed to parse address")
    }
}

async fn memory_db() -> DatabaseConnection {
    // A single pooled connection keeps every query on the same in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    prepare(&db).await;
    db
}

async fn prepare(db: &DatabaseConnection) {
    setup_schema(db).await.expect("Failed to create schema");
    seed_categories(db).await.expect("Failed to seed categories");
}

fn temp_upload_dir() -> PathBuf {
    std::env::temp_dir().join(format!("marketplace-test-{}", Uuid::new_v4()))
}
