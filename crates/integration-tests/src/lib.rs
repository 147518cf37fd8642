//! Integration tests for Tillpoint.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tillpoint-integration-tests
//! ```
//!
//! Each test spawns the storefront on an ephemeral port with the coupon
//! service and checkout endpoint replaced by `wiremock` servers. No external
//! services are needed.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Client, Response};
use secrecy::SecretString;
use serde_json::json;
use tillpoint_core::CurrencyCode;
use tillpoint_storefront::catalog::Catalog;
use tillpoint_storefront::config::{CheckoutConfig, CouponServiceConfig, StorefrontConfig};
use tillpoint_storefront::routes;
use tillpoint_storefront::state::AppState;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Products every test storefront sells.
pub const CATALOG: &str = r#"[
    { "id": "tee", "name": "Tee", "price": "19.99" },
    { "id": "mug", "name": "Mug", "price": "8.00" }
]"#;

/// Origin of the hosted checkout pages the mock endpoint returns.
pub const PAY_ORIGIN: &str = "https://pay.example";

/// A running storefront plus its mocked collaborators.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub coupons: MockServer,
    pub checkout: MockServer,
}

impl TestApp {
    /// Spawn a storefront with development sign-in enabled.
    pub async fn spawn() -> Self {
        let coupons = MockServer::start().await;
        let checkout = MockServer::start().await;

        let config = StorefrontConfig {
            host: "127.0.0.1".parse().expect("valid IP"),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            currency: CurrencyCode::USD,
            catalog_path: None,
            http_timeout: Duration::from_secs(5),
            dev_sign_in: true,
            coupons: CouponServiceConfig {
                base_url: Url::parse(&coupons.uri()).expect("valid mock URL"),
                api_token: SecretString::from("tok_9fA7b6C5d4E3"),
            },
            checkout: CheckoutConfig {
                endpoint: Url::parse(&format!("{}/api/checkout", checkout.uri()))
                    .expect("valid mock URL"),
                redirect_origins: vec![PAY_ORIGIN.to_string()],
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        let catalog = Catalog::from_json(CATALOG).expect("valid catalog");
        let state = AppState::new(config, catalog).expect("Failed to build state");
        let static_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../storefront/static");
        let app = routes::app(state, &static_dir);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Test server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Self::client(),
            coupons,
            checkout,
        }
    }

    /// A cookie-keeping client that does not follow redirects.
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a form as a plain browser would.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("Request failed")
    }

    /// POST a form as HTMX would.
    pub async fn post_htmx(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn get_text(&self, path: &str) -> String {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
            .text()
            .await
            .expect("Failed to read body")
    }

    pub async fn add_to_cart(&self, product_id: &str, quantity: u32) {
        let quantity = quantity.to_string();
        let resp = self
            .post_form(
                "/cart/add",
                &[("product_id", product_id), ("quantity", &quantity)],
            )
            .await;
        assert!(resp.status().is_redirection(), "add failed: {}", resp.status());
    }

    pub async fn sign_in(&self, user_id: &str) {
        let resp = self
            .post_form("/auth/session", &[("user_id", user_id)])
            .await;
        assert!(resp.status().is_redirection(), "sign-in failed: {}", resp.status());
    }

    /// Make the coupon service accept every code with the given rate.
    pub async fn mock_coupon(&self, code: &str, discount_amount: f64) {
        Mock::given(method("POST"))
            .and(path("/coupons/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "code": code,
                "discountAmount": discount_amount,
                "couponOwnerId": "owner_1"
            })))
            .mount(&self.coupons)
            .await;
    }

    /// Make the checkout endpoint answer with a session URL.
    pub async fn mock_checkout_session(&self, session_url: &str) {
        Mock::given(method("POST"))
            .and(path("/api/checkout"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "sessionUrl": session_url })),
            )
            .mount(&self.checkout)
            .await;
    }
}
