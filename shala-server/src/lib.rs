mod auth;
mod context;
mod docs;
mod errors;
mod events;
mod schemas;
mod serialized;
mod users;

use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use log::info;
use shala_studio::Studio;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::context::ServerContext;

pub use errors::{ErrorBody, ServerError};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Builds the router with every endpoint of the shala API
pub fn app(studio: Arc<Studio>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/events", events::router())
        .nest("/users", users::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(ServerContext { studio })
}

/// Serves the shala API on an already bound listener
pub async fn serve(listener: TcpListener, studio: Arc<Studio>) -> io::Result<()> {
    axum::serve(listener, app(studio).into_make_service()).await
}

/// Starts the shala server
pub async fn run_server(studio: Arc<Studio>, port: u16) -> io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    serve(listener, studio).await
}

#[cfg(test)]
mod test {
    use std::{net::SocketAddr, sync::Arc};

    use chrono::{Duration, Utc};
    use reqwest::{Client, StatusCode};
    use serde_json::{json, Value};
    use shala_core::Config;
    use shala_studio::Studio;
    use tokio::net::TcpListener;

    use super::serve;

    struct TestServer {
        base: String,
        client: Client,
    }

    impl TestServer {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr: SocketAddr = listener.local_addr().unwrap();
            let studio = Arc::new(Studio::in_memory(Config::default()));

            tokio::spawn(serve(listener, studio));

            Self {
                base: format!("http://{}", addr),
                client: Client::new(),
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }

        async fn register(&self, path: &str, username: &str) -> Value {
            let response = self
                .client
                .post(self.url(path))
                .json(&json!({
                    "username": username,
                    "password": "namaste-1234",
                    "displayName": username,
                }))
                .send()
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            response.json().await.unwrap()
        }

        /// Registers and logs in, returning the id and token of the user
        async fn user(&self, path: &str, username: &str) -> (i64, String) {
            let user = self.register(path, username).await;

            let login: Value = self
                .client
                .post(self.url("/v1/auth/login"))
                .json(&json!({ "username": username, "password": "namaste-1234" }))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();

            (
                user["id"].as_i64().unwrap(),
                login["token"].as_str().unwrap().to_string(),
            )
        }
    }

    #[tokio::test]
    async fn test_login_and_current_user() {
        let server = TestServer::start().await;
        let (id, token) = server.user("/v1/auth/register", "maya").await;

        let response = server
            .client
            .get(server.url("/v1/auth/user"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let user: Value = response.json().await.unwrap();
        assert_eq!(user["id"].as_i64(), Some(id));
        assert_eq!(user["role"], "USER");
        assert_eq!(user["checkInsQuantity"], 0);

        let response = server
            .client
            .post(server.url("/v1/auth/logout"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let response = server
            .client
            .get(server.url("/v1/auth/user"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let server = TestServer::start().await;
        server.register("/v1/auth/register", "maya").await;

        let response = server
            .client
            .post(server.url("/v1/auth/login"))
            .json(&json!({ "username": "maya", "password": "wrong-password" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn test_invalid_body_is_rejected() {
        let server = TestServer::start().await;

        let response = server
            .client
            .post(server.url("/v1/auth/register"))
            .json(&json!({
                "username": "maya",
                "password": "short",
                "displayName": "Maya",
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "invalid");
        assert_eq!(body["location"], "body");
    }

    #[tokio::test]
    async fn test_check_in_flow() {
        let server = TestServer::start().await;
        let (_, admin) = server.user("/v1/auth/register-admin", "root").await;
        let (maya_id, maya) = server.user("/v1/auth/register", "maya").await;
        let (leo_id, leo) = server.user("/v1/auth/register", "leo").await;

        let response = server
            .client
            .post(server.url("/v1/auth/register-admin"))
            .json(&json!({
                "username": "intruder",
                "password": "namaste-1234",
                "displayName": "Intruder",
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let start_date = Utc::now() + Duration::minutes(60);

        let event: Value = server
            .client
            .post(server.url("/v1/events"))
            .bearer_auth(&admin)
            .json(&json!({
                "title": "Morning flow",
                "startDate": start_date.to_rfc3339(),
                "durationMinutes": 60,
                "checkInsMaxQuantity": 1,
                "isLive": true,
                "liveUrl": "https://live.example.com/morning",
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let event_id = event["id"].as_i64().unwrap();
        assert_eq!(event["vacancy"], 1);

        for user_id in [maya_id, leo_id] {
            let response = server
                .client
                .post(server.url(&format!("/v1/users/{}/check-ins", user_id)))
                .bearer_auth(&admin)
                .json(&json!({ "amount": 2 }))
                .send()
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = server
            .client
            .post(server.url(&format!("/v1/events/check-in?eventId={}", event_id)))
            .bearer_auth(&maya)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let check_in: Value = response.json().await.unwrap();
        assert_eq!(check_in["attendance"], "UNRECORDED");

        let response = server
            .client
            .post(server.url(&format!("/v1/events/check-in?eventId={}", event_id)))
            .bearer_auth(&leo)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "no_vacancy");
        assert_eq!(body["location"], "event");

        let eligibility: Value = server
            .client
            .get(server.url(&format!("/v1/events/{}/eligibility", event_id)))
            .bearer_auth(&maya)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(eligibility["hasCheckedIn"], true);
        assert_eq!(eligibility["canCheckIn"], false);
        assert_eq!(eligibility["checkInDenial"], "already_checked_in");
        assert_eq!(eligibility["canCancelCheckIn"], true);

        let response = server
            .client
            .put(server.url("/v1/events/attendance"))
            .bearer_auth(&maya)
            .json(&json!({
                "eventId": event_id,
                "checkIns": [{ "id": check_in["id"], "attended": true }],
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "not_manager");

        let response = server
            .client
            .delete(server.url(&format!(
                "/v1/events/cancel-check-in?eventId={}",
                event_id
            )))
            .bearer_auth(&maya)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let user: Value = server
            .client
            .get(server.url("/v1/auth/user"))
            .bearer_auth(&maya)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(user["checkInsQuantity"], 2);

        let response = server
            .client
            .post(server.url(&format!("/v1/events/check-in?eventId={}", event_id)))
            .bearer_auth(&leo)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_users_cannot_manage() {
        let server = TestServer::start().await;
        let (maya_id, maya) = server.user("/v1/auth/register", "maya").await;

        let response = server
            .client
            .post(server.url("/v1/events"))
            .bearer_auth(&maya)
            .json(&json!({ "title": "My class", "durationMinutes": 30 }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = server
            .client
            .post(server.url(&format!("/v1/users/{}/check-ins", maya_id)))
            .bearer_auth(&maya)
            .json(&json!({ "amount": 100 }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_ids_are_rejected() {
        let server = TestServer::start().await;
        let (_, maya) = server.user("/v1/auth/register", "maya").await;

        let response = server
            .client
            .post(server.url("/v1/events/check-in?eventId=abc"))
            .bearer_auth(&maya)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "invalid");
        assert_eq!(body["location"], "query");

        let response = server
            .client
            .get(server.url("/v1/events/abc"))
            .bearer_auth(&maya)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "invalid");
        assert_eq!(body["location"], "path");
    }

    #[tokio::test]
    async fn test_event_update_clears_fields() {
        let server = TestServer::start().await;
        let (_, admin) = server.user("/v1/auth/register-admin", "root").await;
        let (maya_id, maya) = server.user("/v1/auth/register", "maya").await;

        let start_date = Utc::now() + Duration::minutes(60);

        let event: Value = server
            .client
            .post(server.url("/v1/events"))
            .bearer_auth(&admin)
            .json(&json!({
                "title": "Evening yin",
                "startDate": start_date.to_rfc3339(),
                "durationMinutes": 60,
                "checkInsMaxQuantity": 4,
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let event_id = event["id"].as_i64().unwrap();

        server
            .client
            .post(server.url(&format!("/v1/users/{}/check-ins", maya_id)))
            .bearer_auth(&admin)
            .json(&json!({ "amount": 1 }))
            .send()
            .await
            .unwrap();

        let response = server
            .client
            .post(server.url(&format!("/v1/events/check-in?eventId={}", event_id)))
            .bearer_auth(&maya)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let response = server
            .client
            .patch(server.url(&format!("/v1/events/{}", event_id)))
            .bearer_auth(&admin)
            .json(&json!({ "checkInsMaxQuantity": null }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "capacity_below_check_ins");

        let response = server
            .client
            .patch(server.url(&format!("/v1/events/{}", event_id)))
            .bearer_auth(&admin)
            .json(&json!({ "checkInsMaxQuantity": -1 }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["location"], "body");

        let response = server
            .client
            .patch(server.url(&format!("/v1/events/{}", event_id)))
            .bearer_auth(&admin)
            .json(&json!({ "startDate": null, "title": "Yin replay" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let event: Value = response.json().await.unwrap();
        assert_eq!(event["title"], "Yin replay");
        assert!(event["startDate"].is_null());
        assert_eq!(event["checkInsMaxQuantity"], 4);
    }

    #[tokio::test]
    async fn test_docs_are_served() {
        let server = TestServer::start().await;

        let response = server
            .client
            .get(server.url("/api.json"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let api: Value = response.json().await.unwrap();
        assert!(api["paths"]["/v1/events/check-in"].is_object());
    }
}
