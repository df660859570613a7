// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ChaosMeme Hub contributors

use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::info;

use crate::{
    auth::{
        AuthError, CurrentUser, TokenKind, TokenPair, ACCESS_COOKIE, INIT_DATA_HEADER,
        REFRESH_COOKIE,
    },
    config::Config,
    models::{AuthResponse, ErrorBody, MeResponse},
    state::AppState,
};

fn session_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

fn with_session_cookies(jar: CookieJar, config: &Config, pair: TokenPair) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_COOKIE,
        pair.access_token,
        config.access_ttl_secs(),
        config.cookie_secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        pair.refresh_token,
        config.refresh_ttl_secs(),
        config.cookie_secure,
    ))
}

#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = "Auth",
    params(
        ("X-Telegram-Init-Data" = String, Header, description = "Telegram.WebApp.initData")
    ),
    responses(
        (status = 200, description = "Session cookies set", body = AuthResponse),
        (status = 401, description = "Authentication failed", body = ErrorBody)
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let init_data = match headers.get(INIT_DATA_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| AuthError::MalformedInitData("header is not valid ASCII".to_string()))?,
        None => return Err(AuthError::MissingInitData),
    };

    let user_id = state.init_data.validate(init_data)?;
    let pair = state.tokens.issue(user_id)?;
    info!(user_id, "Telegram user authenticated");

    Ok((
        with_session_cookies(CookieJar::new(), &state.config, pair),
        Json(AuthResponse {
            status: "authenticated".to_string(),
            user_id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cookies renewed", body = AuthResponse),
        (status = 401, description = "Authentication failed", body = ErrorBody)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AuthError::MissingToken)?;

    let claims = state.tokens.verify(&refresh_token, TokenKind::Refresh)?;
    let pair = state.tokens.issue(claims.user_id)?;
    info!(user_id = claims.user_id, "Session refreshed");

    Ok((
        with_session_cookies(jar, &state.config, pair),
        Json(AuthResponse {
            status: "refreshed".to_string(),
            user_id: claims.user_id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Signed-in user", body = MeResponse),
        (status = 401, description = "Authentication failed", body = ErrorBody)
    )
)]
pub async fn me(CurrentUser(user_id): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse { user_id })
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::auth::init_data::tests::signed_init_data;
    use crate::auth::TokenKind;
    use crate::test_support::{test_config, test_state, test_state_with_config, TEST_BOT_TOKEN};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, Response, StatusCode},
    };
    use chrono::Utc;
    use tower::ServiceExt;

    fn set_cookies(response: &Response<Body>) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn cookie_value<'a>(cookies: &'a [String], name: &str) -> &'a str {
        let prefix = format!("{name}=");
        let cookie = cookies
            .iter()
            .find(|c| c.starts_with(&prefix))
            .unwrap_or_else(|| panic!("cookie {name} not set"));
        cookie[prefix.len()..].split(';').next().unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn verify_request(init_data: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/auth/verify");
        if let Some(init_data) = init_data {
            builder = builder.header("X-Telegram-Init-Data", init_data);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn verify_sets_two_session_cookies() {
        let state = test_state();
        let config = state.config.clone();
        let init_data = signed_init_data(TEST_BOT_TOKEN, 42, Utc::now().timestamp());

        let response = router(state.clone())
            .oneshot(verify_request(Some(&init_data)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        for cookie in &cookies {
            assert!(cookie.contains("HttpOnly"), "{cookie}");
            assert!(cookie.contains("SameSite=Lax"), "{cookie}");
            assert!(cookie.contains("Path=/"), "{cookie}");
            assert!(!cookie.contains("; Secure"), "{cookie}");
        }

        let access = cookies.iter().find(|c| c.starts_with("access_token=")).unwrap();
        assert!(access.contains(&format!("Max-Age={}", config.jwt_access_minutes * 60)));
        let refresh = cookies.iter().find(|c| c.starts_with("refresh_token=")).unwrap();
        assert!(refresh.contains(&format!("Max-Age={}", config.jwt_refresh_days * 86_400)));

        let access_claims = state
            .tokens
            .verify(cookie_value(&cookies, "access_token"), TokenKind::Access)
            .unwrap();
        let refresh_claims = state
            .tokens
            .verify(cookie_value(&cookies, "refresh_token"), TokenKind::Refresh)
            .unwrap();
        assert_eq!(access_claims.user_id, 42);
        assert_eq!(refresh_claims.user_id, 42);

        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({"status": "authenticated", "user_id": 42}));
    }

    #[tokio::test]
    async fn verify_marks_cookies_secure_in_production() {
        let mut config = test_config();
        config.cookie_secure = true;
        let init_data = signed_init_data(TEST_BOT_TOKEN, 42, Utc::now().timestamp());

        let response = router(test_state_with_config(config))
            .oneshot(verify_request(Some(&init_data)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        for cookie in set_cookies(&response) {
            assert!(cookie.contains("; Secure"), "{cookie}");
        }
    }

    #[tokio::test]
    async fn verify_without_header_is_401_without_cookies() {
        let response = router(test_state())
            .oneshot(verify_request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"detail": "Authentication failed"})
        );
    }

    #[tokio::test]
    async fn verify_with_bad_signature_is_401_without_cookies() {
        let init_data = signed_init_data("999:someone-else", 42, Utc::now().timestamp());
        let response = router(test_state())
            .oneshot(verify_request(Some(&init_data)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"detail": "Authentication failed"})
        );
    }

    #[tokio::test]
    async fn verify_with_stale_init_data_is_401() {
        let init_data = signed_init_data(TEST_BOT_TOKEN, 42, Utc::now().timestamp() - 2 * 86_400);
        let response = router(test_state())
            .oneshot(verify_request(Some(&init_data)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn refresh_reissues_cookies_for_same_user() {
        let state = test_state();
        let pair = state.tokens.issue(77).unwrap();

        let response = router(state.clone())
            .oneshot(
                Request::post("/auth/refresh")
                    .header(header::COOKIE, format!("refresh_token={}", pair.refresh_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        let claims = state
            .tokens
            .verify(cookie_value(&cookies, "access_token"), TokenKind::Access)
            .unwrap();
        assert_eq!(claims.user_id, 77);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "refreshed", "user_id": 77})
        );
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = test_state();
        let pair = state.tokens.issue(77).unwrap();

        let response = router(state)
            .oneshot(
                Request::post("/auth/refresh")
                    .header(header::COOKIE, format!("refresh_token={}", pair.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn me_requires_access_cookie() {
        let state = test_state();
        let pair = state.tokens.issue(88).unwrap();

        let response = router(state.clone())
            .oneshot(Request::get("/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(state)
            .oneshot(
                Request::get("/auth/me")
                    .header(header::COOKIE, format!("access_token={}", pair.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"user_id": 88}));
    }
}
