//! 认证 API 集成测试

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

mod common;
use common::{
    create_test_app, decode_claims, login_user, register_user, send, send_with_headers,
    TEST_PASSWORD,
};

// ==================== 注册 ====================

#[tokio::test]
async fn test_register_success() {
    let (app, _) = create_test_app();

    let body = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());
    assert_eq!(body["user"]["email"], "a@b.com");
    assert_eq!(body["user"]["first_name"], "Ada");
    assert_eq!(body["user"]["last_name"], "Lovelace");
    assert_eq!(body["user"]["is_active"], true);
    assert!(body["user"]["date_joined"].is_string());
    assert!(body["user"].get("password_hash").is_none());

    // 访问令牌的 subject 即返回的用户 ID
    let claims = decode_claims(body["access"].as_str().unwrap());
    assert_eq!(claims["sub"], body["user"]["id"]);
    assert_eq!(claims["token_type"], "access");
}

#[tokio::test]
async fn test_register_short_password() {
    let (app, _) = create_test_app();

    for password in ["1", "12345", "abcde"] {
        let response = send(
            &app,
            "POST",
            "/api/auth/register/",
            Some(json!({ "email": "a@b.com", "password": password })),
            None,
        )
        .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body,
            json!({ "error": "Password must be at least 6 characters long" })
        );
    }
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, _) = create_test_app();
    register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "POST",
        "/api/auth/register/",
        Some(json!({ "email": "a@b.com", "password": "another1" })),
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({ "error": "User with this email already exists" }));
}

#[tokio::test]
async fn test_register_validation_order() {
    let (app, _) = create_test_app();

    let cases = [
        (json!({}), "Email is required"),
        (json!({ "email": "", "password": "" }), "Email is required"),
        (json!({ "email": "not-an-email" }), "Please enter a valid email address"),
        (json!({ "email": "a@b.com" }), "Password is required"),
        (json!({ "email": "a@b.com", "password": "" }), "Password is required"),
    ];

    for (body, expected) in cases {
        let response = send(&app, "POST", "/api/auth/register/", Some(body), None).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], expected);
    }
}

#[tokio::test]
async fn test_register_name_too_long() {
    let (app, _) = create_test_app();

    let response = send(
        &app,
        "POST",
        "/api/auth/register/",
        Some(json!({
            "email": "a@b.com",
            "password": TEST_PASSWORD,
            "first_name": "x".repeat(5000)
        })),
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({ "error": "First name must be at most 150 characters long" })
    );

    // 没有创建用户
    register_user(&app, "a@b.com", TEST_PASSWORD).await;
}

#[tokio::test]
async fn test_register_failure_creates_nothing() {
    let (app, _) = create_test_app();

    let response = send(
        &app,
        "POST",
        "/api/auth/register/",
        Some(json!({ "email": "a@b.com", "password": "123" })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // 失败的注册没有留下用户，同一邮箱可以正常注册
    register_user(&app, "a@b.com", TEST_PASSWORD).await;
}

#[tokio::test]
async fn test_register_malformed_json() {
    let (app, _) = create_test_app();

    let response = send_with_headers(
        &app,
        "POST",
        "/api/auth/register/",
        None,
        None,
        &[("content-type", "application/json")],
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
}

// ==================== 登录 ====================

#[tokio::test]
async fn test_register_then_login_same_user() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", "secret1").await;

    let response = login_user(&app, "a@b.com", "secret1").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["id"], registered["user"]["id"]);
    assert!(response.body["access"].is_string());
    assert!(response.body["refresh"].is_string());
}

#[tokio::test]
async fn test_login_email_domain_case_insensitive() {
    let (app, _) = create_test_app();
    register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = login_user(&app, "a@B.COM", TEST_PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_missing_fields() {
    let (app, _) = create_test_app();

    for body in [json!({}), json!({ "email": "a@b.com" }), json!({ "password": "secret1" })] {
        let response = send(&app, "POST", "/api/auth/login/", Some(body), None).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, json!({ "error": "Email and password are required" }));
    }
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_user_look_the_same() {
    let (app, _) = create_test_app();
    register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let wrong_password = login_user(&app, "a@b.com", "WrongPassword").await;
    let unknown_user = login_user(&app, "nobody@b.com", TEST_PASSWORD).await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(
        wrong_password.body,
        json!({ "detail": "No active account found with the given credentials" })
    );
}

#[tokio::test]
async fn test_login_sets_http_only_cookies() {
    let (app, _) = create_test_app();
    register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = login_user(&app, "a@b.com", TEST_PASSWORD).await;
    let cookies = response.set_cookies();

    let access = cookies
        .iter()
        .find(|c| c.starts_with("access_token="))
        .expect("access cookie");
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=Lax"));
    assert!(access.contains("Path=/"));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
}

// ==================== 刷新与登出 ====================

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({ "refresh": registered["refresh"] })),
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let access = response.body["access"].as_str().unwrap();
    assert!(response.body.get("refresh").is_none());

    let profile = send(&app, "GET", "/api/auth/user/", None, Some(access)).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["id"], registered["user"]["id"]);
}

#[tokio::test]
async fn test_refresh_with_invalid_token() {
    let (app, _) = create_test_app();

    let response = send(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({ "refresh": "garbage" })),
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body,
        json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })
    );
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({ "refresh": registered["access"] })),
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "token_not_valid");
}

#[tokio::test]
async fn test_refresh_missing_token() {
    let (app, _) = create_test_app();

    let response = send(&app, "POST", "/api/auth/refresh/", Some(json!({})), None).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({ "error": "Refresh token is required" }));
}

#[tokio::test]
async fn test_refresh_from_cookie() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let cookie = format!("refresh_token={}", registered["refresh"].as_str().unwrap());

    let response = send_with_headers(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({})),
        None,
        &[("cookie", cookie.as_str())],
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["access"].is_string());
    assert!(response
        .set_cookies()
        .iter()
        .any(|c| c.starts_with("access_token=")));
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let refresh = registered["refresh"].clone();

    let response = send(
        &app,
        "POST",
        "/api/auth/logout/",
        Some(json!({ "refresh": refresh })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "message": "Successfully logged out" }));

    let response = send(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({ "refresh": refresh })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "token_not_valid");

    // 重复登出仍然成功
    let response = send(
        &app,
        "POST",
        "/api/auth/logout/",
        Some(json!({ "refresh": refresh })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Successfully logged out");
}

#[tokio::test]
async fn test_logout_only_revokes_the_given_session() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let second = login_user(&app, "a@b.com", TEST_PASSWORD).await;

    send(
        &app,
        "POST",
        "/api/auth/logout/",
        Some(json!({ "refresh": registered["refresh"] })),
        None,
    )
    .await;

    let response = send(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({ "refresh": second.body["refresh"] })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_with_garbage_or_missing_token() {
    let (app, _) = create_test_app();

    for body in [json!({ "refresh": "garbage" }), json!({})] {
        let response = send(&app, "POST", "/api/auth/logout/", Some(body), None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["message"], "Successfully logged out");
    }
}

#[tokio::test]
async fn test_logout_clears_cookies() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let cookie = format!("refresh_token={}", registered["refresh"].as_str().unwrap());

    let response = send_with_headers(
        &app,
        "POST",
        "/api/auth/logout/",
        Some(json!({})),
        None,
        &[("cookie", cookie.as_str())],
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let cookies = response.set_cookies();
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));

    // cookie 中的刷新令牌已被撤销
    let response = send(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({ "refresh": registered["refresh"] })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cookie_only_refresh_without_body() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let cookie = format!("refresh_token={}", registered["refresh"].as_str().unwrap());

    let response = send_with_headers(
        &app,
        "POST",
        "/api/auth/refresh/",
        None,
        None,
        &[("cookie", cookie.as_str())],
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["access"].is_string());
}

#[tokio::test]
async fn test_refresh_without_body_or_cookie() {
    let (app, _) = create_test_app();

    let response = send(&app, "POST", "/api/auth/refresh/", None, None).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({ "error": "Refresh token is required" }));
}

#[tokio::test]
async fn test_cookie_only_logout_without_body() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let cookie = format!("refresh_token={}", registered["refresh"].as_str().unwrap());

    let response = send_with_headers(
        &app,
        "POST",
        "/api/auth/logout/",
        None,
        None,
        &[("cookie", cookie.as_str())],
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Successfully logged out");

    let response = send(
        &app,
        "POST",
        "/api/auth/refresh/",
        Some(json!({ "refresh": registered["refresh"] })),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "token_not_valid");
}

#[tokio::test]
async fn test_logout_with_empty_json_body() {
    let (app, _) = create_test_app();

    let response = send_with_headers(
        &app,
        "POST",
        "/api/auth/logout/",
        None,
        None,
        &[("content-type", "application/json")],
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Successfully logged out");
}

// ==================== 令牌过期 ====================

#[tokio::test]
async fn test_access_token_lifetime() {
    let (app, clock) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let access = registered["access"].as_str().unwrap();

    clock.advance(Duration::minutes(59));
    let response = send(&app, "GET", "/api/auth/user/", None, Some(access)).await;
    assert_eq!(response.status, StatusCode::OK);

    clock.advance(Duration::minutes(2));
    let response = send(&app, "GET", "/api/auth/user/", None, Some(access)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "token_not_valid");
}

#[tokio::test]
async fn test_refresh_token_lifetime() {
    let (app, clock) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    let body = json!({ "refresh": registered["refresh"] });

    clock.advance(Duration::days(7) - Duration::minutes(1));
    let response = send(&app, "POST", "/api/auth/refresh/", Some(body.clone()), None).await;
    assert_eq!(response.status, StatusCode::OK);

    clock.advance(Duration::minutes(2));
    let response = send(&app, "POST", "/api/auth/refresh/", Some(body), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// ==================== 个人资料 ====================

#[tokio::test]
async fn test_get_current_user() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "GET",
        "/api/auth/user/",
        None,
        registered["access"].as_str(),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, registered["user"]);
}

#[tokio::test]
async fn test_get_current_user_without_token() {
    let (app, _) = create_test_app();

    let response = send(&app, "GET", "/api/auth/user/", None, None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body,
        json!({ "detail": "Authentication credentials were not provided." })
    );
}

#[tokio::test]
async fn test_get_current_user_with_refresh_token() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "GET",
        "/api/auth/user/",
        None,
        registered["refresh"].as_str(),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "token_not_valid");
}

#[tokio::test]
async fn test_update_last_name_only() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "PUT",
        "/api/auth/user/update/",
        Some(json!({ "last_name": "Byron" })),
        registered["access"].as_str(),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["last_name"], "Byron");
    assert_eq!(response.body["first_name"], registered["user"]["first_name"]);
    assert_eq!(response.body["email"], registered["user"]["email"]);
    assert_eq!(response.body["id"], registered["user"]["id"]);
}

#[tokio::test]
async fn test_update_email() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "PUT",
        "/api/auth/user/update/",
        Some(json!({ "email": "new@b.com" })),
        registered["access"].as_str(),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["email"], "new@b.com");

    // 新邮箱可以登录，旧邮箱不行
    assert_eq!(login_user(&app, "new@b.com", TEST_PASSWORD).await.status, StatusCode::OK);
    assert_eq!(
        login_user(&app, "a@b.com", TEST_PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_update_email_taken_by_other_user() {
    let (app, _) = create_test_app();
    let first = register_user(&app, "a@b.com", TEST_PASSWORD).await;
    register_user(&app, "c@d.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "PUT",
        "/api/auth/user/update/",
        Some(json!({ "email": "c@d.com" })),
        first["access"].as_str(),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({ "error": "Email already taken" }));
}

#[tokio::test]
async fn test_update_email_to_own_email() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "PUT",
        "/api/auth/user/update/",
        Some(json!({ "email": "a@b.com", "first_name": "Augusta" })),
        registered["access"].as_str(),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["email"], "a@b.com");
    assert_eq!(response.body["first_name"], "Augusta");
}

#[tokio::test]
async fn test_update_invalid_email() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "PUT",
        "/api/auth/user/update/",
        Some(json!({ "email": "broken" })),
        registered["access"].as_str(),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Please enter a valid email address");
}

#[tokio::test]
async fn test_update_name_too_long() {
    let (app, _) = create_test_app();
    let registered = register_user(&app, "a@b.com", TEST_PASSWORD).await;

    let response = send(
        &app,
        "PUT",
        "/api/auth/user/update/",
        Some(json!({ "last_name": "y".repeat(151) })),
        registered["access"].as_str(),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Last name must be at most 150 characters long");

    let profile = send(&app, "GET", "/api/auth/user/", None, registered["access"].as_str()).await;
    assert_eq!(profile.body["last_name"], "Lovelace");
}

#[tokio::test]
async fn test_update_without_token() {
    let (app, _) = create_test_app();

    let response = send(
        &app,
        "PUT",
        "/api/auth/user/update/",
        Some(json!({ "last_name": "Byron" })),
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// ==================== 跨域 ====================

#[tokio::test]
async fn test_cors_preflight_allows_frontend() {
    let (app, _) = create_test_app();

    let response = send_with_headers(
        &app,
        "OPTIONS",
        "/api/auth/login/",
        None,
        None,
        &[
            ("origin", "http://localhost:3000"),
            ("access-control-request-method", "POST"),
            ("access-control-request-headers", "authorization,content-type"),
        ],
    )
    .await;

    assert_eq!(
        response.headers.get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        response.headers.get("access-control-allow-credentials").unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_rejects_unknown_origin() {
    let (app, _) = create_test_app();

    let response = send_with_headers(
        &app,
        "OPTIONS",
        "/api/auth/login/",
        None,
        None,
        &[
            ("origin", "https://evil.example.com"),
            ("access-control-request-method", "POST"),
        ],
    )
    .await;

    assert!(response.headers.get("access-control-allow-origin").is_none());
}
