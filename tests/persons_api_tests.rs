use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use rapport::api::{self, AppState};
use rapport::auth::AuthService;
use rapport::store::Store;

macro_rules! init_app {
    () => {{
        let store = Arc::new(Store::in_memory().unwrap());
        let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState { store, auth_service }))
                .configure(api::configure_routes),
        )
        .await
    }};
}

macro_rules! register_and_get_token {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": $username,
                "email": format!("{}@example.com", $username),
                "password": "password123"
            }))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        resp["token"].as_str().unwrap().to_string()
    }};
}

macro_rules! create_person {
    ($app:expr, $token:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/persons")
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json($body)
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        resp
    }};
}

fn alice() -> serde_json::Value {
    json!({
        "name": "Alice",
        "relationshipType": "Friend",
        "relationshipStrength": 4
    })
}

// ==================== Create ====================

#[actix_web::test]
async fn test_create_person_success() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");

    let req = test::TestRequest::post()
        .uri("/api/persons")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "name": "Alice",
            "origin": "Work",
            "relationshipType": "Friend",
            "relationshipStrength": 4,
            "occupation": "",
            "context": "Met at the offsite"
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["id"].is_string());
    assert!(body["userId"].is_string());
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["origin"], "Work");
    assert_eq!(body["relationshipStrength"], 4);
    // Blank optional inputs are stored as absent
    assert!(body["occupation"].is_null());
    assert_eq!(body["context"], "Met at the offsite");
    assert_eq!(body["createdAt"], body["updatedAt"]);
}

#[actix_web::test]
async fn test_create_person_requires_fields() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");

    for body in [
        json!({"relationshipType": "Friend", "relationshipStrength": 3}),
        json!({"name": "", "relationshipType": "Friend", "relationshipStrength": 3}),
        json!({"name": "Alice", "relationshipStrength": 3}),
        json!({"name": "Alice", "relationshipType": "Friend"}),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/persons")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(body)
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["error"],
            "Name, relationshipType, and relationshipStrength are required"
        );
    }
}

#[actix_web::test]
async fn test_create_person_strength_out_of_range() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");

    for strength in [0, 6, 7, -1] {
        let req = test::TestRequest::post()
            .uri("/api/persons")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({
                "name": "Alice",
                "relationshipType": "Friend",
                "relationshipStrength": strength
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Relationship strength must be between 1 and 5");
    }
}

#[actix_web::test]
async fn test_create_person_malformed_body() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");

    let req = test::TestRequest::post()
        .uri("/api/persons")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}

#[actix_web::test]
async fn test_persons_require_auth() {
    let app = init_app!();

    let req = test::TestRequest::get().uri("/api/persons").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/api/persons")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Unauthorized");
}

// ==================== Read ====================

#[actix_web::test]
async fn test_list_persons_newest_first() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");

    for name in ["First", "Second", "Third"] {
        create_person!(
            app,
            token,
            json!({"name": name, "relationshipType": "Friend", "relationshipStrength": 2})
        );
    }

    let req = test::TestRequest::get()
        .uri("/api/persons")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    let names: Vec<&str> = resp
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Third", "Second", "First"]);
}

#[actix_web::test]
async fn test_get_person_and_not_found() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");
    let person = create_person!(app, token, alice());
    let id = person["id"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["name"], "Alice");

    let req = test::TestRequest::get()
        .uri("/api/persons/nonexistent")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Person not found");
}

#[actix_web::test]
async fn test_persons_are_isolated_between_users() {
    let app = init_app!();
    let owner = register_and_get_token!(app, "owner");
    let other = register_and_get_token!(app, "other");
    let person = create_person!(app, owner, alice());
    let id = person["id"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/persons")
        .insert_header(("Authorization", format!("Bearer {}", other)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(resp.as_array().unwrap().is_empty());

    for req in [
        test::TestRequest::get().uri(&format!("/api/persons/{}", id)),
        test::TestRequest::patch()
            .uri(&format!("/api/persons/{}", id))
            .set_json(json!({"name": "Mallory"})),
        test::TestRequest::delete().uri(&format!("/api/persons/{}", id)),
    ] {
        let req = req
            .insert_header(("Authorization", format!("Bearer {}", other)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    // Still intact for the owner
    let req = test::TestRequest::get()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", owner)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["name"], "Alice");
}

// ==================== Update ====================

#[actix_web::test]
async fn test_update_person_partial() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");
    let person = create_person!(
        app,
        token,
        json!({
            "name": "Alice",
            "relationshipType": "Friend",
            "relationshipStrength": 4,
            "occupation": "Engineer"
        })
    );
    let id = person["id"].as_str().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"relationshipStrength": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["relationshipStrength"], 5);
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["occupation"], "Engineer");
    assert_eq!(body["createdAt"], person["createdAt"]);

    // Explicit null clears a nullable field
    let req = test::TestRequest::patch()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"occupation": null}))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(resp["occupation"].is_null());
    assert_eq!(resp["relationshipStrength"], 5);
}

#[actix_web::test]
async fn test_update_person_validates_merged_result() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");
    let person = create_person!(app, token, alice());
    let id = person["id"].as_str().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"relationshipStrength": 7}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Relationship strength must be between 1 and 5");

    let req = test::TestRequest::patch()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"name": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Required fields cannot be cleared with null
    for body in [
        json!({"name": null}),
        json!({"relationshipType": null}),
        json!({"relationshipStrength": null}),
        json!({"relationshipStrength": "strong"}),
    ] {
        let req = test::TestRequest::patch()
            .uri(&format!("/api/persons/{}", id))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["error"],
            "Name, relationshipType, and relationshipStrength are required"
        );
    }

    // Nothing was written
    let req = test::TestRequest::get()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["name"], "Alice");
    assert_eq!(resp["relationshipStrength"], 4);
}

#[actix_web::test]
async fn test_relationship_strength_as_numeric_text() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");

    let req = test::TestRequest::post()
        .uri("/api/persons")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "name": "Alice",
            "relationshipType": "Friend",
            "relationshipStrength": "4"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let person: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(person["relationshipStrength"], 4);
    let id = person["id"].as_str().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"relationshipStrength": "5"}))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["relationshipStrength"], 5);

    // Numeric text still goes through the range check
    let req = test::TestRequest::patch()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"relationshipStrength": "9"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Relationship strength must be between 1 and 5");

    let req = test::TestRequest::post()
        .uri("/api/persons")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "name": "Bob",
            "relationshipType": "Friend",
            "relationshipStrength": "lots"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        "Name, relationshipType, and relationshipStrength are required"
    );
}

#[actix_web::test]
async fn test_update_unknown_person() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");

    let req = test::TestRequest::patch()
        .uri("/api/persons/nonexistent")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"name": "Bob"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

// ==================== Delete ====================

#[actix_web::test]
async fn test_delete_person() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");
    let person = create_person!(app, token, alice());
    let id = person["id"].as_str().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["message"], "Person deleted successfully");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/persons/{}", id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_delete_person_removes_interactions() {
    let app = init_app!();
    let token = register_and_get_token!(app, "owner");
    let person = create_person!(app, token, alice());
    let person_id = person["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri("/api/interactions")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"personId": person_id, "title": "Coffee"}))
        .to_request();
    let interaction: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let interaction_id = interaction["id"].as_str().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/persons/{}", person_id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get()
        .uri(&format!("/api/interactions/{}", interaction_id))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::get()
        .uri("/api/interactions")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(resp.as_array().unwrap().is_empty());
}
