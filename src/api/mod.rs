use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{AuthService, AuthUser};
use crate::models::*;
use crate::store::{Store, StoreError};

mod error;

pub use error::ApiError;

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
}

type ApiResult = Result<HttpResponse, ApiError>;

/// Maps a store miss to a 404 carrying `"<what> not found"`.
fn or_not_found(what: &'static str) -> impl Fn(StoreError) -> ApiError {
    move |e| match e {
        StoreError::NotFound(_) => ApiError::not_found(format!("{} not found", what)),
        e => ApiError::Store(e),
    }
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Auth Endpoints ====================

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> ApiResult {
    let body = body.into_inner();
    if body.username.is_empty() || body.email.is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Username, email, and password are required"));
    }

    match state.store.get_user_by_username(&body.username) {
        Ok(_) => return Err(ApiError::bad_request("Username already taken")),
        Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let password_hash = state
        .auth_service
        .hash_password(&body.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;

    let mut user = User {
        id: String::new(),
        display_name: body.display_name.unwrap_or_else(|| body.username.clone()),
        username: body.username,
        email: body.email,
        password_hash,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.store.create_user(&mut user)?;

    let token = state
        .auth_service
        .generate_token(&user.id)
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))?;

    log::info!("Registered user {}", user.username);
    Ok(HttpResponse::Created().json(AuthResponse { token, user }))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> ApiResult {
    let user = match state.store.get_user_by_username(&body.username) {
        Ok(u) => u,
        Err(StoreError::NotFound(_)) => return Ok(invalid_credentials()),
        Err(e) => return Err(e.into()),
    };

    let valid = state
        .auth_service
        .verify_password(&body.password, &user.password_hash)
        .unwrap_or(false);
    if !valid {
        return Ok(invalid_credentials());
    }

    let token = state
        .auth_service
        .generate_token(&user.id)
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))?;

    Ok(HttpResponse::Ok().json(AuthResponse { token, user }))
}

fn invalid_credentials() -> HttpResponse {
    HttpResponse::Unauthorized().json(ErrorBody {
        error: "Invalid credentials".to_string(),
    })
}

pub async fn get_current_user(
    state: web::Data<AppState>,
    auth_user: AuthUser,
) -> ApiResult {
    let user = state
        .store
        .get_user(&auth_user.user_id)
        .map_err(or_not_found("User"))?;
    Ok(HttpResponse::Ok().json(user))
}

// ==================== Persons Endpoints ====================

fn person_fields_required() -> ApiError {
    ApiError::bad_request("Name, relationshipType, and relationshipStrength are required")
}

/// Rules shared by create and update; returns the validated strength.
fn validate_person(name: &str, relationship_type: &str, strength: Option<i64>) -> Result<i64, ApiError> {
    let strength = match strength {
        Some(s) if !name.is_empty() && !relationship_type.is_empty() => s,
        _ => return Err(person_fields_required()),
    };

    if !(MIN_RELATIONSHIP_STRENGTH..=MAX_RELATIONSHIP_STRENGTH).contains(&strength) {
        return Err(ApiError::bad_request(
            "Relationship strength must be between 1 and 5",
        ));
    }
    Ok(strength)
}

pub async fn list_persons(
    state: web::Data<AppState>,
    auth_user: AuthUser,
) -> ApiResult {
    let persons = state.store.list_persons(&auth_user.user_id)?;
    Ok(HttpResponse::Ok().json(persons))
}

pub async fn get_person(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<String>,
) -> ApiResult {
    let id = path.into_inner();
    let person = state
        .store
        .get_person(&auth_user.user_id, &id)
        .map_err(or_not_found("Person"))?;
    Ok(HttpResponse::Ok().json(person))
}

pub async fn create_person(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<CreatePersonRequest>,
) -> ApiResult {
    let body = body.into_inner();
    let name = body.name.unwrap_or_default();
    let relationship_type = body.relationship_type.unwrap_or_default();
    let relationship_strength = validate_person(&name, &relationship_type, body.relationship_strength)?;

    let mut person = Person {
        id: String::new(),
        user_id: auth_user.user_id,
        name,
        origin: non_blank(body.origin),
        relationship_type,
        relationship_strength,
        occupation: non_blank(body.occupation),
        context: non_blank(body.context),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.store.create_person(&mut person)?;

    log::info!("Created person {} for user {}", person.id, person.user_id);
    Ok(HttpResponse::Created().json(person))
}

/// Merges the provided fields over the stored person, then applies the
/// same rules as create to the result.
pub async fn update_person(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<PersonPatch>,
) -> ApiResult {
    let id = path.into_inner();
    let mut person = state
        .store
        .get_person(&auth_user.user_id, &id)
        .map_err(or_not_found("Person"))?;

    if body.clears_required() {
        return Err(person_fields_required());
    }
    body.apply_to(&mut person);
    validate_person(
        &person.name,
        &person.relationship_type,
        Some(person.relationship_strength),
    )?;
    person.origin = non_blank(person.origin.take());
    person.occupation = non_blank(person.occupation.take());
    person.context = non_blank(person.context.take());

    state
        .store
        .update_person(&mut person)
        .map_err(or_not_found("Person"))?;
    Ok(HttpResponse::Ok().json(person))
}

pub async fn delete_person(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<String>,
) -> ApiResult {
    let id = path.into_inner();
    state
        .store
        .delete_person(&auth_user.user_id, &id)
        .map_err(or_not_found("Person"))?;

    log::info!("Deleted person {} for user {}", id, auth_user.user_id);
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "Person deleted successfully".to_string(),
    }))
}

// ==================== Interactions Endpoints ====================

#[derive(Deserialize)]
pub struct ListInteractionsQuery {
    #[serde(rename = "personId")]
    person_id: Option<String>,
}

pub async fn list_interactions(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    query: web::Query<ListInteractionsQuery>,
) -> ApiResult {
    let person_id = non_blank(query.into_inner().person_id);

    if let Some(ref person_id) = person_id {
        state
            .store
            .get_person(&auth_user.user_id, person_id)
            .map_err(or_not_found("Person"))?;
    }

    let interactions = state
        .store
        .list_interactions(&auth_user.user_id, person_id.as_deref())?;
    Ok(HttpResponse::Ok().json(interactions))
}

pub async fn get_interaction(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<String>,
) -> ApiResult {
    let id = path.into_inner();
    let interaction = state
        .store
        .get_interaction(&auth_user.user_id, &id)
        .map_err(or_not_found("Interaction"))?;
    Ok(HttpResponse::Ok().json(interaction))
}

pub async fn create_interaction(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<CreateInteractionRequest>,
) -> ApiResult {
    let body = body.into_inner();
    let person_id =
        non_blank(body.person_id).ok_or_else(|| ApiError::bad_request("Person ID is required"))?;
    let title = non_blank(body.title).ok_or_else(|| ApiError::bad_request("Title is required"))?;

    state
        .store
        .get_person(&auth_user.user_id, &person_id)
        .map_err(or_not_found("Person"))?;

    let mut interaction = Interaction {
        id: String::new(),
        person_id,
        title,
        place_name: non_blank(body.place_name),
        latitude: body.latitude,
        longitude: body.longitude,
        interaction_time: body.interaction_time,
        notes: body.notes.and_then(Notes::non_empty),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        person: None,
    };
    state.store.create_interaction(&mut interaction)?;

    log::info!(
        "Created interaction {} with person {}",
        interaction.id,
        interaction.person_id
    );
    Ok(HttpResponse::Created().json(interaction))
}

pub async fn update_interaction(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<InteractionPatch>,
) -> ApiResult {
    let id = path.into_inner();
    let mut interaction = state
        .store
        .get_interaction(&auth_user.user_id, &id)
        .map_err(or_not_found("Interaction"))?;

    if let Some(ref title) = body.title {
        if title.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::bad_request("Title is required"));
        }
    }
    if let Some(ref person_id) = body.person_id {
        let person_id = match person_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => return Err(ApiError::bad_request("Person ID is required")),
        };
        // Moving an interaction requires owning the destination person too
        if person_id != interaction.person_id {
            state
                .store
                .get_person(&auth_user.user_id, person_id)
                .map_err(or_not_found("Person"))?;
        }
    }

    body.apply_to(&mut interaction);
    state
        .store
        .update_interaction(&mut interaction)
        .map_err(or_not_found("Interaction"))?;
    Ok(HttpResponse::Ok().json(interaction))
}

pub async fn delete_interaction(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    path: web::Path<String>,
) -> ApiResult {
    let id = path.into_inner();
    state
        .store
        .delete_interaction(&auth_user.user_id, &id)
        .map_err(or_not_found("Interaction"))?;

    Ok(HttpResponse::Ok().json(MessageBody {
        message: "Interaction deleted successfully".to_string(),
    }))
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::bad_request(format!("Invalid request body: {}", err)).into()
    });

    cfg.app_data(json_config)
        // Health check
        .route("/health", web::get().to(health))

        // Auth routes
        .route("/api/auth/register", web::post().to(register))
        .route("/api/auth/login", web::post().to(login))
        .route("/api/auth/me", web::get().to(get_current_user))

        // Persons
        .route("/api/persons", web::get().to(list_persons))
        .route("/api/persons", web::post().to(create_person))
        .route("/api/persons/{id}", web::get().to(get_person))
        .route("/api/persons/{id}", web::patch().to(update_person))
        .route("/api/persons/{id}", web::delete().to(delete_person))

        // Interactions
        .route("/api/interactions", web::get().to(list_interactions))
        .route("/api/interactions", web::post().to(create_interaction))
        .route("/api/interactions/{id}", web::get().to(get_interaction))
        .route("/api/interactions/{id}", web::patch().to(update_interaction))
        .route("/api/interactions/{id}", web::delete().to(delete_interaction));
}
