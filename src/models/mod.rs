use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

/// Lowest accepted relationship strength.
pub const MIN_RELATIONSHIP_STRENGTH: i64 = 1;
/// Highest accepted relationship strength.
pub const MAX_RELATIONSHIP_STRENGTH: i64 = 5;

/// User is an account that owns persons. The API only consumes its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Person is a contact in the owner's network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// How the owner met this person
    pub origin: Option<String>,
    pub relationship_type: String,
    pub relationship_strength: i64,
    pub occupation: Option<String>,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal person view joined onto interactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: String,
    pub name: String,
}

/// Interaction is a logged meeting or event with one person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub person_id: String,
    pub title: String,
    pub place_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub interaction_time: Option<DateTime<Utc>>,
    pub notes: Option<Notes>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonSummary>,
}

impl Interaction {
    /// When the interaction happened, falling back to when it was logged.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.interaction_time.unwrap_or(self.created_at)
    }
}

/// Free-form notes attached to an interaction.
///
/// On the wire this is either a bare JSON string or any other JSON value.
/// A JSON string always decodes as `PlainText`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notes {
    PlainText(String),
    Structured(serde_json::Value),
}

impl Notes {
    /// Text shown to the user: plain text verbatim, structured values as compact JSON.
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Notes::PlainText(text) => Cow::Borrowed(text.as_str()),
            Notes::Structured(value) => Cow::Owned(value.to_string()),
        }
    }

    /// Drops notes that carry nothing worth storing.
    pub fn non_empty(self) -> Option<Self> {
        match self {
            Notes::PlainText(ref text) if text.is_empty() => None,
            Notes::Structured(serde_json::Value::Null) => None,
            other => Some(other),
        }
    }
}

impl From<&str> for Notes {
    fn from(text: &str) -> Self {
        Notes::PlainText(text.to_string())
    }
}

impl From<String> for Notes {
    fn from(text: String) -> Self {
        Notes::PlainText(text)
    }
}

impl From<serde_json::Value> for Notes {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Notes::PlainText(text),
            other => Notes::Structured(other),
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A whole number sent either as a JSON number or as numeric text, the way
/// form fields arrive.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

impl NumberOrText {
    fn into_number(self) -> Option<i64> {
        match self {
            NumberOrText::Number(n) => Some(n),
            NumberOrText::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Text that does not parse as a whole number decodes as absent, so it is
/// reported by validation instead of failing the whole body.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumberOrText>::deserialize(deserializer)?.and_then(NumberOrText::into_number))
}

fn lenient_number_patch<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer).map(Some)
}

// Request/Response types for API

/// Body of `POST /api/persons`. Every field is optional here so that
/// missing fields produce a validation message rather than a decode error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonRequest {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub relationship_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub relationship_strength: Option<i64>,
    pub occupation: Option<String>,
    pub context: Option<String>,
}

/// Partial update of a person. `Some(None)` clears a nullable field; on a
/// required field it is a validation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPatch {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub origin: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub relationship_type: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_number_patch"
    )]
    pub relationship_strength: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub occupation: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub context: Option<Option<String>>,
}

impl PersonPatch {
    /// Whether the patch sends `null` for a field every person must have.
    pub fn clears_required(&self) -> bool {
        matches!(self.name, Some(None))
            || matches!(self.relationship_type, Some(None))
            || matches!(self.relationship_strength, Some(None))
    }

    /// Overwrites the provided fields. Nulls on required fields are skipped;
    /// callers reject them first with `clears_required`.
    pub fn apply_to(&self, person: &mut Person) {
        if let Some(Some(ref name)) = self.name {
            person.name = name.clone();
        }
        if let Some(ref origin) = self.origin {
            person.origin = origin.clone();
        }
        if let Some(Some(ref rel_type)) = self.relationship_type {
            person.relationship_type = rel_type.clone();
        }
        if let Some(Some(strength)) = self.relationship_strength {
            person.relationship_strength = strength;
        }
        if let Some(ref occupation) = self.occupation {
            person.occupation = occupation.clone();
        }
        if let Some(ref context) = self.context {
            person.context = context.clone();
        }
    }
}

/// Body of `POST /api/interactions`, validated by the handler.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInteractionRequest {
    pub person_id: Option<String>,
    pub title: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_name: Option<String>,
    pub interaction_time: Option<DateTime<Utc>>,
    pub notes: Option<Notes>,
}

/// Partial update of an interaction. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub person_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub longitude: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub place_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub interaction_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub notes: Option<Option<Notes>>,
}

impl InteractionPatch {
    pub fn apply_to(&self, interaction: &mut Interaction) {
        if let Some(Some(ref person_id)) = self.person_id {
            interaction.person_id = person_id.clone();
        }
        if let Some(Some(ref title)) = self.title {
            interaction.title = title.clone();
        }
        if let Some(latitude) = self.latitude {
            interaction.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            interaction.longitude = longitude;
        }
        if let Some(ref place_name) = self.place_name {
            interaction.place_name = non_blank(place_name.clone());
        }
        if let Some(interaction_time) = self.interaction_time {
            interaction.interaction_time = interaction_time;
        }
        if let Some(ref notes) = self.notes {
            interaction.notes = notes.clone().and_then(Notes::non_empty);
        }
    }
}

/// Client-side payload for creating a person
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub relationship_type: String,
    pub relationship_strength: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Client-side payload for creating an interaction
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInteraction {
    pub person_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Body of every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Treats empty strings as absent, the way the forms submit blank inputs.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
