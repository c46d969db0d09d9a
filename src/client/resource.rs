use serde::{de::DeserializeOwned, Serialize};

use crate::models::{Interaction, InteractionPatch, NewInteraction, NewPerson, Person, PersonPatch};

/// An entity collection served under one REST base path.
pub trait Resource: Clone + DeserializeOwned + Send + Sync + 'static {
    /// Payload of a create request
    type Draft: Serialize + Send + Sync;
    /// Payload of a partial update
    type Patch: Serialize + Send + Sync;

    const PATH: &'static str;
    const SINGULAR: &'static str;
    const PLURAL: &'static str;
    /// Query parameter used to scope a list request, if the API supports one
    const FILTER_PARAM: Option<&'static str> = None;

    fn id(&self) -> &str;
}

impl Resource for Person {
    type Draft = NewPerson;
    type Patch = PersonPatch;

    const PATH: &'static str = "/api/persons";
    const SINGULAR: &'static str = "person";
    const PLURAL: &'static str = "persons";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Resource for Interaction {
    type Draft = NewInteraction;
    type Patch = InteractionPatch;

    const PATH: &'static str = "/api/interactions";
    const SINGULAR: &'static str = "interaction";
    const PLURAL: &'static str = "interactions";
    const FILTER_PARAM: Option<&'static str> = Some("personId");

    fn id(&self) -> &str {
        &self.id
    }
}
