//! Search, grouping and ordering over cached collections, as the contact
//! and interaction screens present them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Interaction, Person};

/// Persons whose name contains `term` (case-insensitive), sorted by name.
pub fn search_persons<'a>(persons: &'a [Person], term: &str) -> Vec<&'a Person> {
    let needle = term.to_lowercase();
    let mut matches: Vec<&Person> = persons
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .collect();
    matches.sort_by(|a, b| compare_names(&a.name, &b.name));
    matches
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn initial(name: &str) -> Option<char> {
    name.chars().next().and_then(|c| c.to_uppercase().next())
}

/// One alphabetical section of the contact list
#[derive(Debug, PartialEq)]
pub struct LetterGroup<'a> {
    pub letter: char,
    pub persons: Vec<&'a Person>,
}

/// Alphabetical sections keyed by upper-cased initial.
///
/// Without a search term every section `A..=Z` is returned, empty or not,
/// and names starting outside that range are left out. With a term only
/// sections holding a match are returned, in key order.
pub fn group_by_initial<'a>(persons: &'a [Person], term: &str) -> Vec<LetterGroup<'a>> {
    let matches = search_persons(persons, term);

    if term.trim().is_empty() {
        return ('A'..='Z')
            .map(|letter| LetterGroup {
                letter,
                persons: matches
                    .iter()
                    .copied()
                    .filter(|p| initial(&p.name) == Some(letter))
                    .collect(),
            })
            .collect();
    }

    let mut sections: BTreeMap<char, Vec<&Person>> = BTreeMap::new();
    for person in matches {
        if let Some(letter) = initial(&person.name) {
            sections.entry(letter).or_default().push(person);
        }
    }
    sections
        .into_iter()
        .map(|(letter, persons)| LetterGroup { letter, persons })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Filters applied to the interaction timeline
#[derive(Debug, Clone, Default)]
pub struct InteractionFilter {
    pub person_id: Option<String>,
    pub search: String,
    pub order: SortOrder,
}

impl InteractionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_person(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    pub fn matching(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn toggle_order(&mut self) {
        self.order = self.order.toggled();
    }

    /// Whether a person or search filter narrows the list
    pub fn is_active(&self) -> bool {
        self.person_id.is_some() || !self.search.is_empty()
    }

    /// Matches title, place name or notes text, case-insensitively.
    pub fn matches(&self, interaction: &Interaction) -> bool {
        if let Some(ref person_id) = self.person_id {
            if interaction.person_id != *person_id {
                return false;
            }
        }

        let needle = self.search.to_lowercase();
        let contains = |text: &str| text.to_lowercase().contains(&needle);

        contains(&interaction.title)
            || interaction.place_name.as_deref().is_some_and(contains)
            || interaction
                .notes
                .as_ref()
                .is_some_and(|notes| contains(notes.display_text().as_ref()))
    }

    /// Matching interactions ordered by when they happened.
    pub fn apply<'a>(&self, interactions: &'a [Interaction]) -> Vec<&'a Interaction> {
        let mut matches: Vec<&Interaction> =
            interactions.iter().filter(|i| self.matches(i)).collect();
        matches.sort_by(|a, b| match self.order {
            SortOrder::Ascending => a.occurred_at().cmp(&b.occurred_at()),
            SortOrder::Descending => b.occurred_at().cmp(&a.occurred_at()),
        });
        matches
    }
}
