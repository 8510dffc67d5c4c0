//! Custom location assignments
//!
//! The bidirectional index between user-created locations and the
//! characters placed in them. All state that must be persisted across
//! sessions lives here. This module must stay pure:
//! - No storage or DOM dependencies
//! - Every mutation replaces the whole snapshot or leaves it untouched
//! - Both maps are rebuilt together inside each operation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The slice of remote character data cached next to an assignment.
///
/// Identity is `id`. The stored value reflects the most recent assignment
/// call, not necessarily the latest remote data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub species: String,
}

/// Validation failures from [`AssignmentStore::assign_character`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignError {
    #[error("location name cannot be empty")]
    EmptyLocationName,

    #[error("a location named \"{0}\" already exists")]
    DuplicateLocationName(String),
}

/// Options for [`AssignmentStore::assign_character`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignOptions {
    /// Reject the assignment if the target location already exists.
    /// Set by the "create new location" flow; the plain assign flow
    /// merges into existing locations without this check.
    pub require_new_location: bool,
}

/// Snapshot of all location assignments.
///
/// `locations` maps a location name to its residents in insertion order;
/// `character_locations` is the inverse index (character id to location
/// name). The two maps are inverses of each other:
/// - every inverse entry points at a location containing exactly one
///   resident with that id
/// - no location has an empty resident list
/// - a character appears in at most one location
///
/// Location names are trimmed, non-empty, and compared case-sensitively.
/// The serialized form is the persisted schema, so field names are fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentState {
    #[serde(default)]
    pub locations: BTreeMap<String, Vec<CharacterSummary>>,
    #[serde(rename = "characterLocations", default)]
    pub character_locations: BTreeMap<String, String>,
}

impl AssignmentState {
    /// Verify the bidirectional index invariants.
    ///
    /// Used when hydrating a stored snapshot: a snapshot that fails this
    /// check is discarded rather than repaired.
    pub fn is_consistent(&self) -> bool {
        for (name, residents) in &self.locations {
            if name.trim() != name || name.is_empty() || residents.is_empty() {
                return false;
            }
            for resident in residents {
                if self.character_locations.get(&resident.id) != Some(name) {
                    return false;
                }
                // No duplicate ids within a location
                if residents.iter().filter(|r| r.id == resident.id).count() != 1 {
                    return false;
                }
            }
        }

        for (id, name) in &self.character_locations {
            let Some(residents) = self.locations.get(name) else {
                return false;
            };
            if residents.iter().filter(|r| r.id == *id).count() != 1 {
                return false;
            }
        }

        true
    }

    /// Total number of assigned characters.
    pub fn resident_count(&self) -> usize {
        self.character_locations.len()
    }
}

/// Owns the current [`AssignmentState`] and enforces its invariants.
///
/// Construct one instance at session start (hydrated from storage) and
/// hand it to whatever needs it; persistence is the caller's job, invoked
/// after each successful mutation.
#[derive(Debug, Clone, Default)]
pub struct AssignmentStore {
    state: AssignmentState,
}

impl AssignmentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store over a previously hydrated snapshot.
    pub fn from_state(state: AssignmentState) -> Self {
        Self { state }
    }

    /// The current snapshot.
    pub fn state(&self) -> &AssignmentState {
        &self.state
    }

    /// Place a character in a location, creating the location on first use.
    ///
    /// The raw name is trimmed before anything else. If the character was
    /// already assigned elsewhere it is moved, and a location emptied by
    /// the move is deleted. Re-assigning to the same location refreshes the
    /// cached summary in place without changing resident order, so
    /// repeating the same call converges to the same snapshot.
    ///
    /// On error the snapshot is untouched.
    pub fn assign_character(
        &mut self,
        character: CharacterSummary,
        raw_location_name: &str,
        options: AssignOptions,
    ) -> Result<(), AssignError> {
        let location = raw_location_name.trim();
        if location.is_empty() {
            return Err(AssignError::EmptyLocationName);
        }

        // Only the explicit create-new flow enforces uniqueness; the plain
        // assign flow merges into an existing location of the same name.
        if options.require_new_location && self.state.locations.contains_key(location) {
            return Err(AssignError::DuplicateLocationName(location.to_string()));
        }

        let mut next = self.state.clone();

        if let Some(previous) = next.character_locations.get(&character.id).cloned()
            && previous != location
        {
            if let Some(residents) = next.locations.get_mut(&previous) {
                residents.retain(|resident| resident.id != character.id);
                if residents.is_empty() {
                    next.locations.remove(&previous);
                }
            }
        }

        let residents = next.locations.entry(location.to_string()).or_default();
        match residents
            .iter_mut()
            .find(|resident| resident.id == character.id)
        {
            Some(slot) => *slot = character.clone(),
            None => residents.push(character.clone()),
        }
        next.character_locations
            .insert(character.id, location.to_string());

        self.state = next;
        Ok(())
    }

    /// Remove a character from whatever location it is in.
    ///
    /// A character with no current location is a no-op, not an error; the
    /// snapshot is not even replaced in that case.
    pub fn unassign_character(&mut self, character_id: &str) {
        let Some(previous) = self.state.character_locations.get(character_id).cloned() else {
            return;
        };

        let mut next = self.state.clone();
        if let Some(residents) = next.locations.get_mut(&previous) {
            residents.retain(|resident| resident.id != character_id);
            if residents.is_empty() {
                next.locations.remove(&previous);
            }
        }
        next.character_locations.remove(character_id);

        self.state = next;
    }

    /// All locations with their residents, sorted by name ascending.
    pub fn list_locations(&self) -> impl Iterator<Item = (&str, &[CharacterSummary])> {
        self.state
            .locations
            .iter()
            .map(|(name, residents)| (name.as_str(), residents.as_slice()))
    }

    /// Residents of a location, empty if the location does not exist.
    pub fn residents_of(&self, location: &str) -> &[CharacterSummary] {
        self.state
            .locations
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The location a character is currently assigned to, if any.
    pub fn location_of(&self, character_id: &str) -> Option<&str> {
        self.state
            .character_locations
            .get(character_id)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn summary(id: &str, name: &str) -> CharacterSummary {
        CharacterSummary {
            id: id.to_string(),
            name: name.to_string(),
            image: format!("https://example.test/{id}.jpeg"),
            status: "Alive".to_string(),
            species: "Human".to_string(),
        }
    }

    #[test]
    fn test_assign_creates_location() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();

        let listed: Vec<_> = store.list_locations().collect();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "Citadel");
        assert_eq!(listed[0].1.len(), 1);
        assert_eq!(listed[0].1[0].id, "1");
        assert_eq!(store.location_of("1"), Some("Citadel"));
    }

    #[test]
    fn test_assign_trims_location_name() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "  Citadel  ", AssignOptions::default())
            .unwrap();

        assert_eq!(store.location_of("1"), Some("Citadel"));
        assert_eq!(store.residents_of("Citadel").len(), 1);
    }

    #[test]
    fn test_assign_rejects_empty_name() {
        let mut store = AssignmentStore::new();
        let err = store
            .assign_character(summary("1", "Rick"), "   ", AssignOptions::default())
            .unwrap_err();

        assert_eq!(err, AssignError::EmptyLocationName);
        assert_eq!(store.state(), &AssignmentState::default());
    }

    #[test]
    fn test_require_new_rejects_existing_location() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Earth", AssignOptions::default())
            .unwrap();
        let before = store.state().clone();

        let err = store
            .assign_character(
                summary("2", "Morty"),
                "Earth",
                AssignOptions {
                    require_new_location: true,
                },
            )
            .unwrap_err();

        assert_eq!(err, AssignError::DuplicateLocationName("Earth".to_string()));
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_plain_assign_merges_into_existing_location() {
        // The duplicate check guards only the create-new flow.
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Earth", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("2", "Morty"), "Earth", AssignOptions::default())
            .unwrap();

        let ids: Vec<_> = store.residents_of("Earth").iter().map(|r| &r.id).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn test_move_removes_from_previous_and_deletes_empty() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("1", "Rick"), "Earth", AssignOptions::default())
            .unwrap();

        let listed: Vec<_> = store.list_locations().collect();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "Earth");
        assert_eq!(store.location_of("1"), Some("Earth"));
    }

    #[test]
    fn test_move_leaves_other_residents_in_place() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("2", "Morty"), "Citadel", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("1", "Rick"), "Earth", AssignOptions::default())
            .unwrap();

        assert_eq!(store.residents_of("Citadel").len(), 1);
        assert_eq!(store.residents_of("Citadel")[0].id, "2");
        assert_eq!(store.residents_of("Earth")[0].id, "1");
    }

    #[test]
    fn test_reassign_same_location_is_idempotent() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("2", "Morty"), "Citadel", AssignOptions::default())
            .unwrap();
        let before = store.state().clone();

        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();

        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_reassign_refreshes_summary_preserving_position() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("2", "Morty"), "Citadel", AssignOptions::default())
            .unwrap();

        let mut refreshed = summary("1", "Rick");
        refreshed.status = "Dead".to_string();
        store
            .assign_character(refreshed, "Citadel", AssignOptions::default())
            .unwrap();

        let residents = store.residents_of("Citadel");
        assert_eq!(residents.len(), 2);
        assert_eq!(residents[0].id, "1");
        assert_eq!(residents[0].status, "Dead");
        assert_eq!(residents[1].id, "2");
    }

    #[test]
    fn test_unassign_removes_and_deletes_empty_location() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();
        store.unassign_character("1");

        assert_eq!(store.list_locations().count(), 0);
        assert_eq!(store.location_of("1"), None);
    }

    #[test]
    fn test_unassign_unknown_character_is_noop() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();
        let before = store.state().clone();

        store.unassign_character("999");

        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_list_locations_sorted_ascending() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Gazorpazorp", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("2", "Morty"), "Earth", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("3", "Summer"), "Citadel", AssignOptions::default())
            .unwrap();

        let names: Vec<_> = store.list_locations().map(|(name, _)| name).collect();
        assert_eq!(names, ["Citadel", "Earth", "Gazorpazorp"]);
    }

    #[test]
    fn test_location_names_are_case_sensitive() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "earth", AssignOptions::default())
            .unwrap();
        store
            .assign_character(summary("2", "Morty"), "Earth", AssignOptions::default())
            .unwrap();

        assert_eq!(store.list_locations().count(), 2);
    }

    #[test]
    fn test_assign_move_unassign_scenario() {
        let mut store = AssignmentStore::new();
        store
            .assign_character(summary("1", "Rick"), "Citadel", AssignOptions::default())
            .unwrap();
        assert_eq!(
            store.list_locations().map(|(name, _)| name).collect::<Vec<_>>(),
            ["Citadel"]
        );

        store
            .assign_character(summary("1", "Rick"), "Earth", AssignOptions::default())
            .unwrap();
        assert_eq!(
            store.list_locations().map(|(name, _)| name).collect::<Vec<_>>(),
            ["Earth"]
        );

        store.unassign_character("1");
        assert_eq!(store.list_locations().count(), 0);
    }

    #[test]
    fn test_consistency_check_rejects_dangling_inverse_entry() {
        let mut state = AssignmentState::default();
        state
            .character_locations
            .insert("1".to_string(), "Citadel".to_string());
        assert!(!state.is_consistent());
    }

    #[test]
    fn test_consistency_check_rejects_empty_resident_list() {
        let mut state = AssignmentState::default();
        state.locations.insert("Citadel".to_string(), Vec::new());
        assert!(!state.is_consistent());
    }

    #[test]
    fn test_consistency_check_rejects_missing_inverse_entry() {
        let mut state = AssignmentState::default();
        state
            .locations
            .insert("Citadel".to_string(), vec![summary("1", "Rick")]);
        assert!(!state.is_consistent());
    }

    /// One step of a randomized operation sequence.
    #[derive(Debug, Clone)]
    enum Op {
        Assign {
            id: u8,
            location: u8,
            require_new: bool,
        },
        Unassign {
            id: u8,
        },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, 0u8..5, any::<bool>()).prop_map(|(id, location, require_new)| Op::Assign {
                id,
                location,
                require_new,
            }),
            (0u8..8).prop_map(|id| Op::Unassign { id }),
        ]
    }

    proptest! {
        #[test]
        fn test_invariants_hold_for_any_op_sequence(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut store = AssignmentStore::new();
            for op in ops {
                match op {
                    Op::Assign { id, location, require_new } => {
                        let character = summary(&id.to_string(), "Someone");
                        let location = format!("Location {location}");
                        let _ = store.assign_character(
                            character,
                            &location,
                            AssignOptions { require_new_location: require_new },
                        );
                    }
                    Op::Unassign { id } => store.unassign_character(&id.to_string()),
                }
                prop_assert!(store.state().is_consistent());
            }
        }
    }
}
