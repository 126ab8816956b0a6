// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory owner of all walls, keyed by survey.
//!
//! The repository is passed explicitly to the engines that need it. Mutation
//! never persists anything by itself: callers snapshot the repository into a
//! local cache or go through the [`crate::storage`] ports when they choose to.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{SurveyId, WallId};
use crate::wall::Wall;

/// Walls of one survey, in insertion order
#[derive(Debug, Default, Clone)]
struct SurveyWalls {
    order: Vec<WallId>,
    walls: FxHashMap<WallId, Wall>,
}

/// `survey id -> wall id -> wall`
#[derive(Debug, Default, Clone)]
pub struct WallRepository {
    surveys: FxHashMap<SurveyId, SurveyWalls>,
}

impl WallRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walls of `survey` in insertion order
    pub fn walls<'a>(&'a self, survey: &SurveyId) -> impl Iterator<Item = &'a Wall> + 'a {
        self.surveys
            .get(survey)
            .into_iter()
            .flat_map(|s| s.order.iter().filter_map(move |id| s.walls.get(id)))
    }

    pub fn wall(&self, survey: &SurveyId, id: &WallId) -> Option<&Wall> {
        self.surveys.get(survey)?.walls.get(id)
    }

    pub fn wall_mut(&mut self, survey: &SurveyId, id: &WallId) -> Option<&mut Wall> {
        self.surveys.get_mut(survey)?.walls.get_mut(id)
    }

    /// Like [`WallRepository::wall`], but a missing wall is an error
    pub fn require_wall(&self, survey: &SurveyId, id: &WallId) -> Result<&Wall> {
        self.wall(survey, id).ok_or_else(|| Error::WallNotFound(id.clone()))
    }

    pub fn contains(&self, survey: &SurveyId, id: &WallId) -> bool {
        self.wall(survey, id).is_some()
    }

    /// Insert or replace a wall. A replaced wall keeps its position.
    pub fn insert_wall(&mut self, survey: SurveyId, wall: Wall) -> Option<Wall> {
        let entry = self.surveys.entry(survey).or_default();
        let id = wall.id.clone();
        let previous = entry.walls.insert(id.clone(), wall);
        if previous.is_none() {
            entry.order.push(id);
        }
        previous
    }

    pub fn remove_wall(&mut self, survey: &SurveyId, id: &WallId) -> Option<Wall> {
        let entry = self.surveys.get_mut(survey)?;
        let removed = entry.walls.remove(id)?;
        entry.order.retain(|k| k != id);
        Some(removed)
    }

    pub fn wall_count(&self, survey: &SurveyId) -> usize {
        self.surveys.get(survey).map_or(0, |s| s.walls.len())
    }

    /// Surveys holding at least one wall, sorted by id
    pub fn survey_ids(&self) -> Vec<SurveyId> {
        let mut ids: Vec<SurveyId> = self
            .surveys
            .iter()
            .filter(|(_, s)| !s.walls.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Drop every wall of `survey`
    pub fn clear_survey(&mut self, survey: &SurveyId) -> usize {
        self.surveys.remove(survey).map_or(0, |s| s.walls.len())
    }

    // --- Local cache ---

    pub fn snapshot(&self) -> RepositorySnapshot {
        RepositorySnapshot {
            surveys: self
                .survey_ids()
                .into_iter()
                .map(|survey_id| SurveySnapshot {
                    walls: self.walls(&survey_id).cloned().collect(),
                    survey_id,
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        let mut repo = Self::new();
        for survey in snapshot.surveys {
            for wall in survey.walls {
                repo.insert_wall(survey.survey_id.clone(), wall);
            }
        }
        repo
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: RepositorySnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

/// Serializable form of the whole repository, ordered for stable output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySnapshot {
    pub surveys: Vec<SurveySnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveySnapshot {
    pub survey_id: SurveyId,
    pub walls: Vec<Wall>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> SurveyId {
        SurveyId::from("s1")
    }

    fn names(repo: &WallRepository) -> Vec<String> {
        repo.walls(&survey()).map(|w| w.name.clone()).collect()
    }

    #[test]
    fn walls_keep_insertion_order() {
        let mut repo = WallRepository::new();
        for (id, name) in [("c", "North"), ("a", "East"), ("b", "South")] {
            repo.insert_wall(survey(), Wall::new(WallId::from(id), name));
        }
        assert_eq!(names(&repo), ["North", "East", "South"]);
    }

    #[test]
    fn replacing_keeps_position() {
        let mut repo = WallRepository::new();
        repo.insert_wall(survey(), Wall::new(WallId::from("a"), "A"));
        repo.insert_wall(survey(), Wall::new(WallId::from("b"), "B"));
        let previous = repo.insert_wall(survey(), Wall::new(WallId::from("a"), "A2"));
        assert_eq!(previous.map(|w| w.name), Some("A".to_string()));
        assert_eq!(names(&repo), ["A2", "B"]);
        assert_eq!(repo.wall_count(&survey()), 2);
    }

    #[test]
    fn remove_and_lookup() {
        let mut repo = WallRepository::new();
        repo.insert_wall(survey(), Wall::new(WallId::from("a"), "A"));
        assert!(repo.contains(&survey(), &WallId::from("a")));
        assert!(repo.remove_wall(&survey(), &WallId::from("a")).is_some());
        assert!(repo.remove_wall(&survey(), &WallId::from("a")).is_none());
        assert!(matches!(
            repo.require_wall(&survey(), &WallId::from("a")),
            Err(Error::WallNotFound(_))
        ));
        assert!(repo.walls(&SurveyId::from("other")).next().is_none());
    }

    #[test]
    fn surveys_are_isolated() {
        let mut repo = WallRepository::new();
        repo.insert_wall(survey(), Wall::new(WallId::from("a"), "A"));
        repo.insert_wall(SurveyId::from("s2"), Wall::new(WallId::from("a"), "Other A"));
        assert_eq!(repo.wall(&survey(), &WallId::from("a")).unwrap().name, "A");
        assert_eq!(repo.clear_survey(&SurveyId::from("s2")), 1);
        assert_eq!(repo.survey_ids(), vec![survey()]);
    }

    #[test]
    fn json_snapshot_round_trip() {
        let mut repo = WallRepository::new();
        repo.insert_wall(survey(), Wall::new(WallId::from("b"), "B"));
        repo.insert_wall(survey(), Wall::new(WallId::from("a"), "A"));
        let json = repo.to_json().unwrap();
        let restored = WallRepository::from_json(&json).unwrap();
        assert_eq!(names(&restored), ["B", "A"]);
        assert!(WallRepository::from_json("{").is_err());
    }
}
