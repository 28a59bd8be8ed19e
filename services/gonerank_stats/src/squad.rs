use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{error::SquadError, source::SquadMutation, types::SquadPlayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SquadState {
    /// The working squad is what the server last confirmed.
    Viewing,
    /// Players were added or removed since; sticky until commit or cancel.
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SquadChange {
    Unchanged,
    Added,
    Removed,
}

impl SquadChange {
    /// Marker shown in front of the player in the confirmation preview.
    pub fn symbol(&self) -> char {
        match self {
            SquadChange::Unchanged => '=',
            SquadChange::Added => '+',
            SquadChange::Removed => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SquadDiffEntry {
    pub player: SquadPlayer,
    pub change: SquadChange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SquadDiff {
    pub entries: Vec<SquadDiffEntry>,
}

impl SquadDiff {
    pub fn with_change(&self, change: SquadChange) -> impl Iterator<Item = &SquadPlayer> {
        self.entries
            .iter()
            .filter(move |e| e.change == change)
            .map(|e| &e.player)
    }

    pub fn unchanged(&self) -> Vec<&SquadPlayer> {
        self.with_change(SquadChange::Unchanged).collect()
    }

    pub fn added(&self) -> Vec<&SquadPlayer> {
        self.with_change(SquadChange::Added).collect()
    }

    pub fn removed(&self) -> Vec<&SquadPlayer> {
        self.with_change(SquadChange::Removed).collect()
    }

    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| e.change != SquadChange::Unchanged)
    }

    /// One line per player, e.g. "+ K. Toko Ekambi".
    pub fn preview(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} {}", e.change.symbol(), e.player.short_name()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Working copy of a match squad, edited locally and submitted as a whole.
#[derive(Debug, Clone)]
pub struct SquadEditor {
    match_id: String,
    archived: bool,
    initial: Vec<SquadPlayer>,
    squad: Vec<SquadPlayer>,
    state: SquadState,
    /// Bumped on every change to the buffers or the state.
    generation: u64,
}

impl SquadEditor {
    /// Start from the first successful load of the server squad.
    pub fn new(match_id: impl Into<String>, server_squad: Vec<SquadPlayer>, archived: bool) -> Self {
        let server_squad = dedup(server_squad);
        Self {
            match_id: match_id.into(),
            archived,
            initial: server_squad.clone(),
            squad: server_squad,
            state: SquadState::Viewing,
            generation: 0,
        }
    }

    /// Compare before and after an await to know whether anything changed
    /// in between.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn state(&self) -> SquadState {
        self.state
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn squad(&self) -> &[SquadPlayer] {
        &self.squad
    }

    pub fn initial_squad(&self) -> &[SquadPlayer] {
        &self.initial
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.squad.iter().any(|p| p.id == player_id)
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.squad.iter().map(|p| p.id.clone()).collect()
    }

    /// Replace both buffers with fresh server data, unless an edit is in
    /// progress. Returns whether the refresh was applied.
    pub fn refresh(&mut self, server_squad: Vec<SquadPlayer>, archived: bool) -> bool {
        if self.state == SquadState::Editing {
            debug!("Ignoring squad refresh for match {} while editing", self.match_id);
            return false;
        }
        let server_squad = dedup(server_squad);
        self.initial = server_squad.clone();
        self.squad = server_squad;
        self.archived = archived;
        self.generation += 1;
        true
    }

    pub fn add(&mut self, player: SquadPlayer) -> Result<(), SquadError> {
        if self.archived {
            return Err(SquadError::Archived(self.match_id.clone()));
        }
        if self.contains(&player.id) {
            return Err(SquadError::AlreadyInSquad(player.id));
        }
        debug!("Adding {} to squad of match {}", player.id, self.match_id);
        self.squad.push(player);
        self.state = SquadState::Editing;
        self.generation += 1;
        Ok(())
    }

    /// Remove a player. Absent ids are a no-op and leave the state alone.
    pub fn remove(&mut self, player_id: &str) -> Result<bool, SquadError> {
        if self.archived {
            return Err(SquadError::Archived(self.match_id.clone()));
        }
        let before = self.squad.len();
        self.squad.retain(|p| p.id != player_id);
        let removed = self.squad.len() != before;
        if removed {
            debug!("Removed {} from squad of match {}", player_id, self.match_id);
            self.state = SquadState::Editing;
            self.generation += 1;
        }
        Ok(removed)
    }

    /// Drop local edits.
    pub fn cancel(&mut self) {
        self.squad = self.initial.clone();
        self.state = SquadState::Viewing;
        self.generation += 1;
    }

    /// Classify the union of both squads. Computed on every call.
    pub fn diff(&self) -> SquadDiff {
        let mut entries: Vec<SquadDiffEntry> = self
            .squad
            .iter()
            .map(|p| SquadDiffEntry {
                player: p.clone(),
                change: if self.initial.iter().any(|i| i.id == p.id) {
                    SquadChange::Unchanged
                } else {
                    SquadChange::Added
                },
            })
            .collect();

        entries.extend(
            self.initial
                .iter()
                .filter(|i| !self.contains(&i.id))
                .map(|i| SquadDiffEntry {
                    player: i.clone(),
                    change: SquadChange::Removed,
                }),
        );

        SquadDiff { entries }
    }

    /// Season players that can still be picked.
    pub fn available<'a>(&self, season_players: &'a [SquadPlayer]) -> Vec<&'a SquadPlayer> {
        season_players
            .iter()
            .filter(|p| !self.contains(&p.id))
            .collect()
    }

    /// Submit the whole working squad. On failure nothing is rolled back and
    /// the editor stays in its current state.
    pub async fn commit<M>(&mut self, boundary: &M) -> Result<(), SquadError>
    where
        M: SquadMutation + ?Sized,
    {
        if self.archived {
            return Err(SquadError::Archived(self.match_id.clone()));
        }
        let player_ids = self.player_ids();
        match boundary.update_match_players(&self.match_id, &player_ids).await {
            Ok(()) => {
                info!(
                    "Committed squad of {} players for match {}",
                    player_ids.len(),
                    self.match_id
                );
                self.initial = self.squad.clone();
                self.state = SquadState::Viewing;
                self.generation += 1;
                Ok(())
            }
            Err(e) => {
                warn!("Squad commit for match {} failed: {}", self.match_id, e);
                Err(e.into())
            }
        }
    }
}

fn dedup(players: Vec<SquadPlayer>) -> Vec<SquadPlayer> {
    let mut unique: Vec<SquadPlayer> = Vec::with_capacity(players.len());
    for player in players {
        if !unique.iter().any(|p| p.id == player.id) {
            unique.push(player);
        }
    }
    unique
}
