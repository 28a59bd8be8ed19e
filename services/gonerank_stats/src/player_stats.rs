use serde::Serialize;
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::{
    charts::{format_player_chart, ChartPoint, DisplayLookup, SinglePlayerAxis},
    error::BoundaryError,
    match_filter::{filter_matches, CompetitionFilter},
    ratings::aggregate_ratings,
    source::StatsSource,
    types::{Competition, Player, PlayerSeasonData, Rating, Season, Who},
};

/// Seasons in which the player was registered, latest first.
pub fn seasons_played<'a>(seasons: &'a [Season], player_id: &str) -> Vec<&'a Season> {
    let mut played: Vec<&Season> = seasons
        .iter()
        .filter(|s| s.includes_player(player_id))
        .collect();
    played.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    played
}

/// The season shown by default on a player page.
pub fn latest_season<'a>(seasons: &'a [Season], player_id: &str) -> Option<&'a Season> {
    seasons_played(seasons, player_id).into_iter().next()
}

/// User ratings only make sense for a signed in viewer; anonymous viewers see
/// the community figures.
pub fn effective_who(who: Who, viewer_id: Option<&str>) -> Who {
    match (who, viewer_id) {
        (Who::User, None) => Who::Community,
        (who, _) => who,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonOption {
    pub id: String,
    pub label: String,
}

impl From<&Season> for SeasonOption {
    fn from(season: &Season) -> Self {
        Self {
            id: season.id.clone(),
            label: season.label(),
        }
    }
}

/// Table rows and chart series of one player for one season.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSeasonView {
    pub player: Option<Player>,
    /// Age at the player's last match of the selection.
    pub age: Option<u32>,
    pub season_id: Option<String>,
    pub competition: CompetitionFilter,
    pub who: Who,
    pub matches: Vec<ChartPoint>,
    pub global_average: Option<f64>,
    pub rated_matches: usize,
    /// Whether at least one of `matches` has a rating for the selected mode.
    pub has_data: bool,
    pub axis: SinglePlayerAxis,
    pub seasons: Vec<SeasonOption>,
    pub competitions: Vec<Competition>,
}

impl PlayerSeasonView {
    /// A view with nothing to show, for players who never played a season.
    pub fn empty(seasons: Vec<SeasonOption>) -> Self {
        Self {
            player: None,
            age: None,
            season_id: None,
            competition: CompetitionFilter::All,
            who: Who::Community,
            matches: Vec::new(),
            global_average: None,
            rated_matches: 0,
            has_data: false,
            axis: SinglePlayerAxis::default(),
            seasons,
            competitions: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        let name = self
            .player
            .as_ref()
            .map(Player::full_name)
            .unwrap_or_else(|| "Unknown player".to_string());
        let mut output = format!("{} Statistics:\n\n", name);

        if self.matches.is_empty() {
            output.push_str("No match is available for this season yet.\n");
            return output;
        }

        let average = self
            .global_average
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string());
        output.push_str("Overall:\n");
        if let Some(age) = self.age {
            let _ = writeln!(output, "- Age: {}", age);
        }
        let _ = write!(
            output,
            "- Matches: {}\n- Rated: {}\n- Average: {}\n\n",
            self.matches.len(),
            self.rated_matches,
            average
        );

        output.push_str("Match Breakdown:\n");
        for point in &self.matches {
            let opponent = point
                .opponent
                .as_ref()
                .map(|o| o.abbreviation.as_str())
                .unwrap_or("???");
            let competition = point
                .competition
                .as_ref()
                .map(|c| c.abbreviation.as_str())
                .unwrap_or("-");
            let rating = point
                .average
                .map(|a| format!("{:.2}", a))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                output,
                "- {} {} {} ({}) {}-{}: {}",
                point.label,
                if point.home { "H" } else { "A" },
                opponent,
                competition,
                point.scored,
                point.conceeded,
                rating
            );
        }

        output
    }
}

/// Reshape already fetched season data into the player view.
pub fn player_season_view(
    data: &PlayerSeasonData,
    ratings: &[Rating],
    season_id: Option<&str>,
    competition: CompetitionFilter,
    who: Who,
    viewer_id: Option<&str>,
) -> PlayerSeasonView {
    let competition = competition.resolve(&data.competitions);
    let who = effective_who(who, viewer_id);

    let matches = filter_matches(&data.matches, &competition, season_id);
    let summary = aggregate_ratings(ratings, &matches, who, viewer_id);
    let entries: Vec<_> = matches
        .iter()
        .zip(summary.matches.iter())
        .map(|(m, avg)| (*m, avg.totals))
        .collect();
    let points = format_player_chart(&entries, DisplayLookup::new(&data.clubs, &data.competitions));

    let age = data
        .player
        .as_ref()
        .zip(points.last())
        .and_then(|(player, last)| player.age_on(last.date));

    PlayerSeasonView {
        player: data.player.clone(),
        age,
        season_id: season_id.map(str::to_string),
        competition,
        who,
        has_data: summary.has_data(),
        axis: SinglePlayerAxis::default(),
        rated_matches: summary.rated_matches(),
        global_average: summary.global_average,
        matches: points,
        seasons: Vec::new(),
        competitions: data.competitions.clone(),
    }
}

/// Filters as they arrive from the page.
#[derive(Debug, Clone, Default)]
pub struct PlayerStatsRequest {
    pub player_id: String,
    pub season_id: Option<String>,
    pub competition: CompetitionFilter,
    pub who: Who,
    pub viewer_id: Option<String>,
}

/// Fetch and build the player view, picking the latest played season when
/// none is requested.
pub async fn load_player_stats<S>(source: &S, request: &PlayerStatsRequest) -> Result<PlayerSeasonView, BoundaryError>
where
    S: StatsSource + ?Sized,
{
    let seasons = source.seasons().await?;
    let played = seasons_played(&seasons, &request.player_id);
    let options: Vec<SeasonOption> = played.iter().map(|s| SeasonOption::from(*s)).collect();

    let season_id = match request.season_id.as_deref().filter(|s| !s.is_empty()) {
        Some(id) => id.to_string(),
        None => match latest_season(&seasons, &request.player_id) {
            Some(latest) => latest.id.clone(),
            None => {
                debug!("Player {} has not played any season", request.player_id);
                return Ok(PlayerSeasonView::empty(options));
            }
        },
    };

    let (data, ratings) = tokio::try_join!(
        source.player_season_data(&request.player_id, &season_id),
        source.player_season_ratings(&request.player_id, &season_id),
    )?;
    info!(
        "Loaded {} matches and {} ratings for player {} in season {}",
        data.matches.len(),
        ratings.len(),
        request.player_id,
        season_id
    );

    let mut view = player_season_view(
        &data,
        &ratings,
        Some(&season_id),
        request.competition.clone(),
        request.who,
        request.viewer_id.as_deref(),
    );
    view.seasons = options;
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::AxisDomain;
    use crate::types::{Club, Match, SeasonPlayer};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn season(id: &str, year: i32, players: &[&str]) -> Season {
        Season {
            id: id.to_string(),
            start_date: Utc.with_ymd_and_hms(year, 7, 1, 0, 0, 0).unwrap(),
            players: players
                .iter()
                .map(|p| SeasonPlayer {
                    id: None,
                    player_id: p.to_string(),
                    player: None,
                })
                .collect(),
        }
    }

    fn game(id: &str, day: u32, competition: &str) -> Match {
        Match {
            id: id.to_string(),
            date: Utc.with_ymd_and_hms(2022, 11, day, 20, 0, 0).unwrap(),
            home: true,
            scored: 3,
            conceeded: 1,
            active: false,
            archived: true,
            competition_id: competition.to_string(),
            season_id: "s22".to_string(),
            opponent_id: "asse".to_string(),
            players: vec![],
        }
    }

    fn rating(match_id: &str, user_id: &str, quantity: f64) -> Rating {
        Rating {
            id: format!("{}-{}", match_id, user_id),
            match_id: match_id.to_string(),
            player_id: Some("p1".to_string()),
            user_id: Some(user_id.to_string()),
            quantity,
        }
    }

    fn data() -> PlayerSeasonData {
        PlayerSeasonData {
            player: Some(Player {
                id: "p1".to_string(),
                first_name: "Rayan".to_string(),
                last_name: "Cherki".to_string(),
                birth_date: None,
                country: None,
                country_code: None,
                image: None,
            }),
            matches: vec![game("m2", 12, "l1"), game("m1", 5, "l1"), game("m3", 20, "cup")],
            clubs: vec![Club {
                id: "asse".to_string(),
                name: "AS Saint-Etienne".to_string(),
                abbreviation: "ASSE".to_string(),
                primary: Some("#009a44".to_string()),
                secondary: None,
            }],
            competitions: vec![
                Competition {
                    id: "l1".to_string(),
                    name: "Ligue 1".to_string(),
                    abbreviation: "L1".to_string(),
                },
                Competition {
                    id: "cup".to_string(),
                    name: "Coupe de France".to_string(),
                    abbreviation: "CDF".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_seasons_played_latest_first() {
        let seasons = vec![
            season("s20", 2020, &["p1"]),
            season("s22", 2022, &["p1"]),
            season("s21", 2021, &["p2"]),
        ];
        let played: Vec<&str> = seasons_played(&seasons, "p1").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(played, vec!["s22", "s20"]);
        assert_eq!(latest_season(&seasons, "p1").unwrap().id, "s22");
        assert!(latest_season(&seasons, "p9").is_none());
    }

    #[test]
    fn test_view_filters_competition_and_sorts() {
        let ratings = vec![
            rating("m1", "u1", 6.0),
            rating("m2", "u1", 8.0),
            rating("m3", "u1", 2.0),
        ];
        let view = player_season_view(
            &data(),
            &ratings,
            Some("s22"),
            CompetitionFilter::Only("l1".to_string()),
            Who::Community,
            None,
        );
        let ids: Vec<&str> = view.matches.iter().map(|p| p.match_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(view.global_average, Some(7.0));
        assert!(view.has_data);
    }

    #[test]
    fn test_unknown_competition_degrades_to_all() {
        let view = player_season_view(
            &data(),
            &[],
            Some("s22"),
            CompetitionFilter::Only("ghost".to_string()),
            Who::Community,
            None,
        );
        assert_eq!(view.competition, CompetitionFilter::All);
        assert_eq!(view.matches.len(), 3);
        assert_eq!(view.global_average, None);
        assert_eq!(view.rated_matches, 0);
        assert!(!view.has_data);
        assert!(view.summary().contains("- Average: -"));
    }

    #[test]
    fn test_has_data_follows_selected_ratings() {
        let ratings = vec![rating("m1", "u2", 4.0)];
        let own = player_season_view(&data(), &ratings, None, CompetitionFilter::All, Who::User, Some("u1"));
        assert_eq!(own.matches.len(), 3);
        assert!(!own.has_data);

        let community = player_season_view(&data(), &ratings, None, CompetitionFilter::All, Who::Community, None);
        assert!(community.has_data);
    }

    #[test]
    fn test_age_at_last_match_and_axis() {
        let mut data = data();
        if let Some(player) = data.player.as_mut() {
            player.birth_date = Some(Utc.with_ymd_and_hms(2003, 8, 7, 0, 0, 0).unwrap());
        }
        let view = player_season_view(&data, &[], None, CompetitionFilter::All, Who::Community, None);
        assert_eq!(view.age, Some(19));
        assert!(view.summary().contains("- Age: 19"));
        assert_eq!(view.axis.domain, AxisDomain::RATING_SCALE);
        assert_eq!(view.axis.ticks, [1, 3, 5, 7, 9]);
        assert_eq!(view.axis.reference, 5.0);

        let cup_only = player_season_view(
            &data,
            &[],
            None,
            CompetitionFilter::Only("cup".to_string()),
            Who::Community,
            None,
        );
        assert_eq!(cup_only.matches.len(), 1);
        assert_eq!(cup_only.age, Some(19));
    }

    #[test]
    fn test_user_mode_needs_viewer() {
        let ratings = vec![rating("m1", "u1", 9.0), rating("m1", "u2", 3.0)];

        let anonymous = player_season_view(&data(), &ratings, None, CompetitionFilter::All, Who::User, None);
        assert_eq!(anonymous.who, Who::Community);
        assert_eq!(anonymous.global_average, Some(6.0));

        let signed_in = player_season_view(&data(), &ratings, None, CompetitionFilter::All, Who::User, Some("u1"));
        assert_eq!(signed_in.who, Who::User);
        assert_eq!(signed_in.global_average, Some(9.0));
    }

    #[test]
    fn test_summary_mentions_no_data() {
        let view = PlayerSeasonView::empty(vec![]);
        assert!(view.summary().contains("No match is available"));

        let ratings = vec![rating("m1", "u1", 6.5)];
        let full = player_season_view(&data(), &ratings, None, CompetitionFilter::All, Who::Community, None);
        let summary = full.summary();
        assert!(summary.starts_with("Rayan Cherki Statistics:"));
        assert!(summary.contains("- 05/11 H ASSE (L1) 3-1: 6.50"));
    }
}
