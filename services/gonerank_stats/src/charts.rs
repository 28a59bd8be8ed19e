use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::{
    ratings::{aggregate_ratings, mean, RatingTotals},
    types::{Club, Competition, Match, Rating, SquadPlayer, Who},
    utils::{day_month_label, hsla, line_alpha, pick_text_color},
};

/// Dashed reference line drawn across rating charts.
pub const REFERENCE_RATING: f64 = 5.0;
/// Fixed y ticks of the single player chart.
pub const SINGLE_PLAYER_TICKS: [u8; 5] = [1, 3, 5, 7, 9];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentBadge {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub primary: Option<String>,
    pub text_color: &'static str,
}

impl From<&Club> for OpponentBadge {
    fn from(club: &Club) -> Self {
        Self {
            id: club.id.clone(),
            name: club.name.clone(),
            abbreviation: club.abbreviation.clone(),
            primary: club.primary.clone(),
            text_color: club.primary.as_deref().map_or("#FFF", pick_text_color),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionBadge {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
}

impl From<&Competition> for CompetitionBadge {
    fn from(competition: &Competition) -> Self {
        Self {
            id: competition.id.clone(),
            name: competition.name.clone(),
            abbreviation: competition.abbreviation.clone(),
        }
    }
}

/// One plotted match, with what a tooltip needs to describe it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub match_id: String,
    pub date: DateTime<Utc>,
    pub label: String,
    pub home: bool,
    pub scored: i32,
    pub conceeded: i32,
    pub opponent: Option<OpponentBadge>,
    pub competition: Option<CompetitionBadge>,
    pub average_sum: f64,
    pub average_quantity: u32,
    pub average: Option<f64>,
    pub running_average: Option<f64>,
}

/// Clubs and competitions used to denormalise points.
#[derive(Debug, Clone, Copy)]
pub struct DisplayLookup<'a> {
    pub clubs: &'a [Club],
    pub competitions: &'a [Competition],
}

impl<'a> DisplayLookup<'a> {
    pub fn new(clubs: &'a [Club], competitions: &'a [Competition]) -> Self {
        Self { clubs, competitions }
    }

    fn point(&self, m: &Match, totals: RatingTotals) -> ChartPoint {
        ChartPoint {
            match_id: m.id.clone(),
            date: m.date,
            label: day_month_label(m.date),
            home: m.home,
            scored: m.scored,
            conceeded: m.conceeded,
            opponent: self
                .clubs
                .iter()
                .find(|c| c.id == m.opponent_id)
                .map(OpponentBadge::from),
            competition: self
                .competitions
                .iter()
                .find(|c| c.id == m.competition_id)
                .map(CompetitionBadge::from),
            average_sum: totals.average_sum,
            average_quantity: totals.average_quantity,
            average: totals.average(),
            running_average: None,
        }
    }
}

/// Build the chronological series of one player.
///
/// Points are sorted by match date whatever the input order. The running
/// average is the mean of the per-match averages seen so far and is left
/// empty on matches nobody rated.
pub fn format_player_chart(entries: &[(&Match, RatingTotals)], lookup: DisplayLookup<'_>) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = entries
        .iter()
        .map(|(m, totals)| lookup.point(m, *totals))
        .collect();
    points.sort_by_key(|p| p.date);

    let mut sum = 0.0;
    let mut rated = 0u32;
    for point in points.iter_mut() {
        if let Some(avg) = point.average {
            sum += avg;
            rated += 1;
            point.running_average = Some(sum / f64::from(rated));
        }
    }

    points
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisDomain {
    pub min: i32,
    pub max: i32,
}

impl AxisDomain {
    /// The fixed 0 to 10 scale of the single player chart.
    pub const RATING_SCALE: AxisDomain = AxisDomain { min: 0, max: 10 };
}

/// Y axis of the single player chart: fixed scale, ticks and reference line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePlayerAxis {
    pub domain: AxisDomain,
    pub ticks: [u8; 5],
    pub reference: f64,
}

impl Default for SinglePlayerAxis {
    fn default() -> Self {
        Self {
            domain: AxisDomain::RATING_SCALE,
            ticks: SINGLE_PLAYER_TICKS,
            reference: REFERENCE_RATING,
        }
    }
}

/// Input of the multi player chart.
#[derive(Debug, Clone)]
pub struct PlayerChartInput<'a> {
    pub player: SquadPlayer,
    pub matches: Vec<(&'a Match, RatingTotals)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSeries {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub global_average: Option<f64>,
    /// Position of the player in the shown list, `None` when hidden.
    pub color_index: Option<usize>,
    pub hue: Option<f64>,
    pub points: Vec<ChartPoint>,
}

impl PlayerSeries {
    pub fn is_shown(&self) -> bool {
        self.color_index.is_some()
    }

    /// Line colour, dimmed when another player is highlighted.
    pub fn stroke(&self, highlighted: Option<&str>) -> Option<String> {
        self.hue
            .map(|hue| hsla(hue, 100, 50, line_alpha(&self.id, highlighted)))
    }

    /// Background of the value label drawn on a highlighted line.
    pub fn label_background(&self) -> Option<String> {
        self.hue.map(|hue| hsla(hue, 50, 50, 100))
    }
}

/// `360 / shown * index + 1`, the hue spread over the shown players.
pub fn hue_for(color_index: usize, shown_count: usize) -> f64 {
    if shown_count == 0 {
        return 1.0;
    }
    360.0 / shown_count as f64 * color_index as f64 + 1.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayersChart {
    pub series: Vec<PlayerSeries>,
    pub domain: Option<AxisDomain>,
    pub shown_ids: Vec<String>,
}

impl PlayersChart {
    /// Order of the player picker: shown players first, otherwise input order.
    pub fn list_order(&self) -> Vec<&PlayerSeries> {
        let mut ordered: Vec<&PlayerSeries> = self.series.iter().collect();
        ordered.sort_by_key(|s| !s.is_shown());
        ordered
    }

    /// Order lines are drawn in: ascending global average.
    pub fn chart_order(&self) -> Vec<&PlayerSeries> {
        let mut ordered: Vec<&PlayerSeries> = self.series.iter().collect();
        ordered.sort_by(|a, b| compare_averages(a.global_average, b.global_average));
        ordered
    }
}

fn compare_averages(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::NEG_INFINITY)
        .total_cmp(&b.unwrap_or(f64::NEG_INFINITY))
}

/// Format every player's series and the shared y domain.
///
/// Players without matches are dropped. Colour indices come from
/// `shown_ids` and are fixed here so list and chart agree.
pub fn format_players_chart(
    inputs: &[PlayerChartInput<'_>],
    lookup: DisplayLookup<'_>,
    shown_ids: &[String],
) -> PlayersChart {
    let series: Vec<PlayerSeries> = inputs
        .iter()
        .filter(|input| !input.matches.is_empty())
        .map(|input| {
            let points = format_player_chart(&input.matches, lookup);
            let color_index = shown_ids.iter().position(|id| id == &input.player.id);
            PlayerSeries {
                id: input.player.id.clone(),
                first_name: input.player.first_name.clone(),
                last_name: input.player.last_name.clone(),
                global_average: mean(points.iter().filter_map(|p| p.average)),
                color_index,
                hue: color_index.map(|i| hue_for(i, shown_ids.len())),
                points,
            }
        })
        .collect();

    PlayersChart {
        domain: domain_of(&series),
        series,
        shown_ids: shown_ids.to_vec(),
    }
}

/// Floor of the lowest and ceiling of the highest per-match average.
pub fn domain_of(series: &[PlayerSeries]) -> Option<AxisDomain> {
    let averages = series
        .iter()
        .flat_map(|s| s.points.iter())
        .filter_map(|p| p.average);

    let (lowest, highest) = averages.fold((None::<f64>, None::<f64>), |(lo, hi), v| {
        (Some(lo.map_or(v, |l| l.min(v))), Some(hi.map_or(v, |h| h.max(v))))
    });

    Some(AxisDomain {
        min: lowest?.floor() as i32,
        max: highest?.ceil() as i32,
    })
}

/// Per-player rating totals over `matches`.
///
/// A player takes part in a match when listed in its roster or rated for it.
pub fn player_chart_inputs<'a>(
    players: &[SquadPlayer],
    matches: &[&'a Match],
    ratings: &[Rating],
    who: Who,
    viewer_id: Option<&str>,
) -> Vec<PlayerChartInput<'a>> {
    players
        .iter()
        .map(|player| {
            let own: Vec<Rating> = ratings
                .iter()
                .filter(|r| r.player_id.as_deref() == Some(player.id.as_str()))
                .cloned()
                .collect();
            let played: Vec<&'a Match> = matches
                .iter()
                .copied()
                .filter(|m| {
                    m.players.iter().any(|mp| mp.player_id == player.id)
                        || own.iter().any(|r| r.match_id == m.id)
                })
                .collect();
            let summary = aggregate_ratings(&own, &played, who, viewer_id);

            PlayerChartInput {
                player: player.clone(),
                matches: played
                    .iter()
                    .zip(summary.matches.iter())
                    .map(|(m, avg)| (*m, avg.totals))
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn game(id: &str, day: u32) -> Match {
        Match {
            id: id.to_string(),
            date: Utc.with_ymd_and_hms(2022, 10, day, 20, 0, 0).unwrap(),
            home: day % 2 == 0,
            scored: 1,
            conceeded: 1,
            active: false,
            archived: true,
            competition_id: "l1".to_string(),
            season_id: "s1".to_string(),
            opponent_id: "psg".to_string(),
            players: vec![],
        }
    }

    fn totals(sum: f64, quantity: u32) -> RatingTotals {
        RatingTotals {
            average_sum: sum,
            average_quantity: quantity,
        }
    }

    fn squad_player(id: &str) -> SquadPlayer {
        SquadPlayer {
            id: id.to_string(),
            first_name: "First".to_string(),
            last_name: id.to_uppercase(),
        }
    }

    fn clubs() -> Vec<Club> {
        vec![Club {
            id: "psg".to_string(),
            name: "Paris Saint-Germain".to_string(),
            abbreviation: "PSG".to_string(),
            primary: Some("#004170".to_string()),
            secondary: None,
        }]
    }

    fn competitions() -> Vec<Competition> {
        vec![Competition {
            id: "l1".to_string(),
            name: "Ligue 1".to_string(),
            abbreviation: "L1".to_string(),
        }]
    }

    #[test]
    fn test_points_are_chronological() {
        let (a, b, c) = (game("a", 20), game("b", 3), game("c", 11));
        let entries = vec![(&a, totals(14.0, 2)), (&b, totals(5.0, 1)), (&c, totals(0.0, 0))];
        let (clubs, comps) = (clubs(), competitions());

        let points = format_player_chart(&entries, DisplayLookup::new(&clubs, &comps));
        let ids: Vec<&str> = points.iter().map(|p| p.match_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!(points.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn test_point_averages_and_metadata() {
        let (a, b, c) = (game("a", 1), game("b", 2), game("c", 3));
        let entries = vec![(&a, totals(12.0, 2)), (&b, totals(0.0, 0)), (&c, totals(8.0, 1))];
        let (clubs, comps) = (clubs(), competitions());

        let points = format_player_chart(&entries, DisplayLookup::new(&clubs, &comps));
        assert_eq!(points[0].average, Some(6.0));
        assert_eq!(points[1].average, None);
        assert_eq!(points[1].running_average, None);
        assert_eq!(points[2].running_average, Some(7.0));

        let opponent = points[0].opponent.as_ref().unwrap();
        assert_eq!(opponent.abbreviation, "PSG");
        assert_eq!(opponent.text_color, "#FFF");
        assert_eq!(points[0].competition.as_ref().unwrap().abbreviation, "L1");
        assert_eq!(points[0].label, "01/10");
    }

    #[test]
    fn test_players_chart_colors_and_orders() {
        let (a, b) = (game("a", 1), game("b", 2));
        let inputs = vec![
            PlayerChartInput {
                player: squad_player("p1"),
                matches: vec![(&a, totals(8.0, 1)), (&b, totals(6.0, 1))],
            },
            PlayerChartInput {
                player: squad_player("p2"),
                matches: vec![(&a, totals(4.5, 1))],
            },
            PlayerChartInput {
                player: squad_player("p3"),
                matches: vec![(&a, totals(9.2, 1))],
            },
            PlayerChartInput {
                player: squad_player("benched"),
                matches: vec![],
            },
        ];
        let shown = vec!["p3".to_string(), "p2".to_string()];
        let (clubs, comps) = (clubs(), competitions());

        let chart = format_players_chart(&inputs, DisplayLookup::new(&clubs, &comps), &shown);
        assert_eq!(chart.series.len(), 3);

        let p1 = &chart.series[0];
        assert_eq!(p1.global_average, Some(7.0));
        assert_eq!(p1.color_index, None);
        assert_eq!(p1.stroke(None), None);

        let p3 = &chart.series[2];
        assert_eq!(p3.color_index, Some(0));
        assert_eq!(p3.hue, Some(1.0));
        assert_eq!(chart.series[1].hue, Some(181.0));
        assert_eq!(
            chart.series[1].stroke(Some("p3")).unwrap(),
            "hsla(181, 100%, 50%, 10%)"
        );

        let list: Vec<&str> = chart.list_order().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(list, vec!["p2", "p3", "p1"]);

        let lines: Vec<&str> = chart.chart_order().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(lines, vec!["p2", "p1", "p3"]);

        assert_eq!(chart.domain, Some(AxisDomain { min: 4, max: 10 }));
    }

    #[test]
    fn test_domain_without_data() {
        let a = game("a", 1);
        let inputs = vec![PlayerChartInput {
            player: squad_player("p1"),
            matches: vec![(&a, totals(0.0, 0))],
        }];
        let chart = format_players_chart(&inputs, DisplayLookup::new(&[], &[]), &[]);
        assert_eq!(chart.domain, None);
        assert_eq!(chart.series[0].global_average, None);
        assert!(chart.series[0].points[0].opponent.is_none());
    }

    #[test]
    fn test_player_chart_inputs_use_roster_and_ratings() {
        let mut a = game("a", 1);
        a.players = vec![crate::types::MatchPlayer {
            id: "mp".to_string(),
            player_id: "p1".to_string(),
        }];
        let b = game("b", 2);
        let matches = vec![&a, &b];
        let ratings = vec![
            Rating {
                id: "r1".to_string(),
                match_id: "b".to_string(),
                player_id: Some("p2".to_string()),
                user_id: Some("u1".to_string()),
                quantity: 6.0,
            },
            Rating {
                id: "r2".to_string(),
                match_id: "a".to_string(),
                player_id: Some("p1".to_string()),
                user_id: Some("u1".to_string()),
                quantity: 3.0,
            },
        ];

        let inputs = player_chart_inputs(
            &[squad_player("p1"), squad_player("p2")],
            &matches,
            &ratings,
            Who::Community,
            None,
        );
        assert_eq!(inputs[0].matches.len(), 1);
        assert_eq!(inputs[0].matches[0].0.id, "a");
        assert_eq!(inputs[0].matches[0].1, totals(3.0, 1));
        assert_eq!(inputs[1].matches.len(), 1);
        assert_eq!(inputs[1].matches[0].0.id, "b");
    }
}
