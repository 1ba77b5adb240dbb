//! NHL endpoint catalog
//!
//! Static endpoints are single documents refreshed wholesale. Dynamic endpoints
//! are fetched once per parameter tuple read from a staging view.

use puck_loader::{EndpointDescriptor, LoadResult};
use std::path::{Path, PathBuf};

const WEB_API: &str = "https://api-web.nhle.com";
const STATS_API: &str = "https://api.nhle.com/stats/rest/en";

/// Where the parameters of a dynamic endpoint come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSource {
    /// View in the staging schema
    pub view: &'static str,
    /// Columns, in order; each becomes a template parameter of the same name
    pub columns: &'static [&'static str],
    /// Boolean column marking rows already extracted; only rows where it is
    /// false are requested
    pub missing_flag: Option<&'static str>,
    /// Parameter whose value names the sub-folder files are saved into
    pub partition_by: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    /// One document, loaded with `load_single`
    Static,
    /// One document per request-id row, loaded with `load_many`
    Dynamic(RequestSource),
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub name: &'static str,
    pub description: &'static str,
    pub descriptor: EndpointDescriptor,
    pub kind: EndpointKind,
}

impl Endpoint {
    pub fn is_static(&self) -> bool {
        matches!(self.kind, EndpointKind::Static)
    }

    pub fn request_source(&self) -> Option<&RequestSource> {
        match &self.kind {
            EndpointKind::Static => None,
            EndpointKind::Dynamic(source) => Some(source),
        }
    }
}

/// Every endpoint the pipeline knows, rooted at one lake directory
#[derive(Debug, Clone)]
pub struct Catalog {
    endpoints: Vec<Endpoint>,
}

impl Catalog {
    /// Build the NHL catalog with files under `lake_base_dir/raw/nhl` and tables in `schema`
    pub fn nhl(lake_base_dir: &Path, schema: &str) -> LoadResult<Self> {
        let root = lake_base_dir.join("raw").join("nhl");
        let single = root.join("single");

        let endpoints = vec![
            // ----------------------------------------------------------------
            // Static
            // ----------------------------------------------------------------
            Endpoint {
                name: "seasons",
                description: "All season ids",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_seasons_id")
                    .schema(schema)
                    .url(format!("{}/v1/season", WEB_API))
                    .file_name("all_season_ids.json")
                    .output_directory(&single)
                    .overwrite()
                    .build()?,
                kind: EndpointKind::Static,
            },
            Endpoint {
                name: "teams",
                description: "All teams",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_teams_id")
                    .schema(schema)
                    .url(format!("{}/team", STATS_API))
                    .file_name("all_teams_ids.json")
                    .output_directory(&single)
                    .array_unwrap_key("data")
                    .overwrite()
                    .build()?,
                kind: EndpointKind::Static,
            },
            Endpoint {
                name: "games-summary",
                description: "Summary of every game",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_games_summary")
                    .schema(schema)
                    .url(format!("{}/game", STATS_API))
                    .file_name("all_games_summary.json")
                    .output_directory(&single)
                    .array_unwrap_key("data")
                    .overwrite()
                    .build()?,
                kind: EndpointKind::Static,
            },
            // ----------------------------------------------------------------
            // Dynamic
            // ----------------------------------------------------------------
            Endpoint {
                name: "games-details",
                description: "Boxscore with players, per game",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_games_details")
                    .schema(schema)
                    .url(format!("{}/v1/gamecenter/{{game_id}}/boxscore", WEB_API))
                    .file_name("raw_{game_id}_details.json")
                    .output_directory(root.join("raw_all_games_details"))
                    .file_pattern("raw_*_details.json")
                    .build()?,
                kind: EndpointKind::Dynamic(RequestSource {
                    view: "vw_stg_request_games_id",
                    columns: &["game_id"],
                    missing_flag: Some("has_games_details"),
                    partition_by: None,
                }),
            },
            Endpoint {
                name: "games-summary-details",
                description: "Right-rail game summary, per game",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_games_summary_details")
                    .schema(schema)
                    .url(format!("{}/v1/gamecenter/{{game_id}}/right-rail", WEB_API))
                    .file_name("raw_{game_id}_summary_details.json")
                    .output_directory(root.join("raw_all_games_summary_details"))
                    .file_pattern("raw_*_summary_details.json")
                    .build()?,
                kind: EndpointKind::Dynamic(RequestSource {
                    view: "vw_stg_request_games_id",
                    columns: &["game_id"],
                    missing_flag: Some("has_games_summary_details"),
                    partition_by: None,
                }),
            },
            Endpoint {
                name: "club-stats",
                description: "Player stats per team, season and game type",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_club_stats")
                    .schema(schema)
                    .url(format!(
                        "{}/v1/club-stats/{{team_id}}/{{season_id}}/{{game_type_id}}",
                        WEB_API
                    ))
                    .file_name("raw_stats_club_{team_id}_{season_id}_{game_type_id}.json")
                    .output_directory(root.join("raw_club_stats"))
                    .file_pattern("raw_stats_club_*_*_*.json")
                    .overwrite()
                    .build()?,
                kind: EndpointKind::Dynamic(RequestSource {
                    view: "vw_stg_request_teams_seasons_gametypes_id",
                    columns: &["team_id", "season_id", "game_type_id"],
                    missing_flag: None,
                    partition_by: None,
                }),
            },
            Endpoint {
                name: "players",
                description: "Player landing pages",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_players")
                    .schema(schema)
                    .url(format!("{}/v1/player/{{player_id}}/landing", WEB_API))
                    .file_name("player_{player_id}_info.json")
                    .output_directory(root.join("raw_player_info"))
                    .file_pattern("player_*_info.json")
                    .overwrite()
                    .build()?,
                kind: EndpointKind::Dynamic(RequestSource {
                    view: "vw_stg_request_players_id",
                    columns: &["player_id"],
                    missing_flag: None,
                    partition_by: None,
                }),
            },
            Endpoint {
                name: "player-game-log",
                description: "Game log per player, season and game type",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_player_game_log")
                    .schema(schema)
                    .url(format!(
                        "{}/v1/player/{{player_id}}/game-log/{{season_id}}/{{game_type_id}}",
                        WEB_API
                    ))
                    .file_name("{player_id}_{season_id}_{game_type_id}.json")
                    .output_directory(root.join("raw_game_log"))
                    .file_pattern("*_*_*.json")
                    .recursive(true)
                    .overwrite()
                    .build()?,
                kind: EndpointKind::Dynamic(RequestSource {
                    view: "vw_stg_request_players_seasons_gametypes_id",
                    columns: &["player_id", "season_id", "game_type_id"],
                    missing_flag: None,
                    partition_by: Some("season_id"),
                }),
            },
            Endpoint {
                name: "play-by-play",
                description: "Play-by-play events, per game",
                descriptor: EndpointDescriptor::builder("nhl_raw_all_play_by_play")
                    .schema(schema)
                    .url(format!("{}/v1/gamecenter/{{game_id}}/play-by-play", WEB_API))
                    .file_name("raw_{game_id}.json")
                    .output_directory(root.join("raw_play_by_play"))
                    .file_pattern("raw_*.json")
                    .build()?,
                kind: EndpointKind::Dynamic(RequestSource {
                    view: "vw_stg_request_games_id",
                    columns: &["game_id"],
                    missing_flag: Some("has_play_by_play"),
                    partition_by: None,
                }),
            },
        ];

        Ok(Self { endpoints })
    }

    /// Catalog made of arbitrary endpoints
    pub fn from_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.endpoints.iter().map(|e| e.name).collect()
    }
}

/// Directory a dynamic endpoint's file lands in for one parameter row
pub fn partition_dir(endpoint: &Endpoint, partition_value: Option<&str>) -> PathBuf {
    let base = endpoint.descriptor.output_directory();
    match partition_value {
        Some(value) => base.join(value),
        None => base.to_path_buf(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use puck_common::template::Params;
    use puck_loader::LoadMode;

    fn catalog() -> Catalog {
        Catalog::nhl(Path::new("/lake"), "raw").unwrap()
    }

    #[test]
    fn test_catalog_contents() {
        let catalog = catalog();
        assert_eq!(catalog.iter().count(), 9);
        assert_eq!(catalog.iter().filter(|e| e.is_static()).count(), 3);
        assert!(catalog.get("does-not-exist").is_none());
    }

    #[test]
    fn test_static_endpoints_overwrite() {
        for endpoint in catalog().iter().filter(|e| e.is_static()) {
            assert_eq!(endpoint.descriptor.load_mode(), LoadMode::Overwrite, "{}", endpoint.name);
            assert!(endpoint.descriptor.required_params().is_empty(), "{}", endpoint.name);
        }
    }

    #[test]
    fn test_dynamic_params_match_request_columns() {
        for endpoint in catalog().iter() {
            if let Some(source) = endpoint.request_source() {
                let mut expected: Vec<String> = source.columns.iter().map(|c| c.to_string()).collect();
                let mut required = endpoint.descriptor.required_params();
                expected.sort();
                required.sort();
                assert_eq!(required, expected, "{}", endpoint.name);
            }
        }
    }

    #[test]
    fn test_games_details_paths() {
        let catalog = catalog();
        let endpoint = catalog.get("games-details").unwrap();
        let params = Params::new().with("game_id", 2023020204);

        assert_eq!(
            endpoint.descriptor.build_url(&params).unwrap(),
            "https://api-web.nhle.com/v1/gamecenter/2023020204/boxscore"
        );
        assert_eq!(
            endpoint.descriptor.build_file_path(&params).unwrap(),
            PathBuf::from("/lake/raw/nhl/raw_all_games_details/raw_2023020204_details.json")
        );
        assert!(endpoint
            .descriptor
            .file_pattern()
            .matches("raw_2023020204_details.json"));
    }

    #[test]
    fn test_game_log_is_partitioned_by_season() {
        let catalog = catalog();
        let endpoint = catalog.get("player-game-log").unwrap();
        assert!(endpoint.descriptor.recursive());
        assert_eq!(
            partition_dir(endpoint, Some("20232024")),
            PathBuf::from("/lake/raw/nhl/raw_game_log/20232024")
        );
    }

    #[test]
    fn test_schema_is_applied() {
        let catalog = Catalog::nhl(Path::new("/lake"), "nhl_raw").unwrap();
        assert!(catalog.iter().all(|e| e.descriptor.schema_name() == "nhl_raw"));
    }
}
