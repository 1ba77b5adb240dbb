//! Named-placeholder templates
//!
//! Endpoint URLs and file names are written as `raw_{game_id}_details.json`.
//! Placeholders are resolved from [`Params`]; `{{` and `}}` produce literal braces.

use crate::error::{PuckError, Result};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Placeholder values used to render a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Display) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Display> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Render `template`, replacing every `{name}` with its value in `params`
pub fn render(template: &str, params: &Params) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            },
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }

                if !closed {
                    return Err(malformed(template, "unclosed '{'"));
                }
                if name.is_empty() {
                    return Err(malformed(template, "empty placeholder '{}'"));
                }

                let value = params.get(&name).ok_or_else(|| PuckError::MissingPlaceholder {
                    template: template.to_string(),
                    placeholder: name.clone(),
                })?;
                out.push_str(value);
            },
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            },
            '}' => return Err(malformed(template, "unmatched '}'")),
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Names of the placeholders a template expects, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' {
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            continue;
        }
        let name: String = chars.by_ref().take_while(|ch| *ch != '}').collect();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }

    names
}

fn malformed(template: &str, reason: &str) -> PuckError {
    PuckError::MalformedTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_placeholder() {
        let params = Params::new().with("game_id", 2023020001u64);
        let url = render("https://api-web.nhle.com/v1/gamecenter/{game_id}/boxscore", &params)
            .unwrap();
        assert_eq!(url, "https://api-web.nhle.com/v1/gamecenter/2023020001/boxscore");
    }

    #[test]
    fn test_render_multiple_placeholders() {
        let params: Params = [("team_id", "10"), ("season_id", "20232024"), ("game_type_id", "2")]
            .into_iter()
            .collect();
        let name = render("raw_stats_club_{team_id}_{season_id}_{game_type_id}.json", &params)
            .unwrap();
        assert_eq!(name, "raw_stats_club_10_20232024_2.json");
    }

    #[test]
    fn test_render_without_placeholders_ignores_params() {
        let params = Params::new().with("unused", 1);
        assert_eq!(render("all_season_ids.json", &params).unwrap(), "all_season_ids.json");
    }

    #[test]
    fn test_render_missing_placeholder() {
        let err = render("player_{player_id}_info.json", &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            PuckError::MissingPlaceholder { ref placeholder, .. } if placeholder == "player_id"
        ));
    }

    #[test]
    fn test_render_escaped_braces() {
        let params = Params::new().with("id", 7);
        assert_eq!(render("{{literal}}_{id}", &params).unwrap(), "{literal}_7");
    }

    #[test]
    fn test_render_malformed() {
        assert!(matches!(
            render("raw_{game_id", &Params::new()),
            Err(PuckError::MalformedTemplate { .. })
        ));
        assert!(render("raw_}", &Params::new()).is_err());
        assert!(render("raw_{}", &Params::new()).is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{player_id}_{season_id}_{game_type_id}.json"),
            vec!["player_id", "season_id", "game_type_id"]
        );
        assert!(placeholders("{{escaped}}.json").is_empty());
    }
}
