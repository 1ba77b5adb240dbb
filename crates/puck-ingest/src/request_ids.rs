//! Request parameters from staging views
//!
//! Dynamic endpoints are driven by views such as
//! `staging.vw_stg_request_games_id` listing the ids still to fetch.

use crate::catalog::RequestSource;
use crate::error::{IngestError, IngestResult};
use puck_common::template::Params;
use puck_loader::descriptor::validate_identifier;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

pub struct RequestIdSource {
    pool: PgPool,
    schema: String,
}

impl RequestIdSource {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Distinct values of `columns` in `view`, as text, one `Vec` per row
    ///
    /// With `bool_filter = Some((column, value))` only rows where `column IS
    /// value` are returned. Rows holding a NULL are dropped.
    pub async fn fetch_ids(
        &self,
        view: &str,
        columns: &[&str],
        bool_filter: Option<(&str, bool)>,
    ) -> IngestResult<Vec<Vec<String>>> {
        let sql = build_query(&self.schema, view, columns, bool_filter)?;
        let qualified_view = format!("{}.{}", self.schema, view);
        debug!(view = %qualified_view, sql = %sql, "Reading request ids");

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IngestError::RequestIds {
                view: qualified_view.clone(),
                source: e,
            })?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                let value: Option<String> = row.try_get(index).map_err(|e| IngestError::RequestIds {
                    view: qualified_view.clone(),
                    source: e,
                })?;
                values.push(value);
            }

            match values.into_iter().collect::<Option<Vec<String>>>() {
                Some(values) => ids.push(values),
                None => warn!(view = %qualified_view, "Skipping request row with NULL value"),
            }
        }

        Ok(ids)
    }

    /// Rows for a catalog request source, as template parameters
    pub async fn fetch_params(&self, source: &RequestSource) -> IngestResult<Vec<Params>> {
        let filter = source.missing_flag.map(|flag| (flag, false));
        let rows = self.fetch_ids(source.view, source.columns, filter).await?;
        Ok(rows.iter().map(|row| to_params(source.columns, row)).collect())
    }
}

/// Pair column names with one row of values
pub fn to_params(columns: &[&str], row: &[String]) -> Params {
    columns.iter().copied().zip(row.iter()).collect()
}

fn build_query(
    schema: &str,
    view: &str,
    columns: &[&str],
    bool_filter: Option<(&str, bool)>,
) -> IngestResult<String> {
    validate_identifier("schema", schema)?;
    validate_identifier("view", view)?;
    if columns.is_empty() {
        return Err(IngestError::config(format!("{}.{}: no columns requested", schema, view)));
    }

    let mut selected = Vec::with_capacity(columns.len());
    for column in columns {
        validate_identifier("column", column)?;
        selected.push(format!("\"{}\"::text", column));
    }

    let mut sql = format!(
        "SELECT DISTINCT {} FROM \"{}\".\"{}\"",
        selected.join(", "),
        schema,
        view
    );

    if let Some((column, value)) = bool_filter {
        validate_identifier("column", column)?;
        sql.push_str(&format!(
            " WHERE \"{}\" IS {}",
            column,
            if value { "TRUE" } else { "FALSE" }
        ));
    }

    let order: Vec<String> = (1..=columns.len()).map(|i| i.to_string()).collect();
    sql.push_str(&format!(" ORDER BY {}", order.join(", ")));

    Ok(sql)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_with_filter() {
        let sql = build_query(
            "staging",
            "vw_stg_request_games_id",
            &["game_id"],
            Some(("has_play_by_play", false)),
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT \"game_id\"::text FROM \"staging\".\"vw_stg_request_games_id\" \
             WHERE \"has_play_by_play\" IS FALSE ORDER BY 1"
        );
    }

    #[test]
    fn test_query_multiple_columns() {
        let sql = build_query(
            "staging",
            "vw_stg_request_teams_seasons_gametypes_id",
            &["team_id", "season_id", "game_type_id"],
            None,
        )
        .unwrap();
        assert!(sql.starts_with("SELECT DISTINCT \"team_id\"::text, \"season_id\"::text, \"game_type_id\"::text"));
        assert!(sql.ends_with("ORDER BY 1, 2, 3"));
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_query_rejects_unsafe_names() {
        assert!(build_query("staging", "v; drop table x", &["id"], None).is_err());
        assert!(build_query("staging", "v", &["id\""], None).is_err());
        assert!(build_query("staging", "v", &["id"], Some(("flag or 1=1", true))).is_err());
        assert!(build_query("staging", "v", &[], None).is_err());
    }

    #[test]
    fn test_to_params() {
        let row = vec!["8478402".to_string(), "20232024".to_string(), "2".to_string()];
        let params = to_params(&["player_id", "season_id", "game_type_id"], &row);
        assert_eq!(params.get("player_id"), Some("8478402"));
        assert_eq!(params.get("game_type_id"), Some("2"));
    }
}
