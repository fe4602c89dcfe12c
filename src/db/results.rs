use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::{db::Database, models::GazeResult};

use super::helpers::parse_risk_level;

const RESULT_COLUMNS: &str = "id, child_id, predicted_class, confidence, risk_level, \
     scanpath_path, heatmap_path, gaze_data_path, created_at";

fn row_to_result(row: &Row) -> Result<GazeResult> {
    let risk_level: String = row.get("risk_level")?;

    Ok(GazeResult {
        id: row.get("id")?,
        child_id: row.get("child_id")?,
        predicted_class: row.get("predicted_class")?,
        confidence: row.get("confidence")?,
        risk_level: parse_risk_level(&risk_level)?,
        scanpath_path: row.get("scanpath_path")?,
        heatmap_path: row.get("heatmap_path")?,
        gaze_data_path: row.get("gaze_data_path")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Insert or refresh a result. Results are immutable upstream, so a
    /// second write only bumps `cached_at`.
    pub async fn upsert_result(&self, result: &GazeResult) -> Result<()> {
        let record = result.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO cached_results (id, child_id, predicted_class, confidence, risk_level,
                     scanpath_path, heatmap_path, gaze_data_path, created_at, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     child_id = excluded.child_id,
                     predicted_class = excluded.predicted_class,
                     confidence = excluded.confidence,
                     risk_level = excluded.risk_level,
                     scanpath_path = excluded.scanpath_path,
                     heatmap_path = excluded.heatmap_path,
                     gaze_data_path = excluded.gaze_data_path,
                     created_at = excluded.created_at,
                     cached_at = excluded.cached_at",
                params![
                    record.id,
                    record.child_id,
                    record.predicted_class,
                    record.confidence,
                    record.risk_level.as_str(),
                    record.scanpath_path,
                    record.heatmap_path,
                    record.gaze_data_path,
                    record.created_at,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| "failed to cache result")?;
            Ok(())
        })
        .await
    }

    pub async fn latest_result_for_child(&self, child_id: &str) -> Result<Option<GazeResult>> {
        let child_id = child_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM cached_results
                 WHERE child_id = ?1
                 ORDER BY created_at DESC, cached_at DESC
                 LIMIT 1"
            ))?;

            let row = stmt
                .query_row(params![child_id], |row| Ok(row_to_result(row)))
                .optional()?;
            row.transpose()
        })
        .await
    }

    pub async fn list_cached_results(&self) -> Result<Vec<GazeResult>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM cached_results
                 ORDER BY created_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_result(row)?);
            }
            Ok(results)
        })
        .await
    }
}
