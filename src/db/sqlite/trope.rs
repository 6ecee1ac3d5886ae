//! SQLite TropeRepository implementation.

use std::collections::{HashMap, HashSet};

use sqlx::sqlite::SqliteRow;
use futures_util::FutureExt;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::helpers::{ensure_exists, in_transaction, parse_column};
use crate::db::utils::current_timestamp;
use crate::db::{
    CompletionStatus, DbError, DbResult, Id, NewTrope, NewTropeInstance, NewTropeScene,
    TrackedTropeScene, Trope, TropeCategory, TropeDetail, TropeInstance, TropeRepository,
    TropeScene, TropeSceneType, TropeUsage,
};

const SELECT_TROPE: &str =
    "SELECT id, series_id, name, category, description, created_at, updated_at FROM tropes";

const SELECT_SCENE_TYPE: &str = "SELECT st.id, st.trope_id, st.scene_function, st.scene_description, \
     st.typical_placement, st.required, st.sequence_order FROM trope_scene_types st";

const SELECT_INSTANCE: &str = "SELECT ti.id, ti.trope_id, ti.book_id, ti.instance_notes, \
     ti.subversion_notes, ti.completion_status, ti.created_at, ti.updated_at FROM trope_instances ti";

const SELECT_TROPE_SCENE: &str = "SELECT ts.id, ts.instance_id, ts.scene_type_id, ts.chapter_id, \
     ts.scene_id, ts.scene_summary, ts.effectiveness_rating, ts.variation_notes FROM trope_scenes ts";

/// SQLx-backed trope repository.
pub struct SqliteTropeRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn trope_from_row(row: &SqliteRow) -> DbResult<Trope> {
    let category: String = row.try_get("category")?;
    Ok(Trope {
        id: row.try_get("id")?,
        series_id: row.try_get("series_id")?,
        name: row.try_get("name")?,
        category: parse_column(&category)?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn scene_type_from_row(row: &SqliteRow) -> DbResult<TropeSceneType> {
    let placement: Option<String> = row.try_get("typical_placement")?;
    Ok(TropeSceneType {
        id: row.try_get("id")?,
        trope_id: row.try_get("trope_id")?,
        scene_function: row.try_get("scene_function")?,
        scene_description: row.try_get("scene_description")?,
        typical_placement: placement.as_deref().map(parse_column).transpose()?,
        required: row.try_get("required")?,
        sequence_order: row.try_get("sequence_order")?,
    })
}

fn instance_from_row(row: &SqliteRow) -> DbResult<TropeInstance> {
    let status: String = row.try_get("completion_status")?;
    Ok(TropeInstance {
        id: row.try_get("id")?,
        trope_id: row.try_get("trope_id")?,
        book_id: row.try_get("book_id")?,
        instance_notes: row.try_get("instance_notes")?,
        subversion_notes: row.try_get("subversion_notes")?,
        completion_status: parse_column(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn trope_scene_from_row(row: &SqliteRow) -> DbResult<TropeScene> {
    Ok(TropeScene {
        id: row.try_get("id")?,
        instance_id: row.try_get("instance_id")?,
        scene_type_id: row.try_get("scene_type_id")?,
        chapter_id: row.try_get("chapter_id")?,
        scene_id: row.try_get("scene_id")?,
        scene_summary: row.try_get("scene_summary")?,
        effectiveness_rating: row.try_get("effectiveness_rating")?,
        variation_notes: row.try_get("variation_notes")?,
    })
}

/// Completion after a scene was tracked.
///
/// The scene types that must be covered are the required ones, or every
/// scene type when none is marked required. A subverted instance stays
/// subverted.
pub(crate) fn recompute_status(
    current: CompletionStatus,
    scene_types: &[(Id, bool)],
    covered: &HashSet<Id>,
) -> (CompletionStatus, usize, usize) {
    let any_required = scene_types.iter().any(|(_, required)| *required);
    let needed: Vec<Id> = scene_types
        .iter()
        .filter(|(_, required)| *required || !any_required)
        .map(|(id, _)| *id)
        .collect();
    let done = needed.iter().filter(|id| covered.contains(id)).count();

    let status = match current {
        CompletionStatus::Subverted => CompletionStatus::Subverted,
        _ if !needed.is_empty() && done == needed.len() => CompletionStatus::Complete,
        _ => CompletionStatus::InProgress,
    };

    (status, done, needed.len())
}

impl<'a> SqliteTropeRepository<'a> {
    async fn scene_types_of(&self, trope_id: Id) -> DbResult<Vec<TropeSceneType>> {
        sqlx::query(&format!(
            "{} WHERE st.trope_id = ? ORDER BY st.sequence_order ASC, st.id ASC",
            SELECT_SCENE_TYPE
        ))
        .bind(trope_id)
        .fetch_all(self.pool)
        .await?
        .iter()
        .map(scene_type_from_row)
        .collect()
    }

    async fn get_instance(&self, id: Id) -> DbResult<TropeInstance> {
        let row = sqlx::query(&format!("{} WHERE ti.id = ?", SELECT_INSTANCE))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Trope instance", id))?;

        instance_from_row(&row)
    }
}

/// Insert a trope and its ordered scene types on `conn`.
async fn insert_trope(conn: &mut SqliteConnection, trope: &NewTrope) -> DbResult<Id> {
    let trope_id = sqlx::query(
        "INSERT INTO tropes (series_id, name, category, description) VALUES (?, ?, ?, ?)",
    )
    .bind(trope.series_id)
    .bind(&trope.name)
    .bind(trope.category.as_str())
    .bind(&trope.description)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::validation(format!(
            "Trope '{}' already exists in this series",
            trope.name
        )),
        other => other,
    })?
    .last_insert_rowid();

    for (index, scene_type) in trope.scene_types.iter().enumerate() {
        sqlx::query(
            "INSERT INTO trope_scene_types (trope_id, scene_function, scene_description, \
             typical_placement, required, sequence_order) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(trope_id)
        .bind(&scene_type.scene_function)
        .bind(&scene_type.scene_description)
        .bind(scene_type.typical_placement.map(|p| p.as_str()))
        .bind(scene_type.required)
        .bind(index as i64 + 1)
        .execute(&mut *conn)
        .await?;
    }

    Ok(trope_id)
}

/// Upsert one tracked scene on `conn` and recompute the instance's completion.
async fn upsert_trope_scene(
    conn: &mut SqliteConnection,
    scene: &NewTropeScene,
) -> DbResult<TrackedTropeScene> {
    let (trope_id, book_id, status): (Id, Id, String) = sqlx::query_as(
        "SELECT trope_id, book_id, completion_status FROM trope_instances WHERE id = ?",
    )
    .bind(scene.instance_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Trope instance", scene.instance_id))?;
    let current_status: CompletionStatus = parse_column(&status)?;

    let type_trope: Id = sqlx::query_scalar("SELECT trope_id FROM trope_scene_types WHERE id = ?")
        .bind(scene.scene_type_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Trope scene type", scene.scene_type_id))?;
    if type_trope != trope_id {
        return Err(DbError::validation(format!(
            "Scene type {} does not belong to trope {}",
            scene.scene_type_id, trope_id
        )));
    }

    if let Some(chapter_id) = scene.chapter_id {
        let chapter_book: Id = sqlx::query_scalar("SELECT book_id FROM chapters WHERE id = ?")
            .bind(chapter_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Chapter", chapter_id))?;
        if chapter_book != book_id {
            return Err(DbError::validation(format!(
                "Chapter {} is not part of book {}",
                chapter_id, book_id
            )));
        }
    }

    if let Some(scene_id) = scene.scene_id {
        let (scene_chapter, scene_book): (Id, Id) = sqlx::query_as(
            "SELECT cs.chapter_id, c.book_id FROM chapter_scenes cs \
             JOIN chapters c ON c.id = cs.chapter_id WHERE cs.id = ?",
        )
        .bind(scene_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Scene", scene_id))?;

        match scene.chapter_id {
            Some(chapter_id) if chapter_id != scene_chapter => {
                return Err(DbError::validation(format!(
                    "Scene {} is not part of chapter {}",
                    scene_id, chapter_id
                )));
            }
            None if scene_book != book_id => {
                return Err(DbError::validation(format!(
                    "Scene {} is not part of book {}",
                    scene_id, book_id
                )));
            }
            _ => {}
        }
    }

    let row = sqlx::query(
        "INSERT INTO trope_scenes (instance_id, scene_type_id, chapter_id, scene_id, \
         scene_summary, effectiveness_rating, variation_notes) VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (instance_id, scene_type_id) DO UPDATE SET \
         chapter_id = excluded.chapter_id, scene_id = excluded.scene_id, \
         scene_summary = excluded.scene_summary, \
         effectiveness_rating = excluded.effectiveness_rating, \
         variation_notes = excluded.variation_notes \
         RETURNING id, instance_id, scene_type_id, chapter_id, scene_id, scene_summary, \
         effectiveness_rating, variation_notes",
    )
    .bind(scene.instance_id)
    .bind(scene.scene_type_id)
    .bind(scene.chapter_id)
    .bind(scene.scene_id)
    .bind(&scene.scene_summary)
    .bind(scene.effectiveness_rating)
    .bind(&scene.variation_notes)
    .fetch_one(&mut *conn)
    .await?;
    let tracked = trope_scene_from_row(&row)?;

    let scene_types: Vec<(Id, bool)> =
        sqlx::query_as("SELECT id, required FROM trope_scene_types WHERE trope_id = ?")
            .bind(trope_id)
            .fetch_all(&mut *conn)
            .await?;
    let covered: HashSet<Id> =
        sqlx::query_scalar::<_, Id>("SELECT scene_type_id FROM trope_scenes WHERE instance_id = ?")
            .bind(scene.instance_id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let (completion_status, required_covered, required_total) =
        recompute_status(current_status, &scene_types, &covered);

    sqlx::query("UPDATE trope_instances SET completion_status = ?, updated_at = ? WHERE id = ?")
        .bind(completion_status.as_str())
        .bind(current_timestamp())
        .bind(scene.instance_id)
        .execute(&mut *conn)
        .await?;

    Ok(TrackedTropeScene {
        scene: tracked,
        completion_status,
        required_covered,
        required_total,
    })
}

impl<'a> TropeRepository for SqliteTropeRepository<'a> {
    async fn create(&self, trope: &NewTrope) -> DbResult<TropeDetail> {
        if trope.name.trim().is_empty() {
            return Err(DbError::validation("Trope name cannot be empty"));
        }
        if let Some(blank) = trope
            .scene_types
            .iter()
            .position(|st| st.scene_function.trim().is_empty())
        {
            return Err(DbError::validation(format!(
                "Scene type {} has an empty scene_function",
                blank + 1
            )));
        }

        let trope = trope.clone();
        let trope_id = in_transaction(self.pool, move |conn| {
            async move { insert_trope(conn, &trope).await }.boxed()
        })
        .await?;

        self.get(trope_id).await
    }

    async fn get(&self, id: Id) -> DbResult<TropeDetail> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_TROPE))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Trope", id))?;

        Ok(TropeDetail {
            trope: trope_from_row(&row)?,
            scene_types: self.scene_types_of(id).await?,
        })
    }

    async fn list(
        &self,
        series_id: Id,
        category: Option<TropeCategory>,
    ) -> DbResult<Vec<TropeDetail>> {
        let tropes = match category {
            Some(category) => {
                sqlx::query(&format!(
                    "{} WHERE series_id = ? AND category = ? ORDER BY name ASC",
                    SELECT_TROPE
                ))
                .bind(series_id)
                .bind(category.as_str())
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("{} WHERE series_id = ? ORDER BY name ASC", SELECT_TROPE))
                    .bind(series_id)
                    .fetch_all(self.pool)
                    .await?
            }
        }
        .iter()
        .map(trope_from_row)
        .collect::<DbResult<Vec<_>>>()?;

        let mut scene_types: HashMap<Id, Vec<TropeSceneType>> = HashMap::new();
        for row in sqlx::query(&format!(
            "{} JOIN tropes t ON t.id = st.trope_id WHERE t.series_id = ? \
             ORDER BY st.sequence_order ASC, st.id ASC",
            SELECT_SCENE_TYPE
        ))
        .bind(series_id)
        .fetch_all(self.pool)
        .await?
        .iter()
        {
            let scene_type = scene_type_from_row(row)?;
            scene_types
                .entry(scene_type.trope_id)
                .or_default()
                .push(scene_type);
        }

        Ok(tropes
            .into_iter()
            .map(|trope| TropeDetail {
                scene_types: scene_types.remove(&trope.id).unwrap_or_default(),
                trope,
            })
            .collect())
    }

    async fn create_instance(&self, instance: &NewTropeInstance) -> DbResult<TropeInstance> {
        let trope_series: Id = sqlx::query_scalar("SELECT series_id FROM tropes WHERE id = ?")
            .bind(instance.trope_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Trope", instance.trope_id))?;

        let book_series: Id = sqlx::query_scalar("SELECT series_id FROM books WHERE id = ?")
            .bind(instance.book_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Book", instance.book_id))?;

        if trope_series != book_series {
            return Err(DbError::validation(format!(
                "Book {} is not part of the series trope {} belongs to",
                instance.book_id, instance.trope_id
            )));
        }

        let id = sqlx::query(
            "INSERT INTO trope_instances (trope_id, book_id, instance_notes, subversion_notes, completion_status) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(instance.trope_id)
        .bind(instance.book_id)
        .bind(&instance.instance_notes)
        .bind(&instance.subversion_notes)
        .bind(instance.completion_status.as_str())
        .execute(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::validation(format!(
                "Trope {} already has an instance in book {}",
                instance.trope_id, instance.book_id
            )),
            other => other,
        })?
        .last_insert_rowid();

        self.get_instance(id).await
    }

    async fn track_scene(&self, scene: &NewTropeScene) -> DbResult<TrackedTropeScene> {
        if let Some(rating) = scene.effectiveness_rating
            && !(1..=10).contains(&rating)
        {
            return Err(DbError::validation(format!(
                "Effectiveness rating must be between 1 and 10, got {}",
                rating
            )));
        }

        let scene = scene.clone();
        in_transaction(self.pool, move |conn| {
            async move { upsert_trope_scene(conn, &scene).await }.boxed()
        })
        .await
    }

    async fn usage(&self, series_id: Id) -> DbResult<Vec<TropeUsage>> {
        ensure_exists(self.pool, "series", "Series", series_id).await?;
        let tropes = self.list(series_id, None).await?;

        let mut scenes: HashMap<Id, Vec<TropeScene>> = HashMap::new();
        for row in sqlx::query(&format!(
            "{} JOIN trope_instances ti ON ti.id = ts.instance_id \
             JOIN tropes t ON t.id = ti.trope_id WHERE t.series_id = ? ORDER BY ts.id ASC",
            SELECT_TROPE_SCENE
        ))
        .bind(series_id)
        .fetch_all(self.pool)
        .await?
        .iter()
        {
            let scene = trope_scene_from_row(row)?;
            scenes.entry(scene.instance_id).or_default().push(scene);
        }

        let mut instances: HashMap<Id, Vec<(TropeInstance, Vec<TropeScene>)>> = HashMap::new();
        for row in sqlx::query(&format!(
            "{} JOIN tropes t ON t.id = ti.trope_id WHERE t.series_id = ? ORDER BY ti.id ASC",
            SELECT_INSTANCE
        ))
        .bind(series_id)
        .fetch_all(self.pool)
        .await?
        .iter()
        {
            let instance = instance_from_row(row)?;
            let tracked = scenes.remove(&instance.id).unwrap_or_default();
            instances
                .entry(instance.trope_id)
                .or_default()
                .push((instance, tracked));
        }

        Ok(tropes
            .into_iter()
            .map(|detail| TropeUsage {
                instances: instances.remove(&detail.trope.id).unwrap_or_default(),
                trope: detail.trope,
                scene_types: detail.scene_types,
            })
            .collect())
    }
}
