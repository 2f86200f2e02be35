//! Command template repository.

use async_trait::async_trait;
use kiln_core::{CommandTemplate, ExecutionPipeline, ResourceId};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct TemplateRow {
    id: uuid::Uuid,
    name: String,
    depend_on: Json<Vec<ResourceId>>,
    pipelines: Json<Vec<ExecutionPipeline>>,
}

impl From<TemplateRow> for CommandTemplate {
    fn from(row: TemplateRow) -> Self {
        CommandTemplate {
            id: row.id.into(),
            name: row.name,
            depend_on: row.depend_on.0,
            pipelines: row.pipelines.0,
        }
    }
}

#[async_trait]
pub trait TemplateRepo: Send + Sync {
    /// Insert a template; a taken name is `Duplicate`.
    async fn create(&self, template: CommandTemplate) -> DbResult<CommandTemplate>;
    async fn get_by_id(&self, id: ResourceId) -> DbResult<CommandTemplate>;
    async fn get_by_name(&self, name: &str) -> DbResult<CommandTemplate>;
    async fn exists_by_name(&self, name: &str) -> DbResult<bool>;
    async fn list(&self) -> DbResult<Vec<CommandTemplate>>;
}

/// PostgreSQL implementation of TemplateRepo.
pub struct PgTemplateRepo {
    pool: PgPool,
}

impl PgTemplateRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepo for PgTemplateRepo {
    async fn create(&self, template: CommandTemplate) -> DbResult<CommandTemplate> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            INSERT INTO command_templates (id, name, depend_on, pipelines)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(template.id.as_uuid())
        .bind(&template.name)
        .bind(Json(&template.depend_on))
        .bind(Json(&template.pipelines))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Duplicate(_) => {
                DbError::Duplicate(format!("command template '{}'", template.name))
            }
            other => other,
        })?;
        Ok(row.into())
    }

    async fn get_by_id(&self, id: ResourceId) -> DbResult<CommandTemplate> {
        let row =
            sqlx::query_as::<_, TemplateRow>("SELECT * FROM command_templates WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("command template {}", id)))?;
        Ok(row.into())
    }

    async fn get_by_name(&self, name: &str) -> DbResult<CommandTemplate> {
        let row =
            sqlx::query_as::<_, TemplateRow>("SELECT * FROM command_templates WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("command template '{}'", name)))?;
        Ok(row.into())
    }

    async fn exists_by_name(&self, name: &str) -> DbResult<bool> {
        let exists =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM command_templates WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn list(&self) -> DbResult<Vec<CommandTemplate>> {
        let rows =
            sqlx::query_as::<_, TemplateRow>("SELECT * FROM command_templates ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(CommandTemplate::from).collect())
    }
}
