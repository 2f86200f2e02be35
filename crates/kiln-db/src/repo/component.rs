//! Component repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiln_core::{CommandTemplateInstance, Component, ResourceId};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::{DbError, DbResult};

/// Database row for components.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ComponentRow {
    id: uuid::Uuid,
    name: String,
    repository_url: Option<String>,
    build_os: Json<Vec<String>>,
    branches: Json<Vec<String>>,
    template_instances: Json<Vec<CommandTemplateInstance>>,
    owned_templates: Json<Vec<ResourceId>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ComponentRow> for Component {
    fn from(row: ComponentRow) -> Self {
        Component {
            id: row.id.into(),
            name: row.name,
            repository_url: row.repository_url,
            build_os: row.build_os.0,
            branches: row.branches.0,
            template_instances: row.template_instances.0,
            owned_templates: row.owned_templates.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
pub trait ComponentRepo: Send + Sync {
    /// Insert a component; a taken name is `Duplicate`.
    async fn create(&self, component: Component) -> DbResult<Component>;
    async fn get_by_id(&self, id: ResourceId) -> DbResult<Component>;
    async fn get_by_name(&self, name: &str) -> DbResult<Component>;
    async fn exists_by_name(&self, name: &str) -> DbResult<bool>;
    async fn list(&self) -> DbResult<Vec<Component>>;
    async fn delete(&self, id: ResourceId) -> DbResult<()>;
}

/// PostgreSQL implementation of ComponentRepo.
pub struct PgComponentRepo {
    pool: PgPool,
}

impl PgComponentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComponentRepo for PgComponentRepo {
    async fn create(&self, component: Component) -> DbResult<Component> {
        let row = sqlx::query_as::<_, ComponentRow>(
            r#"
            INSERT INTO components (
                id, name, repository_url, build_os, branches,
                template_instances, owned_templates, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(component.id.as_uuid())
        .bind(&component.name)
        .bind(&component.repository_url)
        .bind(Json(&component.build_os))
        .bind(Json(&component.branches))
        .bind(Json(&component.template_instances))
        .bind(Json(&component.owned_templates))
        .bind(component.created_at)
        .bind(component.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Duplicate(_) => DbError::Duplicate(format!("component '{}'", component.name)),
            other => other,
        })?;
        Ok(row.into())
    }

    async fn get_by_id(&self, id: ResourceId) -> DbResult<Component> {
        let row = sqlx::query_as::<_, ComponentRow>("SELECT * FROM components WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("component {}", id)))?;
        Ok(row.into())
    }

    async fn get_by_name(&self, name: &str) -> DbResult<Component> {
        let row = sqlx::query_as::<_, ComponentRow>("SELECT * FROM components WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("component '{}'", name)))?;
        Ok(row.into())
    }

    async fn exists_by_name(&self, name: &str) -> DbResult<bool> {
        let exists =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM components WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn list(&self) -> DbResult<Vec<Component>> {
        let rows = sqlx::query_as::<_, ComponentRow>("SELECT * FROM components ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Component::from).collect())
    }

    async fn delete(&self, id: ResourceId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM components WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("component {}", id)));
        }
        Ok(())
    }
}
