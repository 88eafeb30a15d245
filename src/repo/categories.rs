use sqlx::PgExecutor;

use uuid::Uuid;

use crate::model::{Category, NewCategory};

/// Outcome of [`CategoriesRepo::delete_if_empty`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDeletion {
    Deleted,
    NotFound,
    /// Posts still reference the category; nothing was deleted
    NotEmpty,
}

pub struct CategoriesRepo;

impl CategoriesRepo {
    #[tracing::instrument(name = "Insert blog category", skip(executor))]
    pub async fn insert<'con>(
        executor: impl PgExecutor<'con>,
        new_category: &NewCategory,
    ) -> sqlx::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("insert into blog_categories(id, name, title, description) values ($1, $2, $3, $4)")
            .bind(id)
            .bind(&new_category.name)
            .bind(&new_category.title)
            .bind(&new_category.description)
            .execute(executor)
            .await?;
        Ok(id)
    }

    #[tracing::instrument(name = "Fetch blog category", skip(executor))]
    pub async fn fetch_by_id<'con>(
        executor: impl PgExecutor<'con>,
        id: Uuid,
    ) -> sqlx::Result<Option<Category>> {
        sqlx::query_as("select id, name, title, description from blog_categories where id=$1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Delete a category unless a post still belongs to it
    #[tracing::instrument(name = "Delete blog category", skip(executor))]
    pub async fn delete_if_empty<'con>(
        executor: impl PgExecutor<'con>,
        id: Uuid,
    ) -> sqlx::Result<CategoryDeletion> {
        // One statement, so a post added concurrently cannot slip in between
        // the emptiness check and the delete
        let (existed, deleted): (bool, bool) = sqlx::query_as(
            r#"
            with target as (
                select id from blog_categories where id = $1
            ), removed as (
                delete from blog_categories c
                where c.id = $1
                  and not exists (select 1 from blog_posts p where p.category_id = c.id)
                returning c.id
            )
            select exists(select 1 from target), exists(select 1 from removed)
            "#,
        )
        .bind(id)
        .fetch_one(executor)
        .await?;

        Ok(match (existed, deleted) {
            (_, true) => CategoryDeletion::Deleted,
            (true, false) => CategoryDeletion::NotEmpty,
            (false, false) => CategoryDeletion::NotFound,
        })
    }
}
