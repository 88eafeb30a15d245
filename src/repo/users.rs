use std::collections::HashSet;

use chrono::{DateTime, Utc};

use secrecy::{ExposeSecret, Secret};

use sqlx::PgExecutor;

use uuid::Uuid;

use crate::domain::{EmailAddress, Role};
use crate::model::{NewUser, Principal, Subscriber, UserCredentials};

const PRINCIPAL_SELECT: &str = r#"
    select u.id, u.email, u.name, u.is_active, u.is_deleted, u.deleted_at,
           coalesce(array_agg(r.name) filter (where r.name is not null), '{}') as roles
    from users u
    left join user_roles ur on ur.user_id = u.id
    left join roles r on r.id = ur.role_id
"#;

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    email: String,
    name: String,
    is_active: bool,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    roles: Vec<String>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        let roles: HashSet<Role> = row
            .roles
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(role) => Some(role),
                Err(error) => {
                    tracing::warn!(user.id = %row.id, "Ignoring stored role: {}", error);
                    None
                }
            })
            .collect();

        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            roles,
            active: row.is_active,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
        }
    }
}

/// Repository for the `users` and `user_roles` tables
pub struct UsersRepo;

impl UsersRepo {
    #[tracing::instrument("Insert a new user record", skip(executor, new_user), fields(email = %new_user.email))]
    pub async fn insert<'conn>(
        executor: impl PgExecutor<'conn>,
        new_user: &NewUser,
    ) -> sqlx::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "insert into users(id, email, password_hash, name, is_password_set) values ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(new_user.email.as_ref())
        .bind(new_user.password_hash.expose_secret())
        .bind(new_user.name.as_ref())
        .bind(new_user.password_set)
        .execute(executor)
        .await?;
        Ok(id)
    }

    #[tracing::instrument("Fetch user credentials", skip(executor))]
    pub async fn fetch_credentials_by_email<'conn>(
        executor: impl PgExecutor<'conn>,
        email: &EmailAddress,
    ) -> sqlx::Result<Option<UserCredentials>> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("select id, password_hash from users where email=$1")
                .bind(email.as_ref())
                .fetch_optional(executor)
                .await?;

        Ok(row.map(|(id, password_hash)| UserCredentials {
            id,
            password_hash: Secret::new(password_hash),
        }))
    }

    #[tracing::instrument("Fetch principal", skip(executor))]
    pub async fn fetch_principal<'conn>(
        executor: impl PgExecutor<'conn>,
        id: Uuid,
    ) -> sqlx::Result<Option<Principal>> {
        let query = format!("{} where u.id = $1 group by u.id", PRINCIPAL_SELECT);
        let row: Option<PrincipalRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row.map(Principal::from))
    }

    #[tracing::instrument("Fetch principal by email", skip(executor))]
    pub async fn fetch_principal_by_email<'conn>(
        executor: impl PgExecutor<'conn>,
        email: &EmailAddress,
    ) -> sqlx::Result<Option<Principal>> {
        let query = format!("{} where u.email = $1 group by u.id", PRINCIPAL_SELECT);
        let row: Option<PrincipalRow> = sqlx::query_as(&query)
            .bind(email.as_ref())
            .fetch_optional(executor)
            .await?;
        Ok(row.map(Principal::from))
    }

    /// Grant a role. Granting a role the user already holds is a no-op.
    #[tracing::instrument("Add role to user", skip(executor))]
    pub async fn add_role<'conn>(
        executor: impl PgExecutor<'conn>,
        user_id: Uuid,
        role: Role,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            insert into user_roles(user_id, role_id)
            select $1, id from roles where name = $2
            on conflict do nothing
            "#,
        )
        .bind(user_id)
        .bind(role.as_ref())
        .execute(executor)
        .await?;
        Ok(())
    }

    #[tracing::instrument("Remove role from user", skip(executor))]
    pub async fn remove_role<'conn>(
        executor: impl PgExecutor<'conn>,
        user_id: Uuid,
        role: Role,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            delete from user_roles
            using roles
            where user_roles.role_id = roles.id
              and user_roles.user_id = $1
              and roles.name = $2
            "#,
        )
        .bind(user_id)
        .bind(role.as_ref())
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Returns `false` when no such user exists or it has been deleted;
    /// deleted accounts stay inactive for good.
    #[tracing::instrument("Set user active flag", skip(executor))]
    pub async fn set_active<'conn>(
        executor: impl PgExecutor<'conn>,
        user_id: Uuid,
        active: bool,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query("update users set is_active=$2 where id=$1 and not is_deleted")
            .bind(user_id)
            .bind(active)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Scrub personal data and mark the account deleted. Posts and comments
    /// are kept.
    #[tracing::instrument("Anonymize user", skip(executor))]
    pub async fn anonymize<'conn>(
        executor: impl PgExecutor<'conn>,
        user_id: Uuid,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            update users
            set email = 'anonymized_' || id::text || '@example.com',
                name = 'Deleted user',
                is_deleted = true,
                deleted_at = now(),
                is_active = false
            where id = $1
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Hard delete; the schema cascades to the user's posts and comments
    #[tracing::instrument("Delete user permanently", skip(executor))]
    pub async fn delete_permanently<'conn>(
        executor: impl PgExecutor<'conn>,
        user_id: Uuid,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query("delete from users where id=$1")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument("Update user password", skip(executor, password_hash))]
    pub async fn update_password<'conn>(
        executor: impl PgExecutor<'conn>,
        email: &EmailAddress,
        password_hash: Secret<String>,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "update users set password_hash=$2, is_password_set=true where email=$1 and not is_deleted",
        )
        .bind(email.as_ref())
        .bind(password_hash.expose_secret())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Current notification audience: active users holding the subscriber role
    #[tracing::instrument("Fetch subscribers", skip(executor))]
    pub async fn fetch_subscribers<'conn>(
        executor: impl PgExecutor<'conn>,
    ) -> sqlx::Result<Vec<Subscriber>> {
        sqlx::query_as(
            r#"
            select u.id, u.name, u.email
            from users u
            join user_roles ur on ur.user_id = u.id
            join roles r on r.id = ur.role_id
            where r.name = $1 and u.is_active and not u.is_deleted
            order by u.created_at
            "#,
        )
        .bind(Role::Subscriber.as_ref())
        .fetch_all(executor)
        .await
    }
}
