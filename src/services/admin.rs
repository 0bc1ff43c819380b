// Administrative seeding of users and groups
// Stands in for the identity and admin collaborators

use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::infrastructure::EntityStore;
use crate::models::{Group, NewGroup, User};
use crate::services::validation;

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn EntityStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn create_user(&self, username: &str) -> AppResult<User> {
        let mut errors = FieldErrors::new();
        let username = validation::validate_username(username, &mut errors);
        errors.into_result()?;

        let user = self.store.create_user(&username).await?.ok_or_else(|| {
            AppError::Validation(FieldErrors::single(
                "username",
                "A user with that username already exists.",
            ))
        })?;
        info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub async fn create_group(&self, group: NewGroup) -> AppResult<Group> {
        let mut errors = FieldErrors::new();
        let title = validation::validate_title(&group.title, &mut errors);
        let slug = validation::validate_slug(&group.slug, &mut errors);
        errors.into_result()?;

        let group = self
            .store
            .create_group(NewGroup {
                title,
                slug,
                description: group.description.trim().to_string(),
            })
            .await?
            .ok_or_else(|| {
                AppError::Validation(FieldErrors::single(
                    "slug",
                    "Group with this Slug already exists.",
                ))
            })?;
        info!(group_id = %group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    /// Posts in the group survive with their group cleared.
    pub async fn delete_group(&self, slug: &str) -> AppResult<()> {
        let group = self
            .store
            .find_group(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group '{}' not found", slug)))?;
        self.store.delete_group(group.id).await?;
        info!(group_id = %group.id, slug, "group deleted");
        Ok(())
    }
}
