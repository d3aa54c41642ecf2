//! Circle definitions: validation and persistence.

use std::sync::Arc;

use keyward_core::{now_millis, CircleId};
use keyward_grants::{
    CircleDefinition, CreateCircleRequest, GrantsError, PermissionKey, SYSTEM_CIRCLE_ID,
};
use keyward_store::{Category, Store, StoreExt};

use crate::drives::{resolve_drive, DriveResolver};
use crate::error::{ClientErrorCode, HostError, Result};

/// Manages circle definitions.
///
/// Disabling a circle does not touch member grants; consumers of circle
/// grants check [`CircleDefinitionService::is_enabled`] instead.
pub struct CircleDefinitionService<S, D> {
    store: Arc<S>,
    drives: Arc<D>,
}

impl<S: Store, D: DriveResolver> CircleDefinitionService<S, D> {
    pub fn new(store: Arc<S>, drives: Arc<D>) -> Self {
        Self { store, drives }
    }

    /// Validate and persist a new circle.
    pub async fn create(&self, request: CreateCircleRequest) -> Result<CircleDefinition> {
        if request.id == SYSTEM_CIRCLE_ID {
            return Err(HostError::client(
                ClientErrorCode::CannotModifySystemCircle,
                "the system circle id is reserved",
            ));
        }
        if self.get_circle(&request.id).await?.is_some() {
            return Err(HostError::client(
                ClientErrorCode::CircleAlreadyExists,
                format!("circle {} already exists", request.id),
            ));
        }

        let definition = CircleDefinition::from_request(request, now_millis());
        self.validate(&definition).await?;
        self.save(&definition).await?;

        tracing::info!(circle = %definition.id, name = %definition.name, "circle created");
        Ok(definition)
    }

    /// Replace a circle's name, description, drives and permissions.
    ///
    /// Creation time and the disabled flag are kept from the stored copy.
    pub async fn update(&self, definition: CircleDefinition) -> Result<CircleDefinition> {
        let existing = self.require_circle(&definition.id).await?;

        let updated = CircleDefinition {
            created: existing.created,
            disabled: existing.disabled,
            last_updated: now_millis(),
            ..definition
        };
        self.validate(&updated).await?;
        self.save(&updated).await?;

        tracing::info!(circle = %updated.id, "circle updated");
        Ok(updated)
    }

    pub async fn disable(&self, id: &CircleId) -> Result<()> {
        self.set_disabled(id, true).await
    }

    pub async fn enable(&self, id: &CircleId) -> Result<()> {
        self.set_disabled(id, false).await
    }

    async fn set_disabled(&self, id: &CircleId, disabled: bool) -> Result<()> {
        let mut definition = self.require_circle(id).await?;
        definition.disabled = disabled;
        definition.last_updated = now_millis();
        self.save(&definition).await?;
        tracing::info!(circle = %id, disabled, "circle state changed");
        Ok(())
    }

    /// Whether the circle exists and is enabled.
    pub async fn is_enabled(&self, id: &CircleId) -> Result<bool> {
        Ok(self
            .get_circle(id)
            .await?
            .is_some_and(|c| c.is_enabled()))
    }

    /// Delete a circle definition.
    ///
    /// Does not consult the membership cache; use
    /// [`CircleMembershipService::delete_circle`](crate::CircleMembershipService::delete_circle)
    /// to refuse deletion of circles that still have members.
    pub async fn delete(&self, id: &CircleId) -> Result<()> {
        if *id == SYSTEM_CIRCLE_ID {
            return Err(HostError::client(
                ClientErrorCode::CannotModifySystemCircle,
                "the system circle cannot be deleted",
            ));
        }
        if !self.store.delete(Category::CircleDefinition, id.as_bytes()).await? {
            return Err(not_found(id));
        }
        tracing::info!(circle = %id, "circle deleted");
        Ok(())
    }

    /// Create the system circle if it does not exist yet. Idempotent.
    pub async fn create_system_circle(&self) -> Result<CircleDefinition> {
        if let Some(existing) = self.get_circle(&SYSTEM_CIRCLE_ID).await? {
            return Ok(existing);
        }
        let definition = CircleDefinition::system(now_millis());
        self.save(&definition).await?;
        tracing::info!("system circle created");
        Ok(definition)
    }

    /// Grant or withdraw a permission key on the system circle.
    pub async fn update_system_circle_permission(&self, key: i32, enabled: bool) -> Result<()> {
        if !PermissionKey::is_circle_eligible(key) {
            return Err(GrantsError::InvalidPermissionKey(key).into());
        }
        let mut definition = self.create_system_circle().await?;
        let changed = if enabled {
            definition.permissions.insert(key)
        } else {
            definition.permissions.remove(key)
        };
        if changed {
            definition.last_updated = now_millis();
            self.save(&definition).await?;
        }
        Ok(())
    }

    pub async fn get_circle(&self, id: &CircleId) -> Result<Option<CircleDefinition>> {
        Ok(self
            .store
            .get_value(Category::CircleDefinition, id.as_bytes())
            .await?)
    }

    /// All circles ordered by id, optionally including the system circle.
    pub async fn get_circles(&self, include_system: bool) -> Result<Vec<CircleDefinition>> {
        let circles: Vec<CircleDefinition> =
            self.store.list_values(Category::CircleDefinition).await?;
        Ok(circles
            .into_iter()
            .filter(|c| include_system || !c.is_system())
            .collect())
    }

    pub(crate) async fn require_circle(&self, id: &CircleId) -> Result<CircleDefinition> {
        self.get_circle(id).await?.ok_or_else(|| not_found(id))
    }

    /// Shape checks, then every drive must exist and accept its permission.
    async fn validate(&self, definition: &CircleDefinition) -> Result<()> {
        definition.validate_shape()?;
        for request in &definition.drive_grants {
            let drive = resolve_drive(self.drives.as_ref(), request.drive()).await?;
            drive.check_circle_permission(request.permission())?;
        }
        Ok(())
    }

    async fn save(&self, definition: &CircleDefinition) -> Result<()> {
        self.store
            .put_value(Category::CircleDefinition, definition.id.as_bytes(), definition)
            .await?;
        Ok(())
    }
}

fn not_found(id: &CircleId) -> HostError {
    HostError::client(ClientErrorCode::CircleNotFound, format!("no circle {}", id))
}
