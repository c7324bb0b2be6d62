/*!
 * Catalog Service
 *
 * Administration of appointment types, operation types and resources.
 * Type writes are admin-only; resource writes are open to schedulers.
 * Deactivation never touches historical references.
 */

use std::sync::Arc;

use crate::db::SchedulingStore;
use crate::models::{
    AppointmentType, Clinician, Id, NewAppointmentType, NewOperationType, NewResource,
    OperationType, Resource,
};
use crate::utils::errors::{Result, SchedulingError};
use crate::utils::permissions;

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn SchedulingStore>,
}

impl CatalogService {
    /// Create a new catalog service
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    // ==================== Appointment types ====================

    pub async fn create_appointment_type(
        &self,
        actor: &Clinician,
        new: NewAppointmentType,
    ) -> Result<AppointmentType> {
        permissions::ensure_appointment_type_write(actor)?;
        if new.name.trim().is_empty() {
            return Err(SchedulingError::invalid("name", "name must not be empty"));
        }
        if let Some(duration) = new.duration_minutes {
            if duration <= 0 {
                return Err(SchedulingError::invalid(
                    "duration_minutes",
                    "duration_minutes must be >= 1",
                ));
            }
        }
        Ok(self.store.create_appointment_type(new).await?)
    }

    pub async fn list_appointment_types(&self, actor: &Clinician) -> Result<Vec<AppointmentType>> {
        permissions::ensure_appointment_type_read(actor)?;
        Ok(self.store.appointment_types().await?)
    }

    pub async fn set_appointment_type_active(
        &self,
        actor: &Clinician,
        id: Id,
        active: bool,
    ) -> Result<AppointmentType> {
        permissions::ensure_appointment_type_write(actor)?;
        Ok(self.store.set_appointment_type_active(id, active).await?)
    }

    // ==================== Operation types ====================

    pub async fn create_operation_type(
        &self,
        actor: &Clinician,
        new: NewOperationType,
    ) -> Result<OperationType> {
        permissions::ensure_operation_type_write(actor)?;
        if new.name.trim().is_empty() {
            return Err(SchedulingError::invalid("name", "name must not be empty"));
        }
        let total =
            new.prep_minutes.max(0) + new.op_minutes.max(0) + new.post_minutes.max(0);
        if total <= 0 {
            return Err(SchedulingError::invalid(
                "op_duration",
                "total duration must be greater than zero",
            ));
        }
        Ok(self.store.create_operation_type(new).await?)
    }

    pub async fn list_operation_types(&self, actor: &Clinician) -> Result<Vec<OperationType>> {
        permissions::ensure_appointment_type_read(actor)?;
        Ok(self.store.operation_types().await?)
    }

    pub async fn set_operation_type_active(
        &self,
        actor: &Clinician,
        id: Id,
        active: bool,
    ) -> Result<OperationType> {
        permissions::ensure_operation_type_write(actor)?;
        Ok(self.store.set_operation_type_active(id, active).await?)
    }

    // ==================== Resources ====================

    pub async fn create_resource(&self, actor: &Clinician, new: NewResource) -> Result<Resource> {
        permissions::ensure_resource_write(actor)?;
        if new.name.trim().is_empty() {
            return Err(SchedulingError::invalid("name", "name must not be empty"));
        }
        Ok(self.store.create_resource(new).await?)
    }

    pub async fn list_resources(&self, actor: &Clinician) -> Result<Vec<Resource>> {
        permissions::ensure_practice_config_read(actor)?;
        Ok(self.store.active_resources().await?)
    }

    pub async fn set_resource_active(
        &self,
        actor: &Clinician,
        id: Id,
        active: bool,
    ) -> Result<Resource> {
        permissions::ensure_resource_write(actor)?;
        Ok(self.store.set_resource_active(id, active).await?)
    }
}
