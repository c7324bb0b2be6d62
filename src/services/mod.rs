/*!
 * Services Module
 *
 * Contains the scheduling core's business logic: admission planning,
 * availability, conflict detection, slot suggestion, lifecycles,
 * calendar aggregation, roster/catalog administration and audit
 * emission.
 */

pub mod audit_service;
pub mod availability_service;
pub mod calendar_service;
pub mod catalog_service;
pub mod conflict_service;
pub mod lifecycle_service;
pub mod patient_flow_service;
pub mod roster_service;
pub mod scheduling_service;
pub mod suggestion_service;

pub use audit_service::AuditService;
pub use availability_service::AvailabilityService;
pub use calendar_service::CalendarService;
pub use catalog_service::CatalogService;
pub use conflict_service::ConflictDetector;
pub use lifecycle_service::{LiveOperation, OperationLifecycleService};
pub use patient_flow_service::PatientFlowService;
pub use roster_service::RosterService;
pub use scheduling_service::{Deadline, SchedulingService};
pub use suggestion_service::SuggestionService;
