//! Domain services
//!
//! Zero-sized rule engines holding the hierarchy and membership policy.
//! They carry no state, so they can be used as plain values
//! (`AcademicUnitDomainService.set_parent(..)`) from any thread.

pub mod membership_service;
pub mod unit_service;

pub use membership_service::MembershipDomainService;
pub use unit_service::AcademicUnitDomainService;
