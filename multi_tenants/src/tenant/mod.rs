pub mod allocator;
pub mod directory;
pub mod migrations;
pub mod provisioner;
pub mod rollback;
pub mod saga;
pub mod schema;
pub mod seeder;

#[cfg(test)]
mod fakes;

pub use provisioner::{Collaborators, TenancySettings, TenantProvisioner};
