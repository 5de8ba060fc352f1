pub mod health;
pub mod jobs;
pub mod org;
pub mod tenants;
