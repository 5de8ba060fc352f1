pub mod postgres;
pub mod provisioner;
