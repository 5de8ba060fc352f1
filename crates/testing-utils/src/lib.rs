//! Shared testing utilities for the conductor workspace.
//!
//! Provides in-memory mock implementations of every repository and service
//! trait, plus builders for test entities. Add as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! conductor-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::{TaskBuilder, TenantBuilder, WorkerBuilder};
pub use mocks::{
    mock_tenant_handle, FailingWorkflowRunner, MockActivityLogRepository, MockEventBus,
    MockHandleProvider, MockMessageRepository, MockTaskRepository, MockTenantRepository,
    MockWorkerRepository, StubWorkflowRunner,
};
