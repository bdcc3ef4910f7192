//! In-memory implementations of the repository and provider traits.
//!
//! These do not require a database connection. They back unit and
//! integration tests and are suitable for embedding the engine where rules
//! are managed in process.

mod resource;
mod rule_repo;
mod tag_repo;

pub use resource::MockResourceProvider;
pub use rule_repo::MockDynamicTagRuleRepository;
pub use tag_repo::MockTagRepository;
