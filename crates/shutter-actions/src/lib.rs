//! # shutter-actions
//!
//! The executable side of Shutter.
//!
//! - [`ActionRegistry`]: the catalog of schema-described, permissioned actions.
//!   Populated once at startup; lookups and capability discovery are safe
//!   against concurrent re-registration.
//! - [`ActionHandler`] and [`TargetResolver`]: the boundary to the photo
//!   store. The core never performs CRUD itself.
//! - [`Dispatcher`]: runs `Ready` commands with bounded concurrency,
//!   per-target failure isolation, cooperative cancellation, progress events
//!   and rollback of reversible bulk actions.
//!
//! ```ignore
//! let registry = Arc::new(ActionRegistry::new());
//! registry.register(
//!     ActionDescriptor::new("tag-photos", "Tag photos", handler)
//!         .schema(schema)
//!         .requires(["write:photos"])
//!         .serves([IntentKind::BulkTag])
//!         .bulk_over("targets")
//!         .reversible(true),
//! )?;
//!
//! let dispatcher = Dispatcher::new(registry, DispatchConfig::default()).with_resolver(library);
//! let result = dispatcher.execute(&command).await?;
//! ```

pub mod catalog;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod progress;
pub mod registry;

pub use catalog::{PhotoHandlers, photo_catalog};
pub use descriptor::{ActionDescriptor, ActionSummary};
pub use dispatcher::{Dispatcher, RollbackReport};
pub use error::{DispatchError, HandlerError, HandlerErrorKind, RegistryError};
pub use handler::{ActionHandler, TargetResolver};
pub use progress::ProgressEvent;
pub use registry::ActionRegistry;
