//! Map synchronization and point-submission core for the field assistant.
//!
//! The crate is headless: it keeps a retained map model consistent with a
//! periodically refreshed backend dataset of protected zones and recorded
//! points, tracks the device position, and runs the optimistic-update
//! protocol for newly submitted points. A host (the bundled terminal binary,
//! or a GUI shell) renders [`viewport::MapSnapshot`]s and forwards user input.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`geo`] | Coordinates, zones, points and backend classification types |
//! | [`client`] | `GeoDataClient` trait and its reqwest implementation |
//! | [`geolocation`] | Position sources and the `GeolocationTracker` |
//! | [`viewport`] | Zones/Points/Self layers, camera, transient effects |
//! | [`sync`] | Polling `MapSyncEngine` (`idle` / `syncing`) |
//! | [`submission`] | Five-state point submission workflow |
//! | [`session`] | `MapSession`: owns everything, `start()` / `dispose()` |
//! | [`task`] | Cancellable task handles and the cosmetic timer scheduler |
//! | [`config`] | Environment-driven configuration |
//! | [`error`] | Shared error-code trait |

pub mod client;
pub mod config;
pub mod error;
pub mod geo;
pub mod geolocation;
pub mod session;
pub mod submission;
pub mod sync;
pub mod task;
pub mod viewport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use session::{MapSession, SessionEvent};
