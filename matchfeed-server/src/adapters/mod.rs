//! Server-side implementations of the core's collaborator ports.
//!
//! - `HttpDeliveryGateway`: signed webhook POSTs via reqwest
//! - `ConfigTabularStore`: match metadata from the config file, player stats in memory
//! - `OptOutConsentGate`: withholds players and competitions listed in the config

pub mod consent;
pub mod gateway;
pub mod tabular;

pub use consent::OptOutConsentGate;
pub use gateway::HttpDeliveryGateway;
pub use tabular::ConfigTabularStore;
