pub mod orchestrator;

pub use orchestrator::{CallTimeouts, Collaborators, CreateRide, RideOrchestrator};
