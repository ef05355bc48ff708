// Operator tooling for the PawfectMatch configuration store

pub mod cli; // Command line parsing and execution
pub mod model; // Settings
pub mod startup; // Logging and service wiring
