// Configuration loading
pub mod config;

// Static object and resource schema
pub mod model;

// Observation events
pub mod notify;

// Simulated objects and registry
pub mod objects;

// Resource values, store and enabler contract
pub mod resource;

// Periodic sampling tasks
pub mod sampler;

// Security mode resolution and credential loading
pub mod security;

// External telemetry source
pub mod telemetry;
