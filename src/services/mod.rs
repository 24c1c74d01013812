// Service layer: validation, audit and search upkeep around the storage
// operations. Callers (CLI, admin endpoints, background jobs) go through here.

pub mod attendees;
pub mod documents;
pub mod people;
pub mod search;
