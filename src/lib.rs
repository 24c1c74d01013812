//! Identity resolution core for municipal meeting records.
//!
//! Attendee mentions extracted from minutes and agendas are resolved into
//! Attendee identities (a name as seen on one governing body) that roll up
//! to People. Around that graph sit duplicate detection and clustering,
//! reversible merges, and a full-text search index over documents, topics,
//! people and governing bodies.

pub mod audit;
pub mod clusters;
pub mod db;
pub mod distance;
pub mod duplicates;
pub mod entity;
pub mod error;
pub mod jobs;
mod migrations;
pub mod normalize;
pub mod processor;
pub mod queries;
pub mod services;
pub mod state;
pub mod types;
