//! MongoDB connection layer

pub mod mongo;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection};
