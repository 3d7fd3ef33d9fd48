mod schema;

pub use schema::{Field, Schema, SchemaError};
