pub mod ids;
pub mod messages;
pub mod model;
pub mod protocol;
pub mod tools;
