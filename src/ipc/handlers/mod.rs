pub mod attendance;
pub mod classes;
pub mod content;
pub mod core;
pub mod scan;
pub mod students;
pub mod updates;
