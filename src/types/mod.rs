pub mod error;
pub mod events;
pub mod grid;
pub mod lake;
pub mod series;
pub mod table;
pub mod variable_class;
