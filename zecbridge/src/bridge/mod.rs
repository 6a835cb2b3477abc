pub mod estimate;
pub mod form;
pub mod script;
