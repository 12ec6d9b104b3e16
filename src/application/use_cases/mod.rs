pub mod data_protection;
pub mod epic_context;
pub mod test_generation;
