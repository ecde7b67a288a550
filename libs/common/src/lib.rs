pub mod log;
pub mod part_id;
