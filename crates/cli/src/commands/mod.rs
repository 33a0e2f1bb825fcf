pub mod doctor;
pub mod serve;
pub mod usage;
