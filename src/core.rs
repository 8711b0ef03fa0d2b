pub mod gate;
pub mod rate;
pub mod retention;
