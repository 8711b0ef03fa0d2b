pub mod homewizard;
pub mod server;
