pub mod escrow;
pub mod lifecycle;
