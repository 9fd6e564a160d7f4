pub mod conversation;
pub mod decision;
pub mod outlet;
