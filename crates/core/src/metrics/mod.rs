pub mod price;
pub mod statements;
