pub mod assignment;
pub mod audit;
pub mod currency;
pub mod expense;
pub mod member;
pub mod settlement;
pub mod trip;
