//! Domain types for BandRev

pub mod bar;
pub mod direction;
pub mod trade;

pub use bar::Bar;
pub use direction::Direction;
pub use trade::Trade;
