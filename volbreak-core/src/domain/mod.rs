//! Domain types for VolBreak

pub mod bar;
pub mod breakout;
pub mod field;
pub mod granularity;
pub mod symbol;

pub use bar::{Bar, BarError, BarKey, Ohlc};
pub use breakout::{presentation_order, sort_for_presentation, BreakoutRecord};
pub use field::{FieldError, PriceField};
pub use granularity::{Granularity, GranularityError};
pub use symbol::{SymbolId, SymbolIdError, SymbolInfo};
