mod fees;
mod money;

pub mod op;

pub use fees::{calculate_fees, FeeSplit};
pub use money::{FeePercentage, FeePercentageError, Money, MoneyConversionError};
