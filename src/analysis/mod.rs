pub mod compare;
pub mod currency;

pub use compare::{compare_prices, detect_anomaly, DEFAULT_ANOMALY_THRESHOLD};
pub use currency::CurrencyConverter;
