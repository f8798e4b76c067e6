/// Модуль предобработки данных

pub mod normalization;
pub mod sanitizer;

pub use normalization::FittedScaler;
pub use sanitizer::Sanitizer;
