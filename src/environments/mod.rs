pub mod garet;
pub mod micro;
pub mod structure;
