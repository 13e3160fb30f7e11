pub mod character;
pub mod item;
