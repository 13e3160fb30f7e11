pub mod context;
pub mod doors;
pub mod ground;
pub mod knowledge;
pub mod map_state;
pub mod position;
pub mod registry;
pub mod spatial;
pub mod spawner;
pub mod views;
