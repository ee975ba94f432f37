pub mod config;
pub mod player;
pub mod provider;
pub mod seek;
pub mod state;

pub use config::{clamp_channels, PlayerConfig};
pub use player::{Delivery, Player, PlayerError};
pub use provider::BufferProvider;
pub use seek::clamp_target;
pub use state::PlayerState;
