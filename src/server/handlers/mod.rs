pub mod health;
pub mod playback;
