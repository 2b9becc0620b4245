pub mod easing;
pub mod timeline;
pub mod timeline_player;
