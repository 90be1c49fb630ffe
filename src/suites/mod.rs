pub mod blip;
pub mod google_video;
pub mod vimeo;

pub use blip::BlipSuite;
pub use google_video::GoogleVideoSuite;
pub use vimeo::VimeoSuite;
