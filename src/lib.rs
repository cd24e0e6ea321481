pub mod engine;
pub mod render;
pub mod vr;

pub use engine::{SharedXrServer, XrServer};
pub use render::{FrameDriver, HeadlessTextureStorage, SharedTextureStorage, TextureStorage};
pub use vr::{WebXrInterface, XrInterface};
